use super::{
    bench::Bench,
    pool::WorkerPoolInner,
};
use std::sync::Weak;
use tokio::{
    runtime::Handle,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;


/// Фоновый цикл выселения простаивающих воркеров.
/// Период опроса равен `max_idle`; выход по `stop_sign` или после дропа пула.
pub(crate) fn spawn(runtime: &Handle, pool: Weak<WorkerPoolInner>, stop_sign: CancellationToken) {
    runtime.spawn(async move {
        let mut recycle: Vec<Bench> = Vec::new();
        loop {
            let interval = {
                let Some(pool) = pool.upgrade() else {
                    return;
                };
                pool.evict_idle(&mut recycle);
                pool.config().max_idle()
            };

            tokio::select! {
                _ = stop_sign.cancelled() => {
                    trace!("janitor stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });
}

/// Граница устаревания: всё, что вернулось в idle-лист раньше, выселяется
#[inline]
pub(crate) fn cutoff(now: Instant, max_idle: Duration) -> Option<Instant> {
    now.checked_sub(max_idle)
}

/// Число устаревших бенчей в начале отсортированного idle-листа
#[inline]
pub(crate) fn stale_count(idle: &[Bench], cutoff: Instant) -> usize {
    idle.partition_point(|bench| bench.last_used < cutoff)
}
