use benchpool::{
    errors::{JobError, PoolError},
    job::{self, BoxJob},
    Config, SizeClassPool, WorkerPoolInner,
};
use std::{
    sync::Arc,
    time::Instant,
};
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "benchpool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let buffers = Arc::new(SizeClassPool::new(64, 64 * 1024)?);
    let handler_buffers = buffers.clone();
    let handler = job::handler(move |job: BoxJob| {
        let buffers = handler_buffers.clone();
        async move {
            let scratch = buffers.get_pooled(4096);
            if scratch.len() != 4096 {
                return Err(JobError::failed("short scratch buffer"));
            }
            job.run(None).await
        }
    });

    let pool = WorkerPoolInner::with_config(Config::io_bound().with_env_overrides(), handler)?;
    pool.start()?;

    let now = Instant::now();
    let mut rejected = 0usize;
    for i in 0..100_000u64 {
        match pool.serve_fn(move |_| async move {
            std::hint::black_box(i);
            Ok(())
        }) {
            Ok(()) => {}
            Err(PoolError::Saturated) => {
                rejected += 1;
                tokio::task::yield_now().await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    pool.stop()?;
    let drained = pool.join_workers_timeout(Duration::from_secs(5)).await;

    let metrics = pool.metrics();
    tracing::info!(
        elapsed = ?now.elapsed(),
        completed = metrics.completed_jobs,
        rejected,
        drained,
        buffer_hit_rate = buffers.metrics().hit_rate(),
        "done"
    );
    Ok(())
}
