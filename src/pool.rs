use super::{
    bench::{Bench, BenchCache, Inbox, Signal},
    errors::{ConfigError, PoolError},
    janitor,
    job::{self, BoxJob, Handler, Params},
    model::PoolMetrics,
    result::{ConfigResult, JobResult, ServeResult},
};
use std::{
    future::Future,
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::Notify,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};


pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(10);

const ENV_MAX_WORKERS: &str = "BENCHPOOL_MAX_WORKERS";
const ENV_MAX_IDLE_MS: &str = "BENCHPOOL_MAX_IDLE_MS";
const ENV_LOG_ALL_ERRORS: &str = "BENCHPOOL_LOG_ALL_ERRORS";


/// Конфигурация пула воркеров
#[derive(Debug, Clone)]
pub struct Config {
    pub max_workers: usize,
    /// Ноль означает `DEFAULT_MAX_IDLE`
    pub max_idle_duration: Duration,
    pub log_all_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get() * 64,
            max_idle_duration: DEFAULT_MAX_IDLE,
            log_all_errors: false,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self {
            max_workers: num_cpus::get(),
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        Self {
            max_workers: num_cpus::get() * 256,
            max_idle_duration: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Переопределения из окружения; некорректные значения игнорируются
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var(ENV_MAX_WORKERS) {
            match val.parse() {
                Ok(n) => self.max_workers = n,
                Err(_) => warn!(var = ENV_MAX_WORKERS, value = %val, "ignoring invalid value"),
            }
        }
        if let Ok(val) = std::env::var(ENV_MAX_IDLE_MS) {
            match val.parse() {
                Ok(ms) => self.max_idle_duration = Duration::from_millis(ms),
                Err(_) => warn!(var = ENV_MAX_IDLE_MS, value = %val, "ignoring invalid value"),
            }
        }
        if let Ok(val) = std::env::var(ENV_LOG_ALL_ERRORS) {
            self.log_all_errors = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        self
    }

    #[inline]
    pub fn max_idle(&self) -> Duration {
        if self.max_idle_duration.is_zero() {
            return DEFAULT_MAX_IDLE;
        }
        self.max_idle_duration
    }
}


struct State {
    /// Отсортирован по `last_used` по возрастанию
    idle: Vec<Bench>,
    workers_count: usize,
    stopped: bool,
    runtime: Option<Handle>,
}

enum Acquired {
    Idle(Bench),
    Create(Handle),
}


pub type WorkerPool = Arc<WorkerPoolInner>;

/// Самомасштабируемый пул воркеров.
///
/// Свободные воркеры ждут на idle-листе, занятые держат свой бенч.
/// Новые воркеры создаются по требованию до `max_workers`,
/// простаивающие дольше `max_idle` выселяются janitor'ом.
pub struct WorkerPoolInner {
    handler: Handler,
    config: Config,
    state: Mutex<State>,
    stop_sign: Mutex<Option<CancellationToken>>,
    cache: BenchCache,
    all_workers_retired: Notify,
    completed_jobs: AtomicUsize,
    failed_jobs: AtomicUsize,
    rejected_jobs: AtomicUsize,
    evicted_workers: AtomicUsize,
}

impl WorkerPoolInner {
    pub fn new(max_workers: usize, handler: Handler) -> ConfigResult<WorkerPool> {
        let config = Config {
            max_workers,
            ..Default::default()
        };
        Self::with_config(config, handler)
    }

    pub fn with_config(config: Config, handler: Handler) -> ConfigResult<WorkerPool> {
        if config.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        Ok(Arc::new(WorkerPoolInner {
            handler,
            cache: BenchCache::new(config.max_workers),
            state: Mutex::new(State {
                idle: Vec::new(),
                workers_count: 0,
                stopped: false,
                runtime: None,
            }),
            stop_sign: Mutex::new(None),
            all_workers_retired: Notify::new(),
            completed_jobs: AtomicUsize::new(0),
            failed_jobs: AtomicUsize::new(0),
            rejected_jobs: AtomicUsize::new(0),
            evicted_workers: AtomicUsize::new(0),
            config,
        }))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Запуск пула: фиксирует текущий tokio-рантайм и поднимает janitor.
    /// Перезапуск после `stop` запрещён.
    pub fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        let mut stop_sign = self.stop_sign.lock();
        if stop_sign.is_some() {
            return Err(PoolError::AlreadyRunning);
        }

        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        {
            let mut state = self.state.lock();
            if state.stopped {
                return Err(PoolError::Stopped);
            }
            state.runtime = Some(runtime.clone());
        }

        let token = CancellationToken::new();
        janitor::spawn(&runtime, Arc::downgrade(self), token.clone());
        *stop_sign = Some(token);

        debug!(
            max_workers = self.config.max_workers,
            max_idle = ?self.config.max_idle(),
            "worker pool started"
        );
        Ok(())
    }

    /// Кооперативная остановка: свободные воркеры получают сигнал завершения,
    /// занятые доделывают текущую задачу и уходят сами.
    pub fn stop(&self) -> Result<(), PoolError> {
        // stop_sign держится до выставления `stopped`, иначе `start` успеет вклиниться
        let mut stop_sign = self.stop_sign.lock();
        let token = stop_sign.take().ok_or(PoolError::NotRunning)?;
        token.cancel();

        let reclaimed = {
            let mut state = self.state.lock();
            state.stopped = true;
            let idle = mem::take(&mut state.idle);
            let reclaimed = idle.len();
            for bench in idle {
                bench.terminate();
            }
            self.retire_locked(&mut state, reclaimed);
            reclaimed
        };
        drop(stop_sign);

        debug!(reclaimed, "worker pool stopped");
        Ok(())
    }

    /// Отдать задачу свободному или новому воркеру.
    /// Не ждёт выполнения; при отсутствии мощностей сразу `Saturated`.
    pub fn serve(self: &Arc<Self>, job: BoxJob) -> ServeResult {
        let bench = match self.acquire()? {
            Acquired::Idle(bench) => bench,
            Acquired::Create(runtime) => self.spawn_worker(&runtime),
        };

        bench.deliver(job).map_err(|_job| {
            // инбокс закрыт только если рантайм уже уничтожил воркер
            warn!("worker is gone, dropping job");
            self.retire(1);
            PoolError::NotRunning
        })
    }

    #[inline]
    pub fn serve_fn<F, Fut>(self: &Arc<Self>, f: F) -> ServeResult
    where
        F: FnOnce(Params) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        self.serve(job::from_fn(f))
    }

    fn acquire(&self) -> Result<Acquired, PoolError> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(PoolError::NotRunning);
        }

        // самый недавно освободившийся бенч: тёплый кэш важнее честности
        if let Some(bench) = state.idle.pop() {
            return Ok(Acquired::Idle(bench));
        }

        if state.workers_count < self.config.max_workers {
            if let Some(runtime) = state.runtime.clone() {
                state.workers_count += 1;
                return Ok(Acquired::Create(runtime));
            }
            return Err(PoolError::NotRunning);
        }
        drop(state);

        self.rejected_jobs.fetch_add(1, Ordering::Relaxed);
        Err(PoolError::Saturated)
    }

    fn spawn_worker(self: &Arc<Self>, runtime: &Handle) -> Bench {
        let (bench, inbox) = self.cache.get();
        runtime.spawn(worker_loop(Arc::downgrade(self), inbox));
        debug!("worker spawned");
        bench
    }

    async fn execute(&self, job: BoxJob) {
        let handler = &self.handler;
        match job::contain(|| handler(job)).await {
            Ok(()) => {
                self.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_jobs.fetch_add(1, Ordering::Relaxed);
                if e.is_panic() {
                    error!(error = %e, "job running error");
                } else if self.config.log_all_errors {
                    warn!(error = %e, "job failed");
                } else {
                    debug!(error = %e, "job failed");
                }
            }
        }
    }

    /// Вернуть бенч в idle-лист. После `stop` воркер вместо этого уходит.
    fn release(&self, mut bench: Bench) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            self.retire_locked(&mut state, 1);
            return false;
        }
        // время берётся под локом, поэтому idle-лист остаётся отсортированным
        bench.last_used = Instant::now();
        state.idle.push(bench);
        true
    }

    fn recycle(&self, bench: Bench, inbox: Inbox) {
        if !self.state.lock().stopped {
            self.cache.put(bench, inbox);
        }
    }

    /// Выселить бенчи, простаивающие дольше `max_idle`.
    /// Каждый получает ровно один сигнал завершения.
    pub(crate) fn evict_idle(&self, recycle: &mut Vec<Bench>) -> usize {
        let Some(cutoff) = janitor::cutoff(Instant::now(), self.config.max_idle()) else {
            return 0;
        };

        {
            let mut state = self.state.lock();
            let stale = janitor::stale_count(&state.idle, cutoff);
            if stale == 0 {
                return 0;
            }
            recycle.extend(state.idle.drain(..stale));
            self.retire_locked(&mut state, stale);
        }

        let evicted = recycle.len();
        for bench in recycle.drain(..) {
            bench.terminate();
        }
        self.evicted_workers.fetch_add(evicted, Ordering::Relaxed);
        debug!(evicted, "evicted idle workers");
        evicted
    }

    fn retire(&self, n: usize) {
        let mut state = self.state.lock();
        self.retire_locked(&mut state, n);
    }

    fn retire_locked(&self, state: &mut State, n: usize) {
        if n == 0 {
            return;
        }
        state.workers_count -= n;
        if state.workers_count == 0 {
            self.all_workers_retired.notify_waiters();
        }
    }

    #[inline]
    fn workers(&self) -> usize {
        self.state.lock().workers_count
    }

    pub fn is_running(&self) -> bool {
        self.stop_sign.lock().is_some()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let (workers, idle_workers) = {
            let state = self.state.lock();
            (state.workers_count, state.idle.len())
        };
        PoolMetrics {
            workers,
            idle_workers,
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            failed_jobs: self.failed_jobs.load(Ordering::Relaxed),
            rejected_jobs: self.rejected_jobs.load(Ordering::Relaxed),
            evicted_workers: self.evicted_workers.load(Ordering::Relaxed),
        }
    }

    /// Дождаться ухода всех воркеров (имеет смысл после `stop`)
    pub async fn join_workers(&self) {
        loop {
            let retired = self.all_workers_retired.notified();
            tokio::pin!(retired);
            retired.as_mut().enable();

            if self.workers() == 0 {
                return;
            }
            retired.await;
        }
    }

    pub async fn join_workers_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.join_workers()).await.is_ok()
    }
}

impl Drop for WorkerPoolInner {
    fn drop(&mut self) {
        if let Some(token) = self.stop_sign.get_mut().take() {
            token.cancel();
        }
    }
}


/// Постоянный цикл воркера. Держит только слабую ссылку на пул:
/// после дропа пула idle-бенчи закрываются и воркер выходит.
async fn worker_loop(pool: Weak<WorkerPoolInner>, mut inbox: Inbox) {
    while let Some(signal) = inbox.recv().await {
        let (job, bench) = match signal {
            Signal::Job(job, bench) => (job, bench),
            Signal::Terminate(bench) => {
                // счётчик уже уменьшил тот, кто прислал сигнал
                if let Some(inner) = pool.upgrade() {
                    inner.recycle(bench, inbox);
                }
                return;
            }
        };

        let Some(inner) = pool.upgrade() else {
            return;
        };
        inner.execute(job).await;
        if !inner.release(bench) {
            return;
        }
    }
}
