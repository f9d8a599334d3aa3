#[cfg(test)]
mod tests {
    use benchpool::{
    errors::{JobError, PoolError},
    job::{self, Params},
    pool::{
        Config,
        WorkerPool,
        WorkerPoolInner,
        },
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tokio::sync::oneshot;

    fn pool_with(max_workers: usize, max_idle: Duration) -> WorkerPool {
        let config = Config {
            max_workers,
            max_idle_duration: max_idle,
            log_all_errors: true,
        };
        WorkerPoolInner::with_config(config, job::run_with(None)).expect("valid config")
    }

    /// Задача, которая держит воркер до сигнала
    fn serve_blocking(pool: &WorkerPool) -> Result<oneshot::Sender<()>, PoolError> {
        let (tx, rx) = oneshot::channel::<()>();
        pool.serve_fn(move |_| async move {
            let _ = rx.await;
            Ok(())
        })?;
        Ok(tx)
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_saturation_single_worker() {
        println!("\n=== TEST: Насыщение при одном воркере ===");
        let pool = pool_with(1, Duration::from_secs(10));
        pool.start().unwrap();

        let release = serve_blocking(&pool).expect("first job accepted");
        let second = pool.serve_fn(|_| async { Ok(()) });
        assert_eq!(second, Err(PoolError::Saturated));
        assert_eq!(pool.metrics().rejected_jobs, 1);
        println!("  ✓ Второй serve вернул Saturated");

        release.send(()).unwrap();
        assert!(wait_until(|| pool.metrics().idle_workers == 1).await);

        // воркер переиспользуется, новых не появляется
        assert!(pool.serve_fn(|_| async { Ok(()) }).is_ok());
        assert!(wait_until(|| pool.metrics().completed_jobs == 2).await);
        assert_eq!(pool.metrics().workers, 1);

        pool.stop().unwrap();
    }

    #[tokio::test]
    async fn test_no_saturation_below_ceiling() {
        println!("\n=== TEST: Рост до потолка без отказов ===");
        let pool = pool_with(4, Duration::from_secs(10));
        pool.start().unwrap();

        let mut gates = Vec::new();
        for i in 0..4 {
            let gate = serve_blocking(&pool).unwrap_or_else(|e| panic!("job {} rejected: {}", i, e));
            gates.push(gate);
            assert_eq!(pool.metrics().workers, i + 1);
        }
        assert_eq!(serve_blocking(&pool).err(), Some(PoolError::Saturated));
        println!("  ✓ Пятая задача упёрлась в потолок");

        for gate in gates {
            gate.send(()).unwrap();
        }
        assert!(wait_until(|| pool.metrics().idle_workers == 4).await);
        assert_eq!(pool.metrics().workers, 4);

        pool.stop().unwrap();
        assert!(pool.join_workers_timeout(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        println!("\n=== TEST: Ошибки жизненного цикла ===");
        let pool = pool_with(2, Duration::from_secs(10));

        assert_eq!(pool.stop(), Err(PoolError::NotRunning));
        pool.start().unwrap();
        assert!(pool.is_running());
        assert_eq!(pool.start(), Err(PoolError::AlreadyRunning));

        pool.stop().unwrap();
        assert!(!pool.is_running());
        assert_eq!(pool.stop(), Err(PoolError::NotRunning));
        assert_eq!(pool.start(), Err(PoolError::Stopped));
        assert_eq!(pool.serve_fn(|_| async { Ok(()) }), Err(PoolError::NotRunning));
        println!("  ✓ Повторный start/stop отклонены");
    }

    #[tokio::test]
    async fn test_cooperative_stop() {
        println!("\n=== TEST: Кооперативная остановка ===");
        let pool = pool_with(2, Duration::from_secs(10));
        pool.start().unwrap();

        let busy = serve_blocking(&pool).unwrap();
        let quick = serve_blocking(&pool).unwrap();
        quick.send(()).unwrap();
        assert!(wait_until(|| pool.metrics().idle_workers == 1).await);

        pool.stop().unwrap();
        let metrics = pool.metrics();
        assert_eq!(metrics.idle_workers, 0, "idle воркеры сняты сразу");
        assert_eq!(metrics.workers, 1, "занятый воркер не прерывается");
        assert!(!pool.join_workers_timeout(Duration::from_millis(50)).await);

        busy.send(()).unwrap();
        assert!(pool.join_workers_timeout(Duration::from_secs(1)).await);

        let metrics = pool.metrics();
        assert_eq!(metrics.workers, 0);
        assert_eq!(metrics.idle_workers, 0, "после stop бенч не возвращается");
        assert_eq!(metrics.completed_jobs, 2);
        println!("  ✓ Занятый воркер доработал и ушёл");
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        println!("\n=== TEST: Изоляция паник ===");
        let pool = pool_with(1, Duration::from_secs(10));
        pool.start().unwrap();

        pool.serve_fn(|_| async {
            let fail = true;
            if fail {
                panic!("handler exploded");
            }
            Ok(())
        })
        .unwrap();
        assert!(wait_until(|| pool.metrics().idle_workers == 1).await);

        pool.serve_fn(|_| async { Err(JobError::failed("bad input")) }).unwrap();
        assert!(wait_until(|| pool.metrics().failed_jobs == 2).await);
        assert!(wait_until(|| pool.metrics().idle_workers == 1).await);

        // ёмкость не утекла: единственный воркер снова свободен
        pool.serve_fn(|_| async { Ok(()) }).unwrap();
        assert!(wait_until(|| pool.metrics().completed_jobs == 1).await);

        let metrics = pool.metrics();
        assert_eq!(metrics.workers, 1);
        assert_eq!(metrics.failed_jobs, 2);
        assert!((metrics.success_rate() - 1.0 / 3.0).abs() < 1e-9);
        println!("  ✓ Паника и ошибка учтены, воркер жив");

        pool.stop().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_evicted() {
        println!("\n=== TEST: Выселение простаивающих ===");
        let pool = pool_with(2, Duration::from_millis(10));
        pool.start().unwrap();

        pool.serve_fn(|_| async { Ok(()) }).unwrap();
        for _ in 0..100 {
            if pool.metrics().idle_workers == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(pool.metrics().idle_workers, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let metrics = pool.metrics();
        assert_eq!(metrics.idle_workers, 0);
        assert_eq!(metrics.workers, 0);
        assert_eq!(metrics.evicted_workers, 1);
        println!("  ✓ Бенч выселен janitor'ом");

        // после выселения пул снова растёт
        pool.serve_fn(|_| async { Ok(()) }).unwrap();
        assert_eq!(pool.metrics().workers, 1);

        pool.stop().unwrap();
    }

    #[tokio::test]
    async fn test_params_reach_jobs() {
        println!("\n=== TEST: Передача параметров ===");
        let seen = Arc::new(AtomicUsize::new(0));
        let params: Params = Some(Arc::new(5usize));
        let pool = WorkerPoolInner::new(2, job::run_with(params)).unwrap();
        pool.start().unwrap();

        for _ in 0..3 {
            let seen = seen.clone();
            pool.serve_fn(move |p: Params| async move {
                let n = p.and_then(|p| p.downcast_ref::<usize>().copied()).unwrap_or(0);
                seen.fetch_add(n, Ordering::SeqCst);
                Ok(())
            })
            .ok();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(wait_until(|| seen.load(Ordering::SeqCst) == 15).await);
        pool.stop().unwrap();
    }

    #[tokio::test]
    async fn test_independent_pools() {
        println!("\n=== TEST: Независимые пулы ===");
        let a = pool_with(1, Duration::from_secs(10));
        let b = pool_with(1, Duration::from_secs(10));
        a.start().unwrap();
        b.start().unwrap();

        let gate = serve_blocking(&a).unwrap();
        assert_eq!(a.serve_fn(|_| async { Ok(()) }), Err(PoolError::Saturated));
        assert!(b.serve_fn(|_| async { Ok(()) }).is_ok());

        a.stop().unwrap();
        assert!(b.is_running());
        gate.send(()).unwrap();
        assert!(a.join_workers_timeout(Duration::from_secs(1)).await);
        b.stop().unwrap();
    }

    #[tokio::test]
    async fn test_dropping_pool_releases_workers() {
        println!("\n=== TEST: Дроп пула ===");
        let pool = pool_with(4, Duration::from_secs(10));
        pool.start().unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = done.clone();
            pool.serve_fn(move |_| async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        assert!(wait_until(|| pool.metrics().idle_workers == 4).await);

        let weak = Arc::downgrade(&pool);
        drop(pool);
        assert!(weak.upgrade().is_none(), "воркеры не держат пул");
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }
}
