//! Упрощённый диспетчер: фиксированное число воркеров, общая очередь и брокер.
//!
//! В отличие от `WorkerPool` не выселяет простаивающих и не сообщает о
//! насыщении: отправитель просто ждёт места в ограниченной очереди.

use super::{
    errors::PoolError,
    job::{self, BoxJob},
};
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};


pub const QUEUE_CAPACITY: usize = 20;

type WorkerInbox = mpsc::Sender<BoxJob>;


pub struct Dispatcher {
    workers: usize,
    queue: mpsc::Sender<BoxJob>,
    pending: Mutex<Option<mpsc::Receiver<BoxJob>>>,
    off: CancellationToken,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        let (queue, pending) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            workers: workers.max(1),
            queue,
            pending: Mutex::new(Some(pending)),
            off: CancellationToken::new(),
        }
    }

    /// Поднять воркеров и брокер. Повторный вызов вернёт `AlreadyRunning`.
    pub fn run(&self) -> Result<(), PoolError> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        let queue = self.pending.lock().take().ok_or(PoolError::AlreadyRunning)?;
        let (free_tx, free_rx) = mpsc::channel::<WorkerInbox>(self.workers);

        for id in 0..self.workers {
            runtime.spawn(worker_loop(id, free_tx.clone(), self.off.child_token()));
        }
        runtime.spawn(broker(queue, free_rx, self.off.clone()));

        debug!(workers = self.workers, "dispatcher running");
        Ok(())
    }

    /// Канал отправки задач
    #[inline]
    pub fn queue(&self) -> mpsc::Sender<BoxJob> {
        self.queue.clone()
    }

    pub fn shutdown(&self) {
        self.off.cancel();
        debug!("dispatcher shut down");
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.off.is_cancelled()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.off.cancel();
    }
}


async fn broker(
    mut queue: mpsc::Receiver<BoxJob>,
    mut free: mpsc::Receiver<WorkerInbox>,
    off: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = off.cancelled() => return,
            job = queue.recv() => match job {
                Some(job) => job,
                None => return,
            },
        };

        let worker = tokio::select! {
            _ = off.cancelled() => return,
            worker = free.recv() => match worker {
                Some(worker) => worker,
                None => return,
            },
        };

        // свободный воркер ждёт ровно одну задачу, слот всегда пуст
        if let Err(e) = worker.try_send(job) {
            debug!(error = %e, "worker left before receiving job, job dropped");
        }
    }
}

async fn worker_loop(id: usize, free: mpsc::Sender<WorkerInbox>, off: CancellationToken) {
    let (inbox, mut tasks) = mpsc::channel::<BoxJob>(1);
    loop {
        if free.send(inbox.clone()).await.is_err() {
            return;
        }

        let job = tokio::select! {
            _ = off.cancelled() => return,
            job = tasks.recv() => match job {
                Some(job) => job,
                None => return,
            },
        };

        if let Err(e) = job::contain(|| job.run(None)).await {
            error!(worker = id, error = %e, "job running error");
        }
    }
}
