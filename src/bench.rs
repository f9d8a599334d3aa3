use super::job::BoxJob;
use crossbeam::queue::ArrayQueue;
use tokio::{
    sync::mpsc,
    time::Instant,
};


/// Бенч на idle-листе всегда вычитан до конца, поэтому одного слота
/// достаточно: передача задачи через `try_send` никогда не упирается в Full.
pub(crate) const BENCH_CAPACITY: usize = 1;

/// Сообщение в инбокс воркера.
/// Бенч путешествует вместе с сообщением: у бенча всегда ровно один владелец.
pub(crate) enum Signal {
    Job(BoxJob, Bench),
    Terminate(Bench),
}

pub(crate) type Inbox = mpsc::Receiver<Signal>;


/// Рабочее место воркера: отправляющая половина его инбокса
/// и время последнего возврата в idle-лист
pub(crate) struct Bench {
    sender: mpsc::Sender<Signal>,
    pub(crate) last_used: Instant,
}

impl Bench {
    /// Отдать задачу воркеру. При закрытом инбоксе задача возвращается.
    pub(crate) fn deliver(self, job: BoxJob) -> Result<(), BoxJob> {
        let sender = self.sender.clone();
        sender
            .try_send(Signal::Job(job, self))
            .or_else(|e| match e.into_inner() {
                Signal::Job(job, _) => Err(job),
                Signal::Terminate(_) => Ok(()),
            })
    }

    /// Единственный сигнал завершения для воркера этого бенча
    pub(crate) fn terminate(self) -> bool {
        let sender = self.sender.clone();
        sender.try_send(Signal::Terminate(self)).is_ok()
    }
}


/// Кэш пар (бенч, инбокс) для повторного использования каналов.
/// Ограничен потолком воркеров: больше бенчей одновременно не существует.
pub(crate) struct BenchCache {
    slots: ArrayQueue<(Bench, Inbox)>,
}

impl BenchCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity.max(1)),
        }
    }

    pub(crate) fn get(&self) -> (Bench, Inbox) {
        self.slots.pop().unwrap_or_else(|| {
            let (sender, inbox) = mpsc::channel(BENCH_CAPACITY);
            let bench = Bench {
                sender,
                last_used: Instant::now(),
            };
            (bench, inbox)
        })
    }

    pub(crate) fn put(&self, bench: Bench, inbox: Inbox) {
        // полный кэш: пара просто дропается
        let _ = self.slots.push((bench, inbox));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
