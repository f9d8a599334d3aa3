use thiserror::Error;


/// Ошибки жизненного цикла пула и приёма задач
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("worker pool is running already")]
    AlreadyRunning,
    #[error("worker pool is not running")]
    NotRunning,
    #[error("worker pool was stopped and cannot be restarted")]
    Stopped,
    #[error("worker pool must be started inside a tokio runtime")]
    NoRuntime,
    #[error("all workers are busy at the moment")]
    Saturated,
}

/// Ошибки конфигурации, фатальны на этапе создания
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("max size {max} can't be less than min size {min}")]
    InvalidRange { min: usize, max: usize },
    #[error("min size must be greater than zero")]
    ZeroMinSize,
    #[error("max workers must be greater than zero")]
    ZeroWorkers,
}

/// Результат неудачной задачи; никогда не покидает воркер
#[derive(Debug, Error, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error("job panicked: {0}")]
    Panic(String),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}
