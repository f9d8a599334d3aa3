use super::errors::{ConfigError, JobError, PoolError};


pub type ServeResult = Result<(), PoolError>;

pub type JobResult = Result<(), JobError>;

pub type ConfigResult<T> = Result<T, ConfigError>;
