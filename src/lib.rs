//! Самомасштабируемый пул воркеров и пул буферов с размерными классами
//!
//! # Features
//! - Воркеры создаются по требованию до заданного потолка и переиспользуются
//! - Janitor выселяет воркеров, простаивающих дольше `max_idle`
//! - Насыщение сообщается сразу, без блокировки вызывающего
//! - Кооперативная остановка: задачи в работе не прерываются
//! - Паники обработчика изолированы внутри воркера
//! - Пул буферов со степенями двойки между `min_size` и `max_size`
//! - Упрощённый диспетчер с фиксированным числом воркеров

mod bench;
pub mod buffer;
pub mod dispatcher;
pub mod errors;
mod janitor;
pub mod job;
pub mod model;
pub mod pool;
pub mod result;

pub use buffer::{PooledBuffer, SizeClassPool};
pub use dispatcher::Dispatcher;
pub use job::{BoxJob, Handler, Job, Params};
pub use pool::{Config, WorkerPool, WorkerPoolInner};
