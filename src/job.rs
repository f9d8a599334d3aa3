use super::{
    errors::JobError,
    result::JobResult,
};
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
};
use futures::FutureExt;


/// Непрозрачный параметр, передаваемый задаче при запуске
pub type Params = Option<Arc<dyn Any + Send + Sync>>;

pub type JobFuture = Pin<Box<dyn Future<Output = JobResult> + Send + 'static>>;

pub type BoxJob = Box<dyn Job>;

/// Обработчик задач, общий для всех воркеров пула (только чтение)
pub type Handler = Arc<dyn Fn(BoxJob) -> JobFuture + Send + Sync>;


/// Единица работы для пула
pub trait Job: Send + 'static {
    fn run(self: Box<Self>, params: Params) -> JobFuture;
}

impl<F, Fut> Job for F
where
    F: FnOnce(Params) -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    fn run(self: Box<Self>, params: Params) -> JobFuture {
        Box::pin((*self)(params))
    }
}

/// Упаковать замыкание в задачу
#[inline]
pub fn from_fn<F, Fut>(f: F) -> BoxJob
where
    F: FnOnce(Params) -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    Box::new(f)
}

/// Обработчик из async-замыкания
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(BoxJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    Arc::new(move |job: BoxJob| -> JobFuture { Box::pin(f(job)) })
}

/// Обработчик, запускающий каждую задачу с общим параметром
pub fn run_with(params: Params) -> Handler {
    Arc::new(move |job: BoxJob| job.run(params.clone()))
}


/// Граница отказа: паника обработчика превращается в `JobError::Panic`,
/// как при синхронном вызове, так и при опросе future.
pub async fn contain<F>(call: F) -> JobResult
where
    F: FnOnce() -> JobFuture,
{
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => fut,
        Err(payload) => return Err(JobError::Panic(panic_message(payload))),
    };

    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(JobError::Panic(panic_message(payload))))
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
