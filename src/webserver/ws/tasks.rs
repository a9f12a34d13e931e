/// Supervised task spawning
///
/// A panic inside a supervised future is caught at the top of the task,
/// logged, and reported to the caller as `None`. Cleanup that lives in
/// Drop guards inside the future still runs during the unwind.
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::logger::{self, LogTag};

/// Run `future`, converting a panic into `None`
pub async fn supervise<F>(label: &str, future: F) -> Option<F::Output>
where
    F: Future,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(output) => Some(output),
        Err(payload) => {
            logger::error(
                LogTag::System,
                &format!("Task '{}' panicked: {}", label, panic_message(payload.as_ref())),
            );
            None
        }
    }
}

/// Spawn `future` on the runtime under supervision
pub fn spawn_supervised<F>(label: impl Into<String>, future: F) -> JoinHandle<Option<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let label = label.into();
    tokio::spawn(async move { supervise(&label, future).await })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
