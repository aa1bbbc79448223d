use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

type RetryAction<T> = Box<dyn FnOnce() -> BoxFuture<'static, ApiResult<T>> + Send>;

/// "Redo the operation that failed for lack of consent."
///
/// Single use. The first [`invoke`](Self::invoke) runs the action; every
/// later call returns [`ApiError::RetryAlreadyUsed`] without running it.
pub struct PendingRetry<T> {
    action: Mutex<Option<RetryAction<T>>>,
}

impl<T: Send + 'static> PendingRetry<T> {
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let action: RetryAction<T> = Box::new(move || action().boxed());
        Self {
            action: Mutex::new(Some(action)),
        }
    }

    /// Run the deferred action, at most once
    pub async fn invoke(&self) -> ApiResult<T> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match action {
            Some(action) => {
                debug!("Retrying operation after consent grant");
                action().await
            }
            None => {
                warn!("Pending retry invoked more than once");
                Err(ApiError::RetryAlreadyUsed)
            }
        }
    }

    /// True once the action has been taken
    pub fn is_spent(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
