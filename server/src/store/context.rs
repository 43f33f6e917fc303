//! Request-scoped cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{StoreError, StoreResult};

/// Cancellation and deadline shared by all store work of one request.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// No deadline, never cancelled unless [`Self::cancel`] is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current failure condition, if any.
    pub fn err(&self) -> Option<StoreError> {
        if self.cancel.is_cancelled() {
            Some(StoreError::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StoreError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Drive `fut` unless the context is cancelled or its deadline passes first.
    ///
    /// The losing future is dropped, which rolls back any open transaction.
    pub async fn run<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(StoreError::Canceled),
            () = deadline => Err(StoreError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
