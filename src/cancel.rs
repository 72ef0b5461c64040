//! Caller-side cancellation and deadlines for a logical fetch

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Optional deadline plus optional cancel signal
///
/// The default control never aborts.
#[derive(Debug, Clone, Default)]
pub struct FetchControl {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Fires the cancel signal of the paired [`FetchControl`]
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals every control created alongside this handle
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl FetchControl {
    /// Control that never aborts
    pub fn none() -> Self {
        Self::default()
    }

    /// Control plus the handle that cancels it
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: Some(rx),
            },
            CancelHandle { tx },
        )
    }

    /// Adds an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Errors if the fetch was cancelled or its deadline has passed
    pub fn check(&self) -> Result<(), ProviderError> {
        if self.cancelled() {
            return Err(ProviderError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ProviderError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Whether the fetch was cancelled or ran past its deadline
    pub fn is_aborted(&self) -> bool {
        self.check().is_err()
    }

    /// Drives `fut` until it completes, the signal fires or the deadline hits
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ProviderError> {
        self.check()?;

        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => {
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        // handle dropped without cancelling
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            out = fut => Ok(out),
            _ = cancelled => Err(ProviderError::Cancelled),
            _ = expired => Err(ProviderError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_control_runs_to_completion() {
        let control = FetchControl::none();
        assert_eq!(control.run(async { 7 }).await, Ok(7));
        assert!(!control.is_aborted());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let (control, handle) = FetchControl::cancellable();
        let task = tokio::spawn(async move {
            control
                .run(tokio::time::sleep(Duration::from_secs(30)))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(ProviderError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_sleep() {
        let control = FetchControl::none().with_timeout(Duration::from_millis(20));
        let result = control
            .run(tokio::time::sleep(Duration::from_secs(30)))
            .await;
        assert_eq!(result, Err(ProviderError::DeadlineExceeded));
        assert_eq!(control.check(), Err(ProviderError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (control, handle) = FetchControl::cancellable();
        drop(handle);
        let result = control
            .run(tokio::time::sleep(Duration::from_millis(10)))
            .await;
        assert_eq!(result, Ok(()));
    }
}
