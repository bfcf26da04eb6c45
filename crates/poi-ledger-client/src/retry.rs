use std::future::Future;
use std::time::Duration;

use backoff::{future::retry_notify, Error, ExponentialBackoff};
use tracing::info;

use crate::LedgerError;

/// Execute a ledger operation with exponential backoff, giving up after `max_elapsed`.
/// Only transport-level failures are retried, everything else is returned immediately.
pub async fn retry_transient<F, Fut, T>(max_elapsed: Duration, operation: F) -> Result<T, LedgerError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    };

    retry_notify(
        backoff,
        || async {
            operation().await.map_err(|err| {
                if err.is_transient() {
                    Error::transient(err)
                } else {
                    Error::permanent(err)
                }
            })
        },
        |err, duration| {
            info!("Ledger request failed, retrying in {:?}: {}", duration, err);
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let result = retry_transient(Duration::from_secs(5), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::Timeout)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), _> = retry_transient(Duration::from_secs(5), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::NotFound("configuration".into()))
        })
        .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
