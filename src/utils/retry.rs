//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for probing a freshly started server.
///
/// A container can print its readiness line a little before the server
/// accepts clients, so the first checks are expected to fail.
///
/// - Min delay: 100ms
/// - Max delay: 2s
/// - Max attempts: 20
/// - Jitter enabled
pub fn readiness_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(20)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use backon::Retryable;

    use super::*;

    #[tokio::test]
    async fn test_readiness_backoff_retries_until_success() {
        let mut attempts = 0;
        let result: Result<u32, String> = (|| {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt < 3 {
                    Err(format!("attempt {} refused", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .retry(
            readiness_backoff()
                .with_min_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        )
        .await;

        assert_eq!(result, Ok(3));
    }
}
