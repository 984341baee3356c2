//! Deadline wrapper for external calls
//!
//! Every call that leaves the process (auth rungs, the user thunk) is
//! raced against a named deadline. The timeout failure carries the
//! operation name so callers see which stage overran.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete with the future's output if it settles within `duration`,
/// otherwise fail with `"<name> timed out after <ms>ms"`. The pending
/// future is dropped when the deadline fires; any cancellation beyond
/// that is best-effort.
pub async fn with_timeout<F, T>(future: F, duration: Duration, name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(value) => Ok(value),
        Err(_) => Err(Error::Timeout {
            name: name.to_string(),
            ms: duration.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pending_future_fails_with_literal_message() {
        let result = with_timeout(
            std::future::pending::<()>(),
            Duration::from_millis(50),
            "slow-op",
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "slow-op timed out after 50ms");
    }

    #[tokio::test(start_paused = true)]
    async fn settled_future_passes_value_through() {
        let result = with_timeout(async { 7 }, Duration::from_millis(50), "fast-op").await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_but_in_time_future_completes() {
        let result = with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "done"
            },
            Duration::from_millis(50),
            "op",
        )
        .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_classifies_as_timeout_kind() {
        let err = with_timeout(
            std::future::pending::<()>(),
            Duration::from_millis(5),
            "getTweets(alice)",
        )
        .await
        .unwrap_err();
        assert_eq!(
            upstream::classify(&err.to_string()),
            upstream::ErrorKind::Timeout
        );
    }
}
