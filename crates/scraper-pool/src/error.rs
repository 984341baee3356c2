//! Error types for dispatch operations

use upstream::ErrorKind;

/// Errors surfaced to callers of the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Admission failure. Never retried.
    #[error("Request queue is full")]
    QueueFull,

    /// The selection filter matched no account.
    #[error("No usable accounts available")]
    NoUsableAccounts,

    /// An operation overran its deadline.
    #[error("{name} timed out after {ms}ms")]
    Timeout { name: String, ms: u64 },

    /// A classified upstream failure.
    #[error("{message}")]
    Upstream { kind: ErrorKind, message: String },

    /// Dispatcher-internal failure (dropped result channel, reload I/O).
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl Error {
    /// Classification of this error for retry and status decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Upstream { kind, .. } => *kind,
            Error::QueueFull | Error::NoUsableAccounts | Error::Dispatch(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status reported to external callers. Admission and
    /// exhaustion failures are service-unavailable rather than caller
    /// errors.
    pub fn external_status(&self) -> u16 {
        match self {
            Error::QueueFull | Error::NoUsableAccounts => 503,
            other => other.kind().external_status(),
        }
    }
}

impl From<upstream::Error> for Error {
    /// Wrap an upstream failure, classifying its message.
    fn from(error: upstream::Error) -> Self {
        let message = error.to_string();
        Error::Upstream {
            kind: upstream::classify(&message),
            message,
        }
    }
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_message_is_exact() {
        assert_eq!(Error::QueueFull.to_string(), "Request queue is full");
    }

    #[test]
    fn no_accounts_message_is_exact() {
        assert_eq!(
            Error::NoUsableAccounts.to_string(),
            "No usable accounts available"
        );
    }

    #[test]
    fn timeout_kind_and_status() {
        let err = Error::Timeout {
            name: "search".into(),
            ms: 60_000,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.external_status(), 502);
    }

    #[test]
    fn upstream_error_keeps_its_kind() {
        let err = Error::Upstream {
            kind: ErrorKind::RateLimit,
            message: "429 Too Many Requests".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.external_status(), 429);
    }

    #[test]
    fn admission_failures_map_to_503() {
        assert_eq!(Error::QueueFull.external_status(), 503);
        assert_eq!(Error::NoUsableAccounts.external_status(), 503);
    }
}
