//! Error model for upstream operations
//!
//! `Error` carries the raw message from the wire; `ErrorKind` is the
//! small classification the dispatcher and HTTP layer act on. The
//! mapping from message to kind lives in [`crate::classify`].

/// Errors from upstream client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (DNS, TLS, connect, client timeout).
    #[error("{0}")]
    Http(String),

    /// The upstream answered with a non-success status or an
    /// unparseable payload. The message embeds the status code and
    /// body so classification sees them.
    #[error("{0}")]
    Api(String),

    /// A login attempt was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Result alias for upstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an upstream failure.
///
/// Drives three decisions: whether the dispatcher retries the request,
/// how the account's health record is punished, and which status the
/// HTTP layer reports to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Network,
    RateLimit,
    Auth,
    NotFound,
    AccountLocked,
    Unknown,
}

impl ErrorKind {
    /// Whether the failure is worth retrying, possibly on a different
    /// account and proxy.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Network | ErrorKind::Unknown
        )
    }

    /// HTTP status reported to external callers for this kind.
    pub fn external_status(self) -> u16 {
        match self {
            ErrorKind::RateLimit => 429,
            ErrorKind::Auth => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::AccountLocked => 503,
            ErrorKind::Timeout | ErrorKind::Network => 502,
            ErrorKind::Unknown => 500,
        }
    }

    /// Kind label for logging and metrics.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AccountLocked => "account_locked",
            ErrorKind::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::Network.is_transient());
        assert!(ErrorKind::Unknown.is_transient());
        assert!(!ErrorKind::RateLimit.is_transient());
        assert!(!ErrorKind::Auth.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
        assert!(!ErrorKind::AccountLocked.is_transient());
    }

    #[test]
    fn external_status_map() {
        assert_eq!(ErrorKind::RateLimit.external_status(), 429);
        assert_eq!(ErrorKind::Auth.external_status(), 401);
        assert_eq!(ErrorKind::NotFound.external_status(), 404);
        assert_eq!(ErrorKind::AccountLocked.external_status(), 503);
        assert_eq!(ErrorKind::Timeout.external_status(), 502);
        assert_eq!(ErrorKind::Network.external_status(), 502);
        assert_eq!(ErrorKind::Unknown.external_status(), 500);
    }

    #[test]
    fn auth_error_message_is_classifiable() {
        let err = Error::Auth("login rejected".into());
        assert_eq!(crate::classify(&err.to_string()), ErrorKind::Auth);
    }
}
