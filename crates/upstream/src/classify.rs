//! Failure-message classification
//!
//! The upstream surfaces failures as free-form messages (transport
//! errors, status lines, API error bodies). Classification is ordered
//! case-insensitive substring matching; the first matching rule wins,
//! so more specific signals (timeouts) are checked before generic ones.

use crate::error::ErrorKind;

/// Signals of a transport-level failure.
const NETWORK_PATTERNS: &[&str] = &[
    "network",
    "fetch failed",
    "connection",
    "socket",
    "econnreset",
    "enotfound",
];

/// Signals that the account hit the upstream rate limit.
const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests", "429"];

/// Signals that the account itself has been actioned by the upstream.
const LOCKED_PATTERNS: &[&str] = &["locked", "suspended", "verify your identity"];

/// Map a failure message to its [`ErrorKind`]. First match wins.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        return ErrorKind::Timeout;
    }
    if NETWORK_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorKind::Network;
    }
    if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorKind::RateLimit;
    }
    if lower.contains("unauthorized")
        || lower.contains("401")
        || lower.contains("authentication failed")
        || (lower.contains("status") && lower.contains("403"))
    {
        return ErrorKind::Auth;
    }
    if lower.contains("not found") || lower.contains("404") {
        return ErrorKind::NotFound;
    }
    if LOCKED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorKind::AccountLocked;
    }
    ErrorKind::Unknown
}
