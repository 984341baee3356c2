//! Error types for inventory loading and persistence

/// Errors from account/proxy/cookie storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("cookie cache parse error: {0}")]
    CacheParse(String),
}

/// Result alias for inventory operations.
pub type Result<T> = std::result::Result<T, Error>;
