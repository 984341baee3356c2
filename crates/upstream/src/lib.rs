//! Upstream client boundary for the scrape gateway
//!
//! Everything the gateway knows about the scraped site lives behind this
//! crate: the `UpstreamClient` trait (session management, login, and the
//! read operations the HTTP layer dispatches), the `ClientFactory` that
//! binds a client to a proxy for the duration of one operation, and the
//! error model the dispatcher classifies against.
//!
//! Request lifecycle as seen from here:
//! 1. Dispatcher picks an account and (maybe) a proxy
//! 2. `ClientFactory::build()` produces a client egressing that proxy
//! 3. The auth ladder installs cookies / logs in via this trait
//! 4. The caller's operation runs against the authenticated client
//! 5. Failures surface as `Error` whose message `classify()` maps to an
//!    `ErrorKind`

pub mod classify;
pub mod client;
pub mod constants;
pub mod error;
pub mod http;
pub mod types;

pub use classify::classify;
pub use client::{BoxFuture, ClientFactory, LoginCredentials, SearchMode, UpstreamClient};
pub use constants::*;
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpClientFactory, HttpUpstreamClient};
pub use types::{Profile, Tweet};
