//! Request-dispatch core of the scrape gateway
//!
//! Multiplexes read-only operations across a population of upstream
//! accounts and proxies. The pieces, in dispatch order:
//!
//! 1. `execute()` admits the operation into the bounded [`PriorityQueue`]
//!    (synchronous rejection when full)
//! 2. The scheduler loop pops requests while `active < max_concurrency`
//! 3. [`HealthRegistry`] picks the healthiest eligible account
//! 4. A proxy is drawn at random and the [`auth`] ladder produces an
//!    authenticated client bound to it
//! 5. The caller's thunk runs under its operation-class deadline
//! 6. The outcome feeds back into the health state machine; transient
//!    failures retry with exponential backoff on a fresh account/proxy
//!
//! A periodic sweep ages cooled-down accounts back to probation and
//! prunes rate-limit windows.

pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod queue;
#[cfg(test)]
pub(crate) mod testing;
pub mod timeout;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats, TimeoutConfig};
pub use error::{Error, Result};
pub use health::{AccountHealth, HealthConfig, HealthRegistry, HealthStatus};
pub use queue::{Priority, PriorityQueue, QueuedItem};
pub use timeout::with_timeout;
