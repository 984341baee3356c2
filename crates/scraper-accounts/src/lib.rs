//! Account and proxy inventory for the scrape gateway
//!
//! Loads the two operator-maintained flat-files (accounts and proxies)
//! and owns the cookie cache that survives across restarts. The cookie
//! cache file is the persistence boundary of the whole gateway; all
//! writes go through one store so concurrent saves are serialized.
//!
//! Inventory lifecycle:
//! 1. `AccountStore::load()` parses the accounts flat-file and the
//!    cookie cache (creating an empty cache on cold start)
//! 2. The dispatcher reads `list()` for selection and `load_cookies()`
//!    during the auth ladder
//! 3. Every successful authentication writes back through
//!    `save_cookies()` (upsert by username, whole file rewritten
//!    atomically)
//! 4. `reload()` re-reads the flat-file, the operator path for
//!    recovering accounts that went LOCKED or DISABLED

pub mod account;
pub mod cookies;
pub mod error;
pub mod proxies;

pub use account::{Account, AccountStore, parse_account_line, parse_accounts};
pub use cookies::{CookieCache, CookieEntry};
pub use error::{Error, Result};
pub use proxies::{Proxy, ProxyStore, parse_proxies};
