//! Upstream client and factory traits
//!
//! Both traits are dyn-compatible: async methods return
//! `Pin<Box<dyn Future>>` so the dispatcher can hold
//! `Arc<dyn UpstreamClient>` / `Arc<dyn ClientFactory>` without generics
//! leaking into the queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::Secret;

use crate::error::Result;
use crate::types::{Profile, Tweet};

/// Boxed future alias used throughout the trait surface.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Credentials handed to [`UpstreamClient::login`].
///
/// The TOTP secret is passed raw; generating the one-time code from it
/// is the client's concern.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: Secret,
    pub email: String,
    pub totp_secret: Option<String>,
}

/// Search result ordering requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Latest,
    Top,
}

impl SearchMode {
    /// Parse the `mode=` query value. Unknown values are rejected so the
    /// HTTP layer can 400 them.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "latest" => Some(SearchMode::Latest),
            "top" => Some(SearchMode::Top),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Latest => "latest",
            SearchMode::Top => "top",
        }
    }
}

/// A session-capable client for the upstream site.
///
/// One client instance is bound to one proxy (or the direct route) and
/// serves exactly one dispatched operation. Cookie accessors are
/// synchronous; the client keeps its session state behind interior
/// mutability.
pub trait UpstreamClient: Send + Sync {
    /// Install a cookie set, replacing any existing session.
    fn set_cookies(&self, cookies: &[String]);

    /// Snapshot of the current cookie set.
    fn cookies(&self) -> Vec<String>;

    /// Credential login. On success the client holds a usable session.
    fn login<'a>(&'a self, credentials: &'a LoginCredentials) -> BoxFuture<'a, Result<()>>;

    /// Resolve a screen name to a user id. Doubles as the trivial call
    /// the auth ladder uses to verify a session.
    fn resolve_screen_name<'a>(&'a self, screen_name: &'a str) -> BoxFuture<'a, Result<String>>;

    fn user_tweets<'a>(
        &'a self,
        screen_name: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<Vec<Tweet>>>;

    fn user_tweets_and_replies<'a>(
        &'a self,
        screen_name: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<Vec<Tweet>>>;

    fn latest_tweet<'a>(&'a self, screen_name: &'a str) -> BoxFuture<'a, Result<Option<Tweet>>>;

    fn search_tweets<'a>(
        &'a self,
        query: &'a str,
        count: u32,
        mode: SearchMode,
    ) -> BoxFuture<'a, Result<Vec<Tweet>>>;

    fn profile<'a>(&'a self, screen_name: &'a str) -> BoxFuture<'a, Result<Profile>>;

    fn followers<'a>(
        &'a self,
        screen_name: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<Vec<Profile>>>;

    fn following<'a>(
        &'a self,
        screen_name: &'a str,
        count: u32,
    ) -> BoxFuture<'a, Result<Vec<Profile>>>;

    fn tweet<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Tweet>>;
}

/// Produces clients bound to a proxy for the duration of one operation.
pub trait ClientFactory: Send + Sync {
    /// Build a client whose traffic egresses `proxy_url`, or the direct
    /// route when `None`.
    fn build(&self, proxy_url: Option<&str>) -> Result<Arc<dyn UpstreamClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_mode_parses_known_values() {
        assert_eq!(SearchMode::parse("latest"), Some(SearchMode::Latest));
        assert_eq!(SearchMode::parse("top"), Some(SearchMode::Top));
        assert_eq!(SearchMode::parse("newest"), None);
        assert_eq!(SearchMode::parse(""), None);
    }

    #[test]
    fn search_mode_round_trips_labels() {
        for mode in [SearchMode::Latest, SearchMode::Top] {
            assert_eq!(SearchMode::parse(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn login_credentials_redact_password() {
        let creds = LoginCredentials {
            username: "alice".into(),
            password: Secret::new("hunter2"),
            email: "alice@example.com".into(),
            totp_secret: None,
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
