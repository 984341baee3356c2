//! Environment-driven configuration
//!
//! Every variable is optional; defaults match the documented gateway
//! contract. Values that are present but unparseable are rejected
//! rather than silently defaulted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use common::{Error, Result};
use scraper_pool::{DispatcherConfig, TimeoutConfig};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub accounts_path: PathBuf,
    pub proxies_path: PathBuf,
    pub cookies_path: PathBuf,
    pub upstream_base_url: String,
    pub max_concurrency: usize,
    pub max_queue_size: usize,
    pub timeout_login: Duration,
    pub timeout_search: Duration,
    pub timeout_profile: Duration,
    pub timeout_tweet: Duration,
    pub timeout_default: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup, so tests don't
    /// mutate process-global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            listen_addr: parse_or(&lookup, "LISTEN_ADDR", "0.0.0.0:3000")?,
            accounts_path: PathBuf::from(
                lookup("ACCOUNTS_TXT_PATH").unwrap_or_else(|| "twitters.txt".into()),
            ),
            proxies_path: PathBuf::from(
                lookup("PROXIES_TXT_PATH").unwrap_or_else(|| "proxies.txt".into()),
            ),
            cookies_path: PathBuf::from(
                lookup("COOKIES_JSON_PATH").unwrap_or_else(|| "cookies.json".into()),
            ),
            upstream_base_url: lookup("UPSTREAM_BASE_URL")
                .unwrap_or_else(|| upstream::DEFAULT_BASE_URL.into()),
            max_concurrency: parse_or(&lookup, "MAX_CONCURRENCY", "10")?,
            max_queue_size: parse_or(&lookup, "MAX_QUEUE_SIZE", "1000")?,
            timeout_login: millis_or(&lookup, "TIMEOUT_LOGIN", 45_000)?,
            timeout_search: millis_or(&lookup, "TIMEOUT_SEARCH", 60_000)?,
            timeout_profile: millis_or(&lookup, "TIMEOUT_PROFILE", 30_000)?,
            timeout_tweet: millis_or(&lookup, "TIMEOUT_TWEET", 35_000)?,
            timeout_default: millis_or(&lookup, "TIMEOUT_DEFAULT", 30_000)?,
        })
    }

    /// Dispatcher tunables derived from this configuration.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrency: self.max_concurrency,
            max_queue_size: self.max_queue_size,
            timeouts: TimeoutConfig {
                login: self.timeout_login,
                search: self.timeout_search,
                profile: self.timeout_profile,
                tweet: self.timeout_tweet,
                fallback: self.timeout_default,
            },
            ..DispatcherConfig::default()
        }
    }

    /// Transport-level timeout for upstream clients: wide enough that
    /// the per-operation deadlines fire first.
    pub fn client_timeout(&self) -> Duration {
        self.timeout_login
            .max(self.timeout_search)
            .max(self.timeout_profile)
            .max(self.timeout_tweet)
            .max(self.timeout_default)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid {key} value {raw:?}: {e}")))
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration> {
    let millis = match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("invalid {key} value {raw:?}: {e}")))?,
        None => default,
    };
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_contract() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.accounts_path, PathBuf::from("twitters.txt"));
        assert_eq!(config.proxies_path, PathBuf::from("proxies.txt"));
        assert_eq!(config.cookies_path, PathBuf::from("cookies.json"));
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.timeout_login, Duration::from_millis(45_000));
        assert_eq!(config.timeout_search, Duration::from_millis(60_000));
        assert_eq!(config.timeout_profile, Duration::from_millis(30_000));
        assert_eq!(config.timeout_tweet, Duration::from_millis(35_000));
        assert_eq!(config.timeout_default, Duration::from_millis(30_000));
    }

    #[test]
    fn overrides_are_honored() {
        let config = Config::from_lookup(lookup_from(&[
            ("MAX_CONCURRENCY", "3"),
            ("MAX_QUEUE_SIZE", "25"),
            ("TIMEOUT_SEARCH", "1500"),
            ("ACCOUNTS_TXT_PATH", "/data/accounts.txt"),
        ]))
        .unwrap();
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.max_queue_size, 25);
        assert_eq!(config.timeout_search, Duration::from_millis(1500));
        assert_eq!(config.accounts_path, PathBuf::from("/data/accounts.txt"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[("MAX_CONCURRENCY", "lots")]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("MAX_CONCURRENCY"), "error was: {err}");

        assert!(Config::from_lookup(lookup_from(&[("TIMEOUT_LOGIN", "-5")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("LISTEN_ADDR", "nowhere")])).is_err());
    }

    #[test]
    fn dispatcher_config_carries_timeouts() {
        let config = Config::from_lookup(lookup_from(&[("TIMEOUT_TWEET", "1234")])).unwrap();
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.timeouts.tweet, Duration::from_millis(1234));
        assert_eq!(dispatcher.max_concurrency, 10);
        assert_eq!(dispatcher.max_retries, 3);
    }

    #[test]
    fn client_timeout_is_the_widest_deadline() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.client_timeout(), Duration::from_millis(60_000));
    }
}
