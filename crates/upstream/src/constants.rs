//! Upstream endpoint constants

/// Default base URL for the upstream REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// Cookie domain for pre-obtained session tokens.
pub const UPSTREAM_COOKIE_DOMAIN: &str = ".twitter.com";

/// A public screen name that always resolves; used to verify that an
/// installed session is actually usable.
pub const VERIFY_SCREEN_NAME: &str = "twitter";

/// Deadline for the session-verification call, in milliseconds.
pub const VERIFY_TIMEOUT_MS: u64 = 15_000;

/// User-Agent presented by gateway-built clients.
pub const GATEWAY_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
