//! Account records and the accounts flat-file
//!
//! Line format: `username:password:email:email_password:2fa:ct0:auth_token`.
//! The 2FA field may itself contain colons (`otpauth://...` URIs), so it
//! is re-joined from everything between the fixed leading fields and the
//! two trailing token fields.

use std::path::PathBuf;

use common::Secret;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cookies::{CookieCache, CookieEntry};
use crate::error::{Error, Result};

/// One upstream account. Immutable after load; identified everywhere by
/// its screen name.
#[derive(Debug, Clone)]
pub struct Account {
    pub username: String,
    pub password: Secret,
    pub email: String,
    pub email_password: Option<Secret>,
    /// Normalized 2FA secret (tail of an `otpauth://` URI, or the raw
    /// value).
    pub totp_secret: Option<String>,
    /// Pre-obtained CSRF session token.
    pub ct0: Option<String>,
    /// Pre-obtained auth session token.
    pub auth_token: Option<String>,
}

impl Account {
    /// Render back to the flat-file line format. Inverse of
    /// [`parse_account_line`] for accounts whose 2FA secret carries no
    /// colon.
    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.username,
            self.password.expose(),
            self.email,
            self.email_password
                .as_ref()
                .map(Secret::expose)
                .unwrap_or(""),
            self.totp_secret.as_deref().unwrap_or(""),
            self.ct0.as_deref().unwrap_or(""),
            self.auth_token.as_deref().unwrap_or(""),
        )
    }
}

/// Parse one record line. Returns `None` for lines with fewer than 7
/// fields; the caller decides how loudly to complain.
pub fn parse_account_line(line: &str) -> Option<Account> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 7 {
        return None;
    }

    let n = fields.len();
    // Everything between the fixed prefix and the two trailing token
    // fields belongs to the 2FA secret.
    let raw_totp = fields[4..n - 2].join(":");

    Some(Account {
        username: fields[0].to_string(),
        password: Secret::new(fields[1]),
        email: fields[2].to_string(),
        email_password: non_empty(fields[3]).map(Secret::new),
        totp_secret: normalize_totp(&raw_totp),
        ct0: non_empty(fields[n - 2]).map(str::to_string),
        auth_token: non_empty(fields[n - 1]).map(str::to_string),
    })
}

/// Normalize a raw 2FA field: trim, take the tail of an `otpauth://`
/// URI, drop empties.
fn normalize_totp(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let secret = match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };
    non_empty(secret).map(str::to_string)
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Parse the full flat-file contents: blank lines and `#` comments are
/// skipped silently, short records with a warning.
pub fn parse_accounts(contents: &str) -> Vec<Account> {
    let mut accounts = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_account_line(line) {
            Some(account) => accounts.push(account),
            None => warn!(line = idx + 1, "skipping malformed account record"),
        }
    }
    accounts
}

/// Owns the account records and the cookie cache.
///
/// Accounts are reloadable (the operator path for recovering banned
/// accounts); cookie persistence is serialized through the cache's own
/// lock.
pub struct AccountStore {
    accounts_path: PathBuf,
    accounts: RwLock<Vec<Account>>,
    cookies: CookieCache,
}

impl AccountStore {
    /// Load accounts from `accounts_path` and the cookie cache from
    /// `cookies_path` (created empty if missing).
    pub async fn load(accounts_path: PathBuf, cookies_path: PathBuf) -> Result<Self> {
        let accounts = read_accounts(&accounts_path).await?;
        info!(
            path = %accounts_path.display(),
            accounts = accounts.len(),
            "loaded accounts"
        );
        let cookies = CookieCache::load(cookies_path).await?;
        Ok(Self {
            accounts_path,
            accounts: RwLock::new(accounts),
            cookies,
        })
    }

    /// Defensive copy of all accounts.
    pub async fn list(&self) -> Vec<Account> {
        self.accounts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Re-read the flat-file, replacing the in-memory set. Returns the
    /// new account count.
    pub async fn reload(&self) -> Result<usize> {
        let fresh = read_accounts(&self.accounts_path).await?;
        let count = fresh.len();
        *self.accounts.write().await = fresh;
        info!(accounts = count, "reloaded accounts");
        Ok(count)
    }

    /// Cached cookie set for an account, if any.
    pub async fn load_cookies(&self, username: &str) -> Option<Vec<String>> {
        self.cookies.get(username).await
    }

    /// Persist a fresh cookie set for an account (upsert by username,
    /// whole cache rewritten).
    pub async fn save_cookies(&self, account: &Account, cookies: Vec<String>) -> Result<()> {
        self.cookies
            .upsert(CookieEntry {
                username: account.username.clone(),
                password: account.password.expose().to_string(),
                email: account.email.clone(),
                twofa: account.totp_secret.clone().unwrap_or_default(),
                cookies,
            })
            .await
    }
}

async fn read_accounts(path: &PathBuf) -> Result<Vec<Account>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("reading accounts file {}: {e}", path.display())))?;
    Ok(parse_accounts(&contents))
}
