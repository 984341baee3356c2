//! Authentication ladder
//!
//! Produces a usable session on a freshly-built client. Rungs are tried
//! strictly in order and the first usable session wins:
//!
//! 1. cookies from the cookie cache
//! 2. pre-obtained session tokens installed as cookies
//! 3. credential login
//!
//! Each rung is verified by resolving a known public screen name under
//! a short deadline; cookies are re-persisted on every success so the
//! cache converges on the freshest session.

use std::time::Duration;

use scraper_accounts::{Account, AccountStore};
use tracing::{debug, info, warn};
use upstream::{
    LoginCredentials, UPSTREAM_COOKIE_DOMAIN, UpstreamClient, VERIFY_SCREEN_NAME,
    VERIFY_TIMEOUT_MS,
};

use crate::error::{Error, Result};
use crate::timeout::with_timeout;

/// Run the ladder against `client`. On success the client holds a
/// verified session and the cookie cache has been refreshed.
pub async fn authenticate(
    client: &dyn UpstreamClient,
    account: &Account,
    store: &AccountStore,
    login_timeout: Duration,
) -> Result<()> {
    // Rung 1: cached cookies
    if let Some(cookies) = store.load_cookies(&account.username).await {
        client.set_cookies(&cookies);
        match verify_session(client).await {
            Ok(()) => {
                debug!(account = %account.username, "session restored from cookie cache");
                persist_cookies(client, account, store).await;
                return Ok(());
            }
            Err(e) => {
                debug!(account = %account.username, error = %e, "cached cookies unusable")
            }
        }
    }

    // Rung 2: pre-obtained session tokens
    if let (Some(ct0), Some(auth_token)) = (&account.ct0, &account.auth_token) {
        client.set_cookies(&token_cookies(ct0, auth_token));
        match verify_session(client).await {
            Ok(()) => {
                info!(account = %account.username, "session established from pre-obtained tokens");
                persist_cookies(client, account, store).await;
                return Ok(());
            }
            Err(e) => {
                debug!(account = %account.username, error = %e, "pre-obtained tokens unusable")
            }
        }
    }

    // Rung 3: credential login
    let credentials = LoginCredentials {
        username: account.username.clone(),
        password: account.password.clone(),
        email: account.email.clone(),
        totp_secret: account.totp_secret.clone(),
    };
    let login = with_timeout(client.login(&credentials), login_timeout, "login")
        .await
        .and_then(|outcome| outcome.map_err(Error::from));
    match login {
        Ok(()) => {
            verify_session(client).await?;
            info!(account = %account.username, "credential login succeeded");
            persist_cookies(client, account, store).await;
            Ok(())
        }
        Err(e) => {
            warn!(account = %account.username, error = %e, "credential login failed");
            Err(e)
        }
    }
}

/// One trivial upstream call proves the session works. An empty result
/// means the upstream answered but the session is not actually usable.
async fn verify_session(client: &dyn UpstreamClient) -> Result<()> {
    let id = with_timeout(
        client.resolve_screen_name(VERIFY_SCREEN_NAME),
        Duration::from_millis(VERIFY_TIMEOUT_MS),
        "verify-session",
    )
    .await
    .and_then(|outcome| outcome.map_err(Error::from))?;

    if id.is_empty() {
        return Err(Error::Upstream {
            kind: upstream::ErrorKind::Unknown,
            message: "session verification returned an empty id".into(),
        });
    }
    Ok(())
}

/// Cookie strings for pre-obtained session tokens, scoped to the
/// upstream domain.
fn token_cookies(ct0: &str, auth_token: &str) -> Vec<String> {
    vec![
        format!("auth_token={auth_token}; Domain={UPSTREAM_COOKIE_DOMAIN}; Path=/; Secure; HttpOnly"),
        format!("ct0={ct0}; Domain={UPSTREAM_COOKIE_DOMAIN}; Path=/; Secure"),
    ]
}

/// Write the client's current cookies back to the cache. Persistence
/// failure is logged, not fatal; the session itself is already good.
async fn persist_cookies(client: &dyn UpstreamClient, account: &Account, store: &AccountStore) {
    if let Err(e) = store.save_cookies(account, client.cookies()).await {
        warn!(account = %account.username, error = %e, "failed to persist cookies");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUpstream;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const LOGIN_TIMEOUT: Duration = Duration::from_secs(45);

    async fn store_with(dir: &tempfile::TempDir, accounts: &str) -> Arc<AccountStore> {
        let accounts_path = dir.path().join("twitters.txt");
        std::fs::write(&accounts_path, accounts).unwrap();
        Arc::new(
            AccountStore::load(accounts_path, dir.path().join("cookies.json"))
                .await
                .unwrap(),
        )
    }

    async fn first_account(store: &AccountStore) -> Account {
        store.list().await.remove(0)
    }

    #[tokio::test]
    async fn cached_cookies_short_circuit_the_ladder() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S:ct0val:tokval\n").await;
        let account = first_account(&store).await;
        store
            .save_cookies(&account, vec!["auth_token=cached; Path=/".into()])
            .await
            .unwrap();

        let client = MockUpstream::new();
        authenticate(client.as_ref(), &account, &store, LOGIN_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(client.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            client.cookies(),
            vec!["auth_token=cached; Path=/".to_string()]
        );
    }

    #[tokio::test]
    async fn token_cookies_used_when_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S:csrfval:tokval\n").await;
        let account = first_account(&store).await;

        let client = MockUpstream::new();
        authenticate(client.as_ref(), &account, &store, LOGIN_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(client.login_calls.load(Ordering::SeqCst), 0);
        let cookies = client.cookies();
        assert_eq!(
            cookies[0],
            "auth_token=tokval; Domain=.twitter.com; Path=/; Secure; HttpOnly"
        );
        assert_eq!(cookies[1], "ct0=csrfval; Domain=.twitter.com; Path=/; Secure");

        // Success persists the session into the cache.
        assert_eq!(store.load_cookies("alice").await.unwrap(), cookies);
    }

    #[tokio::test]
    async fn stale_cache_falls_through_to_login() {
        let dir = tempfile::tempdir().unwrap();
        // No pre-obtained tokens on this account.
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S::\n").await;
        let account = first_account(&store).await;
        store
            .save_cookies(&account, vec!["auth_token=stale; Path=/".into()])
            .await
            .unwrap();

        let client = MockUpstream::new();
        client.script_verify(Err("401 Unauthorized"));

        authenticate(client.as_ref(), &account, &store, LOGIN_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(client.login_calls.load(Ordering::SeqCst), 1);
        // The cache now holds the fresh login session, not the stale one.
        assert_eq!(
            store.load_cookies("alice").await.unwrap(),
            vec!["auth_token=mock; Path=/".to_string()]
        );
    }

    #[tokio::test]
    async fn all_rungs_failing_returns_the_login_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S::\n").await;
        let account = first_account(&store).await;

        let client = MockUpstream::new();
        client.script_login(Err("bad credentials"));

        let err = authenticate(client.as_ref(), &account, &store, LOGIN_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), upstream::ErrorKind::Auth);
        assert!(err.to_string().contains("bad credentials"));
    }

    #[tokio::test]
    async fn empty_verification_id_is_not_a_usable_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S::\n").await;
        let account = first_account(&store).await;

        let client = MockUpstream::new();
        // Login succeeds, but verification resolves an empty id.
        client.script_verify(Ok(""));

        let err = authenticate(client.as_ref(), &account, &store, LOGIN_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty id"));
    }

    #[tokio::test(start_paused = true)]
    async fn login_rung_honors_its_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "alice:pw:a@b.com:ep:S::\n").await;
        let account = first_account(&store).await;

        let client = MockUpstream::new();
        client.delay_login(Duration::from_secs(120));

        let err = authenticate(
            client.as_ref(),
            &account,
            &store,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "login timed out after 50ms");
    }
}
