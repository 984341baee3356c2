//! Per-account health records and the selection policy
//!
//! The registry owns one record per account screen name, lazily created
//! on first touch. All mutation goes through the registry so the record
//! invariants stay local:
//!
//! - exactly one of the consecutive counters is non-zero at any time
//! - COOLDOWN always carries a deadline
//! - LOCKED and DISABLED are terminal until `reset()`
//! - the sliding window of recent attempts is the authority for
//!   rate-limit admission; stale entries are pruned lazily
//!
//! Status transitions:
//! - HEALTHY/PROBATION → LOCKED on an account-locked failure
//! - HEALTHY/PROBATION → COOLDOWN on a rate-limit failure, or when
//!   consecutive failures reach the cap
//! - COOLDOWN → PROBATION when the sweep finds the deadline passed
//! - PROBATION → HEALTHY after three consecutive successes

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use scraper_accounts::Account;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use upstream::ErrorKind;

/// Runtime status of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Probation,
    Cooldown,
    Disabled,
    Locked,
}

impl HealthStatus {
    /// Status label for stats and logging.
    pub fn label(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Probation => "probation",
            HealthStatus::Cooldown => "cooldown",
            HealthStatus::Disabled => "disabled",
            HealthStatus::Locked => "locked",
        }
    }

    /// Terminal statuses only clear on operator reload.
    pub fn is_terminal(self) -> bool {
        matches!(self, HealthStatus::Disabled | HealthStatus::Locked)
    }
}

/// Mutable health record for one account.
#[derive(Debug, Clone)]
pub struct AccountHealth {
    pub status: HealthStatus,
    pub last_used: Option<Instant>,
    pub request_count: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub cooldown_until: Option<Instant>,
    pub last_error: Option<ErrorKind>,
    pub last_error_at: Option<Instant>,
    /// Exponentially-weighted success average in [0,1].
    pub success_rate: f64,
    /// Attempt timestamps within the rate window (successes and
    /// failures both count).
    pub recent: VecDeque<Instant>,
}

impl Default for AccountHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            last_used: None,
            request_count: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            cooldown_until: None,
            last_error: None,
            last_error_at: None,
            success_rate: 1.0,
            recent: VecDeque::new(),
        }
    }
}

/// EMA weight on the previous value.
const EMA_DECAY: f64 = 0.9;

/// Tunables for the health state machine.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// How long a rate-limited account sits out.
    pub cooldown_window: Duration,
    /// Sliding window over which attempts are counted.
    pub rate_window: Duration,
    /// Attempt budget within one rate window.
    pub max_requests_per_window: usize,
    /// Consecutive failures that force a cooldown.
    pub max_consecutive_failures: u32,
    /// Consecutive successes that promote PROBATION back to HEALTHY.
    pub probation_promotion: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cooldown_window: Duration::from_secs(120),
            rate_window: Duration::from_secs(900),
            max_requests_per_window: 50,
            max_consecutive_failures: 10,
            probation_promotion: 3,
        }
    }
}

/// Registry of health records, keyed by account screen name.
pub struct HealthRegistry {
    records: RwLock<HashMap<String, AccountHealth>>,
    config: HealthConfig,
}

impl HealthRegistry {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Ensure a record exists for each username.
    pub async fn init<'a>(&self, usernames: impl IntoIterator<Item = &'a str>) {
        let mut records = self.records.write().await;
        for name in usernames {
            records.entry(name.to_string()).or_default();
        }
    }

    /// Drop all records and start fresh for the given usernames. This
    /// is the operator reload path: terminal statuses are forgiven.
    pub async fn reset<'a>(&self, usernames: impl IntoIterator<Item = &'a str>) {
        let mut records = self.records.write().await;
        records.clear();
        for name in usernames {
            records.insert(name.to_string(), AccountHealth::default());
        }
        info!(accounts = records.len(), "health records reset");
    }

    /// Record a successful attempt.
    pub async fn record_success(&self, username: &str) {
        let mut records = self.records.write().await;
        let health = records.entry(username.to_string()).or_default();
        let now = Instant::now();

        health.request_count += 1;
        health.last_used = Some(now);
        health.recent.push_back(now);
        health.consecutive_successes += 1;
        health.consecutive_failures = 0;
        health.success_rate = health.success_rate * EMA_DECAY + (1.0 - EMA_DECAY);

        if health.status == HealthStatus::Probation
            && health.consecutive_successes >= self.config.probation_promotion
        {
            info!(account = username, "probation cleared, account healthy");
            health.status = HealthStatus::Healthy;
        }
    }

    /// Record a failed attempt of the given kind, applying status
    /// transitions.
    pub async fn record_failure(&self, username: &str, kind: ErrorKind) {
        let mut records = self.records.write().await;
        let health = records.entry(username.to_string()).or_default();
        let now = Instant::now();

        health.request_count += 1;
        health.last_used = Some(now);
        health.recent.push_back(now);
        health.consecutive_failures += 1;
        health.consecutive_successes = 0;
        health.success_rate *= EMA_DECAY;
        health.last_error = Some(kind);
        health.last_error_at = Some(now);

        if health.status.is_terminal() {
            return;
        }

        match kind {
            ErrorKind::AccountLocked => {
                warn!(account = username, "account locked by upstream");
                health.status = HealthStatus::Locked;
            }
            ErrorKind::RateLimit => {
                info!(
                    account = username,
                    cooldown_secs = self.config.cooldown_window.as_secs(),
                    "account rate limited, entering cooldown"
                );
                health.status = HealthStatus::Cooldown;
                health.cooldown_until = Some(now + self.config.cooldown_window);
            }
            _ => {
                if health.consecutive_failures >= self.config.max_consecutive_failures {
                    warn!(
                        account = username,
                        failures = health.consecutive_failures,
                        "failure streak reached cap, entering cooldown"
                    );
                    health.status = HealthStatus::Cooldown;
                    health.cooldown_until = Some(now + self.config.cooldown_window);
                }
            }
        }
    }

    /// Periodic maintenance: prune rate windows and age expired
    /// cooldowns into probation.
    pub async fn sweep(&self) {
        let mut records = self.records.write().await;
        let now = Instant::now();
        for (username, health) in records.iter_mut() {
            prune_window(health, now, self.config.rate_window);
            if health.status == HealthStatus::Cooldown
                && health.cooldown_until.is_some_and(|until| now >= until)
            {
                info!(account = %username, "cooldown expired, account on probation");
                health.status = HealthStatus::Probation;
                health.consecutive_failures = 0;
                health.cooldown_until = None;
            }
        }
    }

    /// Pick the best eligible account, or `None` if the population is
    /// exhausted.
    ///
    /// Eligible: not terminal, cooldown (if any) expired, attempt
    /// budget left in the rate window. Ordering: HEALTHY first, then
    /// fewest consecutive failures, then least recently used.
    pub async fn select(&self, accounts: &[Account]) -> Option<Account> {
        let mut records = self.records.write().await;
        let now = Instant::now();

        let mut candidates: Vec<(usize, bool, u32, Option<Instant>)> = Vec::new();
        for (idx, account) in accounts.iter().enumerate() {
            let health = records.entry(account.username.clone()).or_default();
            prune_window(health, now, self.config.rate_window);

            if health.status.is_terminal() {
                continue;
            }
            if health.status == HealthStatus::Cooldown {
                match health.cooldown_until {
                    Some(until) if now >= until => {}
                    _ => continue,
                }
            }
            if health.recent.len() >= self.config.max_requests_per_window {
                debug!(account = %account.username, "rate window exhausted, skipping");
                continue;
            }

            candidates.push((
                idx,
                health.status != HealthStatus::Healthy,
                health.consecutive_failures,
                health.last_used,
            ));
        }

        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)).then(a.3.cmp(&b.3)));
        candidates.first().map(|&(idx, ..)| accounts[idx].clone())
    }

    /// Force a status, bypassing the normal transitions. Operator and
    /// test hook.
    pub async fn set_status(&self, username: &str, status: HealthStatus) {
        let mut records = self.records.write().await;
        let health = records.entry(username.to_string()).or_default();
        health.status = status;
        if status != HealthStatus::Cooldown {
            health.cooldown_until = None;
        }
    }

    /// Clone of all records, for stats reporting.
    pub async fn snapshot(&self) -> HashMap<String, AccountHealth> {
        self.records.read().await.clone()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

fn prune_window(health: &mut AccountHealth, now: Instant, window: Duration) {
    let cutoff = now.checked_sub(window);
    if let Some(cutoff) = cutoff {
        while health.recent.front().is_some_and(|&t| t < cutoff) {
            health.recent.pop_front();
        }
    }
}
