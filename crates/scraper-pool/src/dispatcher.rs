//! The dispatcher: admission, scheduling, and the retry loop
//!
//! `execute()` admits an operation into the bounded priority queue and
//! hands back a future for its eventual outcome. A scheduler task pops
//! requests while the concurrency gauge has room; each popped request
//! runs the full attempt cycle (select account → pick proxy → build
//! client → auth ladder → thunk under deadline → record outcome),
//! retrying on a fresh account and proxy when the failure is worth it.
//!
//! Error policy:
//! - AUTH and NOT_FOUND propagate to the caller immediately
//! - RATE_LIMIT and ACCOUNT_LOCKED punish the account, then retry on
//!   another if attempts remain
//! - TIMEOUT, NETWORK, and UNKNOWN back off exponentially and retry
//!
//! Messages handed to callers are truncated so upstream stack traces do
//! not leak through the API surface.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use scraper_accounts::{Account, AccountStore, ProxyStore};
use serde::Serialize;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use upstream::{BoxFuture, ClientFactory, ErrorKind, UpstreamClient};

use crate::auth;
use crate::error::{Error, Result};
use crate::health::{HealthConfig, HealthRegistry, HealthStatus};
use crate::queue::{Priority, PriorityQueue};
use crate::timeout::with_timeout;

/// Longest failure message handed to callers.
const MESSAGE_LIMIT: usize = 300;

/// Operation-class deadlines. The class is chosen by substring of the
/// operation name, so `"getTweets(alice)"` lands in the tweet class and
/// `"searchTweets(rust)"` in the search class.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub login: Duration,
    pub search: Duration,
    pub profile: Duration,
    pub tweet: Duration,
    pub fallback: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            login: Duration::from_millis(45_000),
            search: Duration::from_millis(60_000),
            profile: Duration::from_millis(30_000),
            tweet: Duration::from_millis(35_000),
            fallback: Duration::from_millis(30_000),
        }
    }
}

impl TimeoutConfig {
    /// Deadline for a named operation.
    pub fn for_op(&self, op_name: &str) -> Duration {
        let lower = op_name.to_lowercase();
        if lower.contains("login") {
            self.login
        } else if lower.contains("search") {
            self.search
        } else if lower.contains("profile") {
            self.profile
        } else if lower.contains("tweet") {
            self.tweet
        } else {
            self.fallback
        }
    }
}

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_concurrency: usize,
    pub max_queue_size: usize,
    /// Total attempts per operation, not extra retries.
    pub max_retries: u32,
    pub timeouts: TimeoutConfig,
    pub health: HealthConfig,
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            max_queue_size: 1000,
            max_retries: 3,
            timeouts: TimeoutConfig::default(),
            health: HealthConfig::default(),
            sweep_interval: Duration::from_secs(120),
        }
    }
}

/// Type-erased queued work: runs the retry loop and fulfills the
/// caller's result channel.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct Inner {
    accounts: Arc<AccountStore>,
    proxies: Arc<ProxyStore>,
    factory: Arc<dyn ClientFactory>,
    registry: HealthRegistry,
    queue: Mutex<PriorityQueue<Job>>,
    active: AtomicUsize,
    wake: Notify,
    config: DispatcherConfig,
}

/// The request dispatcher. Share via `Arc`; `start()` spawns the
/// scheduler and sweep tasks, `stop()` tears them down.
pub struct Dispatcher {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        accounts: Arc<AccountStore>,
        proxies: Arc<ProxyStore>,
        factory: Arc<dyn ClientFactory>,
        config: DispatcherConfig,
    ) -> Self {
        let registry = HealthRegistry::new(config.health.clone());
        Self {
            inner: Arc::new(Inner {
                accounts,
                proxies,
                factory,
                registry,
                queue: Mutex::new(PriorityQueue::new(config.max_queue_size)),
                active: AtomicUsize::new(0),
                wake: Notify::new(),
                config,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Initialize health records and spawn the scheduler and sweep
    /// tasks. Idempotent: a second call replaces the running tasks.
    pub async fn start(&self) {
        let accounts = self.inner.accounts.list().await;
        self.inner
            .registry
            .init(accounts.iter().map(|a| a.username.as_str()))
            .await;

        let scheduler = tokio::spawn(scheduler_loop(Arc::clone(&self.inner)));
        let sweeper = tokio::spawn(sweep_loop(Arc::clone(&self.inner)));

        let mut tasks = self.tasks.lock();
        for old in tasks.drain(..) {
            old.abort();
        }
        *tasks = vec![scheduler, sweeper];

        info!(
            accounts = accounts.len(),
            max_concurrency = self.inner.config.max_concurrency,
            queue_capacity = self.inner.config.max_queue_size,
            "dispatcher started"
        );
    }

    /// Abort the scheduler and sweep tasks. In-flight operations run to
    /// completion; queued ones stay queued until a future `start()`.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("dispatcher stopped");
    }

    /// Admit an operation. Fails synchronously with
    /// `"Request queue is full"` when the queue is at capacity;
    /// otherwise resolves once the operation has run to completion (or
    /// exhausted its attempts).
    pub async fn execute<T, F, Fut>(&self, op_name: &str, thunk: F, priority: Priority) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn UpstreamClient>, Account) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, upstream::Error>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T>>();
        let inner = Arc::clone(&self.inner);
        let op = op_name.to_string();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = run_operation(inner, op, thunk).await;
                let _ = tx.send(result);
            })
        });

        self.inner.queue.lock().enqueue(priority, job)?;
        debug!(op = %op_name, priority = priority.label(), "operation admitted");
        self.inner.wake.notify_one();

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Dispatch("operation dropped before completion".into())),
        }
    }

    /// Re-read the accounts flat-file and reset all health records.
    /// Terminal (LOCKED/DISABLED) statuses are forgiven.
    pub async fn reload_accounts(&self) -> Result<usize> {
        let count = self
            .inner
            .accounts
            .reload()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;
        let accounts = self.inner.accounts.list().await;
        self.inner
            .registry
            .reset(accounts.iter().map(|a| a.username.as_str()))
            .await;
        Ok(count)
    }

    /// Point-in-time view of accounts, queue, and concurrency.
    pub async fn stats(&self) -> DispatcherStats {
        let accounts = self.inner.accounts.list().await;
        let snapshot = self.inner.registry.snapshot().await;

        let mut totals = AccountTotals {
            total: accounts.len(),
            healthy: 0,
            probation: 0,
            cooldown: 0,
            disabled: 0,
            locked: 0,
        };
        let mut per_account = BTreeMap::new();
        for account in &accounts {
            let health = snapshot.get(&account.username).cloned().unwrap_or_default();
            match health.status {
                HealthStatus::Healthy => totals.healthy += 1,
                HealthStatus::Probation => totals.probation += 1,
                HealthStatus::Cooldown => totals.cooldown += 1,
                HealthStatus::Disabled => totals.disabled += 1,
                HealthStatus::Locked => totals.locked += 1,
            }
            per_account.insert(
                account.username.clone(),
                AccountEntry {
                    status: health.status.label(),
                    requests: health.request_count,
                    success_rate: (health.success_rate * 1000.0).round() / 10.0,
                },
            );
        }

        let (depth, max_size) = {
            let queue = self.inner.queue.lock();
            (queue.len(), queue.capacity())
        };

        DispatcherStats {
            accounts: totals,
            proxies: ProxyTotals {
                total: self.inner.proxies.len(),
            },
            queue: QueueTotals { depth, max_size },
            concurrency: ConcurrencyTotals {
                active: self.inner.active.load(Ordering::Acquire),
                max: self.inner.config.max_concurrency,
            },
            per_account,
        }
    }

    /// The health registry, for operator tooling and tests.
    pub fn registry(&self) -> &HealthRegistry {
        &self.inner.registry
    }
}

/// Stats document served by the API layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub accounts: AccountTotals,
    pub proxies: ProxyTotals,
    pub queue: QueueTotals,
    pub concurrency: ConcurrencyTotals,
    pub per_account: BTreeMap<String, AccountEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountTotals {
    pub total: usize,
    pub healthy: usize,
    pub probation: usize,
    pub cooldown: usize,
    pub disabled: usize,
    pub locked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyTotals {
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTotals {
    pub depth: usize,
    /// The configured capacity, not a constant.
    pub max_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcurrencyTotals {
    pub active: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub status: &'static str,
    pub requests: u64,
    /// Success EMA as a percentage, one decimal.
    pub success_rate: f64,
}

/// Pop and spawn queued work while the concurrency gauge has room.
/// Woken by admissions and completions; the tick bounds the wait so a
/// missed wakeup can only stall the queue briefly.
async fn scheduler_loop(inner: Arc<Inner>) {
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    loop {
        loop {
            if inner.active.load(Ordering::Acquire) >= inner.config.max_concurrency {
                break;
            }
            let entry = inner.queue.lock().dequeue();
            let Some(entry) = entry else { break };

            inner.active.fetch_add(1, Ordering::AcqRel);
            debug!(
                priority = entry.priority.label(),
                queued_ms = entry.enqueued_at.elapsed().as_millis() as u64,
                "starting queued operation"
            );
            let task_inner = Arc::clone(&inner);
            tokio::spawn(async move {
                (entry.item)().await;
                task_inner.active.fetch_sub(1, Ordering::AcqRel);
                task_inner.wake.notify_one();
            });
        }

        tokio::select! {
            _ = inner.wake.notified() => {}
            _ = tick.tick() => {}
        }
    }
}

/// Periodic health maintenance.
async fn sweep_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.sweep_interval);
    // Records were initialized just before spawn; skip the immediate tick.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        inner.registry.sweep().await;
    }
}

/// The retry loop for one admitted operation.
async fn run_operation<T, F, Fut>(inner: Arc<Inner>, op_name: String, thunk: F) -> Result<T>
where
    T: Send + 'static,
    F: Fn(Arc<dyn UpstreamClient>, Account) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, upstream::Error>> + Send + 'static,
{
    let max_attempts = inner.config.max_retries.max(1);
    let mut last_error: Option<Error> = None;

    for attempt in 0..max_attempts {
        let accounts = inner.accounts.list().await;
        let Some(account) = inner.registry.select(&accounts).await else {
            return Err(Error::NoUsableAccounts);
        };
        let proxy_url = inner.proxies.pick_random().map(|p| p.url.clone());

        let client = match inner.factory.build(proxy_url.as_deref()) {
            Ok(client) => client,
            Err(e) => {
                let error = Error::from(e);
                warn!(op = %op_name, error = %error, "building upstream client failed");
                last_error = Some(error);
                maybe_backoff(attempt, max_attempts, &op_name).await;
                continue;
            }
        };

        if let Err(error) = auth::authenticate(
            client.as_ref(),
            &account,
            &inner.accounts,
            inner.config.timeouts.login,
        )
        .await
        {
            let kind = error.kind();
            inner.registry.record_failure(&account.username, kind).await;
            warn!(
                op = %op_name,
                account = %account.username,
                kind = kind.label(),
                "authentication failed"
            );
            if propagates_immediately(kind) {
                return Err(clip(error));
            }
            last_error = Some(error);
            maybe_backoff(attempt, max_attempts, &op_name).await;
            continue;
        }

        let deadline = inner.config.timeouts.for_op(&op_name);
        let outcome = with_timeout(thunk(Arc::clone(&client), account.clone()), deadline, &op_name)
            .await
            .and_then(|result| result.map_err(Error::from));

        match outcome {
            Ok(value) => {
                inner.registry.record_success(&account.username).await;
                debug!(op = %op_name, account = %account.username, attempt, "operation succeeded");
                return Ok(value);
            }
            Err(error) => {
                let kind = error.kind();
                inner.registry.record_failure(&account.username, kind).await;
                warn!(
                    op = %op_name,
                    account = %account.username,
                    kind = kind.label(),
                    error = %error,
                    "operation failed"
                );
                if propagates_immediately(kind) {
                    return Err(clip(error));
                }
                last_error = Some(error);
                maybe_backoff(attempt, max_attempts, &op_name).await;
            }
        }
    }

    Err(clip(last_error.unwrap_or(Error::NoUsableAccounts)))
}

/// AUTH and NOT_FOUND are caller errors: no retry, no further account
/// punishment beyond the recorded counters.
fn propagates_immediately(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Auth | ErrorKind::NotFound)
}

/// Exponential backoff with jitter between attempts; skipped after the
/// final attempt.
async fn maybe_backoff(attempt: u32, max_attempts: u32, op_name: &str) {
    if attempt + 1 >= max_attempts {
        return;
    }
    let jitter: u64 = rand::rng().random_range(0..500);
    let delay = Duration::from_millis(1000u64.saturating_mul(2u64.saturating_pow(attempt)) + jitter);
    debug!(op = %op_name, attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
    tokio::time::sleep(delay).await;
}

/// Bound the failure message handed to callers.
fn clip(error: Error) -> Error {
    match error {
        Error::Upstream { kind, message } if message.chars().count() > MESSAGE_LIMIT => {
            let clipped: String = message.chars().take(MESSAGE_LIMIT).collect();
            Error::Upstream {
                kind,
                message: clipped,
            }
        }
        other => other,
    }
}
