//! REST surface under `/api/v3`
//!
//! Thin shells: each handler clamps its parameters, builds a thunk over
//! the upstream client trait, and hands it to the dispatcher. Every
//! response is wrapped in the `{success, message, data, errors}`
//! envelope; failure statuses come from the dispatch error's
//! classification.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use scraper_accounts::Account;
use scraper_pool::{Dispatcher, Priority};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use upstream::{Profile, SearchMode, Tweet, UpstreamClient};

use crate::error::ApiError;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: Instant,
}

/// Response envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub errors: Vec<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: "ok".into(),
            data: Some(data),
            errors: Vec::new(),
        }
    }
}

impl Envelope<()> {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message: message.clone(),
            data: None,
            errors: vec![message],
        }
    }
}

/// Build the full application router.
pub fn build_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/tweets/{username}", get(tweets))
        .route("/tweets/{username}/latest", get(latest_tweet))
        .route("/tweets/{username}/replies", get(replies))
        .route("/search", get(search))
        .route("/profile/{username}", get(profile))
        .route("/followers/{username}", get(followers))
        .route("/following/{username}", get(following))
        .route("/tweet/{id}", get(tweet))
        .with_state(state);

    Router::new()
        .nest("/api/v3", api)
        .route("/metrics", get(move || async move { metrics_handle.render() }))
}

#[derive(Debug, Deserialize)]
struct CountQuery {
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    count: Option<u32>,
    mode: Option<String>,
}

/// Clamp a requested count into the route's range.
fn clamp_count(requested: Option<u32>, min: u32, max: u32, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(min, max)
}

/// Run one operation through the dispatcher, recording metrics and
/// wrapping the outcome.
async fn dispatch<T, F, Fut>(
    state: &AppState,
    route: &'static str,
    op: String,
    thunk: F,
) -> Result<Json<Envelope<T>>, ApiError>
where
    T: Send + 'static,
    F: Fn(Arc<dyn UpstreamClient>, Account) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, upstream::Error>> + Send + 'static,
{
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let started = Instant::now();
    debug!(request_id = %request_id, op = %op, "dispatching");

    let result = state.dispatcher.execute(&op, thunk, Priority::Medium).await;
    let duration = started.elapsed().as_secs_f64();

    match result {
        Ok(data) => {
            crate::metrics::record_request(route, 200, duration);
            Ok(Json(Envelope::ok(data)))
        }
        Err(e) => {
            crate::metrics::record_request(route, e.external_status(), duration);
            crate::metrics::record_upstream_error(e.kind().label());
            warn!(request_id = %request_id, op = %op, error = %e, "operation failed");
            Err(ApiError::Dispatch(e))
        }
    }
}

/// GET /api/v3/health: liveness plus a pool summary.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.dispatcher.stats().await;
    let totals = &stats.accounts;
    let status = if totals.total > 0 && totals.healthy == totals.total {
        "healthy"
    } else if totals.healthy + totals.probation > 0 {
        "degraded"
    } else {
        "unhealthy"
    };

    Json(Envelope::ok(serde_json::json!({
        "status": status,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "accounts": stats.accounts,
        "queue": stats.queue,
    })))
}

/// GET /api/v3/stats: the full dispatcher stats document.
async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(Envelope::ok(state.dispatcher.stats().await))
}

/// GET /api/v3/tweets/{username}?count= (1-100, default 5)
async fn tweets(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Envelope<Vec<Tweet>>>, ApiError> {
    let count = clamp_count(query.count, 1, 100, 5);
    let op = format!("getTweets({username})");
    dispatch(&state, "tweets", op, move |client, _account| {
        let username = username.clone();
        async move { client.user_tweets(&username, count).await }
    })
    .await
}

/// GET /api/v3/tweets/{username}/latest
async fn latest_tweet(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<Option<Tweet>>>, ApiError> {
    let op = format!("getLatestTweet({username})");
    dispatch(&state, "latest_tweet", op, move |client, _account| {
        let username = username.clone();
        async move { client.latest_tweet(&username).await }
    })
    .await
}

/// GET /api/v3/tweets/{username}/replies?count= (1-100, default 5)
async fn replies(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Envelope<Vec<Tweet>>>, ApiError> {
    let count = clamp_count(query.count, 1, 100, 5);
    let op = format!("getTweetsAndReplies({username})");
    dispatch(&state, "replies", op, move |client, _account| {
        let username = username.clone();
        async move { client.user_tweets_and_replies(&username, count).await }
    })
    .await
}

/// GET /api/v3/search?q=&count=&mode= (count 1-100 default 20, mode
/// latest|top default latest)
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Envelope<Vec<Tweet>>>, ApiError> {
    let q = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter q is required".into()))?;
    let mode = match query.mode.as_deref() {
        None => SearchMode::Latest,
        Some(raw) => SearchMode::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid mode {raw:?}")))?,
    };
    let count = clamp_count(query.count, 1, 100, 20);
    let op = format!("searchTweets({q})");
    dispatch(&state, "search", op, move |client, _account| {
        let q = q.clone();
        async move { client.search_tweets(&q, count, mode).await }
    })
    .await
}

/// GET /api/v3/profile/{username}
async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<Profile>>, ApiError> {
    let op = format!("getProfile({username})");
    dispatch(&state, "profile", op, move |client, _account| {
        let username = username.clone();
        async move { client.profile(&username).await }
    })
    .await
}

/// GET /api/v3/followers/{username}?count= (1-200, default 50)
async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Envelope<Vec<Profile>>>, ApiError> {
    let count = clamp_count(query.count, 1, 200, 50);
    let op = format!("getFollowers({username})");
    dispatch(&state, "followers", op, move |client, _account| {
        let username = username.clone();
        async move { client.followers(&username, count).await }
    })
    .await
}

/// GET /api/v3/following/{username}?count= (1-200, default 50)
async fn following(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<Envelope<Vec<Profile>>>, ApiError> {
    let count = clamp_count(query.count, 1, 200, 50);
    let op = format!("getFollowing({username})");
    dispatch(&state, "following", op, move |client, _account| {
        let username = username.clone();
        async move { client.following(&username, count).await }
    })
    .await
}

/// GET /api/v3/tweet/{id}
async fn tweet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Tweet>>, ApiError> {
    let op = format!("getTweet({id})");
    dispatch(&state, "tweet", op, move |client, _account| {
        let id = id.clone();
        async move { client.tweet(&id).await }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_uses_default_when_absent() {
        assert_eq!(clamp_count(None, 1, 100, 5), 5);
        assert_eq!(clamp_count(None, 1, 100, 20), 20);
        assert_eq!(clamp_count(None, 1, 200, 50), 50);
    }

    #[test]
    fn clamp_bounds_out_of_range_values() {
        assert_eq!(clamp_count(Some(0), 1, 100, 5), 1);
        assert_eq!(clamp_count(Some(5000), 1, 100, 5), 100);
        assert_eq!(clamp_count(Some(201), 1, 200, 50), 200);
        assert_eq!(clamp_count(Some(42), 1, 100, 5), 42);
    }

    #[test]
    fn ok_envelope_shape() {
        let envelope = Envelope::ok(vec![1, 2, 3]);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "ok");
        assert_eq!(json["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["errors"], serde_json::json!([]));
    }

    #[test]
    fn failure_envelope_shape() {
        let envelope = Envelope::failure("Request queue is full".into());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Request queue is full");
        assert_eq!(json["data"], serde_json::Value::Null);
        assert_eq!(json["errors"], serde_json::json!(["Request queue is full"]));
    }
}
