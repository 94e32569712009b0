use std::{
    collections::HashMap,
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use odekake_core::app_config::RateLimitRule;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Axum middleware that extracts or generates a request ID.
///
/// An incoming `x-request-id` header is reused; otherwise a new `UUIDv4` is
/// generated. The ID lands in request extensions and on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// The outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    pub retry_after_secs: u64,
}

/// Storage behind the limiter: per-key request timestamps. In-memory here;
/// a shared store can be swapped in without touching the checking logic.
pub trait RateLimitStore: Send {
    /// Drops timestamps older than `window` for `key` and returns how many
    /// remain.
    fn prune_and_count(&mut self, key: &str, window: Duration, now: Instant) -> usize;

    fn record(&mut self, key: &str, now: Instant);

    /// Oldest surviving timestamp for `key`, for retry-after computation.
    fn oldest(&self, key: &str) -> Option<Instant>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    requests: HashMap<String, VecDeque<Instant>>,
}

impl RateLimitStore for InMemoryStore {
    fn prune_and_count(&mut self, key: &str, window: Duration, now: Instant) -> usize {
        let Some(entries) = self.requests.get_mut(key) else {
            return 0;
        };
        while let Some(front) = entries.front() {
            if now.duration_since(*front) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
        if entries.is_empty() {
            self.requests.remove(key);
            return 0;
        }
        entries.len()
    }

    fn record(&mut self, key: &str, now: Instant) {
        self.requests.entry(key.to_string()).or_default().push_back(now);
    }

    fn oldest(&self, key: &str) -> Option<Instant> {
        self.requests.get(key).and_then(|e| e.front().copied())
    }
}

const GLOBAL_KEY: &str = "__global__";

/// Sliding-window limiter with a per-client and a global ceiling.
///
/// Both windows are checked and recorded under one lock so that concurrent
/// requests cannot slip past either ceiling between check and record.
#[derive(Clone)]
pub struct RateLimiter {
    per_client: RateLimitRule,
    global: RateLimitRule,
    store: Arc<Mutex<dyn RateLimitStore>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(per_client: RateLimitRule, global: RateLimitRule) -> Self {
        Self::with_store(per_client, global, Arc::new(Mutex::new(InMemoryStore::default())))
    }

    #[must_use]
    pub fn with_store(
        per_client: RateLimitRule,
        global: RateLimitRule,
        store: Arc<Mutex<dyn RateLimitStore>>,
    ) -> Self {
        Self {
            per_client,
            global,
            store,
        }
    }

    /// Checks both windows for a raw client identifier and records the
    /// request when admitted.
    pub async fn check(&self, client_id: &str, now: Instant) -> RateLimitDecision {
        let key = hash_client_id(client_id);
        let per_window = Duration::from_secs(self.per_client.window_secs);
        let global_window = Duration::from_secs(self.global.window_secs);

        let mut store = self.store.lock().await;

        let global_count = store.prune_and_count(GLOBAL_KEY, global_window, now);
        if global_count >= self.global.total_allowed() {
            let retry = retry_after(store.oldest(GLOBAL_KEY), global_window, now);
            // The headers must name the ceiling that actually fired.
            return RateLimitDecision {
                allowed: false,
                limit: self.global.total_allowed(),
                remaining: 0,
                retry_after_secs: retry,
            };
        }

        let client_count = store.prune_and_count(&key, per_window, now);
        if client_count >= self.per_client.total_allowed() {
            let retry = retry_after(store.oldest(&key), per_window, now);
            return RateLimitDecision {
                allowed: false,
                limit: self.per_client.total_allowed(),
                remaining: 0,
                retry_after_secs: retry,
            };
        }

        store.record(GLOBAL_KEY, now);
        store.record(&key, now);

        RateLimitDecision {
            allowed: true,
            limit: self.per_client.total_allowed(),
            remaining: self.per_client.total_allowed() - client_count - 1,
            retry_after_secs: 0,
        }
    }
}

fn retry_after(oldest: Option<Instant>, window: Duration, now: Instant) -> u64 {
    let Some(oldest) = oldest else {
        return 1;
    };
    let elapsed = now.duration_since(oldest);
    window.saturating_sub(elapsed).as_secs().max(1)
}

/// Client identifiers are hashed before use as map keys, so raw addresses
/// never sit in memory longer than the request.
fn hash_client_id(client_id: &str) -> String {
    let digest = Sha256::digest(client_id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

#[derive(Debug, Serialize)]
struct RateLimitErrorBody {
    error: &'static str,
    message: String,
    retry_after: u64,
}

/// Middleware enforcing the per-client and global windows.
pub async fn enforce_rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client_id = client_identifier(&req);
    let decision = limiter.check(&client_id, Instant::now()).await;

    if !decision.allowed {
        let mut res = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitErrorBody {
                error: "rate_limited",
                message: format!(
                    "リクエストが多すぎます。{}秒後に再試行してください。",
                    decision.retry_after_secs
                ),
                retry_after: decision.retry_after_secs,
            }),
        )
            .into_response();
        insert_rate_limit_headers(&mut res, &decision);
        return res;
    }

    let mut res = next.run(req).await;
    insert_rate_limit_headers(&mut res, &decision);
    res
}

fn insert_rate_limit_headers(res: &mut Response, decision: &RateLimitDecision) {
    let headers = res.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if !decision.allowed {
        if let Ok(v) = HeaderValue::from_str(&decision.retry_after_secs.to_string()) {
            headers.insert("retry-after", v);
        }
    }
}

/// The client key: `X-Forwarded-For`'s first hop when present (the Lambda /
/// proxy case), otherwise the socket address extension.
fn client_identifier(req: &Request) -> String {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}
