use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use odekake_core::FacilityTable;
use odekake_resolver::{
    check_all_facilities_closure, check_facility_closure, list_available_facilities, Resolver,
};

use crate::middleware::{enforce_rate_limit, request_id, RateLimiter, RequestId};

const MAX_QUERY_CHARS: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(rename = "responseTime")]
    pub response_time: f64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

pub fn build_app(state: AppState, limiter: RateLimiter, cors: CorsLayer) -> Router {
    let protected = Router::new()
        .route("/query", post(handle_query))
        .layer(from_fn_with_state(limiter, enforce_rate_limit));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "facilities": state.resolver.table().len(),
    }))
}

async fn handle_query(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, Json<ApiError>)> {
    let started = Instant::now();

    let query = match body.query.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => {
            return Err(bad_request("質問が空です。queryフィールドを指定してください。"));
        }
    };
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(bad_request("質問が長すぎます。1000文字以内にしてください。"));
    }

    tracing::info!(request_id = %req_id.0, query = %query, "handling query");

    let today = today_jst();
    let response = route_query(&state.resolver, &query, today).await;

    Ok(Json(QueryResponse {
        response,
        response_time: started.elapsed().as_secs_f64(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

fn bad_request(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

/// Today's date in Japan, where the facilities are.
fn today_jst() -> NaiveDate {
    match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => Utc::now().with_timezone(&jst).date_naive(),
        None => Utc::now().date_naive(),
    }
}

/// Lightweight intent routing: find a facility mention and a date expression
/// in the free text and dispatch to the matching tool.
async fn route_query(resolver: &Resolver, query: &str, today: NaiveDate) -> String {
    if query.contains("一覧") || query.contains("リスト") {
        return list_available_facilities(resolver.table());
    }

    let date_expr = extract_date_expr(query).unwrap_or_else(|| "今日".to_string());

    match find_facility_mention(resolver.table(), query) {
        Some(name) => check_facility_closure(resolver, &name, &date_expr, today).await,
        None => check_all_facilities_closure(resolver, &date_expr, today).await,
    }
}

/// The longest facility name or alias contained in the query wins, so a
/// specific mention beats a generic substring.
fn find_facility_mention(table: &FacilityTable, query: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    for rule in table.all() {
        for candidate in std::iter::once(rule.name.as_str())
            .chain(rule.aliases.iter().map(String::as_str))
        {
            if query.contains(candidate)
                && best.map_or(true, |b| candidate.chars().count() > b.chars().count())
            {
                best = Some(candidate);
            }
        }
    }
    best.map(ToOwned::to_owned)
}

/// Pulls the first recognizable date expression out of free text.
fn extract_date_expr(query: &str) -> Option<String> {
    use std::sync::OnceLock;

    static RES: OnceLock<Vec<regex::Regex>> = OnceLock::new();
    let patterns = RES.get_or_init(|| {
        [
            r"\d{4}-\d{2}-\d{2}",
            r"\d{4}/\d{1,2}/\d{1,2}",
            r"\d{4}年\d{1,2}月\d{1,2}日",
            r"\d{1,2}月\d{1,2}日",
            r"明後日|あさって|明日|あした|今日|本日",
        ]
        .iter()
        .filter_map(|p| regex::Regex::new(p).ok())
        .collect()
    });

    for re in patterns {
        if let Some(m) = re.find(query) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::body::Body;
    use axum::http::{header, Request};
    use odekake_core::app_config::RateLimitRule;
    use odekake_core::{ClosedWeekday, ExtractorKind, FacilityRule, SeasonalWindow, StaticHolidayCalendar};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    fn table() -> FacilityTable {
        let daisetz = FacilityRule {
            slug: "suzuki-daisetz".to_string(),
            name: "鈴木大拙館".to_string(),
            aliases: vec!["大拙館".to_string()],
            url: "https://example.invalid/".to_string(),
            extra_pages: Vec::new(),
            regular_closed: vec![ClosedWeekday::Monday],
            transfer_holiday: true,
            overrides: BTreeMap::new(),
            long_closures: Vec::new(),
            seasonal_blackout: Some(SeasonalWindow::year_end()),
            extractor: ExtractorKind::Standard,
            phone: None,
            address: None,
            notes: None,
        };
        let kenrokuen = FacilityRule {
            slug: "kenrokuen".to_string(),
            name: "特別名勝 兼六園".to_string(),
            aliases: vec!["兼六園".to_string()],
            url: "https://example.invalid/kenrokuen".to_string(),
            extra_pages: Vec::new(),
            regular_closed: Vec::new(),
            transfer_holiday: false,
            overrides: BTreeMap::new(),
            long_closures: Vec::new(),
            seasonal_blackout: None,
            extractor: ExtractorKind::Standard,
            phone: None,
            address: None,
            notes: None,
        };
        FacilityTable::from_rules(vec![daisetz, kenrokuen]).unwrap()
    }

    fn app_with_limits(per_client: RateLimitRule) -> Router {
        let resolver = Resolver::offline(
            Arc::new(table()),
            Arc::new(StaticHolidayCalendar::japan_2025()),
        );
        let state = AppState {
            resolver: Arc::new(resolver),
        };
        let global = RateLimitRule {
            max_requests: 100,
            window_secs: 60,
            burst_allowance: 20,
        };
        build_app(
            state,
            RateLimiter::new(per_client, global),
            crate::cors::build_cors(&[]),
        )
    }

    fn app() -> Router {
        app_with_limits(RateLimitRule {
            max_requests: 10,
            window_secs: 60,
            burst_allowance: 3,
        })
    }

    fn query_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_facility_count() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = body_json(res).await;
        assert_eq!(v["status"], "ok");
        assert_eq!(v["facilities"], 2);
    }

    #[tokio::test]
    async fn missing_query_is_rejected() {
        let res = app().oneshot(query_request("{}")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let res = app()
            .oneshot(query_request(r#"{"query": "  "}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlong_query_is_rejected() {
        let long = "あ".repeat(1001);
        let body = serde_json::to_string(&serde_json::json!({ "query": long })).unwrap();
        let res = app().oneshot(query_request(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn facility_query_returns_verdict_envelope() {
        let res = app()
            .oneshot(query_request(
                r#"{"query": "鈴木大拙館は2025-10-06に開いていますか？"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = body_json(res).await;
        assert!(v["responseTime"].as_f64().unwrap() >= 0.0);
        assert!(v["timestamp"].as_str().is_some());
        let inner: Value = serde_json::from_str(v["response"].as_str().unwrap()).unwrap();
        assert_eq!(inner["facility"], "鈴木大拙館");
        assert_eq!(inner["date"], "2025-10-06");
        assert_eq!(inner["is_closed"], true);
    }

    #[tokio::test]
    async fn query_without_facility_aggregates() {
        let res = app()
            .oneshot(query_request(
                r#"{"query": "2025-10-06に休みの施設を教えて"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = body_json(res).await;
        let inner: Value = serde_json::from_str(v["response"].as_str().unwrap()).unwrap();
        assert_eq!(inner["total"], 2);
        assert_eq!(inner["closed_list"][0], "鈴木大拙館");
    }

    #[tokio::test]
    async fn list_intent_returns_facility_list() {
        let res = app()
            .oneshot(query_request(r#"{"query": "施設の一覧を見せて"}"#))
            .await
            .unwrap();
        let v = body_json(res).await;
        let inner: Value = serde_json::from_str(v["response"].as_str().unwrap()).unwrap();
        assert_eq!(inner["total"], 2);
    }

    #[tokio::test]
    async fn fourteenth_request_is_rate_limited() {
        let app = app();
        for i in 0..13 {
            let res = app
                .clone()
                .oneshot(query_request(r#"{"query": "兼六園は今日開いてる？"}"#))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK, "request {} should pass", i + 1);
        }
        let res = app
            .oneshot(query_request(r#"{"query": "兼六園は今日開いてる？"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
        assert!(retry > 0);
        assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    }

    #[tokio::test]
    async fn preflight_gets_cors_headers() {
        let res = app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/query")
                    .header(header::ORIGIN, "https://demo.example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(res.headers().contains_key("access-control-allow-origin"));
        assert!(res.headers().contains_key("access-control-max-age"));
    }

    #[test]
    fn date_expressions_are_extracted_in_priority_order() {
        assert_eq!(extract_date_expr("10月6日は休み？").as_deref(), Some("10月6日"));
        assert_eq!(
            extract_date_expr("2025-10-06はどう？").as_deref(),
            Some("2025-10-06")
        );
        assert_eq!(extract_date_expr("明日開いてる？").as_deref(), Some("明日"));
        assert_eq!(extract_date_expr("いつか行きたい"), None);
    }

    #[test]
    fn longest_facility_mention_wins() {
        let t = table();
        assert_eq!(
            find_facility_mention(&t, "特別名勝 兼六園に行きたい").as_deref(),
            Some("特別名勝 兼六園")
        );
        assert_eq!(
            find_facility_mention(&t, "大拙館は開いてる？").as_deref(),
            Some("大拙館")
        );
        assert_eq!(find_facility_mention(&t, "こんにちは"), None);
    }
}
