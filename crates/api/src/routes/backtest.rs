use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use backtest::{backtest_ma_cross, BacktestParams, BacktestResult, ExitMode};

use crate::{auth::require_auth, AppState};

const MIN_FAST_WINDOW: usize = 2;
const MIN_SLOW_WINDOW: usize = 3;
const MIN_HOLD_DAYS: usize = 1;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/backtest", get(get_backtest))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Deserialize)]
struct BacktestQuery {
    ticker: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    fast_window: Option<usize>,
    slow_window: Option<usize>,
    exit_mode: Option<ExitMode>,
    hold_days: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BacktestResponse {
    ticker: String,
    #[serde(flatten)]
    result: BacktestResult,
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() }))).into_response()
}

/// Validate dashboard input into a ticker and backtest parameters.
fn parse_query(q: BacktestQuery) -> Result<(String, BacktestParams), String> {
    let ticker = q.ticker.unwrap_or_default().trim().to_uppercase();
    if ticker.is_empty() {
        return Err("ticker is required".into());
    }

    let defaults = BacktestParams::default();
    let params = BacktestParams {
        start: q.start,
        end: q.end,
        fast_window: q.fast_window.unwrap_or(defaults.fast_window),
        slow_window: q.slow_window.unwrap_or(defaults.slow_window),
        exit_mode: q.exit_mode.unwrap_or(defaults.exit_mode),
        hold_days: q.hold_days.unwrap_or(defaults.hold_days),
        ..defaults
    };

    if params.fast_window < MIN_FAST_WINDOW {
        return Err(format!("fast_window must be at least {MIN_FAST_WINDOW}"));
    }
    if params.slow_window < MIN_SLOW_WINDOW {
        return Err(format!("slow_window must be at least {MIN_SLOW_WINDOW}"));
    }
    if params.hold_days < MIN_HOLD_DAYS {
        return Err(format!("hold_days must be at least {MIN_HOLD_DAYS}"));
    }
    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start > end {
            return Err("start must not be after end".into());
        }
    }

    Ok((ticker, params))
}

async fn get_backtest(
    State(state): State<AppState>,
    query: Result<Query<BacktestQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (ticker, params) = match parse_query(query) {
        Ok(parsed) => parsed,
        Err(msg) => return bad_request(msg),
    };

    info!(%ticker, fast = params.fast_window, slow = params.slow_window, exit = %params.exit_mode, "Dashboard backtest");
    let result = backtest_ma_cross(state.market.as_ref(), &ticker, &params).await;

    Json(BacktestResponse { ticker, result }).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use replay::{daily_series, ReplayMarketData};

    use crate::{router, AppState};

    use super::*;

    async fn app(token: Option<&str>) -> Router {
        let market = ReplayMarketData::new();
        market
            .insert_history(
                "AAPL",
                daily_series("2021-01-01".parse().unwrap(), &[1.0, 1.0, 1.0, 2.0, 3.0, 4.0]),
            )
            .await;
        router(AppState::new(Arc::new(market), token.map(str::to_string)))
    }

    async fn get(app: Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn runs_backtest_for_normalized_ticker() {
        let (status, body) = get(
            app(None).await,
            "/api/backtest?ticker=%20aapl%20&fast_window=2&slow_window=3&hold_days=2",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticker"], "AAPL");
        assert_eq!(body["history"].as_array().unwrap().len(), 6);
        assert_eq!(body["trades"].as_array().unwrap().len(), 1);
        assert_eq!(body["trades"][0]["return_pct"], 100.0);
        assert_eq!(body["metrics"]["total_trades"], 1.0);
    }

    #[tokio::test]
    async fn unknown_ticker_returns_empty_result() {
        let (status, body) = get(app(None).await, "/api/backtest?ticker=NOPE", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["history"].as_array().unwrap().is_empty());
        assert!(body["metrics"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_out_of_range_inputs() {
        for uri in [
            "/api/backtest?ticker=",
            "/api/backtest?ticker=AAPL&fast_window=1",
            "/api/backtest?ticker=AAPL&slow_window=2",
            "/api/backtest?ticker=AAPL&hold_days=0",
            "/api/backtest?ticker=AAPL&start=2022-01-01&end=2021-01-01",
            "/api/backtest?ticker=AAPL&exit_mode=trailing",
            "/api/backtest?ticker=AAPL&fast_window=abc",
        ] {
            let (status, body) = get(app(None).await, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn token_is_enforced_when_configured() {
        let uri = "/api/backtest?ticker=AAPL";
        let (status, _) = get(app(Some("secret")).await, uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(app(Some("secret")).await, uri, Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = get(app(Some("secret")).await, uri, Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_check_skips_auth() {
        let (status, body) = get(app(Some("secret")).await, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn defaults_match_backtest_defaults() {
        let q = BacktestQuery {
            ticker: Some("msft".into()),
            start: None,
            end: None,
            fast_window: None,
            slow_window: None,
            exit_mode: None,
            hold_days: None,
        };
        let (ticker, params) = parse_query(q).unwrap();
        assert_eq!(ticker, "MSFT");
        assert_eq!(params, BacktestParams::default());
    }
}
