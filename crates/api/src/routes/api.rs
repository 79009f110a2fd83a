use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use chart::{chart_window, info_table, render_chart, ChartSpec};
use common::{Error, Interval, Period, RankOrder, ScreenResult, TickerInfo};
use signals::with_moving_averages;

use crate::{ApiError, AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/screen", get(get_screen))
        .route("/api/screen/refresh", post(refresh_screen))
        .route("/api/chart/:ticker", get(get_chart))
        .route("/api/info/:ticker", get(get_info))
        .route("/api/tickers", get(suggest_tickers))
}

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ScreenQuery {
    sort: Option<RankOrder>,
}

async fn get_screen(State(state): State<AppState>, Query(q): Query<ScreenQuery>) -> Json<Value> {
    let latest = state.screener.latest().await;
    Json(screen_body(latest.as_ref(), q.sort.unwrap_or_default()))
}

#[derive(Deserialize)]
struct RefreshQuery {
    sort: Option<RankOrder>,
    /// `false` queues the run and answers 202 right away.
    wait: Option<bool>,
}

async fn refresh_screen(
    State(state): State<AppState>,
    Query(q): Query<RefreshQuery>,
) -> Result<Response, ApiError> {
    info!(wait = q.wait.unwrap_or(true), "Screen refresh requested via API");
    if !q.wait.unwrap_or(true) {
        state.screener.trigger().await?;
        let body = Json(json!({ "status": "queued" }));
        return Ok((StatusCode::ACCEPTED, body).into_response());
    }

    let result = state.screener.refresh().await?;
    Ok(Json(screen_body(Some(&result), q.sort.unwrap_or_default())).into_response())
}

fn screen_body(result: Option<&ScreenResult>, order: RankOrder) -> Value {
    match result {
        Some(result) => json!({
            "rows": result.display_records(order),
            "total": result.len(),
            "attempted": result.attempted,
            "dropped": result.dropped,
            "generated_at": result.finished_at,
        }),
        None => json!({
            "rows": [],
            "total": 0,
            "attempted": 0,
            "dropped": [],
            "generated_at": null,
        }),
    }
}

// ─── Chart & info ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartQuery {
    period: Option<Period>,
}

async fn get_chart(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(q): Query<ChartQuery>,
) -> Result<Json<ChartSpec>, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    let (fetch, rows) = chart_window(q.period.unwrap_or(Period::OneYear));

    let series = state.client.get_history(&ticker, fetch, Interval::Daily).await?;
    let series = with_moving_averages(series)?.tail(rows);

    // The chart still renders without a subtitle when info is missing.
    let info = state.client.get_info(&ticker).await.unwrap_or_else(|e| {
        warn!(ticker = %ticker, error = %e, "Info unavailable for chart");
        TickerInfo::default()
    });

    Ok(Json(render_chart(&series, &ticker, &info)))
}

async fn get_info(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    let info = state.client.get_info(&ticker).await?;

    let rows: Vec<Value> = info_table(&info)
        .into_iter()
        .map(|(label, value)| json!({ "label": label, "value": value }))
        .collect();
    Ok(Json(json!({
        "ticker": ticker,
        "name": info.long_name,
        "rows": rows,
    })))
}

// ─── Ticker search ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TickerQuery {
    q: Option<String>,
}

async fn suggest_tickers(
    State(state): State<AppState>,
    Query(q): Query<TickerQuery>,
) -> Json<Vec<String>> {
    let needle = q.q.unwrap_or_default().trim().to_uppercase();
    if needle.is_empty() {
        return Json(Vec::new());
    }
    Json(
        state
            .universe
            .iter()
            .filter(|t| t.to_uppercase().contains(&needle))
            .cloned()
            .collect(),
    )
}

fn normalize_ticker(raw: &str) -> Result<String, Error> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(Error::InvalidArgument("ticker must not be empty".into()));
    }
    Ok(ticker)
}
