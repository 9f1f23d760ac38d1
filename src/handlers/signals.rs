use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use validator::Validate;

use crate::errors::AppError;
use crate::models::signal::{
    analysis_response, AnalysisResponse, AnalyzeQuery, ScanSnapshot, SignalsResponse,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/signals",
    responses(
        (status = 200, description = "Signals from the latest batch scan, newest first", body = SignalsResponse)
    )
)]
pub async fn get_signals(State(state): State<AppState>) -> Result<Json<SignalsResponse>, AppError> {
    let latest = state.scan_state.latest.read().await.clone();
    Ok(Json(SignalsResponse {
        scanned: latest.is_some(),
        snapshot: latest.unwrap_or_default(),
    }))
}

#[utoipa::path(
    get,
    path = "/signals/stream",
    responses(
        (status = 200, description = "SSE stream of scan snapshots", content_type = "text/event-stream")
    )
)]
pub async fn get_signals_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let initial_events: Vec<Result<Event, Infallible>> = state
        .scan_state
        .latest
        .read()
        .await
        .as_ref()
        .and_then(snapshot_event)
        .map(Ok)
        .into_iter()
        .collect();
    let initial_stream = tokio_stream::iter(initial_events);

    let rx = state.scan_state.broadcaster.subscribe();
    let broadcast_stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(snapshot) => snapshot_event(&snapshot).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let stream = initial_stream.chain(broadcast_stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[utoipa::path(
    get,
    path = "/analyze",
    params(AnalyzeQuery),
    responses(
        (status = 200, description = "On-demand analysis of one symbol", body = AnalysisResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Candle fetch failed", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalysisResponse>, AppError> {
    query.validate()?;

    let symbol = query.symbol.to_uppercase();
    let interval = query.interval.unwrap_or_else(|| state.interval.clone());
    tracing::info!("Analyzing {} ({})", symbol, interval);

    let candles = state
        .binance
        .fetch_historical(&symbol, &interval, state.analyzer.config().anchor_ms)
        .await
        .map_err(|error| AppError::Upstream(format!("{:#}", error)))?;

    let result = state
        .analyzer
        .analyze_symbol(&symbol, &candles, state.binance.as_ref())
        .await;

    Ok(Json(analysis_response(&result, &interval, candles.len())))
}

fn snapshot_event(snapshot: &ScanSnapshot) -> Option<Event> {
    let data = serde_json::to_string(snapshot).ok()?;
    Some(
        Event::default()
            .event("snapshot")
            .id(snapshot.as_of_ms.to_string())
            .data(data),
    )
}
