mod business_logic;
mod config;
mod errors;
mod handlers;
mod models;
mod services;
mod state;

use axum::{routing::get, Router};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::business_logic::analyzer::SignalAnalyzer;
use crate::handlers::signals::{get_analysis, get_signals, get_signals_stream};
use crate::services::binance::BinanceClient;
use crate::services::scan_state::new_scan_state;
use crate::services::scanner::ScannerService;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::signals::get_signals,
        handlers::signals::get_signals_stream,
        handlers::signals::get_analysis
    ),
    components(schemas(
        handlers::health::HealthResponse,
        errors::ErrorResponse,
        models::signal::SignalsResponse,
        models::signal::ScanSnapshot,
        models::signal::SignalView,
        models::signal::SymbolStatus,
        business_logic::stage::StageSummary,
        models::signal::AnalysisResponse,
        models::signal::PullbackHighView
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::fetch_config()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let binance = Arc::new(BinanceClient::new(
        config.binance_api_key.clone(),
        config.scanner.request_delay,
    ));
    let analyzer = SignalAnalyzer::new(config.signal.clone());
    let scan_state = new_scan_state();

    tracing::info!(
        "Scanning {} candles for pullback highs, anchored at {}",
        config.scanner.interval,
        models::signal::format_ts(config.signal.anchor_ms)
    );

    let scanner = ScannerService::new(
        binance.clone(),
        analyzer.clone(),
        config.scanner.clone(),
        scan_state.clone(),
    );
    tokio::spawn(async move {
        scanner.run().await;
    });

    let app_state = AppState {
        scan_state,
        binance,
        analyzer: Arc::new(analyzer),
        interval: config.scanner.interval.clone(),
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/signals", get(get_signals))
        .route("/signals/stream", get(get_signals_stream))
        .route("/analyze", get(get_analysis))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Stdout logging, plus daily rolling files when `log_dir` is set.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pullbackscreener.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pullbackscreener=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
