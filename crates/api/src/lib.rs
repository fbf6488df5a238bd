//! HTTP front end for selector recovery.

use axum::{
    Router,
    extract::Json,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use selscope_analysis::{ScanConfig, ScanStats, analyze};
use selscope_core::decoder::input_to_bytes;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use std::time::Duration;
use tracing::{error, info};

/// Body of `POST /selectors`.
#[derive(Debug, Deserialize, Serialize)]
pub struct SelectorsRequest {
    /// Runtime bytecode as hex string (with or without 0x prefix)
    pub bytecode: String,
    /// Instruction budget for the scan; absent or zero selects the engine default
    pub gas_limit: Option<u32>,
}

/// Successful `POST /selectors` reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectorsResponse {
    /// Selectors as 0x-prefixed hex, in discovery order
    pub selectors: Vec<String>,
    /// Scan counters.
    pub stats: ScanStats,
    /// Wall-clock time spent in the scan.
    pub execution_time_ms: u64,
}

/// JSON body returned with 4xx and 5xx statuses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short error description.
    pub error: String,
    /// Underlying cause, when there is one.
    pub details: Option<String>,
}

type ApiError = (StatusCode, ResponseJson<ErrorResponse>);

/// Builds the router with tracing and permissive CORS.
pub fn app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/selectors", post(recover_selectors))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn health_check() -> ResponseJson<serde_json::Value> {
    ResponseJson(serde_json::json!({
        "status": "healthy",
        "service": "selscope-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn recover_selectors(
    Json(request): Json<SelectorsRequest>,
) -> Result<ResponseJson<SelectorsResponse>, ApiError> {
    let start_time = std::time::Instant::now();

    let bytes = input_to_bytes(&request.bytecode, false).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ResponseJson(ErrorResponse {
                error: "Invalid hex bytecode".to_string(),
                details: Some(e.to_string()),
            }),
        )
    })?;
    info!("Received selector request for {} bytes of code", bytes.len());

    let config = ScanConfig::with_gas_limit(request.gas_limit.unwrap_or(0));
    // The scan is pure CPU work; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || analyze(&bytes, &config))
        .await
        .map_err(|e| {
            error!("Selector scan failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(ErrorResponse {
                    error: "Selector scan failed".to_string(),
                    details: Some(e.to_string()),
                }),
            )
        })?;

    let execution_time = start_time.elapsed();
    info!(
        "Found {} selectors in {}ms",
        report.selectors.len(),
        execution_time.as_millis()
    );
    Ok(ResponseJson(SelectorsResponse {
        selectors: report.selector_strings(),
        stats: report.stats,
        execution_time_ms: elapsed_ms(execution_time),
    }))
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
