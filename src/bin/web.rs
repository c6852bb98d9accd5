//! ==============================================================================
//! web.rs - consumer JSON API
//! ==============================================================================
//!
//! purpose:
//!     the reader process. serves the store file over http for the web ui
//!     and any other consumer. never writes the store.
//!
//! endpoints:
//!     GET /api/data              -> full store contents
//!     GET /api/series/{key}      -> values for one metric, in record order
//!     GET /api/series/{key}?days=N -> same, limited to the last N days
//!                                     (timestamps and values stay aligned)
//!
//! the writer rewrites the store file in place, so every read here goes
//! through the retrying reader; a torn read degrades to an empty list, and
//! the ui shows "no data yet" instead of an error page.
//!
//! ==============================================================================

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use sensehat_station::config::StationConfig;
use sensehat_station::series;
use sensehat_station::store::read_with_retry;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct WebState {
    store_path: PathBuf,
    read_retries: u32,
    retry_delay: Duration,
}

impl WebState {
    /// Robust read on the blocking pool; the retry loop sleeps.
    async fn read_store(&self) -> Vec<Value> {
        let path = self.store_path.clone();
        let (retries, delay) = (self.read_retries, self.retry_delay);
        tokio::task::spawn_blocking(move || read_with_retry(&path, retries, delay))
            .await
            .unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = StationConfig::load_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let state = Arc::new(WebState {
        store_path: config.store.path.clone(),
        read_retries: config.web.read_retries,
        retry_delay: config.web.retry_delay(),
    });

    let app = Router::new()
        .route("/api/data", get(data_handler))
        .route("/api/series/:key", get(series_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("Consumer API listening on {}", config.web.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.web.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Full store contents. Empty list when there is no data (or the reader
/// exhausted its retries against a torn file).
async fn data_handler(State(state): State<Arc<WebState>>) -> Json<Vec<Value>> {
    Json(state.read_store().await)
}

#[derive(Deserialize)]
struct SeriesParams {
    days: Option<i64>,
}

/// One metric as parallel timestamp/value series.
async fn series_handler(
    State(state): State<Arc<WebState>>,
    Path(key): Path<String>,
    Query(params): Query<SeriesParams>,
) -> Json<Value> {
    let records = state.read_store().await;
    let (timestamps, values) = match params.days {
        Some(days) => series::extract_last_days(&key, &records, days),
        None => (
            series::extract("timestamp", &records)
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            series::extract(&key, &records),
        ),
    };
    Json(json!({ "key": key, "timestamps": timestamps, "values": values }))
}
