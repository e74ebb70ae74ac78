//! HTTP surface: `GET /isochrone` and `GET /health`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::engine::Hints;
use crate::error::IsochroneError;
use crate::graph::RoadNetwork;
use crate::isochrone;
use crate::isoline::HullIsolineBuilder;
use crate::query::RawQuery;
use crate::response::IsochroneResponse;

pub const TOOK_HEADER: &str = "x-took";

pub struct AppState {
    pub network: RoadNetwork,
    pub extractor: HullIsolineBuilder,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(network: RoadNetwork, config: ServiceConfig) -> Self {
        AppState {
            network,
            extractor: config.isoline_builder(),
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/isochrone", get(isochrone_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Isochrone(#[from] IsochroneError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Isochrone(err) => (StatusCode::BAD_REQUEST, err.code()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = ErrorResponse {
            message: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn isochrone_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    raw: Result<Query<RawQuery>, QueryRejection>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();

    let (Query(raw), Query(pairs)) = match (raw, pairs) {
        (Ok(raw), Ok(pairs)) => (raw, pairs),
        (Err(rejection), _) | (_, Err(rejection)) => {
            let err = IsochroneError::invalid(rejection.body_text());
            tracing::debug!(code = err.code(), error = %err, "malformed query string");
            return Err(err.into());
        }
    };
    let hints = Hints::from_pairs(pairs);

    let worker = Arc::clone(&state);
    let processed = tokio::task::spawn_blocking(move || {
        isochrone::process(
            &raw,
            &hints,
            &worker.network,
            &worker.extractor,
            worker.config.max_visited_nodes,
        )
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    let (query, outcome) = processed.map_err(|err| {
        tracing::debug!(code = err.code(), error = %err, "isochrone request rejected");
        ApiError::from(err)
    })?;

    let response = IsochroneResponse::new(outcome.payload, &state.config.copyrights, started.elapsed());
    tracing::info!(
        took = response.took(),
        visited = outcome.visited_nodes,
        mode = query.result_mode.as_str(),
        buckets = query.bucket_count,
        query = uri.query().unwrap_or_default(),
        "isochrone"
    );

    let took = response.took().to_string();
    Ok(([(TOOK_HEADER, took)], Json(response)).into_response())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    nodes: usize,
    edges: usize,
    profiles: Vec<String>,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let graph = state.network.graph();
    Json(HealthResponse {
        status: "ok",
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        profiles: state
            .network
            .profiles()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}
