use crate::errors::{Error, Result};
use crate::metrics::{
    self, DEVICES_REPORTING, INVALID_PAYLOAD_TOTAL, LATEST_NOT_FOUND_TOTAL,
    READINGS_ACCEPTED_TOTAL, UNAUTHORIZED_TOTAL,
};
use crate::model::{HealthResponse, Measurement, Reading, StatusResponse};
use crate::registry::DeviceRegistry;
use crate::store::ReadingStore;
use crate::validate::parse_measurement;
use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Request},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const DEVICE_TOKEN_HEADER: &str = "x-device-token";

/// Largest submission body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub store: ReadingStore,
}

impl AppState {
    pub fn new(registry: DeviceRegistry, store: ReadingStore) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
        }
    }
}

/// Routes for submission, latest lookup and health.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices/:device_id/readings", post(submit_reading))
        .route("/api/devices/:device_id/readings/latest", get(latest_reading))
        .route("/health", get(health))
        .with_state(state)
}

/// Full application: API routes plus `/metrics`, request ids, tracing and CORS.
pub fn build_app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(create_router(state))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    %request_id,
                    method = %req.method(),
                    uri = %req.uri(),
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// Any origin when `allow_origin` is `None`, otherwise exactly that origin.
pub fn cors_layer(allow_origin: Option<&str>) -> Result<CorsLayer> {
    match allow_origin {
        None => Ok(CorsLayer::permissive()),
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|_| Error::Config(format!("invalid CORS origin '{}'", origin)))?;
            Ok(CorsLayer::permissive().allow_origin(AllowOrigin::exact(origin)))
        }
    }
}

async fn submit_reading(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<StatusResponse>> {
    let token = headers
        .get(DEVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.registry.authorize(&device_id, token) {
        UNAUTHORIZED_TOTAL.inc();
        warn!(%device_id, "rejected reading: unauthorized");
        return Err(Error::Unauthorized);
    }

    // The body is not read until the device is authorized.
    let measurement = read_measurement(body).await.map_err(|e| {
        INVALID_PAYLOAD_TOTAL.inc();
        warn!(%device_id, error = %e, "rejected reading");
        e
    })?;

    let reading = Reading::new(device_id.clone(), measurement);
    debug!(
        %device_id,
        temperature = reading.temperature,
        humidity = reading.humidity,
        "storing reading"
    );
    let devices = state.store.put(&device_id, reading).await;

    READINGS_ACCEPTED_TOTAL.inc();
    DEVICES_REPORTING.set(devices as i64);
    info!(%device_id, "reading accepted");

    Ok(Json(StatusResponse::ok()))
}

async fn read_measurement(body: Body) -> Result<Measurement> {
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| Error::InvalidPayload(format!("could not read body: {}", e)))?;
    parse_measurement(&bytes)
}

async fn latest_reading(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Reading>> {
    match state.store.get(&device_id).await {
        Some(reading) => Ok(Json(reading)),
        None => {
            LATEST_NOT_FOUND_TOTAL.inc();
            debug!(%device_id, "no reading stored yet");
            Err(Error::NotFound)
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        devices: state.store.list_device_ids().await,
    })
}

async fn metrics_handler() -> Result<String> {
    metrics::gather_metrics()
}
