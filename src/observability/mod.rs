//! Ambient observability stack: Prometheus metrics plus the
//! `/healthz` and `/metrics` HTTP surface.

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use tower_http::cors::CorsLayer;

pub fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

#[derive(Clone)]
pub struct Metrics {
    pub prometheus_handle: PrometheusHandle,
}

impl Metrics {
    pub fn new(prometheus_handle: PrometheusHandle) -> Self {
        Self { prometheus_handle }
    }

    pub fn record_rows_drained(&self, count: u64) {
        metrics::increment_counter!("etl_batches_drained_total");
        metrics::histogram!("etl_rows_drained_batch_size", count as f64);
    }

    pub fn record_chunk_failed(&self) {
        metrics::increment_counter!("etl_chunk_failures_total");
    }

    pub fn record_city_scored(&self, hotspot_count: u64) {
        metrics::increment_counter!("etl_cities_scored_total");
        metrics::histogram!("etl_city_hotspot_count", hotspot_count as f64);
    }

    /// `state` is recorded as a label-free gauge bump; the current state
    /// name is also carried in the accompanying log line.
    pub fn record_sync_state(&self, _state: &'static str) {
        metrics::increment_counter!("etl_sync_state_transitions_total");
    }
}

#[derive(Clone)]
struct AppState {
    metrics: Metrics,
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.prometheus_handle.render()
}

/// The full observability HTTP surface: `/healthz` and `/metrics` only.
/// No REST query routes, WebSocket push, or frontend static file server.
pub fn router(metrics: Metrics, cors_allow_origin: &str) -> Router {
    let cors = if cors_allow_origin == "*" {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(
                cors_allow_origin
                    .parse::<HeaderValue>()
                    .unwrap_or(HeaderValue::from_static("*")),
            )
            .allow_methods([Method::GET])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .with_state(AppState { metrics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_metrics() -> Metrics {
        // build_recorder, not install_recorder: the global recorder slot can
        // only be set once per process and multiple tests would race for it.
        let recorder = PrometheusBuilder::new().build_recorder();
        Metrics::new(recorder.handle())
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = router(test_metrics(), "*");
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_is_reachable() {
        let app = router(test_metrics(), "*");
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
