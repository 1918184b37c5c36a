use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use matzip_core::SearchError;
use matzip_search::EsClient;
use serde::Serialize;

/// Reachability seam so the handler can be exercised without a live
/// backend.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    async fn probe(&self) -> Result<(), SearchError>;
}

#[async_trait]
impl BackendProbe for EsClient {
    async fn probe(&self) -> Result<(), SearchError> {
        self.ping().await
    }
}

#[derive(Clone)]
pub struct HealthState {
    probe: Arc<dyn BackendProbe>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub search_backend: HealthCheck,
    pub checked_at: String,
}

pub fn router(probe: Arc<dyn BackendProbe>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { probe })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let search_backend = backend_check(state.probe.as_ref()).await;
    let ready = search_backend.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "matzip-server runtime initialized".to_owned(),
        },
        search_backend,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn backend_check(probe: &dyn BackendProbe) -> HealthCheck {
    match probe.probe().await {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: "search backend reachable".to_owned(),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("search backend unreachable: {error}"),
        },
    }
}
