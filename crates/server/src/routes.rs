//! JSON API:
//! - `POST /api/v1/search` — resolve a free-text query and run the search

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use matzip_agent::{LlmClient, SearchAgent, SearchOutcome};
use matzip_core::domain::action::ParamMap;
use matzip_core::domain::result::SearchResult;
use matzip_search::SearchBackend;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ActionEcho {
    pub strategy: String,
    pub params: ParamMap,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub action: ActionEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub attempts: u32,
    pub satisfactory: bool,
    pub verdict_reason: String,
    pub widened: bool,
    pub result: SearchResult,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            query: outcome.query,
            action: ActionEcho {
                strategy: outcome.action.strategy.as_str().to_owned(),
                params: outcome.action.params,
            },
            reasoning: outcome.reasoning,
            attempts: outcome.attempts,
            satisfactory: outcome.satisfactory,
            verdict_reason: outcome.verdict_reason,
            widened: outcome.widened,
            result: outcome.result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub fn router<L, B>(agent: Arc<SearchAgent<L, B>>) -> Router
where
    L: LlmClient + 'static,
    B: SearchBackend + 'static,
{
    Router::new().route("/api/v1/search", post(search::<L, B>)).with_state(agent)
}

pub async fn search<L: LlmClient, B: SearchBackend>(
    State(agent): State<Arc<SearchAgent<L, B>>>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let query = request.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError { error: "질의가 필요합니다".to_owned() }),
        )
            .into_response();
    }

    let correlation_id = Uuid::new_v4();
    info!(
        event_name = "api.search.received",
        correlation_id = %correlation_id,
        "search request received"
    );

    let outcome = agent.resolve_and_search(query).await;

    info!(
        event_name = "api.search.completed",
        correlation_id = %correlation_id,
        strategy = %outcome.action.strategy,
        total = outcome.result.total,
        widened = outcome.widened,
        "search request completed"
    );

    (StatusCode::OK, Json(SearchResponse::from(outcome))).into_response()
}
