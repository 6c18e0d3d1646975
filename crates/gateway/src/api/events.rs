use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dr_eventstore::TopicEvent;
use serde::{Deserialize, Serialize};

use crate::auth::InternalCaller;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct NextEventsQuery {
    pub cursor: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
pub struct NextEventsResponse {
    pub cursor: Option<String>,
    pub events: Vec<TopicEvent>,
}

/// `GET /internal/events/next?cursor&limit` — used by trusted
/// internal consumers that poll the timeline rather than holding a
/// WebSocket connection open.
pub async fn next(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Query(query): Query<NextEventsQuery>,
) -> Response {
    let events = state.events.list_timeline(query.cursor.as_deref(), query.limit);
    if events.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    let cursor = events.last().map(|e| e.cursor.clone());
    Json(NextEventsResponse { cursor, events }).into_response()
}
