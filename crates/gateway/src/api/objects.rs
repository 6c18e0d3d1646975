use axum::extract::{Path, State};
use axum::Json;
use dr_domain::model::AuthenticatedSubject;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::require_self_if_player;
use crate::error_response::ApiError;
use crate::services::object_commit;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CommitObjectRequest {
    pub owner_id: Uuid,
    pub stroke_ids: Vec<Uuid>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Serialize)]
pub struct CommitObjectResponse {
    pub object: dr_domain::model::CanvasObject,
    pub turn: dr_domain::model::Turn,
    pub room: dr_domain::model::Room,
}

pub async fn commit_object(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    subject: AuthenticatedSubject,
    Json(body): Json<CommitObjectRequest>,
) -> Result<Json<CommitObjectResponse>, ApiError> {
    require_self_if_player(&subject, body.owner_id)?;

    let outcome = object_commit::commit_object(
        &state,
        room_id,
        body.owner_id,
        body.stroke_ids,
        body.label,
    )
    .await?;

    Ok(Json(CommitObjectResponse {
        object: outcome.object,
        turn: outcome.turn,
        room: outcome.room,
    }))
}
