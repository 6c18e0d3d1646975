use axum::extract::{Path, State};
use axum::Json;
use dr_domain::model::{AuthenticatedSubject, Turn};
use uuid::Uuid;

use crate::error_response::ApiError;
use crate::state::AppState;

pub async fn list_turns(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    _subject: AuthenticatedSubject,
) -> Result<Json<Vec<Turn>>, ApiError> {
    let turns = state.store.transaction(|txn| {
        txn.get_room(room_id)?;
        Ok(txn.get_turns_for_room(room_id))
    })?;
    Ok(Json(turns))
}
