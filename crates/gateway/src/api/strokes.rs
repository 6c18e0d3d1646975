use axum::extract::{Path, State};
use axum::Json;
use dr_domain::model::{AuthenticatedSubject, Point, Stroke};
use dr_domain::Error;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::require_self_if_player;
use crate::error_response::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateStrokeRequest {
    pub author_id: Uuid,
    pub path: Vec<Point>,
    pub color: String,
    pub width: f64,
}

pub async fn create_stroke(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    subject: AuthenticatedSubject,
    Json(body): Json<CreateStrokeRequest>,
) -> Result<Json<Stroke>, ApiError> {
    require_self_if_player(&subject, body.author_id)?;
    if body.path.is_empty() {
        return Err(Error::BadRequest("stroke path must not be empty".into()).into());
    }
    if body.width <= 0.0 {
        return Err(Error::BadRequest("stroke width must be positive".into()).into());
    }

    let _guard = state.commit_lock.lock().await;

    let stroke = state.store.transaction(|txn| {
        txn.get_room(room_id)?;
        let stroke = Stroke::new(room_id, body.author_id, body.path.clone(), body.color.clone(), body.width);
        txn.save_stroke(stroke.clone());
        Ok(stroke)
    })?;

    state.events.append_stream(
        "ws:events",
        "stroke",
        room_id,
        json!({
            "id": stroke.id,
            "roomId": stroke.room_id,
            "authorId": stroke.author_id,
            "color": stroke.color,
            "width": stroke.width,
            "ts": stroke.ts,
            "path": stroke.path,
            "objectId": stroke.object_id,
        }),
    );

    Ok(Json(stroke))
}

pub async fn list_strokes(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    _subject: AuthenticatedSubject,
) -> Result<Json<Vec<Stroke>>, ApiError> {
    let strokes = state.store.transaction(|txn| {
        txn.get_room(room_id)?;
        Ok(txn.list_strokes(room_id))
    })?;
    Ok(Json(strokes))
}
