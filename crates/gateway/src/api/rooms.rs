use axum::extract::{Path, State};
use axum::Json;
use dr_domain::model::{AuthenticatedSubject, Room, RoomMember, RoomRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::require_self_if_player;
use crate::error_response::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub host_id: Uuid,
}

#[derive(Serialize)]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: Room,
}

pub async fn create_room(
    State(state): State<AppState>,
    subject: AuthenticatedSubject,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    require_self_if_player(&subject, body.host_id)?;

    let room = state.store.transaction(|txn| {
        let room = Room::new(body.name.clone());
        txn.save_room(room.clone());
        txn.save_room_member(RoomMember::new(room.id, body.host_id, RoomRole::Host));
        Ok(room)
    })?;

    tracing::info!(room_id = %room.id, host_id = %body.host_id, "room created");
    Ok(Json(RoomResponse { room }))
}

#[derive(Deserialize)]
pub struct JoinRoomRequest {
    pub user_id: Uuid,
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    subject: AuthenticatedSubject,
    Json(body): Json<JoinRoomRequest>,
) -> Result<Json<RoomMember>, ApiError> {
    require_self_if_player(&subject, body.user_id)?;

    let member = state.store.transaction(|txn| {
        txn.get_room(room_id)?;
        let member = RoomMember::new(room_id, body.user_id, RoomRole::Participant);
        txn.save_room_member(member.clone());
        Ok(member)
    })?;

    tracing::info!(room_id = %room_id, user_id = %body.user_id, "room joined");
    Ok(Json(member))
}

#[derive(Serialize)]
pub struct RoomSnapshot {
    pub room: Room,
    pub members: Vec<RoomMember>,
    pub strokes: Vec<dr_domain::model::Stroke>,
    pub objects: Vec<dr_domain::model::CanvasObject>,
    pub turns: Vec<dr_domain::model::Turn>,
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    _subject: AuthenticatedSubject,
) -> Result<Json<RoomSnapshot>, ApiError> {
    let snapshot = state.store.transaction(|txn| {
        let room = txn.get_room(room_id)?;
        Ok(RoomSnapshot {
            members: txn.list_room_members(room_id),
            strokes: txn.list_strokes(room_id),
            objects: txn.list_objects(room_id),
            turns: txn.get_turns_for_room(room_id),
            room,
        })
    })?;

    Ok(Json(snapshot))
}
