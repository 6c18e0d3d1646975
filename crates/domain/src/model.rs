//! Core entities: rooms, members, strokes, objects, turns, audit logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single (x, y) point on a stroke's path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The pair of nested boxes an AI patch is allowed to draw inside.
/// `inner` is the committed object's own bbox; `outer` is padded by
/// 40% of the larger dimension on every side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRing {
    pub inner: BBox,
    pub outer: BBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomRole {
    Host,
    Participant,
}

/// The role carried by a verified signed token — distinct from
/// [`RoomRole`], which is per-room membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Player,
    Moderator,
    Parent,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Player => "player",
            UserRole::Moderator => "moderator",
            UserRole::Parent => "parent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Draft,
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    WaitingForAi,
    AiCompleted,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnActor {
    Player,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Passed,
    Blocked,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub turn_seq: u64,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            turn_seq: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub role: RoomRole,
    pub joined_at: DateTime<Utc>,
}

impl RoomMember {
    pub fn new(room_id: Uuid, user_id: Uuid, role: RoomRole) -> Self {
        Self {
            room_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: Uuid,
    pub path: Vec<Point>,
    pub color: String,
    pub width: f64,
    pub ts: DateTime<Utc>,
    pub object_id: Option<Uuid>,
}

impl Stroke {
    pub fn new(
        room_id: Uuid,
        author_id: Uuid,
        path: Vec<Point>,
        color: String,
        width: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            author_id,
            path,
            color,
            width,
            ts: Utc::now(),
            object_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    pub id: Uuid,
    pub room_id: Uuid,
    pub owner_id: Uuid,
    pub bbox: BBox,
    pub anchor_ring: AnchorRing,
    pub status: ObjectStatus,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sequence: u64,
    pub status: TurnStatus,
    pub current_actor: TurnActor,
    pub source_object_id: Uuid,
    pub ai_patch_uri: Option<String>,
    pub safety_status: Option<SafetyStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(room_id: Uuid, sequence: u64, source_object_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            room_id,
            sequence,
            status: TurnStatus::WaitingForAi,
            current_actor: TurnActor::Ai,
            source_object_id,
            ai_patch_uri: None,
            safety_status: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Option<Uuid>,
    pub turn_id: Option<Uuid>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        room_id: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_id,
            user_id: None,
            turn_id: None,
            event_type: event_type.into(),
            payload,
            ts: Utc::now(),
        }
    }

    pub fn with_turn(mut self, turn_id: Uuid) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSubject {
    pub user_id: Uuid,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_status_serializes_to_snake_case() {
        let s = serde_json::to_string(&TurnStatus::AiCompleted).unwrap();
        assert_eq!(s, "\"ai_completed\"");
    }

    #[test]
    fn room_starts_at_zero_turn_seq() {
        let room = Room::new("forest");
        assert_eq!(room.turn_seq, 0);
    }
}
