//! Atomic JSON snapshot of the whole store: write to a sibling temp
//! path, then rename over the destination, so a crash mid-write never
//! leaves a truncated file behind.

use std::path::Path;

use dr_domain::model::{AuditLog, CanvasObject, Room, RoomMember, Stroke, Turn};
use dr_domain::Result;
use serde::{Deserialize, Serialize};

use crate::StoreInner;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub rooms: Vec<Room>,
    pub members: Vec<RoomMember>,
    pub strokes: Vec<Stroke>,
    pub objects: Vec<CanvasObject>,
    pub turns: Vec<Turn>,
    pub audit_logs: Vec<AuditLog>,
}

impl From<&StoreInner> for Snapshot {
    fn from(inner: &StoreInner) -> Self {
        Self {
            rooms: inner.rooms.values().cloned().collect(),
            members: inner.members.values().cloned().collect(),
            strokes: inner.strokes.values().cloned().collect(),
            objects: inner.objects.values().cloned().collect(),
            turns: inner.turns.values().cloned().collect(),
            audit_logs: inner.audit_logs.clone(),
        }
    }
}

impl From<Snapshot> for StoreInner {
    fn from(snapshot: Snapshot) -> Self {
        let mut inner = StoreInner::default();
        for room in snapshot.rooms {
            inner.rooms.insert(room.id, room);
        }
        for member in snapshot.members {
            inner.members.insert((member.room_id, member.user_id), member);
        }
        for stroke in snapshot.strokes {
            inner.strokes.insert(stroke.id, stroke);
        }
        for object in snapshot.objects {
            inner.objects.insert(object.id, object);
        }
        for turn in snapshot.turns {
            inner.turns.insert(turn.id, turn);
        }
        inner.audit_logs = snapshot.audit_logs;
        inner
    }
}

pub(crate) fn write(path: &Path, inner: &StoreInner) -> Result<()> {
    let snapshot = Snapshot::from(inner);
    let json = serde_json::to_string_pretty(&snapshot)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<StoreInner> {
    let raw = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    Ok(snapshot.into())
}
