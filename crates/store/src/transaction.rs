use std::collections::HashMap;

use dr_domain::error::NotFoundKind;
use dr_domain::model::{AuditLog, CanvasObject, Room, RoomMember, Stroke, Turn};
use dr_domain::{Error, Result};
use uuid::Uuid;

use crate::StoreInner;

/// One buffered transaction body. All reads see this transaction's
/// own pending writes layered on top of the state the store held
/// when the transaction began; nothing is visible to other
/// transactions until the body returns `Ok` and the store applies it.
pub struct Transaction {
    base: StoreInner,
    pending: StoreInner,
}

impl Transaction {
    pub(crate) fn new(base: StoreInner) -> Self {
        Self {
            base,
            pending: StoreInner::default(),
        }
    }

    pub(crate) fn has_pending_changes(&self) -> bool {
        !self.pending.rooms.is_empty()
            || !self.pending.members.is_empty()
            || !self.pending.strokes.is_empty()
            || !self.pending.objects.is_empty()
            || !self.pending.turns.is_empty()
            || !self.pending.audit_logs.is_empty()
    }

    pub(crate) fn apply_to(self, target: &mut StoreInner) {
        target.rooms.extend(self.pending.rooms);
        target.members.extend(self.pending.members);
        target.strokes.extend(self.pending.strokes);
        target.objects.extend(self.pending.objects);
        target.turns.extend(self.pending.turns);
        target.audit_logs.extend(self.pending.audit_logs);
    }

    // ── Rooms ──────────────────────────────────────────────────────

    pub fn get_room(&self, room_id: Uuid) -> Result<Room> {
        self.pending
            .rooms
            .get(&room_id)
            .or_else(|| self.base.rooms.get(&room_id))
            .cloned()
            .ok_or(Error::NotFound(NotFoundKind::Room))
    }

    pub fn save_room(&mut self, room: Room) {
        self.pending.rooms.insert(room.id, room);
    }

    // ── Room members ─────────────────────────────────────────────

    pub fn get_room_member(&self, room_id: Uuid, user_id: Uuid) -> Result<RoomMember> {
        let key = (room_id, user_id);
        self.pending
            .members
            .get(&key)
            .or_else(|| self.base.members.get(&key))
            .cloned()
            .ok_or(Error::NotFound(NotFoundKind::RoomMember))
    }

    pub fn save_room_member(&mut self, member: RoomMember) {
        self.pending
            .members
            .insert((member.room_id, member.user_id), member);
    }

    pub fn list_room_members(&self, room_id: Uuid) -> Vec<RoomMember> {
        let mut merged: HashMap<(Uuid, Uuid), RoomMember> = self
            .base
            .members
            .iter()
            .filter(|(k, _)| k.0 == room_id)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, v) in self.pending.members.iter().filter(|(k, _)| k.0 == room_id) {
            merged.insert(*k, v.clone());
        }
        let mut members: Vec<RoomMember> = merged.into_values().collect();
        members.sort_by_key(|m| m.joined_at);
        members
    }

    // ── Strokes ──────────────────────────────────────────────────

    fn stroke_lookup(&self, id: Uuid) -> Option<Stroke> {
        self.pending
            .strokes
            .get(&id)
            .or_else(|| self.base.strokes.get(&id))
            .cloned()
    }

    pub fn save_stroke(&mut self, stroke: Stroke) {
        self.pending.strokes.insert(stroke.id, stroke);
    }

    pub fn get_stroke(&self, stroke_id: Uuid) -> Result<Stroke> {
        self.stroke_lookup(stroke_id)
            .ok_or(Error::NotFound(NotFoundKind::Stroke))
    }

    /// Fetch strokes in the order `ids` were given. Fails with
    /// `bad_request` if any id is missing or belongs to a different
    /// room.
    pub fn get_strokes(&self, room_id: Uuid, ids: &[Uuid]) -> Result<Vec<Stroke>> {
        ids.iter()
            .map(|id| {
                let stroke = self
                    .stroke_lookup(*id)
                    .ok_or_else(|| Error::BadRequest(format!("stroke {id} not found")))?;
                if stroke.room_id != room_id {
                    return Err(Error::BadRequest(format!(
                        "stroke {id} does not belong to the room"
                    )));
                }
                Ok(stroke)
            })
            .collect()
    }

    pub fn list_strokes(&self, room_id: Uuid) -> Vec<Stroke> {
        let mut merged: HashMap<Uuid, Stroke> = self
            .base
            .strokes
            .iter()
            .filter(|(_, s)| s.room_id == room_id)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, v) in self
            .pending
            .strokes
            .iter()
            .filter(|(_, s)| s.room_id == room_id)
        {
            merged.insert(*k, v.clone());
        }
        let mut strokes: Vec<Stroke> = merged.into_values().collect();
        strokes.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.id.cmp(&b.id)));
        strokes
    }

    /// Record that `stroke_id` has been assigned to `object_id`.
    pub fn update_stroke(&mut self, stroke_id: Uuid, object_id: Uuid) -> Result<()> {
        let mut stroke = self.get_stroke(stroke_id)?;
        stroke.object_id = Some(object_id);
        self.save_stroke(stroke);
        Ok(())
    }

    // ── Objects ──────────────────────────────────────────────────

    pub fn save_object(&mut self, object: CanvasObject) {
        self.pending.objects.insert(object.id, object);
    }

    pub fn get_object(&self, object_id: Uuid) -> Result<CanvasObject> {
        self.pending
            .objects
            .get(&object_id)
            .or_else(|| self.base.objects.get(&object_id))
            .cloned()
            .ok_or(Error::NotFound(NotFoundKind::Object))
    }

    pub fn list_objects(&self, room_id: Uuid) -> Vec<CanvasObject> {
        let mut merged: HashMap<Uuid, CanvasObject> = self
            .base
            .objects
            .iter()
            .filter(|(_, o)| o.room_id == room_id)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, v) in self
            .pending
            .objects
            .iter()
            .filter(|(_, o)| o.room_id == room_id)
        {
            merged.insert(*k, v.clone());
        }
        let mut objects: Vec<CanvasObject> = merged.into_values().collect();
        objects.sort_by_key(|o| o.created_at);
        objects
    }

    // ── Turns ────────────────────────────────────────────────────

    pub fn save_turn(&mut self, turn: Turn) {
        self.pending.turns.insert(turn.id, turn);
    }

    pub fn update_turn(&mut self, turn: Turn) {
        self.pending.turns.insert(turn.id, turn);
    }

    pub fn get_turn(&self, turn_id: Uuid) -> Result<Turn> {
        self.pending
            .turns
            .get(&turn_id)
            .or_else(|| self.base.turns.get(&turn_id))
            .cloned()
            .ok_or(Error::NotFound(NotFoundKind::Turn))
    }

    pub fn get_turns_for_room(&self, room_id: Uuid) -> Vec<Turn> {
        let mut merged: HashMap<Uuid, Turn> = self
            .base
            .turns
            .iter()
            .filter(|(_, t)| t.room_id == room_id)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, v) in self.pending.turns.iter().filter(|(_, t)| t.room_id == room_id) {
            merged.insert(*k, v.clone());
        }
        let mut turns: Vec<Turn> = merged.into_values().collect();
        turns.sort_by_key(|t| t.sequence);
        turns
    }

    // ── Audit logs ───────────────────────────────────────────────

    pub fn append_audit_log(&mut self, log: AuditLog) {
        self.pending.audit_logs.push(log);
    }

    pub fn list_audit_logs(&self, room_id: Option<Uuid>) -> Vec<AuditLog> {
        let mut logs: Vec<AuditLog> = self
            .base
            .audit_logs
            .iter()
            .chain(self.pending.audit_logs.iter())
            .filter(|log| room_id.map(|r| log.room_id == r).unwrap_or(true))
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.ts);
        logs
    }
}
