//! The object-commit pipeline (one store transaction, then one
//! ordered burst of event-store appends): groups strokes into a
//! committed object, allocates the next turn, and dispatches it.

use dr_domain::model::{AnchorRing, AuditLog, BBox, CanvasObject, ObjectStatus, Point, Room, Turn};
use dr_domain::{Error, Result};
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

const MIN_EXTENT: f64 = 1e-6;
const ANCHOR_PADDING_FACTOR: f64 = 0.4;

fn compute_bbox(points: &[Point]) -> Result<BBox> {
    if points.is_empty() {
        return Err(Error::BadRequest(
            "cannot commit an object with no points".into(),
        ));
    }
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Ok(BBox {
        x: min_x,
        y: min_y,
        width: (max_x - min_x).max(MIN_EXTENT),
        height: (max_y - min_y).max(MIN_EXTENT),
    })
}

fn compute_anchor_ring(bbox: BBox) -> AnchorRing {
    let padding = ANCHOR_PADDING_FACTOR * bbox.width.max(bbox.height);
    let outer = BBox {
        x: bbox.x - padding,
        y: bbox.y - padding,
        width: bbox.width + padding * 2.0,
        height: bbox.height + padding * 2.0,
    };
    AnchorRing { inner: bbox, outer }
}

pub struct CommitOutcome {
    pub object: CanvasObject,
    pub turn: Turn,
    pub room: Room,
}

/// Result of the main transaction: either the commit went through, or
/// the label was rejected after everything else had already checked
/// out (in which case the transaction body still aborts, and the
/// audit log is persisted separately — see below).
enum CommitAttempt {
    Rejected { reasons: Vec<String> },
    Committed { object: CanvasObject, turn: Turn, room: Room },
}

/// Commit a group of strokes into an object, per §4.2. Returns the
/// new object, the turn it spawned, and the room (with its
/// incremented `turn_seq`).
pub async fn commit_object(
    state: &AppState,
    room_id: Uuid,
    owner_id: Uuid,
    stroke_ids: Vec<Uuid>,
    label: Option<String>,
) -> Result<CommitOutcome> {
    if let Some(label) = &label {
        if label.chars().count() > 128 {
            return Err(Error::BadRequest("label exceeds 128 characters".into()));
        }
    }

    let _guard = state.commit_lock.lock().await;

    let attempt = state.store.transaction(|txn| {
        let room = txn.get_room(room_id)?;
        let strokes = txn.get_strokes(room_id, &stroke_ids)?;

        let assigned: Vec<Uuid> = strokes
            .iter()
            .filter_map(|s| s.object_id.map(|_| s.id))
            .collect();
        if !assigned.is_empty() {
            return Err(Error::Conflict(format!(
                "strokes already assigned to an object: {assigned:?}"
            )));
        }

        let all_points: Vec<Point> = strokes.iter().flat_map(|s| s.path.clone()).collect();
        let bbox = compute_bbox(&all_points)?;
        let anchor_ring = compute_anchor_ring(bbox);

        if let Some(label) = &label {
            let verdict = state.moderation.evaluate_text(label);
            if !verdict.passed {
                return Ok(CommitAttempt::Rejected { reasons: verdict.reasons });
            }
        }

        let object = CanvasObject {
            id: Uuid::new_v4(),
            room_id,
            owner_id,
            bbox,
            anchor_ring,
            status: ObjectStatus::Committed,
            label: label.clone(),
            created_at: chrono::Utc::now(),
        };
        txn.save_object(object.clone());

        for stroke in &strokes {
            txn.update_stroke(stroke.id, object.id)?;
        }

        txn.append_audit_log(AuditLog::new(
            room_id,
            "object.committed",
            json!({
                "objectId": object.id,
                "strokeIds": stroke_ids,
                "bbox": object.bbox,
                "anchorRing": object.anchor_ring,
            }),
        ));

        let mut room = room;
        room.turn_seq += 1;
        let turn = Turn::new(room_id, room.turn_seq, object.id);
        txn.save_room(room.clone());
        txn.save_turn(turn.clone());

        txn.append_audit_log(
            AuditLog::new(
                room_id,
                "turn.created",
                json!({
                    "sequence": turn.sequence,
                    "status": turn.status,
                    "currentActor": turn.current_actor,
                    "sourceObjectId": turn.source_object_id,
                }),
            )
            .with_turn(turn.id),
        );

        Ok(CommitAttempt::Committed { object, turn, room })
    })?;

    let (object, turn, room) = match attempt {
        CommitAttempt::Rejected { reasons } => {
            // The main transaction aborted without persisting anything,
            // so the rejection is logged in its own transaction here.
            state.store.transaction(|txn| {
                txn.append_audit_log(AuditLog::new(
                    room_id,
                    "object.blocked",
                    json!({ "reasons": reasons.clone() }),
                ));
                Ok(())
            })?;
            return Err(Error::unprocessable(reasons));
        }
        CommitAttempt::Committed { object, turn, room } => (object, turn, room),
    };

    state.events.append_stream(
        "ws:object-events",
        "object",
        room_id,
        json!({
            "id": object.id,
            "roomId": room_id,
            "ownerId": object.owner_id,
            "label": object.label,
            "status": object.status,
            "bbox": object.bbox,
            "anchorRing": object.anchor_ring,
            "createdAt": object.created_at,
            "turnId": turn.id,
        }),
    );
    state.events.append_stream(
        "ws:events",
        "object",
        room_id,
        json!({
            "id": object.id,
            "roomId": room_id,
            "ownerId": object.owner_id,
            "label": object.label,
            "status": object.status,
            "bbox": object.bbox,
            "anchorRing": object.anchor_ring,
            "createdAt": object.created_at,
            "turnId": turn.id,
        }),
    );
    state.events.push_queue(
        "turn:events",
        json!({
            "event": "turn.waiting_for_ai",
            "turn_id": turn.id,
            "room_id": room_id,
            "object_id": object.id,
            "sequence": turn.sequence,
        }),
    );

    Ok(CommitOutcome { object, turn, room })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_domain::config::Config;
    use dr_domain::model::Stroke;

    fn state() -> AppState {
        AppState::new(Config::default())
    }

    async fn make_room_and_strokes(state: &AppState, points: Vec<(f64, f64)>) -> (Uuid, Vec<Uuid>) {
        let room = Room::new("garden");
        let room_id = room.id;
        let author = Uuid::new_v4();
        let strokes: Vec<Stroke> = points
            .into_iter()
            .map(|(x, y)| Stroke::new(room_id, author, vec![Point { x, y }], "red".into(), 2.0))
            .collect();
        let ids: Vec<Uuid> = strokes.iter().map(|s| s.id).collect();
        state
            .store
            .transaction(|txn| {
                txn.save_room(room.clone());
                for s in &strokes {
                    txn.save_stroke(s.clone());
                }
                Ok(())
            })
            .unwrap();
        (room_id, ids)
    }

    #[tokio::test]
    async fn bbox_matches_the_documented_worked_example() {
        let state = state();
        let (room_id, ids) = make_room_and_strokes(&state, vec![(10.0, 15.0), (30.0, 45.0)]).await;
        let owner = Uuid::new_v4();
        let outcome = commit_object(&state, room_id, owner, ids, None).await.unwrap();

        assert_eq!(outcome.object.bbox.x, 10.0);
        assert_eq!(outcome.object.bbox.y, 15.0);
        assert_eq!(outcome.object.bbox.width, 20.0);
        assert_eq!(outcome.object.bbox.height, 30.0);
        assert_eq!(outcome.object.anchor_ring.outer.width, 44.0);
    }

    #[tokio::test]
    async fn first_commit_in_a_room_creates_turn_sequence_one() {
        let state = state();
        let (room_id, ids) = make_room_and_strokes(&state, vec![(0.0, 0.0), (5.0, 5.0)]).await;
        let owner = Uuid::new_v4();
        let outcome = commit_object(&state, room_id, owner, ids, None).await.unwrap();

        assert_eq!(outcome.turn.sequence, 1);
        assert_eq!(outcome.room.turn_seq, 1);
        let queued = state.events.list_queue("turn:events");
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0]["sequence"], 1);
    }

    #[tokio::test]
    async fn rejected_label_aborts_without_creating_an_object() {
        let state = state();
        let (room_id, ids) = make_room_and_strokes(&state, vec![(0.0, 0.0), (5.0, 5.0)]).await;
        let owner = Uuid::new_v4();

        let err = commit_object(&state, room_id, owner, ids, Some("a weapon".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unprocessable_entity");

        let objects = state.store.transaction(|txn| Ok(txn.list_objects(room_id))).unwrap();
        assert!(objects.is_empty());

        let logs = state
            .store
            .transaction(|txn| Ok(txn.list_audit_logs(Some(room_id))))
            .unwrap();
        assert!(logs.iter().any(|l| l.event_type == "object.blocked"));
    }

    #[tokio::test]
    async fn already_assigned_stroke_is_a_conflict() {
        let state = state();
        let (room_id, ids) = make_room_and_strokes(&state, vec![(0.0, 0.0), (5.0, 5.0)]).await;
        let owner = Uuid::new_v4();
        commit_object(&state, room_id, owner, ids.clone(), None).await.unwrap();

        let err = commit_object(&state, room_id, owner, ids, None).await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn nonexistent_room_is_reported_before_a_banned_label_is_even_checked() {
        let state = state();
        let owner = Uuid::new_v4();
        let err = commit_object(&state, Uuid::new_v4(), owner, vec![], Some("a weapon".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn already_assigned_stroke_with_a_banned_label_is_still_a_conflict() {
        let state = state();
        let (room_id, ids) = make_room_and_strokes(&state, vec![(0.0, 0.0), (5.0, 5.0)]).await;
        let owner = Uuid::new_v4();
        commit_object(&state, room_id, owner, ids.clone(), None).await.unwrap();

        let err = commit_object(&state, room_id, owner, ids, Some("a weapon".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }
}
