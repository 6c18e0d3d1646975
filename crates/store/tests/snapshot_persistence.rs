//! End-to-end coverage of the transactional store together with its
//! snapshot persistence: commit a full spread of entities, reopen
//! the store from the snapshot file as a fresh process would, and
//! check every map rehydrates intact.

use dr_domain::model::{
    AuditLog, CanvasObject, ObjectStatus, Point, Room, RoomMember, RoomRole, Stroke, Turn,
};
use dr_store::Store;
use serde_json::json;

#[test]
fn a_full_room_round_trips_through_a_snapshot_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drawroom.json");

    let room = Room::new("attic");
    let host = uuid::Uuid::new_v4();
    let participant = uuid::Uuid::new_v4();
    let stroke = Stroke::new(room.id, host, vec![Point { x: 1.0, y: 2.0 }], "blue".into(), 3.0);

    {
        let store = Store::with_snapshot(path.clone(), true).unwrap();
        store
            .transaction(|txn| {
                txn.save_room(room.clone());
                txn.save_room_member(RoomMember::new(room.id, host, RoomRole::Host));
                txn.save_room_member(RoomMember::new(room.id, participant, RoomRole::Participant));
                txn.save_stroke(stroke.clone());
                txn.append_audit_log(AuditLog::new(room.id, "room.created", json!({})));
                Ok(())
            })
            .unwrap();

        let object = CanvasObject {
            id: uuid::Uuid::new_v4(),
            room_id: room.id,
            owner_id: host,
            bbox: dr_domain::model::BBox { x: 1.0, y: 2.0, width: 1.0, height: 1.0 },
            anchor_ring: dr_domain::model::AnchorRing {
                inner: dr_domain::model::BBox { x: 1.0, y: 2.0, width: 1.0, height: 1.0 },
                outer: dr_domain::model::BBox { x: 0.0, y: 1.0, width: 3.0, height: 3.0 },
            },
            status: ObjectStatus::Committed,
            label: Some("a tree".into()),
            created_at: chrono::Utc::now(),
        };
        let turn = Turn::new(room.id, 1, object.id);
        store
            .transaction(|txn| {
                txn.save_object(object.clone());
                txn.update_stroke(stroke.id, object.id)?;
                let mut room = txn.get_room(room.id)?;
                room.turn_seq = 1;
                txn.save_room(room);
                txn.save_turn(turn.clone());
                Ok(())
            })
            .unwrap();
    }
    // `store` is dropped here, exactly as a restarting process would
    // drop it; the next `Store::with_snapshot` call reloads from disk.

    let reopened = Store::with_snapshot(path, true).unwrap();
    reopened
        .transaction(|txn| {
            let reloaded_room = txn.get_room(room.id)?;
            assert_eq!(reloaded_room.name, "attic");
            assert_eq!(reloaded_room.turn_seq, 1);

            let members = txn.list_room_members(room.id);
            assert_eq!(members.len(), 2);

            let strokes = txn.list_strokes(room.id);
            assert_eq!(strokes.len(), 1);
            assert!(strokes[0].object_id.is_some());

            let objects = txn.list_objects(room.id);
            assert_eq!(objects.len(), 1);
            assert_eq!(objects[0].label.as_deref(), Some("a tree"));

            let turns = txn.get_turns_for_room(room.id);
            assert_eq!(turns.len(), 1);
            assert_eq!(turns[0].sequence, 1);

            let logs = txn.list_audit_logs(Some(room.id));
            assert!(logs.iter().any(|l| l.event_type == "room.created"));

            Ok(())
        })
        .unwrap();
}

#[test]
fn a_transaction_that_fails_never_reaches_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drawroom.json");
    let store = Store::with_snapshot(path.clone(), true).unwrap();

    let room = Room::new("cellar");
    let err = store.transaction(|txn| {
        txn.save_room(room.clone());
        Err::<(), dr_domain::Error>(dr_domain::Error::BadRequest("boom".into()))
    });
    assert!(err.is_err());
    drop(store);

    let reopened = Store::with_snapshot(path, true).unwrap();
    let result = reopened.transaction(|txn| txn.get_room(room.id));
    assert!(result.is_err());
}
