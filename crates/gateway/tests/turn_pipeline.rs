//! End-to-end coverage of the object-commit -> turn:events -> turn
//! processor -> timeline pipeline, with the AI agent replaced by a
//! wiremock double.

use std::time::Duration;

use dr_domain::config::Config;
use dr_domain::model::{Point, Stroke, TurnStatus};
use dr_gateway::services::{object_commit, turn_processor};
use dr_gateway::state::AppState;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_state(agent_url: String) -> AppState {
    let mut config = Config::default();
    config.turn_processor.agent_url = agent_url;
    config.turn_processor.poll_interval_ms = 10;
    AppState::new(config)
}

async fn make_room_and_strokes(state: &AppState) -> (Uuid, Vec<Uuid>) {
    let room = dr_domain::model::Room::new("garden");
    let room_id = room.id;
    let author = Uuid::new_v4();
    let strokes = vec![
        Stroke::new(room_id, author, vec![Point { x: 0.0, y: 0.0 }], "red".into(), 2.0),
        Stroke::new(room_id, author, vec![Point { x: 10.0, y: 10.0 }], "red".into(), 2.0),
    ];
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

async fn wait_for_turn_status(state: &AppState, turn_id: Uuid, status: TurnStatus) {
    for _ in 0..200 {
        let turn = state.store.transaction(|txn| txn.get_turn(turn_id)).unwrap();
        if turn.status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("turn {turn_id} never reached {status:?}");
}

#[tokio::test]
async fn a_committed_object_is_generated_moderated_and_completed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "patch": { "instructions": "a friendly cat", "labels": ["cat"] },
            "cacheDir": "/tmp/cache/1",
        })))
        .mount(&mock_server)
        .await;

    let state = make_state(mock_server.uri());
    let (room_id, stroke_ids) = make_room_and_strokes(&state).await;
    let owner = Uuid::new_v4();

    let outcome = object_commit::commit_object(&state, room_id, owner, stroke_ids, None)
        .await
        .unwrap();

    let handle = turn_processor::start(state.clone());
    wait_for_turn_status(&state, outcome.turn.id, TurnStatus::AiCompleted).await;
    handle.stop().await;

    let stream = state.events.list_stream("ws:events");
    let completed = stream
        .iter()
        .find(|e| e.payload["turnId"] == outcome.turn.id.to_string())
        .expect("a turn event was emitted");
    assert_eq!(completed.payload["status"], "ai_completed");
    assert_eq!(completed.payload["patch"]["instructions"], "a friendly cat");
}

#[tokio::test]
async fn a_banned_generated_label_blocks_the_turn_and_hands_control_to_the_player() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "patch": { "instructions": null, "labels": ["weapon"] },
        })))
        .mount(&mock_server)
        .await;

    let state = make_state(mock_server.uri());
    let (room_id, stroke_ids) = make_room_and_strokes(&state).await;
    let owner = Uuid::new_v4();

    let outcome = object_commit::commit_object(&state, room_id, owner, stroke_ids, None)
        .await
        .unwrap();

    let handle = turn_processor::start(state.clone());
    wait_for_turn_status(&state, outcome.turn.id, TurnStatus::Blocked).await;
    handle.stop().await;

    let turn = state.store.transaction(|txn| txn.get_turn(outcome.turn.id)).unwrap();
    assert_eq!(turn.current_actor, dr_domain::model::TurnActor::Player);

    let stream = state.events.list_stream("ws:events");
    let blocked = stream
        .iter()
        .find(|e| e.payload["turnId"] == outcome.turn.id.to_string() && e.payload["status"] == "blocked")
        .expect("a blocked turn event was emitted");
    assert_eq!(blocked.payload["reason"], "policy_violation");
}

#[tokio::test]
async fn an_unreachable_agent_blocks_the_turn_with_ai_still_current_actor() {
    // No mock mounted: the agent URL points at a server with nothing
    // listening, so the request itself fails at the transport layer.
    let state = make_state("http://127.0.0.1:1".to_string());
    let (room_id, stroke_ids) = make_room_and_strokes(&state).await;
    let owner = Uuid::new_v4();

    let outcome = object_commit::commit_object(&state, room_id, owner, stroke_ids, None)
        .await
        .unwrap();

    let handle = turn_processor::start(state.clone());
    wait_for_turn_status(&state, outcome.turn.id, TurnStatus::Blocked).await;
    handle.stop().await;

    let turn = state.store.transaction(|txn| txn.get_turn(outcome.turn.id)).unwrap();
    assert_eq!(turn.current_actor, dr_domain::model::TurnActor::Ai);
}
