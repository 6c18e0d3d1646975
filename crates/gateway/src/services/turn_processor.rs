//! The turn processor: a long-lived cooperative worker that drains
//! `turn:events`, calls out to the AI agent, runs the result through
//! moderation, and lands the turn in a terminal state.

use std::sync::Arc;
use std::time::Duration;

use dr_domain::config::Config;
use dr_domain::model::{AuditLog, SafetyStatus, Turn, TurnActor, TurnStatus};
use dr_moderation::ModerationPort;
use dr_store::Store;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TurnEvent {
    turn_id: Uuid,
    room_id: Uuid,
    #[allow(dead_code)]
    object_id: Uuid,
    #[allow(dead_code)]
    sequence: u64,
}

#[derive(Debug, Default, Deserialize)]
struct GeneratePatch {
    #[serde(default)]
    instructions: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(flatten)]
    rest: Value,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    patch: GeneratePatch,
    #[serde(default)]
    cache_dir: Option<String>,
}

/// Handle to the background polling task. Dropping it does not stop
/// the worker; call [`TurnProcessorHandle::stop`] explicitly.
pub struct TurnProcessorHandle {
    cancel: Arc<AsyncMutex<bool>>,
    join: JoinHandle<()>,
}

impl TurnProcessorHandle {
    pub async fn stop(self) {
        *self.cancel.lock().await = true;
        let _ = self.join.await;
    }
}

/// Start the worker loop as a detached tokio task bound to `state`.
pub fn start(state: AppState) -> TurnProcessorHandle {
    let cancel = Arc::new(AsyncMutex::new(false));
    let cancel_for_task = cancel.clone();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(state.config.turn_processor.request_timeout_secs))
        .build()
        .expect("reqwest client must build with a fixed timeout");

    let join = tokio::spawn(async move {
        loop {
            if *cancel_for_task.lock().await {
                return;
            }
            match state.events.pop_queue("turn:events") {
                Some(payload) => process_one(&state, &client, payload).await,
                None => {
                    tokio::time::sleep(Duration::from_millis(
                        state.config.turn_processor.poll_interval_ms,
                    ))
                    .await;
                }
            }
        }
    });

    TurnProcessorHandle { cancel, join }
}

async fn process_one(state: &AppState, client: &reqwest::Client, payload: Value) {
    let event: TurnEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed turn:events payload");
            return;
        }
    };

    let loaded = state.store.transaction(|txn| {
        let turn = txn.get_turn(event.turn_id)?;
        let object = txn.get_object(turn.source_object_id)?;
        Ok((turn, object))
    });
    let (turn, object) = match loaded {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(turn_id = %event.turn_id, error = %err, "turn or source object missing, skipping");
            return;
        }
    };
    if turn.status != TurnStatus::WaitingForAi {
        return;
    }

    let url = format!("{}/generate", state.config.turn_processor.agent_url);
    let body = json!({
        "roomId": event.room_id,
        "objectId": object.id,
        "anchorRegion": object.anchor_ring,
    });

    let response = match client.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            let status = resp.status();
            mark_blocked(
                state,
                &turn,
                &format!("agent returned status {status}"),
                None,
            )
            .await;
            return;
        }
        Err(err) => {
            mark_blocked(state, &turn, &err.to_string(), None).await;
            return;
        }
    };

    let generated: GenerateResponse = match response.json().await {
        Ok(g) => g,
        Err(err) => {
            mark_blocked(state, &turn, &format!("malformed agent response: {err}"), None).await;
            return;
        }
    };

    let summary = moderate_patch(
        state.moderation.as_ref(),
        generated.patch.instructions.as_deref(),
        &generated.patch.labels,
        object.label.as_deref(),
    );

    if !summary.passed() {
        mark_blocked(state, &turn, "policy_violation", Some(summary)).await;
        return;
    }

    mark_completed(state, &turn, generated).await;
}

/// Group `instructions` (free text) and `labels` + `object_label`
/// (discrete tags) into their respective moderation checks, per
/// §4.3 step 6. When there is nothing in either group, returns the
/// vacuous passing summary rather than evaluating empty input.
fn moderate_patch(
    moderation: &dyn ModerationPort,
    instructions: Option<&str>,
    patch_labels: &[String],
    object_label: Option<&str>,
) -> dr_moderation::SafetySummary {
    let mut labels: Vec<String> = patch_labels.to_vec();
    if let Some(label) = object_label {
        labels.push(label.to_string());
    }

    if instructions.is_none() && labels.is_empty() {
        return dr_moderation::SafetySummary::empty_pass();
    }

    let text_result = moderation.evaluate_text(instructions.unwrap_or(""));
    let labels_result = moderation.evaluate_labels(&labels);
    dr_moderation::SafetySummary {
        results: vec![text_result, labels_result],
    }
}

async fn mark_blocked(
    state: &AppState,
    turn: &Turn,
    reason: &str,
    summary: Option<dr_moderation::SafetySummary>,
) {
    let safety_status = if summary.is_some() {
        SafetyStatus::Blocked
    } else {
        SafetyStatus::Error
    };
    let current_actor = if summary.is_some() {
        TurnActor::Player
    } else {
        TurnActor::Ai
    };
    let reasons = summary.as_ref().map(|s| s.reasons()).unwrap_or_default();

    let _guard = state.commit_lock.lock().await;

    let updated = apply_transition(&state.store, turn.id, |t| {
        t.status = TurnStatus::Blocked;
        t.current_actor = current_actor;
        t.safety_status = Some(safety_status);
        t.updated_at = chrono::Utc::now();
    });

    let Some(updated) = updated else { return };

    let safety = json!({ "passed": false, "reasons": reasons });

    state.store.transaction(|txn| {
        txn.append_audit_log(
            AuditLog::new(
                updated.room_id,
                "turn.ai.blocked",
                json!({
                    "sequence": updated.sequence,
                    "reason": reason,
                    "safetyStatus": safety_status,
                    "safety": safety,
                }),
            )
            .with_turn(updated.id),
        );
        Ok(())
    }).ok();

    // Policy-violation blocks carry the safety verdict that caused them;
    // transport/agent errors have none to report.
    let mut payload = json!({
        "turnId": updated.id,
        "sequence": updated.sequence,
        "status": updated.status,
        "safetyStatus": safety_status,
        "reason": reason,
    });
    if summary.is_some() {
        payload["safety"] = safety;
    }
    state.events.append_stream("ws:events", "turn", updated.room_id, payload);
}

async fn mark_completed(state: &AppState, turn: &Turn, generated: GenerateResponse) {
    let _guard = state.commit_lock.lock().await;

    let updated = apply_transition(&state.store, turn.id, |t| {
        t.status = TurnStatus::AiCompleted;
        t.current_actor = TurnActor::Player;
        t.safety_status = Some(SafetyStatus::Passed);
        t.updated_at = chrono::Utc::now();
        t.ai_patch_uri = generated
            .cache_dir
            .clone()
            .filter(|s| !s.is_empty());
    });

    let Some(updated) = updated else { return };

    let patch_body = json!({
        "instructions": generated.patch.instructions,
        "labels": generated.patch.labels,
        "rest": generated.patch.rest,
    });

    state.store.transaction(|txn| {
        txn.append_audit_log(
            AuditLog::new(
                updated.room_id,
                "turn.ai.completed",
                json!({
                    "sequence": updated.sequence,
                    "patch": patch_body,
                    "cacheDir": updated.ai_patch_uri,
                    "safetyStatus": "passed",
                }),
            )
            .with_turn(updated.id),
        );
        Ok(())
    }).ok();
    state.events.append_stream(
        "ws:events",
        "turn",
        updated.room_id,
        json!({
            "turnId": updated.id,
            "sequence": updated.sequence,
            "status": updated.status,
            "safetyStatus": "passed",
            "safety": json!({ "passed": true, "reasons": [] }),
            "patch": patch_body,
        }),
    );
}

/// Apply `mutate` to the turn if it is still `waiting_for_ai`
/// (idempotency guard), persisting the change in its own
/// transaction. Returns the updated turn, or `None` if it had
/// already left `waiting_for_ai`.
fn apply_transition(store: &Store, turn_id: Uuid, mutate: impl FnOnce(&mut Turn)) -> Option<Turn> {
    store
        .transaction(|txn| {
            let mut turn = txn.get_turn(turn_id)?;
            if turn.status != TurnStatus::WaitingForAi {
                return Ok(None);
            }
            mutate(&mut turn);
            txn.update_turn(turn.clone());
            Ok(Some(turn))
        })
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_domain::model::{CanvasObject, ObjectStatus, Point, Room};
    use dr_moderation::{KeywordModerationEngine, SafetyResult};

    fn state() -> AppState {
        AppState::new(Config::default())
    }

    fn seed_waiting_turn(state: &AppState, label: Option<String>) -> Turn {
        state
            .store
            .transaction(|txn| {
                let room = Room::new("garden");
                txn.save_room(room.clone());
                let object = CanvasObject {
                    id: Uuid::new_v4(),
                    room_id: room.id,
                    owner_id: Uuid::new_v4(),
                    bbox: dr_domain::model::BBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                    anchor_ring: dr_domain::model::AnchorRing {
                        inner: dr_domain::model::BBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
                        outer: dr_domain::model::BBox { x: -1.0, y: -1.0, width: 3.0, height: 3.0 },
                    },
                    status: ObjectStatus::Committed,
                    label,
                    created_at: chrono::Utc::now(),
                };
                txn.save_object(object.clone());
                let turn = Turn::new(room.id, 1, object.id);
                txn.save_turn(turn.clone());
                Ok(turn)
            })
            .unwrap()
    }

    fn engine() -> KeywordModerationEngine {
        KeywordModerationEngine::new(
            ["violence", "blood", "weapon", "scary", "alcohol"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    #[test]
    fn moderate_patch_with_nothing_to_evaluate_is_the_vacuous_pass() {
        let summary = moderate_patch(&engine(), None, &[], None);
        assert!(summary.passed());
        assert_eq!(summary.results.len(), 1);
    }

    #[test]
    fn moderate_patch_checks_object_label_for_exact_match_not_substring() {
        // "bloodied" contains "blood" as a substring but is not an exact
        // label match, and it must go through evaluate_labels, not
        // evaluate_text, or it would be wrongly flagged.
        let summary = moderate_patch(&engine(), None, &[], Some("bloodied"));
        assert!(summary.passed());
    }

    #[test]
    fn moderate_patch_flags_an_object_label_that_exactly_matches() {
        let summary = moderate_patch(&engine(), None, &[], Some("weapon"));
        assert!(!summary.passed());
        assert_eq!(summary.reasons(), vec!["weapon".to_string()]);
    }

    #[test]
    fn moderate_patch_flags_instructions_by_substring() {
        let summary = moderate_patch(&engine(), Some("a scary dragon"), &[], None);
        assert!(!summary.passed());
    }

    #[tokio::test]
    async fn mark_completed_transitions_and_is_idempotent() {
        let state = state();
        let turn = seed_waiting_turn(&state, None);
        let generated = GenerateResponse {
            patch: GeneratePatch { instructions: None, labels: vec![], rest: Value::Null },
            cache_dir: Some("/tmp/ai".into()),
        };
        mark_completed(&state, &turn, generated).await;

        let after = state.store.transaction(|txn| txn.get_turn(turn.id)).unwrap();
        assert_eq!(after.status, TurnStatus::AiCompleted);
        assert_eq!(after.current_actor, TurnActor::Player);
        assert_eq!(after.ai_patch_uri.as_deref(), Some("/tmp/ai"));

        // A second call finds the turn no longer waiting and is a no-op.
        let generated_again = GenerateResponse {
            patch: GeneratePatch { instructions: None, labels: vec![], rest: Value::Null },
            cache_dir: Some("/tmp/other".into()),
        };
        mark_completed(&state, &turn, generated_again).await;
        let still = state.store.transaction(|txn| txn.get_turn(turn.id)).unwrap();
        assert_eq!(still.ai_patch_uri.as_deref(), Some("/tmp/ai"));
    }

    #[tokio::test]
    async fn mark_blocked_on_transport_error_keeps_ai_as_current_actor() {
        let state = state();
        let turn = seed_waiting_turn(&state, None);
        mark_blocked(&state, &turn, "connection refused", None).await;

        let after = state.store.transaction(|txn| txn.get_turn(turn.id)).unwrap();
        assert_eq!(after.status, TurnStatus::Blocked);
        assert_eq!(after.current_actor, TurnActor::Ai);
        assert_eq!(after.safety_status, Some(SafetyStatus::Error));

        let stream = state.events.list_stream("ws:events");
        let event = stream.iter().find(|e| e.payload["turnId"] == turn.id.to_string()).unwrap();
        assert_eq!(event.payload["safetyStatus"], "error");
        assert!(event.payload.get("safety").is_none());
    }

    #[tokio::test]
    async fn mark_blocked_on_policy_violation_hands_control_to_player() {
        let state = state();
        let turn = seed_waiting_turn(&state, None);
        let summary = dr_moderation::SafetySummary {
            results: vec![SafetyResult {
                category: dr_moderation::SafetyCategory::Text,
                passed: false,
                reasons: vec!["blood".into()],
            }],
        };
        mark_blocked(&state, &turn, "policy_violation", Some(summary)).await;

        let after = state.store.transaction(|txn| txn.get_turn(turn.id)).unwrap();
        assert_eq!(after.status, TurnStatus::Blocked);
        assert_eq!(after.current_actor, TurnActor::Player);
        assert_eq!(after.safety_status, Some(SafetyStatus::Blocked));
    }

    #[tokio::test]
    async fn mark_completed_emits_turn_event_with_patch_and_passed_safety() {
        let state = state();
        let turn = seed_waiting_turn(&state, None);
        let generated = GenerateResponse {
            patch: GeneratePatch {
                instructions: Some("add a hat".into()),
                labels: vec!["hat".into()],
                rest: Value::Null,
            },
            cache_dir: Some("/tmp/ai".into()),
        };
        mark_completed(&state, &turn, generated).await;

        let stream = state.events.list_stream("ws:events");
        let event = stream.iter().find(|e| e.payload["turnId"] == turn.id.to_string()).unwrap();
        assert_eq!(event.payload["status"], "ai_completed");
        assert_eq!(event.payload["safetyStatus"], "passed");
        assert_eq!(event.payload["safety"]["passed"], true);
        assert_eq!(event.payload["patch"]["instructions"], "add a hat");
    }

    #[tokio::test]
    async fn mark_blocked_emits_turn_event_with_reason_and_safety() {
        let state = state();
        let turn = seed_waiting_turn(&state, None);
        let summary = dr_moderation::SafetySummary {
            results: vec![SafetyResult {
                category: dr_moderation::SafetyCategory::Text,
                passed: false,
                reasons: vec!["blood".into()],
            }],
        };
        mark_blocked(&state, &turn, "policy_violation", Some(summary)).await;

        let stream = state.events.list_stream("ws:events");
        let event = stream.iter().find(|e| e.payload["turnId"] == turn.id.to_string()).unwrap();
        assert_eq!(event.payload["status"], "blocked");
        assert_eq!(event.payload["reason"], "policy_violation");
        assert_eq!(event.payload["safety"]["passed"], false);
        assert_eq!(event.payload["safety"]["reasons"][0], "blood");
    }
}
