//! WebSocket fan-out: one connection per room, replaying the
//! timeline from a client-supplied cursor and then tailing new
//! entries.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use dr_domain::model::UserRole;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{decode_ws_token, WS_POLICY_VIOLATION};
use crate::state::AppState;

const REPLAY_PAGE_SIZE: usize = 50;
const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
    #[serde(default)]
    pub cursor: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let subject = match decode_ws_token(&query.token, &state) {
        Ok(subject) => subject,
        Err(err) => {
            tracing::warn!(room_id = %room_id, error = %err, "ws auth rejected");
            return ws.on_upgrade(move |socket| reject(socket));
        }
    };

    let membership_ok = state.store.transaction(|txn| {
        txn.get_room(room_id)?;
        if subject.role != UserRole::Player {
            return Ok(true);
        }
        let members = txn.list_room_members(room_id);
        Ok(members.iter().any(|m| m.user_id == subject.user_id))
    });

    match membership_ok {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(room_id = %room_id, user_id = %subject.user_id, "ws rejected: not a room member");
            return ws.on_upgrade(move |socket| reject(socket));
        }
        Err(err) => {
            tracing::warn!(room_id = %room_id, error = %err, "ws rejected: room lookup failed");
            return ws.on_upgrade(move |socket| reject(socket));
        }
    }

    ws.on_upgrade(move |socket| serve(socket, state, room_id, query.cursor))
}

async fn reject(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: WS_POLICY_VIOLATION,
            reason: "authentication failed".into(),
        })))
        .await;
}

async fn serve(mut socket: WebSocket, state: AppState, room_id: Uuid, cursor: Option<String>) {
    let mut cursor = cursor;

    loop {
        let page = state.events.list_timeline(cursor.as_deref(), REPLAY_PAGE_SIZE);
        if page.is_empty() {
            break;
        }
        for event in &page {
            if event.room_id == room_id {
                if send_event(&mut socket, event).await.is_err() {
                    return;
                }
            }
        }
        // Advance past the whole page, even filtered-out entries, so
        // the tail loop below resumes exactly where replay left off.
        cursor = page.last().map(|e| e.cursor.clone());
        if page.len() < REPLAY_PAGE_SIZE {
            break;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => continue,
                }
            }
            _ = tokio::time::sleep(TAIL_POLL_INTERVAL) => {
                match state.events.next_timeline_event(cursor.as_deref()) {
                    None => continue,
                    Some(event) => {
                        cursor = Some(event.cursor.clone());
                        if event.room_id == room_id && send_event(&mut socket, &event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn send_event(
    socket: &mut WebSocket,
    event: &dr_eventstore::TopicEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).expect("TopicEvent always serializes");
    socket.send(Message::Text(text)).await
}
