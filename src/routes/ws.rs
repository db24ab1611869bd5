//! WebSocket upgrade + message loop. Each client message is parsed as a JSON
//! `ClientEvent` and forwarded to core logic. We reply with one `OutputIntent` per message.
//!
//! The connection is bound to `?userId=`; without it a random id is assigned
//! for the lifetime of the socket.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::logic::handle_event;
use crate::machine::Event;
use crate::protocol::{ClientEvent, UserQuery};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> impl IntoResponse {
  let user_id = q.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
  let session = state.sessions.get_or_create(&user_id).await;
  info!(target: "competency_bot", %user_id, stage = ?session.stage, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user_id))
}

/// Unparseable frames are treated like any other unrecognised input.
fn parse_event(txt: &str) -> Event {
  match serde_json::from_str::<ClientEvent>(txt) {
    Ok(e) => e.into(),
    Err(e) => {
      debug!(target: "competency_bot", error = %e, "WS frame is not a client event");
      Event::UnknownInput
    }
  }
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user_id: String) {
  info!(target: "competency_bot", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let event = parse_event(&txt);
        debug!(target: "competency_bot", ?event, "WS received");
        let intent = handle_event(&state, &user_id, event).await;

        let out = serde_json::to_string(&intent).unwrap_or_else(|e| {
          serde_json::json!({ "type": "show_error", "kind": "serialization", "message": e.to_string() }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "competency_bot", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "competency_bot", "WebSocket disconnected");
}
