//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::logic::*;
use crate::machine::Event;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, sessions: state.sessions.len().await })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_bank(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(bank_out(state.machine.bank()))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, event = ?body.event))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EventIn>,
) -> impl IntoResponse {
  let intent = handle_event(&state, &body.user_id, Event::from(body.event)).await;
  Json(intent)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UserQuery>,
) -> Response {
  let Some(user_id) = q.user_id else {
    return (StatusCode::BAD_REQUEST, "missing userId").into_response();
  };
  match session_snapshot(&state, &user_id).await {
    Some(session) => Json(session).into_response(),
    None => StatusCode::NOT_FOUND.into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id))]
pub async fn http_put_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> StatusCode {
  import_session(&state, &body.user_id, body.session).await;
  info!(target: "assessment", user_id = %body.user_id, "Session snapshot imported");
  StatusCode::NO_CONTENT
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_result(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> Response {
  match stored_result(&state, &user_id).await {
    Ok(Some(result)) => Json(result).into_response(),
    Ok(None) => StatusCode::NOT_FOUND.into_response(),
    Err(e) => {
      error!(target: "assessment", %user_id, error = %e, "Failed to load result");
      StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
  }
}
