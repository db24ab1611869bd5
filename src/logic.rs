//! Core behavior shared by every transport (HTTP, WebSocket, Telegram).
//!
//! `handle_event` is the single entry point: it never fails. Refused transitions
//! come back as `OutputIntent::ShowError`, and a failed result write is logged
//! while the user still gets their report.

use tracing::{error, info, instrument};

use crate::error::{PersistError, TransitionError};
use crate::machine::{Event, Outcome};
use crate::persist::StoredResult;
use crate::protocol::OutputIntent;
use crate::session::Session;
use crate::state::AppState;

#[instrument(level = "info", skip(state), fields(%user_id))]
pub async fn handle_event(state: &AppState, user_id: &str, event: Event) -> OutputIntent {
  // Held until the transition (and any result write) is done.
  let mut session = if event == Event::Restart {
    state.sessions.reset(user_id).await
  } else {
    state.sessions.lock(user_id).await
  };
  let transition = match state.machine.apply(&session, &event) {
    Ok(t) => t,
    Err(e) => {
      if !matches!(e, TransitionError::InvalidAnswer { .. }) {
        info!(target: "assessment", %user_id, error = %e, "Event refused");
      }
      return OutputIntent::ShowError { kind: e.kind() };
    }
  };
  *session = transition.session;

  match transition.outcome {
    Outcome::Welcome => OutputIntent::ShowWelcome,
    Outcome::Question(view) => OutputIntent::ShowQuestion(view),
    Outcome::Completed { report, newly_completed } => {
      if newly_completed {
        let record = StoredResult::new(user_id, session.answers.clone(), report.clone());
        match state.persister.save(&record).await {
          Ok(()) => info!(target: "assessment", %user_id, overall = report.overall_average, "Result saved"),
          Err(e) => error!(target: "assessment", %user_id, error = %e, "Failed to save result"),
        }
      }
      OutputIntent::ShowReport(report)
    }
  }
}

pub async fn session_snapshot(state: &AppState, user_id: &str) -> Option<Session> {
  state.sessions.get(user_id).await
}

#[instrument(level = "info", skip(state, session), fields(%user_id, stage = ?session.stage))]
pub async fn import_session(state: &AppState, user_id: &str, session: Session) {
  state.sessions.replace(user_id, session).await;
}

pub async fn stored_result(state: &AppState, user_id: &str) -> Result<Option<StoredResult>, PersistError> {
  state.persister.load(user_id).await
}
