//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).

use serde::{Deserialize, Serialize};

use crate::domain::QuestionBank;
use crate::error::ErrorKind;
use crate::machine::{Event, QuestionView};
use crate::score::FinalReport;
use crate::session::Session;

/// What the transport should show the user after an event.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputIntent {
  ShowWelcome,
  ShowQuestion(QuestionView),
  ShowReport(FinalReport),
  ShowError { kind: ErrorKind },
}

/// Events a client can send, over WebSocket or inside `EventIn`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
  Start,
  StartAssessment,
  SubmitAnswer {
    #[serde(rename = "optionIndex")]
    option_index: usize,
  },
  GoBack,
  Finish,
  Restart,
  #[serde(other)]
  Unknown,
}

impl From<ClientEvent> for Event {
  fn from(e: ClientEvent) -> Self {
    match e {
      ClientEvent::Start => Event::Start,
      ClientEvent::StartAssessment => Event::StartAssessment,
      ClientEvent::SubmitAnswer { option_index } => Event::SubmitAnswer(option_index),
      ClientEvent::GoBack => Event::GoBack,
      ClientEvent::Finish => Event::Finish,
      ClientEvent::Restart => Event::Restart,
      ClientEvent::Unknown => Event::UnknownInput,
    }
  }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct EventIn {
  #[serde(rename = "userId")]
  pub user_id: String,
  pub event: ClientEvent,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
  #[serde(rename = "userId")]
  pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionIn {
  #[serde(rename = "userId")]
  pub user_id: String,
  pub session: Session,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub sessions: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyOut {
  pub name: String,
  pub question_count: usize,
}

#[derive(Serialize)]
pub struct BankOut {
  pub competencies: Vec<CompetencyOut>,
}

pub fn bank_out(bank: &QuestionBank) -> BankOut {
  BankOut {
    competencies: bank
      .competencies()
      .iter()
      .map(|c| CompetencyOut { name: c.name.clone(), question_count: c.questions.len() })
      .collect(),
  }
}
