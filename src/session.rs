//! Per-user assessment progress.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  /// Greeted but the assessment has not begun.
  #[default]
  AwaitingStart,
  InProgress,
  Completed,
}

/// Recorded answers for one competency.
///
/// Older snapshots may hold the competency's average instead of its answers
/// (`Aggregated`). Such a slot is discarded the next time an answer is recorded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerSlot {
  Recorded(Vec<u32>),
  Aggregated(f64),
}

impl Default for AnswerSlot {
  fn default() -> Self {
    AnswerSlot::Recorded(Vec::new())
  }
}

impl AnswerSlot {
  /// Recorded weights, or `None` for a legacy aggregated value.
  #[cfg(test)]
  pub fn recorded(&self) -> Option<&[u32]> {
    match self {
      AnswerSlot::Recorded(v) => Some(v),
      AnswerSlot::Aggregated(_) => None,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  #[serde(default)]
  pub stage: Stage,
  #[serde(default)]
  pub competency_index: usize,
  #[serde(default)]
  pub question_index: usize,
  /// Competency name -> weights, in the order competencies were first touched.
  #[serde(default)]
  pub answers: IndexMap<String, AnswerSlot>,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_completed(&self) -> bool {
    self.stage == Stage::Completed
  }
}
