//! Error types, one enum per concern.
//!
//! Only `BankError` and `ConfigError` are allowed to reach `main`; everything a
//! user can trigger is folded into an `OutputIntent::ShowError` by the logic layer.

use serde::Serialize;
use thiserror::Error;

/// Failure to load the question bank. Fatal at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
  #[error("failed to read question bank {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("question bank is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("malformed question bank: {0}")]
  Malformed(String),
  #[error("question bank has no competencies")]
  Empty,
}

/// Failure to load the TOML configuration file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config {path}: {source}")]
  Toml {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

/// A transition the session state machine refused. The session is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
  #[error("answer option {index} is out of range ({available} options)")]
  InvalidAnswer { index: usize, available: usize },
  #[error("assessment already completed")]
  SessionTerminal,
  #[error("assessment has not been started")]
  NotStarted,
  #[error("unrecognised input")]
  UnknownInput,
}

impl TransitionError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      TransitionError::InvalidAnswer { .. } => ErrorKind::InvalidAnswer,
      TransitionError::SessionTerminal => ErrorKind::SessionTerminal,
      TransitionError::NotStarted => ErrorKind::NotStarted,
      TransitionError::UnknownInput => ErrorKind::UnknownInput,
    }
  }
}

/// Caller-visible error tag carried by `OutputIntent::ShowError`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  InvalidAnswer,
  SessionTerminal,
  NotStarted,
  UnknownInput,
}

/// Failure to store a finished result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
  #[error("result storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to serialize result: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Failure talking to the Telegram Bot API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TelegramError {
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error("telegram API error: {0}")]
  Api(String),
}

impl TelegramError {
  /// Telegram refuses an edit whose text and buttons equal the current ones.
  pub fn is_not_modified(&self) -> bool {
    matches!(self, TelegramError::Api(msg) if msg.contains("message is not modified"))
  }
}
