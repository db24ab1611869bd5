//! Application state shared by all transports.
//!
//! This module owns:
//!   - the state machine (with the read-only question bank and recommendation table)
//!   - the per-user session store
//!   - the result persister (JSON files when `results_dir` is configured, memory otherwise)

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::domain::QuestionBank;
use crate::machine::SessionStateMachine;
use crate::persist::{JsonFilePersister, MemoryPersister, ResultPersister};
use crate::store::SessionStore;

pub struct AppState {
  pub machine: SessionStateMachine,
  pub sessions: SessionStore,
  pub persister: Arc<dyn ResultPersister>,
}

impl AppState {
  /// Build state from a loaded bank and the service configuration.
  #[instrument(level = "info", skip_all)]
  pub fn new(cfg: &AppConfig, bank: QuestionBank) -> Self {
    let persister: Arc<dyn ResultPersister> = match &cfg.results_dir {
      Some(dir) => {
        info!(target: "competency_bot", dir = %dir.display(), "Persisting results as JSON files");
        Arc::new(JsonFilePersister::new(dir.clone()))
      }
      None => {
        info!(target: "competency_bot", "No results_dir configured; keeping results in memory");
        Arc::new(MemoryPersister::default())
      }
    };
    info!(target: "competency_bot", policy = ?cfg.revisit_policy, "Revisit policy");
    let machine = SessionStateMachine::new(Arc::new(bank), cfg.recommendations(), cfg.revisit_policy);
    Self::with_parts(machine, persister)
  }

  pub fn with_parts(machine: SessionStateMachine, persister: Arc<dyn ResultPersister>) -> Self {
    Self { machine, sessions: SessionStore::new(), persister }
  }
}
