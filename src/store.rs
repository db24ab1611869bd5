//! In-memory session store: one entry per user, never evicted.
//!
//! Each user's session sits behind its own mutex so at most one transition per
//! user is in flight; different users never block each other beyond the brief
//! map lookup.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, instrument};

use crate::session::Session;

#[derive(Clone, Default)]
pub struct SessionStore {
  sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  async fn entry(&self, user_id: &str) -> Arc<Mutex<Session>> {
    if let Some(slot) = self.sessions.read().await.get(user_id) {
      return slot.clone();
    }
    let mut sessions = self.sessions.write().await;
    sessions
      .entry(user_id.to_string())
      .or_insert_with(|| {
        debug!(target: "assessment", %user_id, "Created session");
        Arc::new(Mutex::new(Session::new()))
      })
      .clone()
  }

  /// Exclusive access to the user's session, creating it if needed.
  /// Hold the guard for the whole read-transition-write cycle.
  pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<Session> {
    self.entry(user_id).await.lock_owned().await
  }

  pub async fn get_or_create(&self, user_id: &str) -> Session {
    self.lock(user_id).await.clone()
  }

  /// Replace the user's session with a fresh one and keep it locked.
  #[instrument(level = "debug", skip(self))]
  pub async fn reset(&self, user_id: &str) -> OwnedMutexGuard<Session> {
    let mut guard = self.lock(user_id).await;
    *guard = Session::new();
    guard
  }

  /// Snapshot without creating an entry.
  pub async fn get(&self, user_id: &str) -> Option<Session> {
    let slot = self.sessions.read().await.get(user_id).cloned()?;
    let session = slot.lock().await.clone();
    Some(session)
  }

  /// Overwrite the user's session with an imported snapshot.
  #[instrument(level = "debug", skip(self, session))]
  pub async fn replace(&self, user_id: &str, session: Session) {
    *self.lock(user_id).await = session;
  }

  pub async fn len(&self) -> usize {
    self.sessions.read().await.len()
  }
}
