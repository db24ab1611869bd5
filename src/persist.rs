//! Durable storage of finished assessments. Writes are keyed upserts: saving a
//! result for a user replaces whatever was stored for that user before.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::PersistError;
use crate::score::FinalReport;
use crate::session::AnswerSlot;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
  pub user_id: String,
  pub answers: IndexMap<String, AnswerSlot>,
  pub report: FinalReport,
  pub saved_at: u64,
}

impl StoredResult {
  pub fn new(user_id: &str, answers: IndexMap<String, AnswerSlot>, report: FinalReport) -> Self {
    let saved_at = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or_default();
    Self { user_id: user_id.to_string(), answers, report, saved_at }
  }
}

#[async_trait]
pub trait ResultPersister: Send + Sync {
  async fn save(&self, result: &StoredResult) -> Result<(), PersistError>;
  async fn load(&self, user_id: &str) -> Result<Option<StoredResult>, PersistError>;
}

/// Keeps results for the lifetime of the process.
#[derive(Default)]
pub struct MemoryPersister {
  results: RwLock<HashMap<String, StoredResult>>,
}

#[async_trait]
impl ResultPersister for MemoryPersister {
  async fn save(&self, result: &StoredResult) -> Result<(), PersistError> {
    self.results.write().await.insert(result.user_id.clone(), result.clone());
    Ok(())
  }

  async fn load(&self, user_id: &str) -> Result<Option<StoredResult>, PersistError> {
    Ok(self.results.read().await.get(user_id).cloned())
  }
}

/// One pretty-printed JSON file per user under `dir`.
pub struct JsonFilePersister {
  dir: PathBuf,
}

impl JsonFilePersister {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, user_id: &str) -> PathBuf {
    self.dir.join(format!("{}.json", file_stem(user_id)))
  }
}

/// Encode a user id into a filesystem-safe stem. Distinct ids map to distinct stems.
fn file_stem(user_id: &str) -> String {
  let mut out = String::with_capacity(user_id.len());
  for b in user_id.bytes() {
    if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
      out.push(b as char);
    } else {
      out.push_str(&format!("%{b:02X}"));
    }
  }
  out
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  let tmp = path.with_extension("json.tmp");
  tokio::fs::write(&tmp, bytes).await?;
  tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl ResultPersister for JsonFilePersister {
  #[instrument(level = "debug", skip(self, result), fields(user_id = %result.user_id))]
  async fn save(&self, result: &StoredResult) -> Result<(), PersistError> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let path = self.path_for(&result.user_id);
    let bytes = serde_json::to_vec_pretty(result)?;
    write_atomic(&path, &bytes).await?;
    debug!(target: "assessment", path = %path.display(), "Result written");
    Ok(())
  }

  async fn load(&self, user_id: &str) -> Result<Option<StoredResult>, PersistError> {
    match tokio::fs::read(self.path_for(user_id)).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(user_id: &str, overall: f64) -> StoredResult {
    let report = FinalReport {
      per_competency_average: IndexMap::from([("teamwork".to_string(), overall)]),
      overall_average: overall,
      recommendations: vec!["Pair up more".into()],
    };
    let answers = IndexMap::from([("teamwork".to_string(), AnswerSlot::Recorded(vec![1, 3]))]);
    StoredResult::new(user_id, answers, report)
  }

  #[test]
  fn file_stems_are_safe_and_distinct() {
    assert_eq!(file_stem("12345"), "12345");
    assert_eq!(file_stem("a/b"), "a%2Fb");
    assert_ne!(file_stem("a/b"), file_stem("a_b"));
    assert!(!file_stem("../etc").contains('/'));
  }

  #[tokio::test]
  async fn memory_persister_upserts_by_user() {
    let p = MemoryPersister::default();
    p.save(&result("u1", 2.0)).await.expect("save");
    p.save(&result("u1", 4.0)).await.expect("save");
    let loaded = p.load("u1").await.expect("load").expect("present");
    assert_eq!(loaded.report.overall_average, 4.0);
    assert!(p.load("u2").await.expect("load").is_none());
  }

  #[tokio::test]
  async fn file_persister_round_trips_and_overwrites() {
    let dir = tempfile::tempdir().expect("tempdir");
    let p = JsonFilePersister::new(dir.path().join("results"));
    assert!(p.load("u1").await.expect("load").is_none());

    p.save(&result("u1", 2.0)).await.expect("save");
    let stored = result("u1", 3.5);
    p.save(&stored).await.expect("save");

    let loaded = p.load("u1").await.expect("load").expect("present");
    assert_eq!(loaded, stored);
    let files = std::fs::read_dir(dir.path().join("results")).expect("dir").count();
    assert_eq!(files, 1);
  }
}
