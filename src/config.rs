//! Service configuration loaded from TOML.
//!
//! The file is optional: without `BOT_CONFIG_PATH` every field takes its default.
//! A path that is set but unreadable or invalid is a startup error.
//!
//! ```toml
//! questions_path = "questions.json"
//! results_dir = "results"          # omit to keep results in memory
//! revisit_policy = "replace"       # or "append"
//! default_recommendations = ["..."]
//!
//! [recommendations]
//! teamwork = ["...", "..."]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::machine::RevisitPolicy;
use crate::score::Recommendations;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
  pub questions_path: PathBuf,
  pub results_dir: Option<PathBuf>,
  pub revisit_policy: RevisitPolicy,
  pub recommendations: HashMap<String, Vec<String>>,
  pub default_recommendations: Vec<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      questions_path: PathBuf::from("questions.json"),
      results_dir: None,
      revisit_policy: RevisitPolicy::default(),
      recommendations: HashMap::new(),
      default_recommendations: Vec::new(),
    }
  }
}

impl AppConfig {
  pub fn from_toml_str(src: &str, path: &str) -> Result<Self, ConfigError> {
    toml::from_str(src).map_err(|source| ConfigError::Toml { path: path.to_string(), source })
  }

  /// Load from `BOT_CONFIG_PATH` (if set) and apply the `QUESTIONS_PATH` override.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut cfg = match std::env::var("BOT_CONFIG_PATH") {
      Ok(path) => {
        let src = std::fs::read_to_string(&path)
          .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let cfg = Self::from_toml_str(&src, &path)?;
        info!(target: "competency_bot", %path, "Loaded config (TOML)");
        cfg
      }
      Err(_) => {
        info!(target: "competency_bot", "BOT_CONFIG_PATH not set; using defaults");
        Self::default()
      }
    };
    if let Ok(p) = std::env::var("QUESTIONS_PATH") {
      cfg.questions_path = PathBuf::from(p);
    }
    Ok(cfg)
  }

  pub fn recommendations(&self) -> Recommendations {
    Recommendations::new(self.recommendations.clone(), self.default_recommendations.clone())
  }
}
