//! Reduction of recorded answers into the final report.
//!
//! Per competency the average is the arithmetic mean of its recorded weights
//! (0 when nothing was recorded). The overall average is the mean of those
//! per-competency averages, not of all individual answers.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Competency;
use crate::session::AnswerSlot;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
  pub per_competency_average: IndexMap<String, f64>,
  pub overall_average: f64,
  pub recommendations: Vec<String>,
}

/// Static recommendation texts keyed by competency name.
#[derive(Clone, Debug, Default)]
pub struct Recommendations {
  by_competency: HashMap<String, Vec<String>>,
  fallback: Vec<String>,
}

impl Recommendations {
  pub fn new(by_competency: HashMap<String, Vec<String>>, fallback: Vec<String>) -> Self {
    Self { by_competency, fallback }
  }

  /// Texts for `name`, or the fallback list when the table has no entry.
  pub fn for_competency(&self, name: &str) -> &[String] {
    self
      .by_competency
      .get(name)
      .map(Vec::as_slice)
      .unwrap_or(self.fallback.as_slice())
  }
}

pub fn mean(values: &[u32]) -> f64 {
  if values.is_empty() {
    0.0
  } else {
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
  }
}

/// Build the report for every bank competency that has an entry in `answers`.
pub fn aggregate(
  answers: &IndexMap<String, AnswerSlot>,
  competencies: &[Competency],
  recommendations: &Recommendations,
) -> FinalReport {
  let mut per_competency_average = IndexMap::new();
  let mut texts: Vec<String> = Vec::new();

  for c in competencies {
    let Some(slot) = answers.get(&c.name) else { continue };
    let average = match slot {
      AnswerSlot::Recorded(weights) => mean(weights),
      AnswerSlot::Aggregated(avg) => {
        debug!(target: "assessment", competency = %c.name, avg, "Using legacy aggregated value");
        *avg
      }
    };
    per_competency_average.insert(c.name.clone(), average);
    for text in recommendations.for_competency(&c.name) {
      if !texts.contains(text) {
        texts.push(text.clone());
      }
    }
  }

  for name in answers.keys() {
    if !competencies.iter().any(|c| &c.name == name) {
      debug!(target: "assessment", competency = %name, "Ignoring answers for unknown competency");
    }
  }

  let overall_average = if per_competency_average.is_empty() {
    0.0
  } else {
    per_competency_average.values().sum::<f64>() / per_competency_average.len() as f64
  };

  FinalReport { per_competency_average, overall_average, recommendations: texts }
}
