//! Question bank: competencies, their questions and weighted answer options.
//!
//! The bank is loaded once at startup from a JSON document of the form
//! `{"competencies": [{"name", "questions": [{"question", "options": [{"text"}]}]}]}`
//! and is read-only afterwards (shared behind an `Arc`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::BankError;

/// One selectable answer. `weight` is the 1-based position of the option.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AnswerOption {
  pub label: String,
  pub weight: u32,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Question {
  pub prompt: String,
  pub options: Vec<AnswerOption>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Competency {
  pub name: String,
  pub questions: Vec<Question>,
}

/// Immutable set of competencies. Never empty.
#[derive(Clone, Debug)]
pub struct QuestionBank {
  competencies: Vec<Competency>,
}

// Source document shape.
#[derive(Deserialize)]
struct BankDoc {
  competencies: Vec<CompetencyDoc>,
}

#[derive(Deserialize)]
struct CompetencyDoc {
  name: String,
  questions: Vec<QuestionDoc>,
}

#[derive(Deserialize)]
struct QuestionDoc {
  question: String,
  options: Vec<OptionDoc>,
}

#[derive(Deserialize)]
struct OptionDoc {
  text: String,
}

impl QuestionBank {
  /// Build a bank, enforcing its structural invariants.
  pub fn new(competencies: Vec<Competency>) -> Result<Self, BankError> {
    if competencies.is_empty() {
      return Err(BankError::Empty);
    }
    for (ci, c) in competencies.iter().enumerate() {
      if c.name.trim().is_empty() {
        return Err(BankError::Malformed(format!("competency #{ci} has an empty name")));
      }
      if competencies[..ci].iter().any(|other| other.name == c.name) {
        return Err(BankError::Malformed(format!("duplicate competency name '{}'", c.name)));
      }
      for (qi, q) in c.questions.iter().enumerate() {
        if q.options.is_empty() {
          return Err(BankError::Malformed(format!(
            "question #{qi} of competency '{}' has no options",
            c.name
          )));
        }
      }
    }
    Ok(Self { competencies })
  }

  /// Parse a bank from its JSON source. Option weights are assigned by position.
  pub fn from_json_str(src: &str) -> Result<Self, BankError> {
    let doc: BankDoc = serde_json::from_str(src)?;
    let competencies = doc
      .competencies
      .into_iter()
      .map(|c| Competency {
        name: c.name,
        questions: c
          .questions
          .into_iter()
          .map(|q| Question {
            prompt: q.question,
            options: q
              .options
              .into_iter()
              .zip(1u32..)
              .map(|(o, weight)| AnswerOption { label: o.text, weight })
              .collect(),
          })
          .collect(),
      })
      .collect();
    Self::new(competencies)
  }

  /// Read and parse the bank file. Callers treat any error as fatal.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|source| BankError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let bank = Self::from_json_str(&src)?;
    info!(
      target: "assessment",
      competencies = bank.len(),
      questions = bank.total_questions(),
      "Loaded question bank"
    );
    Ok(bank)
  }

  pub fn competencies(&self) -> &[Competency] {
    &self.competencies
  }

  pub fn competency(&self, index: usize) -> Option<&Competency> {
    self.competencies.get(index)
  }

  pub fn question(&self, competency: usize, question: usize) -> Option<&Question> {
    self.competency(competency)?.questions.get(question)
  }

  pub fn len(&self) -> usize {
    self.competencies.len()
  }

  pub fn total_questions(&self) -> usize {
    self.competencies.iter().map(|c| c.questions.len()).sum()
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  /// Build a bank of `(name, question_count, option_count)` entries.
  pub(crate) fn bank_of(layout: &[(&str, usize, usize)]) -> QuestionBank {
    let competencies = layout
      .iter()
      .map(|(name, questions, options)| Competency {
        name: name.to_string(),
        questions: (0..*questions)
          .map(|qi| Question {
            prompt: format!("{name} question {}", qi + 1),
            options: (1..=*options as u32)
              .map(|w| AnswerOption { label: format!("option {w}"), weight: w })
              .collect(),
          })
          .collect(),
      })
      .collect();
    QuestionBank::new(competencies).expect("valid bank")
  }

  #[test]
  fn parses_weights_from_option_position() {
    let bank = QuestionBank::from_json_str(
      r#"{"competencies":[{"name":"teamwork","questions":[
        {"question":"q1","options":[{"text":"a"},{"text":"b"},{"text":"c"}]}
      ]}]}"#,
    )
    .expect("bank");
    let q = bank.question(0, 0).expect("question");
    assert_eq!(q.prompt, "q1");
    let weights: Vec<u32> = q.options.iter().map(|o| o.weight).collect();
    assert_eq!(weights, vec![1, 2, 3]);
    assert_eq!(q.options[2].label, "c");
  }

  #[test]
  fn loads_the_shipped_bank() {
    let bank = QuestionBank::load("questions.json").expect("shipped bank loads");
    assert!(bank.len() >= 1);
    assert!(bank.total_questions() >= bank.len());
  }

  #[test]
  fn rejects_missing_fields_and_wrong_shapes() {
    for src in [
      r#"{}"#,
      r#"[]"#,
      r#"{"competencies":[{"questions":[]}]}"#,
      r#"{"competencies":[{"name":"x","questions":[{"options":[{"text":"a"}]}]}]}"#,
      r#"{"competencies":[{"name":"x","questions":[{"question":"q","options":[{}]}]}]}"#,
      r#"{"competencies":"nope"}"#,
    ] {
      assert!(
        matches!(QuestionBank::from_json_str(src), Err(BankError::Json(_))),
        "should reject {src}"
      );
    }
  }

  #[test]
  fn rejects_empty_banks_and_empty_option_lists() {
    assert!(matches!(
      QuestionBank::from_json_str(r#"{"competencies":[]}"#),
      Err(BankError::Empty)
    ));
    assert!(matches!(
      QuestionBank::from_json_str(
        r#"{"competencies":[{"name":"x","questions":[{"question":"q","options":[]}]}]}"#
      ),
      Err(BankError::Malformed(_))
    ));
    assert!(matches!(
      QuestionBank::from_json_str(
        r#"{"competencies":[{"name":"x","questions":[]},{"name":"x","questions":[]}]}"#
      ),
      Err(BankError::Malformed(_))
    ));
  }

  #[test]
  fn missing_file_is_an_io_error() {
    assert!(matches!(
      QuestionBank::load("definitely/not/here.json"),
      Err(BankError::Io { .. })
    ));
  }
}
