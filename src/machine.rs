//! Session state machine.
//!
//! Every transition is a pure function `(&Session, &Event) -> (Session', Outcome)`.
//! A refused transition returns a `TransitionError` and produces no new session,
//! so the stored one stays exactly as it was.
//!
//! Position rules:
//!   - `question_index` reaching the competency's question count rolls over to
//!     the next competency (`competency_index += 1`, `question_index = 0`);
//!   - `competency_index` reaching the competency count completes the session;
//!   - `GoBack` never crosses a competency boundary and never removes an answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::QuestionBank;
use crate::error::TransitionError;
use crate::score::{aggregate, FinalReport, Recommendations};
use crate::session::{AnswerSlot, Session, Stage};

/// What happens when a question that already holds an answer is answered again
/// (after `GoBack`).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevisitPolicy {
  /// Overwrite the earlier answer for that question.
  #[default]
  Replace,
  /// Record the new answer next to the old one (duplicates are averaged in).
  Append,
}

/// Transport-independent user action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
  Start,
  StartAssessment,
  SubmitAnswer(usize),
  GoBack,
  Finish,
  Restart,
  UnknownInput,
}

/// Everything a renderer needs to present one question.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
  pub competency_name: String,
  pub question_text: String,
  pub options: Vec<String>,
  pub progress_fraction: f64,
  pub question_number: usize,
  pub question_count: usize,
  pub competency_number: usize,
  pub competency_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
  Welcome,
  Question(QuestionView),
  /// `newly_completed` is false when an already completed session re-emits its report.
  Completed { report: FinalReport, newly_completed: bool },
}

#[derive(Clone, Debug)]
pub struct Transition {
  pub session: Session,
  pub outcome: Outcome,
}

pub struct SessionStateMachine {
  bank: Arc<QuestionBank>,
  recommendations: Recommendations,
  policy: RevisitPolicy,
}

impl SessionStateMachine {
  pub fn new(bank: Arc<QuestionBank>, recommendations: Recommendations, policy: RevisitPolicy) -> Self {
    Self { bank, recommendations, policy }
  }

  pub fn bank(&self) -> &QuestionBank {
    &self.bank
  }

  pub fn apply(&self, session: &Session, event: &Event) -> Result<Transition, TransitionError> {
    match event {
      Event::Start => Ok(Transition { session: session.clone(), outcome: Outcome::Welcome }),
      Event::StartAssessment => Ok(self.begin(session.clone())),
      Event::Restart => Ok(self.begin(Session::new())),
      Event::SubmitAnswer(index) => self.submit(session, *index),
      Event::GoBack => {
        require_in_progress(session)?;
        let mut next = session.clone();
        next.question_index = next.question_index.saturating_sub(1);
        Ok(self.settle(next))
      }
      Event::Finish => match session.stage {
        Stage::AwaitingStart => Err(TransitionError::NotStarted),
        Stage::Completed => Ok(Transition {
          outcome: Outcome::Completed { report: self.report(session), newly_completed: false },
          session: session.clone(),
        }),
        Stage::InProgress => {
          info!(
            target: "assessment",
            competency_index = session.competency_index,
            question_index = session.question_index,
            "Assessment finished early"
          );
          Ok(self.complete(session.clone()))
        }
      },
      Event::UnknownInput if session.is_completed() => Err(TransitionError::SessionTerminal),
      Event::UnknownInput => Err(TransitionError::UnknownInput),
    }
  }

  /// Aggregate the answers recorded so far.
  pub fn report(&self, session: &Session) -> FinalReport {
    aggregate(&session.answers, self.bank.competencies(), &self.recommendations)
  }

  fn begin(&self, mut next: Session) -> Transition {
    if next.is_completed() {
      next.answers.clear();
    }
    next.stage = Stage::InProgress;
    next.competency_index = 0;
    next.question_index = 0;
    self.settle(next)
  }

  fn submit(&self, session: &Session, index: usize) -> Result<Transition, TransitionError> {
    require_in_progress(session)?;
    let (ci, qi) = (session.competency_index, session.question_index);
    let Some(question) = self.bank.question(ci, qi) else {
      // Position is past the end of a competency; re-present the real current question.
      warn!(target: "assessment", ci, qi, "Answer received at an unsettled position");
      return Ok(self.settle(session.clone()));
    };
    let Some(option) = question.options.get(index) else {
      warn!(target: "assessment", ci, qi, index, available = question.options.len(), "Answer option out of range");
      return Err(TransitionError::InvalidAnswer { index, available: question.options.len() });
    };
    let name = &self.bank.competencies()[ci].name;

    let mut next = session.clone();
    let slot = next.answers.entry(name.clone()).or_default();
    let mut weights = match std::mem::take(slot) {
      AnswerSlot::Recorded(weights) => weights,
      AnswerSlot::Aggregated(value) => {
        warn!(target: "assessment", competency = %name, value, "Answer slot held an aggregated value; resetting it");
        Vec::new()
      }
    };
    match self.policy {
      RevisitPolicy::Replace if qi < weights.len() => weights[qi] = option.weight,
      _ => weights.push(option.weight),
    }
    *slot = AnswerSlot::Recorded(weights);

    debug!(target: "assessment", competency = %name, qi, weight = option.weight, "Answer recorded");
    next.question_index += 1;
    Ok(self.settle(next))
  }

  /// Apply rollover rules until the session points at an existing question or is complete.
  fn settle(&self, mut next: Session) -> Transition {
    loop {
      let Some(competency) = self.bank.competency(next.competency_index) else {
        if next.competency_index > self.bank.len() {
          warn!(target: "assessment", competency_index = next.competency_index, "Competency index out of range; completing");
        }
        next.competency_index = self.bank.len();
        next.question_index = 0;
        return self.complete(next);
      };
      let count = competency.questions.len();
      if next.question_index < count {
        let question = &competency.questions[next.question_index];
        let view = QuestionView {
          competency_name: competency.name.clone(),
          question_text: question.prompt.clone(),
          options: question.options.iter().map(|o| o.label.clone()).collect(),
          progress_fraction: (next.question_index + 1) as f64 / count as f64,
          question_number: next.question_index + 1,
          question_count: count,
          competency_number: next.competency_index + 1,
          competency_count: self.bank.len(),
        };
        return Transition { session: next, outcome: Outcome::Question(view) };
      }
      if next.question_index > count {
        warn!(target: "assessment", question_index = next.question_index, count, "Question index out of range; rolling over");
      }
      next.answers.entry(competency.name.clone()).or_default();
      debug!(target: "assessment", competency = %competency.name, "Competency completed");
      next.competency_index += 1;
      next.question_index = 0;
    }
  }

  fn complete(&self, mut next: Session) -> Transition {
    next.stage = Stage::Completed;
    let report = self.report(&next);
    info!(
      target: "assessment",
      overall = report.overall_average,
      competencies = report.per_competency_average.len(),
      "Assessment completed"
    );
    Transition { session: next, outcome: Outcome::Completed { report, newly_completed: true } }
  }
}

fn require_in_progress(session: &Session) -> Result<(), TransitionError> {
  match session.stage {
    Stage::InProgress => Ok(()),
    Stage::AwaitingStart => Err(TransitionError::NotStarted),
    Stage::Completed => Err(TransitionError::SessionTerminal),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::tests::bank_of;

  fn machine(layout: &[(&str, usize, usize)], policy: RevisitPolicy) -> SessionStateMachine {
    SessionStateMachine::new(Arc::new(bank_of(layout)), Recommendations::default(), policy)
  }

  fn run(m: &SessionStateMachine, events: &[Event]) -> (Session, Outcome) {
    let mut session = Session::new();
    let mut outcome = Outcome::Welcome;
    for e in events {
      let t = m.apply(&session, e).expect("transition");
      session = t.session;
      outcome = t.outcome;
    }
    (session, outcome)
  }

  fn recorded<'a>(s: &'a Session, name: &str) -> &'a [u32] {
    s.answers[name].recorded().expect("recorded slot")
  }

  #[test]
  fn single_competency_scenario() {
    let m = machine(&[("teamwork", 2, 3)], RevisitPolicy::Replace);
    let (s, outcome) = run(
      &m,
      &[Event::Start, Event::StartAssessment, Event::SubmitAnswer(0), Event::SubmitAnswer(2)],
    );
    assert_eq!(recorded(&s, "teamwork"), &[1, 3]);
    assert_eq!(s.stage, Stage::Completed);
    let Outcome::Completed { report, newly_completed } = outcome else { panic!("expected report") };
    assert!(newly_completed);
    assert_eq!(report.per_competency_average["teamwork"], 2.0);
    assert_eq!(report.overall_average, 2.0);
  }

  #[test]
  fn overall_average_is_mean_of_competency_means() {
    let m = machine(&[("teamwork", 2, 5), ("leadership", 1, 5)], RevisitPolicy::Replace);
    let (_, outcome) = run(
      &m,
      &[Event::StartAssessment, Event::SubmitAnswer(2), Event::SubmitAnswer(4), Event::SubmitAnswer(1)],
    );
    let Outcome::Completed { report, .. } = outcome else { panic!("expected report") };
    assert_eq!(report.per_competency_average["teamwork"], 4.0);
    assert_eq!(report.per_competency_average["leadership"], 2.0);
    assert_eq!(report.overall_average, 3.0);
  }

  #[test]
  fn out_of_range_answer_is_rejected_without_moving() {
    let m = machine(&[("teamwork", 2, 3)], RevisitPolicy::Replace);
    let (s, _) = run(&m, &[Event::StartAssessment]);
    let err = m.apply(&s, &Event::SubmitAnswer(5)).unwrap_err();
    assert_eq!(err, TransitionError::InvalidAnswer { index: 5, available: 3 });
    assert_eq!(s.question_index, 0);
    assert!(s.answers.is_empty());
  }

  #[test]
  fn question_view_reports_progress() {
    let m = machine(&[("teamwork", 4, 3), ("leadership", 1, 2)], RevisitPolicy::Replace);
    let (_, outcome) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(0)]);
    let Outcome::Question(view) = outcome else { panic!("expected question") };
    assert_eq!(view.competency_name, "teamwork");
    assert_eq!(view.question_text, "teamwork question 2");
    assert_eq!(view.options.len(), 3);
    assert_eq!((view.question_number, view.question_count), (2, 4));
    assert_eq!((view.competency_number, view.competency_count), (1, 2));
    assert_eq!(view.progress_fraction, 0.5);
  }

  #[test]
  fn rollover_moves_to_next_competency() {
    let m = machine(&[("teamwork", 1, 3), ("leadership", 2, 3)], RevisitPolicy::Replace);
    let (s, outcome) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(1)]);
    assert_eq!((s.competency_index, s.question_index), (1, 0));
    let Outcome::Question(view) = outcome else { panic!("expected question") };
    assert_eq!(view.competency_name, "leadership");
  }

  #[test]
  fn go_back_at_floor_is_a_no_op() {
    let m = machine(&[("teamwork", 1, 3), ("leadership", 2, 3)], RevisitPolicy::Replace);
    let (s, _) = run(&m, &[Event::StartAssessment]);
    let t = m.apply(&s, &Event::GoBack).expect("go back");
    assert_eq!((t.session.competency_index, t.session.question_index), (0, 0));

    // Also at the start of a later competency: no crossing back.
    let (s, _) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(0)]);
    let t = m.apply(&s, &Event::GoBack).expect("go back");
    assert_eq!((t.session.competency_index, t.session.question_index), (1, 0));
  }

  #[test]
  fn go_back_keeps_the_recorded_answer() {
    let m = machine(&[("teamwork", 3, 3)], RevisitPolicy::Replace);
    let (s, _) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(2), Event::GoBack]);
    assert_eq!(s.question_index, 0);
    assert_eq!(recorded(&s, "teamwork"), &[3]);
  }

  #[test]
  fn replace_policy_overwrites_revisited_answer() {
    let m = machine(&[("teamwork", 3, 3)], RevisitPolicy::Replace);
    let (s, _) = run(
      &m,
      &[Event::StartAssessment, Event::SubmitAnswer(2), Event::GoBack, Event::SubmitAnswer(0)],
    );
    assert_eq!(recorded(&s, "teamwork"), &[1]);
    assert_eq!(s.question_index, 1);
  }

  #[test]
  fn append_policy_accumulates_duplicates() {
    let m = machine(&[("teamwork", 3, 3)], RevisitPolicy::Append);
    let (s, _) = run(
      &m,
      &[Event::StartAssessment, Event::SubmitAnswer(2), Event::GoBack, Event::SubmitAnswer(0)],
    );
    assert_eq!(recorded(&s, "teamwork"), &[3, 1]);
  }

  #[test]
  fn finish_twice_yields_same_report() {
    let m = machine(&[("teamwork", 3, 3), ("leadership", 2, 3)], RevisitPolicy::Replace);
    let (s, first) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(1), Event::Finish]);
    let Outcome::Completed { report: r1, newly_completed: true } = first else { panic!("expected fresh report") };
    assert_eq!(r1.per_competency_average.len(), 1);
    assert_eq!(r1.overall_average, 2.0);

    let t = m.apply(&s, &Event::Finish).expect("second finish");
    let Outcome::Completed { report: r2, newly_completed } = t.outcome else { panic!("expected report") };
    assert!(!newly_completed);
    assert_eq!(r1, r2);
    assert_eq!(t.session, s);
  }

  #[test]
  fn completed_session_refuses_navigation() {
    let m = machine(&[("teamwork", 1, 3)], RevisitPolicy::Replace);
    let (s, _) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(0)]);
    assert_eq!(m.apply(&s, &Event::SubmitAnswer(0)).unwrap_err(), TransitionError::SessionTerminal);
    assert_eq!(m.apply(&s, &Event::GoBack).unwrap_err(), TransitionError::SessionTerminal);
    assert_eq!(m.apply(&s, &Event::UnknownInput).unwrap_err(), TransitionError::SessionTerminal);
  }

  #[test]
  fn not_started_session_refuses_answers() {
    let m = machine(&[("teamwork", 1, 3)], RevisitPolicy::Replace);
    let s = Session::new();
    assert_eq!(m.apply(&s, &Event::SubmitAnswer(0)).unwrap_err(), TransitionError::NotStarted);
    assert_eq!(m.apply(&s, &Event::Finish).unwrap_err(), TransitionError::NotStarted);
    assert_eq!(m.apply(&s, &Event::UnknownInput).unwrap_err(), TransitionError::UnknownInput);
  }

  #[test]
  fn start_assessment_after_completion_begins_a_new_run() {
    let m = machine(&[("teamwork", 1, 3)], RevisitPolicy::Replace);
    let (s, outcome) = run(
      &m,
      &[Event::StartAssessment, Event::SubmitAnswer(2), Event::StartAssessment],
    );
    assert!(matches!(outcome, Outcome::Question(_)));
    assert_eq!(s.stage, Stage::InProgress);
    assert!(s.answers.is_empty());
  }

  #[test]
  fn restart_discards_progress() {
    let m = machine(&[("teamwork", 3, 3)], RevisitPolicy::Replace);
    let (s, _) = run(&m, &[Event::StartAssessment, Event::SubmitAnswer(2), Event::Restart]);
    assert_eq!(s.stage, Stage::InProgress);
    assert_eq!((s.competency_index, s.question_index), (0, 0));
    assert!(s.answers.is_empty());
  }

  #[test]
  fn aggregated_slot_is_repaired_before_recording() {
    let m = machine(&[("teamwork", 2, 3)], RevisitPolicy::Replace);
    let mut s = Session { stage: Stage::InProgress, ..Session::new() };
    s.answers.insert("teamwork".into(), AnswerSlot::Aggregated(4.5));
    let t = m.apply(&s, &Event::SubmitAnswer(1)).expect("answer");
    assert_eq!(recorded(&t.session, "teamwork"), &[2]);
  }

  #[test]
  fn competencies_without_questions_are_skipped_and_score_zero() {
    let m = machine(&[("empty", 0, 3), ("teamwork", 1, 3)], RevisitPolicy::Replace);
    let (s, outcome) = run(&m, &[Event::StartAssessment]);
    assert_eq!(s.competency_index, 1);
    let Outcome::Question(view) = outcome else { panic!("expected question") };
    assert_eq!(view.competency_name, "teamwork");

    let t = m.apply(&s, &Event::SubmitAnswer(2)).expect("answer");
    let Outcome::Completed { report, .. } = t.outcome else { panic!("expected report") };
    assert_eq!(report.per_competency_average["empty"], 0.0);
    assert_eq!(report.overall_average, 1.5);
  }

  #[test]
  fn bank_without_any_question_completes_immediately() {
    let m = machine(&[("empty", 0, 3)], RevisitPolicy::Replace);
    let (s, outcome) = run(&m, &[Event::StartAssessment]);
    assert_eq!(s.stage, Stage::Completed);
    assert!(matches!(outcome, Outcome::Completed { .. }));
  }

  #[test]
  fn out_of_range_indices_are_recovered() {
    let m = machine(&[("teamwork", 2, 3)], RevisitPolicy::Replace);
    let s = Session { stage: Stage::InProgress, competency_index: 7, ..Session::new() };
    let t = m.apply(&s, &Event::GoBack).expect("go back");
    assert_eq!(t.session.stage, Stage::Completed);
    assert_eq!(t.session.competency_index, 1);

    let s = Session { stage: Stage::InProgress, question_index: 9, ..Session::new() };
    let t = m.apply(&s, &Event::SubmitAnswer(0)).expect("answer");
    assert_eq!(t.session.stage, Stage::Completed);
  }

  #[test]
  fn recorded_answers_never_exceed_question_count_with_replace() {
    let m = machine(&[("teamwork", 3, 4), ("leadership", 2, 4)], RevisitPolicy::Replace);
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..200 {
      let mut s = Session::new();
      for _ in 0..40 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let e = match seed % 10 {
          0 => Event::StartAssessment,
          1 | 2 => Event::GoBack,
          3 => Event::Finish,
          n => Event::SubmitAnswer((n % 5) as usize),
        };
        if let Ok(t) = m.apply(&s, &e) {
          s = t.session;
        }
        for c in m.bank().competencies() {
          if let Some(w) = s.answers.get(&c.name).and_then(AnswerSlot::recorded) {
            assert!(w.len() <= c.questions.len(), "{} has {} answers", c.name, w.len());
            assert!(w.iter().all(|&x| (1..=4).contains(&x)));
          }
        }
        assert!(s.competency_index <= m.bank().len());
      }
    }
  }
}
