//! Plain-text rendering of output intents for chat transports, plus the inline
//! button layout that goes with each message.

use crate::error::ErrorKind;
use crate::machine::QuestionView;
use crate::protocol::OutputIntent;
use crate::score::FinalReport;
use crate::util::capitalize;

// Callback payloads carried by buttons.
pub const START_ASSESSMENT: &str = "start_assessment";
pub const ANSWER_PREFIX: &str = "answer_";
pub const BACK: &str = "back";
pub const FINISH: &str = "finish";
pub const RESTART: &str = "restart";

const BAR_BLOCKS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
  pub label: String,
  pub data: String,
}

impl Button {
  fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
    Self { label: label.into(), data: data.into() }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
  pub text: String,
  /// Rows of buttons, top to bottom.
  pub keyboard: Vec<Vec<Button>>,
}

pub fn render(intent: &OutputIntent) -> RenderedMessage {
  match intent {
    OutputIntent::ShowWelcome => RenderedMessage {
      text: "Ready to start the competency assessment?".into(),
      keyboard: vec![vec![Button::new("Start assessment", START_ASSESSMENT)]],
    },
    OutputIntent::ShowQuestion(view) => render_question(view),
    OutputIntent::ShowReport(report) => render_report(report),
    OutputIntent::ShowError { kind } => render_error(*kind),
  }
}

/// `🟩🟩⬜️⬜️⬜️ (40% complete)` style bar for a fraction in `[0, 1]`.
pub fn progress_bar(fraction: f64) -> String {
  let fraction = fraction.clamp(0.0, 1.0);
  let filled = ((fraction * BAR_BLOCKS as f64) as usize).min(BAR_BLOCKS);
  let percent = (fraction * 100.0) as u32;
  format!(
    "{}{} ({percent}% complete)",
    "🟩".repeat(filled),
    "⬜️".repeat(BAR_BLOCKS - filled)
  )
}

fn render_question(view: &QuestionView) -> RenderedMessage {
  let text = format!(
    "Competency: {}\nQuestion {} of {} 🔍\n{}\n\n{}",
    capitalize(&view.competency_name),
    view.question_number,
    view.question_count,
    progress_bar(view.progress_fraction),
    view.question_text
  );
  let mut keyboard: Vec<Vec<Button>> = view
    .options
    .iter()
    .enumerate()
    .map(|(i, label)| vec![Button::new(label.as_str(), format!("{ANSWER_PREFIX}{i}"))])
    .collect();
  keyboard.push(vec![Button::new("Back", BACK), Button::new("Finish", FINISH)]);
  RenderedMessage { text, keyboard }
}

fn render_report(report: &FinalReport) -> RenderedMessage {
  let mut text = String::from("📊 Final results:\n");
  for (name, avg) in &report.per_competency_average {
    text.push_str(&format!("• {}: {avg:.2}/5\n", capitalize(name)));
  }
  text.push_str(&format!("\nOverall level: {:.2}/5\n", report.overall_average));
  if !report.recommendations.is_empty() {
    text.push_str("\nRecommendations:\n");
    for r in &report.recommendations {
      text.push_str(&format!("• {r}\n"));
    }
  }
  RenderedMessage { text, keyboard: vec![vec![Button::new("Restart", RESTART)]] }
}

fn render_error(kind: ErrorKind) -> RenderedMessage {
  let (text, keyboard) = match kind {
    ErrorKind::InvalidAnswer => ("That option is not available. Please pick one of the listed answers.", vec![]),
    ErrorKind::SessionTerminal => (
      "This assessment is already finished. Restart to take it again.",
      vec![vec![Button::new("Restart", RESTART)]],
    ),
    ErrorKind::NotStarted => (
      "The assessment has not started yet.",
      vec![vec![Button::new("Start assessment", START_ASSESSMENT)]],
    ),
    ErrorKind::UnknownInput => ("Sorry, I didn't understand that. Use the buttons or /start.", vec![]),
  };
  RenderedMessage { text: text.into(), keyboard }
}
