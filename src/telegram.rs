//! Telegram Bot API transport (long polling).
//!
//! Enabled only when TELEGRAM_BOT_TOKEN is set. Commands arrive as messages
//! (`/start`, `/restart`), answers and navigation as inline-button callbacks.
//! Command replies are sent as new messages; button presses edit the message
//! that carried the buttons. A rejected press leaves that message alone and
//! shows the error as a notification instead.
//!
//! NOTE: the token is part of every request URL, so URLs are never logged.

use std::{sync::Arc, time::Duration};

use reqwest::header::USER_AGENT;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ErrorKind, TelegramError};
use crate::logic::handle_event;
use crate::machine::Event;
use crate::protocol::OutputIntent;
use crate::render::{self, RenderedMessage, ANSWER_PREFIX, BACK, FINISH, RESTART, START_ASSESSMENT};
use crate::state::AppState;
use crate::util::trunc_for_log;

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TelegramBot {
  client: reqwest::Client,
  api_base: String,
  token: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
  ok: bool,
  result: Option<T>,
  description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
  update_id: i64,
  #[serde(default)]
  message: Option<Message>,
  #[serde(default)]
  callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
  message_id: i64,
  chat: Chat,
  #[serde(default)]
  from: Option<User>,
  #[serde(default)]
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
  id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
  id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
  id: String,
  from: User,
  #[serde(default)]
  message: Option<Message>,
  #[serde(default)]
  data: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates {
  offset: i64,
  timeout: u64,
  allowed_updates: [&'static str; 2],
}

#[derive(Serialize, Debug, PartialEq)]
struct InlineKeyboardButton {
  text: String,
  callback_data: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct InlineKeyboardMarkup {
  inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
  chat_id: i64,
  text: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
  chat_id: i64,
  message_id: i64,
  text: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
  callback_query_id: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  text: Option<&'a str>,
}

/// How a button press is answered.
#[derive(Debug, PartialEq)]
enum CallbackReply {
  /// Keep the message (and its keyboard) and show a notification.
  Notice(String),
  /// Replace the message that carried the buttons.
  Edit(RenderedMessage),
}

fn callback_reply(intent: &OutputIntent) -> CallbackReply {
  let rendered = render::render(intent);
  match intent {
    OutputIntent::ShowError { kind: ErrorKind::InvalidAnswer | ErrorKind::UnknownInput } => {
      CallbackReply::Notice(rendered.text)
    }
    _ => CallbackReply::Edit(rendered),
  }
}

/// Map a text message to an event. Commands may carry a `@botname` suffix or a payload.
fn event_from_text(text: &str) -> Event {
  let command = text.split_whitespace().next().unwrap_or_default();
  let command = command.split('@').next().unwrap_or_default();
  match command {
    "/start" => Event::Start,
    "/restart" => Event::Restart,
    _ => Event::UnknownInput,
  }
}

fn event_from_callback(data: &str) -> Event {
  match data {
    START_ASSESSMENT => Event::StartAssessment,
    BACK => Event::GoBack,
    FINISH => Event::Finish,
    RESTART => Event::Restart,
    _ => data
      .strip_prefix(ANSWER_PREFIX)
      .and_then(|n| n.parse::<usize>().ok())
      .map(Event::SubmitAnswer)
      .unwrap_or(Event::UnknownInput),
  }
}

fn markup(msg: &RenderedMessage) -> Option<InlineKeyboardMarkup> {
  if msg.keyboard.is_empty() {
    return None;
  }
  Some(InlineKeyboardMarkup {
    inline_keyboard: msg
      .keyboard
      .iter()
      .map(|row| {
        row
          .iter()
          .map(|b| InlineKeyboardButton { text: b.label.clone(), callback_data: b.data.clone() })
          .collect()
      })
      .collect(),
  })
}

impl TelegramBot {
  /// Construct the bot if TELEGRAM_BOT_TOKEN is present; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.trim().is_empty())?;
    let api_base =
      std::env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| "https://api.telegram.org".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
      .build()
      .ok()?;

    Some(Self { client, api_base, token })
  }

  pub fn api_base(&self) -> &str {
    &self.api_base
  }

  async fn call<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R, TelegramError> {
    let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "competency-bot/0.1")
      .json(body)
      .send()
      .await?;
    let status = res.status();
    let body: ApiResponse<R> = res.json().await?;
    match (body.ok, body.result) {
      (true, Some(result)) => Ok(result),
      _ => Err(TelegramError::Api(format!(
        "{method} failed ({status}): {}",
        body.description.unwrap_or_default()
      ))),
    }
  }

  /// Poll for updates forever, handling them one at a time so a user's events stay in order.
  #[instrument(level = "info", skip_all, fields(api_base = %self.api_base))]
  pub async fn run(self, state: Arc<AppState>) {
    info!(target: "competency_bot", "Telegram polling started");
    let mut offset = 0i64;
    loop {
      let req = GetUpdates {
        offset,
        timeout: POLL_TIMEOUT_SECS,
        allowed_updates: ["message", "callback_query"],
      };
      let updates: Vec<Update> = match self.call("getUpdates", &req).await {
        Ok(u) => u,
        Err(e) => {
          error!(target: "competency_bot", error = %e, "getUpdates failed; retrying");
          tokio::time::sleep(RETRY_DELAY).await;
          continue;
        }
      };
      for update in updates {
        offset = offset.max(update.update_id + 1);
        self.dispatch(&state, update).await;
      }
    }
  }

  async fn dispatch(&self, state: &AppState, update: Update) {
    if let Some(cq) = update.callback_query {
      self.on_callback(state, cq).await;
    } else if let Some(msg) = update.message {
      self.on_message(state, msg).await;
    } else {
      debug!(target: "competency_bot", update_id = update.update_id, "Ignoring update");
    }
  }

  async fn on_message(&self, state: &AppState, msg: Message) {
    let Some(from) = &msg.from else { return };
    let text = msg.text.as_deref().unwrap_or_default();
    let event = event_from_text(text);
    let user_id = from.id.to_string();
    info!(target: "competency_bot", %user_id, chat_id = msg.chat.id, text = %trunc_for_log(text, 64), ?event, "Telegram message");

    let rendered = render::render(&handle_event(state, &user_id, event).await);
    self.send(msg.chat.id, &rendered).await;
  }

  async fn on_callback(&self, state: &AppState, cq: CallbackQuery) {
    let event = event_from_callback(cq.data.as_deref().unwrap_or_default());
    let user_id = cq.from.id.to_string();
    debug!(target: "competency_bot", %user_id, ?event, "Telegram callback");
    let reply = callback_reply(&handle_event(state, &user_id, event).await);

    let notice = match &reply {
      CallbackReply::Notice(text) => Some(text.as_str()),
      CallbackReply::Edit(_) => None,
    };
    let ack = AnswerCallbackQuery { callback_query_id: &cq.id, text: notice };
    if let Err(e) = self.call::<_, bool>("answerCallbackQuery", &ack).await {
      warn!(target: "competency_bot", error = %e, "answerCallbackQuery failed");
    }
    let CallbackReply::Edit(rendered) = reply else { return };

    match &cq.message {
      Some(m) => {
        let edit = EditMessageText {
          chat_id: m.chat.id,
          message_id: m.message_id,
          text: &rendered.text,
          reply_markup: markup(&rendered),
        };
        match self.call::<_, serde_json::Value>("editMessageText", &edit).await {
          Ok(_) => {}
          Err(e) if e.is_not_modified() => {
            debug!(target: "competency_bot", %user_id, "Message already shows this content");
          }
          Err(e) => {
            warn!(target: "competency_bot", error = %e, "editMessageText failed; sending a new message");
            self.send(m.chat.id, &rendered).await;
          }
        }
      }
      // Buttons on very old messages arrive without the message; reply in the user's private chat.
      None => self.send(cq.from.id, &rendered).await,
    }
  }

  async fn send(&self, chat_id: i64, rendered: &RenderedMessage) {
    let msg = SendMessage { chat_id, text: &rendered.text, reply_markup: markup(rendered) };
    if let Err(e) = self.call::<_, serde_json::Value>("sendMessage", &msg).await {
      error!(target: "competency_bot", chat_id, error = %e, "sendMessage failed");
    }
  }
}
