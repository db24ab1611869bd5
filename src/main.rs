//! Competency self-assessment bot
//!
//! - Multi-step questionnaire grouped into competencies, scored per competency
//! - Axum HTTP + WebSocket API
//! - Optional Telegram transport (long polling)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   BOT_CONFIG_PATH    : path to TOML config (question bank path, results dir, recommendations)
//!   QUESTIONS_PATH     : overrides `questions_path` from the config
//!   TELEGRAM_BOT_TOKEN : enables the Telegram transport if present
//!   TELEGRAM_API_BASE  : default "https://api.telegram.org"
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod session;
mod score;
mod machine;
mod store;
mod persist;
mod config;
mod state;
mod protocol;
mod logic;
mod render;
mod telegram;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::QuestionBank;
use crate::routes::build_router;
use crate::state::AppState;
use crate::telegram::TelegramBot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = AppConfig::from_env()?;

  // The service must not take traffic without a valid bank.
  let bank = QuestionBank::load(&cfg.questions_path).map_err(|e| {
    error!(target: "competency_bot", path = %cfg.questions_path.display(), error = %e, "Failed to load question bank");
    e
  })?;

  let state = Arc::new(AppState::new(&cfg, bank));

  let poller = match TelegramBot::from_env() {
    Some(bot) => {
      info!(target: "competency_bot", api_base = %bot.api_base(), "Telegram transport enabled");
      Some(tokio::spawn(bot.run(state.clone())))
    }
    None => {
      info!(target: "competency_bot", "Telegram transport disabled (no TELEGRAM_BOT_TOKEN)");
      None
    }
  };

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "competency_bot", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  if let Some(handle) = poller {
    handle.abort();
  }
  info!(target: "competency_bot", "Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "competency_bot", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "competency_bot", "Shutdown signal received");
}
