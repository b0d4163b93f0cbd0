//! soop-chat: a terminal chat client for SOOP broadcasts.
//!
//! Joins a broadcast's chat room, prints every accepted event on stdout and
//! sends each line typed on stdin as a chat message.
//!
//! # Usage
//!
//! ```text
//! soop-chat --live-info live.json [--cookie <COOKIE>] [--config chat.toml] [--json]
//! soop-chat --domain chat.example.com --port 8000 --room 12345 --broadcaster someone
//! ```
//!
//! `--live-info` is the JSON record returned by the live-info resolver; only
//! its `BJID`, `CHATNO`, `CHDOMAIN` and `CHPT` fields are read.  Without it,
//! the same fields are taken from the individual flags.
//!
//! # Environment variable overrides
//!
//! | Variable            | Flag            |
//! |---------------------|-----------------|
//! | `SOOP_LIVE_INFO`    | `--live-info`   |
//! | `SOOP_CHAT_DOMAIN`  | `--domain`      |
//! | `SOOP_CHAT_PORT`    | `--port`        |
//! | `SOOP_CHAT_ROOM`    | `--room`        |
//! | `SOOP_BROADCASTER`  | `--broadcaster` |
//! | `SOOP_COOKIE`       | `--cookie`      |
//! | `SOOP_CHAT_CONFIG`  | `--config`      |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).  Logs go to stderr so
//! stdout carries only chat output.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use soop_chat_client::domain::{ChatConfig, EndpointInfo};
use soop_chat_client::infrastructure::{connect, ChatHandler, ConnectOutcome, SessionError};
use soop_chat_core::events::{ChatEvent, EventPayload};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Terminal client for SOOP live chat.
#[derive(Debug, Parser)]
#[command(name = "soop-chat", about = "Join a SOOP broadcast's live chat", version)]
struct Cli {
    /// Live-info JSON file (takes precedence over the individual endpoint flags).
    #[arg(long, env = "SOOP_LIVE_INFO")]
    live_info: Option<PathBuf>,

    /// Chat server host name.
    #[arg(long, env = "SOOP_CHAT_DOMAIN")]
    domain: Option<String>,

    /// Advertised chat port (the client connects to the next port up).
    #[arg(long, env = "SOOP_CHAT_PORT")]
    port: Option<String>,

    /// Chat room number.
    #[arg(long, env = "SOOP_CHAT_ROOM")]
    room: Option<String>,

    /// Broadcaster id.
    #[arg(long, env = "SOOP_BROADCASTER", default_value = "")]
    broadcaster: String,

    /// Session cookie; chat is joined anonymously without it.
    #[arg(long, env = "SOOP_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// TOML configuration file.
    #[arg(long, env = "SOOP_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Print events as JSON lines instead of text.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Builds the endpoint record from `--live-info` or the individual flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the live-info file cannot be read or parsed.
    fn endpoint_info(&self) -> anyhow::Result<EndpointInfo> {
        if let Some(path) = &self.live_info {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read live info {}", path.display()))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("invalid live info in {}", path.display()));
        }

        Ok(EndpointInfo {
            broadcaster_id: self.broadcaster.clone(),
            room_id: self.room.clone(),
            domain: self.domain.clone(),
            port: self.port.clone(),
        })
    }

    fn chat_config(&self) -> anyhow::Result<ChatConfig> {
        match &self.config {
            Some(path) => ChatConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display())),
            None => Ok(ChatConfig::default()),
        }
    }
}

// ── Console output ────────────────────────────────────────────────────────────

/// Prints events on stdout.
struct ConsoleHandler {
    json: bool,
}

impl ChatHandler for ConsoleHandler {
    fn on_connect(&mut self) {
        info!("joined chat");
    }

    fn on_flush(&mut self) {
        info!("chat disconnected");
    }

    fn on_event(&mut self, event: &ChatEvent, _retained: bool) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("failed to serialise event {}: {e}", event.index),
            }
        } else {
            println!("{}", render(event));
        }
    }
}

/// One-line text rendering of an event.
fn render(event: &ChatEvent) -> String {
    match &event.payload {
        EventPayload::Message {
            user_id,
            nickname,
            text,
            ..
        } => format!("<{nickname} ({user_id})> {text}"),
        EventPayload::UserJoin { nickname, .. } => format!("* {nickname} joined"),
        EventPayload::UserExit { nickname, .. } => format!("* {nickname} left"),
        EventPayload::Mute {
            user_id, duration, ..
        } => match duration {
            Some(secs) => format!("* {user_id} muted for {secs}s"),
            None => format!("* {user_id} muted"),
        },
        EventPayload::ManagerSet { user_id, .. } => format!("* {user_id} manager rights changed"),
        EventPayload::FreezeMode { enabled: true, .. } => "* chat frozen".to_string(),
        EventPayload::FreezeMode { enabled: false, .. } => "* chat unfrozen".to_string(),
        EventPayload::SlowMode { interval } => match interval {
            Some(secs) => format!("* slow mode: {secs}s"),
            None => "* slow mode changed".to_string(),
        },
        EventPayload::Kick { nickname, .. } => format!("* {nickname} was kicked"),
        EventPayload::KickDisplayToggle { visible } => {
            format!("* kick notices {}", if *visible { "shown" } else { "hidden" })
        }
        EventPayload::Notice { text } => format!("[notice] {text}"),
        EventPayload::Follow {
            nickname,
            sub_months,
            ..
        } => match sub_months {
            Some(months) => format!("* {nickname} subscribed ({months} months)"),
            None => format!("* {nickname} subscribed"),
        },
        EventPayload::Sticker {
            nickname,
            sticker_id,
            ..
        } => format!("<{nickname}> [sticker {sticker_id}]"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let info = cli.endpoint_info()?;
    let config = cli.chat_config()?;

    let session = match connect(
        &info,
        cli.cookie.clone(),
        config,
        ConsoleHandler { json: cli.json },
    ) {
        ConnectOutcome::Started(session) => session,
        ConnectOutcome::Unavailable(reason) => {
            warn!("chat is unavailable for this broadcast: {reason}");
            return Ok(());
        }
    };
    let handle = session.handle().clone();

    // ── Ctrl+C closes the session ─────────────────────────────────────────────
    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; closing chat");
                ctrl_c_handle.close();
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Stdin lines become chat messages ──────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match handle.send(&line) {
                    Ok(()) => {}
                    Err(SessionError::NotConnected) => warn!("not connected yet; message dropped"),
                    Err(e) => {
                        warn!("{e}");
                        break;
                    }
                },
                // Stdin closed: keep printing until the session ends.
                Ok(None) => {
                    handle.closed().await;
                    break;
                }
                Err(e) => {
                    warn!("failed to read stdin: {e}");
                    handle.closed().await;
                    break;
                }
            },
            _ = handle.closed() => break,
        }
    }

    session.wait().await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
