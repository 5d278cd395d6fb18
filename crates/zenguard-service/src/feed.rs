//! Newline-delimited JSON host feed.
//!
//! The `zenguard` binary reads host notifications from stdin, one JSON object
//! per line:
//!
//! ```text
//! {"type":"start","duration_secs":300}
//! {"type":"foreground","app_id":"com.example.game"}
//! {"type":"key","code":"back"}
//! {"type":"launch","app_id":"com.example.notes"}
//! {"type":"set_slot","slot":0,"app_id":"com.example.notes"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. A malformed line or a
//! rejected command is logged and the feed continues.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use zenguard_core::{
    AppId, ForegroundChange, HostCommand, KeyCode, KeyEvent, KeyPhase, env::Environment,
};

use crate::engine::{EngineError, EngineHandle};

/// One line of the host feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Start a session.
    Start {
        /// Requested duration; validated by the engine.
        #[serde(default)]
        duration_secs: Option<i64>,
    },
    /// Stop the session.
    Stop,
    /// Foreground application changed. `null` if unresolved.
    Foreground {
        /// Application now in front.
        #[serde(default)]
        app_id: Option<AppId>,
    },
    /// Key notification.
    Key {
        /// Which key.
        code: KeyCode,
        /// Press, release or repeat.
        #[serde(default = "default_phase")]
        phase: KeyPhase,
    },
    /// User activated the emergency exit.
    EmergencyExit,
    /// User picked an application on the blocking surface.
    Launch {
        /// Application to launch.
        app_id: AppId,
    },
    /// Store an allow-list slot.
    SetSlot {
        /// Slot index.
        slot: usize,
        /// Application id.
        app_id: AppId,
    },
    /// Clear an allow-list slot.
    ClearSlot {
        /// Slot index.
        slot: usize,
    },
}

fn default_phase() -> KeyPhase {
    KeyPhase::Down
}

/// Host feed errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Reading the feed failed.
    #[error("feed read failed: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid feed message.
    #[error("line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// The engine rejected the message or has stopped.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Parse one feed line. Returns `None` for blank and comment lines.
///
/// # Errors
///
/// - `FeedError::Parse` if the line is not a valid [`FeedMessage`]
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<FeedMessage>, FeedError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| FeedError::Parse { line: line_number, source })
}

/// Forward one message to the engine.
///
/// # Errors
///
/// - `FeedError::Engine` if the engine rejected the message or has stopped
pub async fn forward<E: Environment>(
    message: FeedMessage,
    engine: &EngineHandle,
    env: &E,
) -> Result<(), FeedError> {
    match message {
        FeedMessage::Start { duration_secs } => {
            engine.command(HostCommand::StartFocus { duration_secs }).await?;
        },
        FeedMessage::Stop => engine.stop_focus().await?,
        FeedMessage::Foreground { app_id } => {
            let change = ForegroundChange { app_id, timestamp_secs: env.wall_clock_secs() };
            engine.foreground_changed(change).await?;
        },
        FeedMessage::Key { code, phase } => {
            let disposition = engine.key_event(KeyEvent { code, phase }).await?;
            tracing::info!(?code, ?phase, ?disposition, "key handled");
        },
        FeedMessage::EmergencyExit => engine.emergency_exit().await?,
        FeedMessage::Launch { app_id } => engine.launch_allowed(app_id).await?,
        FeedMessage::SetSlot { slot, app_id } => engine.set_slot(slot, app_id).await?,
        FeedMessage::ClearSlot { slot } => engine.clear_slot(slot).await?,
    }
    Ok(())
}

/// Pump the feed into the engine until end of input.
///
/// Returns the number of messages forwarded.
///
/// # Errors
///
/// - `FeedError::Io` if reading fails
/// - `FeedError::Engine` with `EngineError::Closed` once the engine stops
pub async fn pump<R, E>(reader: R, engine: &EngineHandle, env: &E) -> Result<usize, FeedError>
where
    R: AsyncBufRead + Unpin,
    E: Environment,
{
    let mut lines = reader.lines();
    let mut line_number = 0;
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;

        let message = match parse_line(line_number, &line) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "skipping feed line");
                continue;
            },
        };

        match forward(message, engine, env).await {
            Ok(()) => forwarded += 1,
            Err(FeedError::Engine(EngineError::Closed)) => {
                return Err(FeedError::Engine(EngineError::Closed));
            },
            Err(e) => tracing::warn!(line = line_number, error = %e, "feed message rejected"),
        }
    }

    tracing::debug!(lines = line_number, forwarded, "feed ended");
    Ok(forwarded)
}
