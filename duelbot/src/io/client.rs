//! Game client abstraction.
//!
//! The [`GameClient`] trait is the only way the bot touches the game: read the
//! screen, click a dialog, execute a board action, or back out of pending
//! prompts. [`TranscriptClient`] replays recorded screens from a JSON file so a
//! session can be exercised end to end without a live client.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::{ActionRequest, DialogClick, ExecOutcome, Screen};

pub trait GameClient {
    fn read_screen(&mut self) -> Result<Screen>;

    fn click_dialog(&mut self, click: &DialogClick) -> Result<()>;

    fn execute(&mut self, action: &ActionRequest) -> Result<ExecOutcome>;

    /// Dismiss any activation or chain prompts the client is waiting on.
    fn cancel_prompts(&mut self) -> Result<()>;
}

/// Recorded sequence of screens.
///
/// A `null` frame stands for a read that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub frames: Vec<Option<Screen>>,
    /// Outcome per executed action, in order. Missing entries mean `done`.
    #[serde(default)]
    pub outcomes: Vec<ExecOutcome>,
}

pub fn load_transcript(path: &Path) -> Result<Transcript> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let transcript: Transcript =
        serde_json::from_str(&raw).with_context(|| format!("parse transcript {}", path.display()))?;
    if transcript.frames.is_empty() {
        return Err(anyhow!("transcript {} has no frames", path.display()));
    }
    Ok(transcript)
}

/// Something the bot did to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Click { click: DialogClick },
    Execute { action: ActionRequest },
    CancelPrompts,
}

/// Client that serves transcript frames in order and records every command.
///
/// Once frames run out the duel is reported as ended.
#[derive(Debug, Clone)]
pub struct TranscriptClient {
    frames: VecDeque<Option<Screen>>,
    outcomes: VecDeque<ExecOutcome>,
    events: Vec<ClientEvent>,
}

impl TranscriptClient {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            frames: transcript.frames.into(),
            outcomes: transcript.outcomes.into(),
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[ClientEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ClientEvent> {
        self.events
    }

    pub fn remaining_frames(&self) -> usize {
        self.frames.len()
    }
}

impl GameClient for TranscriptClient {
    fn read_screen(&mut self) -> Result<Screen> {
        match self.frames.pop_front() {
            Some(Some(screen)) => Ok(screen),
            Some(None) => Err(anyhow!("recorded frame unreadable")),
            None => {
                debug!("transcript exhausted");
                Ok(Screen {
                    duel_ended: true,
                    ..Screen::default()
                })
            }
        }
    }

    fn click_dialog(&mut self, click: &DialogClick) -> Result<()> {
        debug!(?click, "transcript click");
        self.events.push(ClientEvent::Click {
            click: click.clone(),
        });
        Ok(())
    }

    fn execute(&mut self, action: &ActionRequest) -> Result<ExecOutcome> {
        info!(action = %action.label(), "transcript execute");
        self.events.push(ClientEvent::Execute {
            action: action.clone(),
        });
        Ok(self.outcomes.pop_front().unwrap_or(ExecOutcome::Done))
    }

    fn cancel_prompts(&mut self) -> Result<()> {
        self.events.push(ClientEvent::CancelPrompts);
        Ok(())
    }
}
