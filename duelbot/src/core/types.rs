//! Shared deterministic types for the duel core.
//!
//! These types are the contract between the game client adapter, strategies,
//! and the dialog/scheduling logic. They carry no I/O and serialize to a stable
//! snake_case JSON shape so transcripts and dumps stay readable.

use serde::{Deserialize, Serialize};

/// Duel phase as reported by the game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Draw,
    Standby,
    Main1,
    Battle,
    Main2,
    End,
}

/// A visible UI element inside a modal dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiElement {
    pub id: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

impl UiElement {
    pub fn new(id: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
        }
    }
}

/// Contents of the modal dialog currently presented by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogView {
    /// Card names listed in the dialog, in display order.
    pub cards: Vec<String>,
    /// Buttons and other identifiable widgets.
    pub elements: Vec<UiElement>,
}

impl DialogView {
    pub fn with_cards<I, S>(cards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cards: cards.into_iter().map(Into::into).collect(),
            elements: Vec::new(),
        }
    }
}

/// One observation of the game client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Screen {
    pub duel_ended: bool,
    pub turn: Option<u32>,
    pub my_turn: bool,
    pub phase: Option<Phase>,
    pub hand: Vec<String>,
    pub dialog: Option<DialogView>,
}

impl Screen {
    pub fn has_dialog(&self) -> bool {
        self.dialog.is_some()
    }
}

/// Kind of game action a strategy may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NormalSummon,
    SpecialSummon,
    ActivateHand,
    ActivateField,
    SetSpellTrap,
    ExtraDeckSummon,
    AdvancePhase,
    Pass,
}

/// Where an action is aimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    HandIndex(usize),
    Zone(u8),
    Phase(Phase),
}

/// A proposed game action. Immutable once handed to the profile filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub card_name: Option<String>,
    pub target: Option<ActionTarget>,
    /// Name of the strategy that proposed the action.
    pub proposer: String,
    #[serde(default)]
    pub description: String,
    /// Total execution attempts (at least one).
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    80
}

impl ActionRequest {
    pub fn new(kind: ActionKind, proposer: impl Into<String>) -> Self {
        Self {
            kind,
            card_name: None,
            target: None,
            proposer: proposer.into(),
            description: String::new(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }

    pub fn with_card(mut self, name: impl Into<String>) -> Self {
        self.card_name = Some(name.into());
        self
    }

    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay_ms: u64) -> Self {
        self.retries = retries.max(1);
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Short label for log records.
    pub fn label(&self) -> String {
        match &self.card_name {
            Some(name) => format!("{:?}({name})", self.kind),
            None => format!("{:?}", self.kind),
        }
    }
}

/// Result of executing one action against the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecOutcome {
    /// Action applied; play may continue this tick.
    Done,
    /// Action applied and the turn or phase ended.
    TurnEnded,
}

/// Dialog button as exposed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogButton {
    Left,
    Middle,
    Right,
}

/// A card chosen from a dialog list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSelection {
    pub index: usize,
    pub name: String,
}

/// One atomic dialog interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogClick {
    /// Highlight a card with the middle button, then confirm.
    Pick(CardSelection),
    /// Confirm the dialog as presented.
    Confirm,
}

impl DialogClick {
    /// Button presses in the order the client must issue them.
    pub fn buttons(&self) -> &'static [DialogButton] {
        match self {
            DialogClick::Pick(_) => &[DialogButton::Middle, DialogButton::Right],
            DialogClick::Confirm => &[DialogButton::Right],
        }
    }
}
