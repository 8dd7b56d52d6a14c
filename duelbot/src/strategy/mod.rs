//! Strategy abstractions: deck logic that proposes actions.
//!
//! A [`Strategy`] only proposes. Filtering, pacing, and execution belong to the
//! scheduler, so a strategy never talks to the game client directly.

use crate::core::profile::Profile;
use crate::core::types::{ActionRequest, CardSelection, DialogView, Screen};

pub mod builtin;
pub mod registry;

/// Read-only context handed to a strategy for one tick.
#[derive(Debug, Clone, Copy)]
pub struct GameView<'a> {
    pub screen: &'a Screen,
    pub profile: &'a Profile,
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Next action to try this tick, or `None` when the strategy has nothing left.
    fn next_action(&mut self, view: &GameView<'_>) -> Option<ActionRequest>;

    /// Preferred card for the open dialog. `None` defers to the profile's pick priority.
    fn on_dialog(&mut self, _dialog: &DialogView, _view: &GameView<'_>) -> Option<CardSelection> {
        None
    }

    fn on_new_turn(&mut self, _turn: u32) {}
}
