//! Typed errors raised by the duel core.

use thiserror::Error;

use crate::core::dialog::StuckDump;

/// The current screen could not be reduced to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservationError {
    #[error("dialog shown without cards or elements")]
    EmptyDialog,
    #[error("dialog element {index} has an empty id")]
    MissingElementId { index: usize },
    #[error("screen unreadable: {0}")]
    Unreadable(String),
}

/// The dialog resolver gave up on the current episode.
///
/// The episode stays blocked until the session controller resets it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dialog stuck ({}) after {} clicks", .dump.reason, .dump.clicks)]
pub struct DialogStuckError {
    pub dump: StuckDump,
}

/// A profile document that cannot be interpreted at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("profile must be a JSON object")]
    NotAnObject,
}
