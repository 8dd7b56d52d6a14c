//! Dialog-aware duel bot.
//!
//! The bot watches a card-game client, clicks through modal dialogs until they
//! clear (or declares them stuck), and otherwise plays actions proposed by a
//! deck strategy at a bounded, paced rate. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (signatures, dialog state machine,
//!   profile filtering, tick budget). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting boundaries (game client, pacing clock, config,
//!   profile files, dumps). Isolated behind traits to enable scripted doubles.
//!
//! Orchestration modules ([`scheduler`], [`session`], [`replay`]) coordinate
//! core logic with I/O to implement the CLI commands. Deck logic lives in
//! [`strategy`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod replay;
pub mod scheduler;
pub mod session;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
