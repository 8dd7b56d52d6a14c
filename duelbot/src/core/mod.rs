//! Deterministic, pure logic shared by the bot core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! observations and return deterministic outputs suitable for tests. Waiting,
//! clicking, and persistence live in the orchestration and `io` layers.

pub mod budget;
pub mod dialog;
pub mod error;
pub mod filter;
pub mod profile;
pub mod signature;
pub mod types;
