//! I/O helpers: game client, pacing, config, profiles, and dumps.

pub mod client;
pub mod config;
pub mod decklist;
pub mod dump;
pub mod pacer;
pub mod profile_store;
