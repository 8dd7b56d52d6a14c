//! Stable exit codes for duelbot CLI commands.

/// Command succeeded, or the session ended with the duel or a stop request.
pub const OK: i32 = 0;
/// Command failed due to invalid config, profile, transcript, or other errors.
pub const INVALID: i32 = 1;
/// The session gave up after too many stuck dialog episodes.
pub const STUCK: i32 = 3;
/// The session hit a failsafe action or turn limit.
pub const FAILSAFE: i32 = 4;
