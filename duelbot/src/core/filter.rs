//! Allow-list filtering of proposed actions.

use tracing::warn;

use crate::core::profile::Profile;
use crate::core::types::ActionRequest;

/// Fail-closed gate between strategies and the scheduler.
///
/// In strict mode an action naming a card outside the profile never reaches
/// execution. Actions without a card name (phase changes, pass) always pass.
#[derive(Debug, Clone, Copy)]
pub struct ProfileFilter<'a> {
    profile: &'a Profile,
    strict: bool,
}

impl<'a> ProfileFilter<'a> {
    pub fn new(profile: &'a Profile, strict: bool) -> Self {
        Self { profile, strict }
    }

    pub fn accept(&self, request: &ActionRequest) -> bool {
        if !self.strict {
            return true;
        }
        let Some(name) = request.card_name.as_deref() else {
            return true;
        };
        if self.profile.is_eligible(name) {
            return true;
        }
        warn!(
            card = name,
            kind = ?request.kind,
            proposer = %request.proposer,
            deck = %self.profile.deck_name,
            "action blocked by strict profile"
        );
        false
    }
}
