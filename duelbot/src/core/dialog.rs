//! Dialog resolution state machine.
//!
//! The resolver consumes one observation at a time and answers with a
//! [`DialogStep`]. It never touches the client: clicking, waiting, and dumping
//! are the caller's job. This keeps every transition deterministic and
//! testable against plain [`Screen`] values.
//!
//! ```text
//! Observing --dialog--> Clicking --cleared--> Resolved --> Observing
//!                          |
//!                          +--signature seen max_cycles times--> Stuck (until reset)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{DialogStuckError, ObservationError};
use crate::core::profile::Profile;
use crate::core::signature::{Signature, SignatureHistory, SignatureTracker};
use crate::core::types::{CardSelection, DialogClick, DialogView, Screen};

/// Resolver state. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    Observing,
    Clicking,
    Stuck,
    Resolved,
}

/// Loop-detection settings, fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogSettings {
    /// Occurrences of one signature within the window that declare the dialog stuck.
    pub max_cycles: usize,
    /// Capacity of the signature history. Never smaller than `max_cycles`.
    pub window: usize,
}

impl DialogSettings {
    /// Default window `2 * max_cycles - 1` catches frozen screens and two-step
    /// loops at exactly the `max_cycles`-th occurrence.
    pub fn new(max_cycles: usize) -> Self {
        let max_cycles = max_cycles.max(1);
        Self {
            max_cycles,
            window: max_cycles.saturating_mul(2).saturating_sub(1).max(max_cycles),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(self.max_cycles);
        self
    }
}

/// What the caller should do after an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogStep {
    /// No dialog in progress; normal play may proceed.
    Idle,
    /// Click the dialog, then wait the click delay before re-observing.
    Click { signature: Signature, attempt: u32 },
    /// The dialog cleared; the resolver is back to observing.
    Resolved { clicks: u32 },
    /// The episode is stuck and awaits an external reset.
    Blocked,
    /// The observation failed; retry after a short delay.
    Retry { failures: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckReason {
    RepeatedSignature,
    ObservationFailures,
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StuckReason::RepeatedSignature => f.write_str("repeated signature"),
            StuckReason::ObservationFailures => f.write_str("observation failures"),
        }
    }
}

/// Diagnostic payload captured when an episode becomes stuck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckDump {
    pub reason: StuckReason,
    /// Signature that tripped the threshold, if one was observed.
    pub signature: Option<Signature>,
    pub occurrences: usize,
    pub threshold: usize,
    pub clicks: u32,
    /// Oldest-first history window at the time of the transition.
    pub history: Vec<Signature>,
    pub last_error: Option<String>,
}

/// Owns the signature history and dialog state for one session.
#[derive(Debug, Clone)]
pub struct DialogResolver {
    settings: DialogSettings,
    state: DialogState,
    tracker: SignatureTracker,
    clicks: u32,
    observation_failures: usize,
}

impl DialogResolver {
    pub fn new(settings: DialogSettings) -> Self {
        Self {
            settings,
            state: DialogState::Observing,
            tracker: SignatureTracker::new(settings.window),
            clicks: 0,
            observation_failures: 0,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_observing(&self) -> bool {
        self.state == DialogState::Observing
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn history(&self) -> &SignatureHistory {
        self.tracker.history()
    }

    pub fn settings(&self) -> DialogSettings {
        self.settings
    }

    /// Feed one successful screen read.
    ///
    /// Returns `Err` exactly once per episode, on the transition into `Stuck`.
    pub fn observe(&mut self, screen: &Screen) -> Result<DialogStep, DialogStuckError> {
        match self.state {
            DialogState::Stuck => return Ok(DialogStep::Blocked),
            DialogState::Resolved => self.transition(DialogState::Observing),
            DialogState::Observing | DialogState::Clicking => {}
        }

        if !screen.has_dialog() {
            self.observation_failures = 0;
            if self.state == DialogState::Clicking {
                let clicks = self.clicks;
                self.finish_episode();
                return Ok(DialogStep::Resolved { clicks });
            }
            return Ok(DialogStep::Idle);
        }

        // A visible dialog opens the episode even if it cannot be fingerprinted.
        if self.state == DialogState::Observing {
            self.transition(DialogState::Clicking);
        }
        let signature = match self.tracker.observe(screen) {
            Ok(signature) => signature,
            Err(err) => return self.observation_failed(&err),
        };
        self.observation_failures = 0;

        let is_repeat = self.tracker.record(signature.clone());
        let occurrences = self.tracker.occurrences(&signature);

        if occurrences >= self.settings.max_cycles {
            return Err(self.enter_stuck(
                StuckReason::RepeatedSignature,
                Some(signature),
                occurrences,
                None,
            ));
        }
        if is_repeat {
            debug!(%signature, occurrences, threshold = self.settings.max_cycles, "dialog signature repeated");
        }

        self.clicks += 1;
        Ok(DialogStep::Click {
            signature,
            attempt: self.clicks,
        })
    }

    /// Feed one failed screen read.
    pub fn observation_failed(
        &mut self,
        err: &ObservationError,
    ) -> Result<DialogStep, DialogStuckError> {
        if self.state == DialogState::Stuck {
            return Ok(DialogStep::Blocked);
        }
        self.observation_failures = self.observation_failures.saturating_add(1);
        if self.state != DialogState::Clicking {
            warn!(
                error = %err,
                failures = self.observation_failures,
                "screen observation failed outside a dialog episode"
            );
            return Ok(DialogStep::Retry {
                failures: self.observation_failures,
            });
        }
        warn!(
            error = %err,
            failures = self.observation_failures,
            threshold = self.settings.max_cycles,
            "dialog observation failed"
        );
        if self.observation_failures >= self.settings.max_cycles {
            let signature = self.tracker.history().last().cloned();
            let occurrences = signature
                .as_ref()
                .map(|sig| self.tracker.occurrences(sig))
                .unwrap_or(0);
            return Err(self.enter_stuck(
                StuckReason::ObservationFailures,
                signature,
                occurrences,
                Some(err.to_string()),
            ));
        }
        Ok(DialogStep::Retry {
            failures: self.observation_failures,
        })
    }

    /// Begin a fresh episode (new duel, new turn, or after an external recovery).
    pub fn reset(&mut self) {
        if self.state == DialogState::Stuck {
            info!(clicks = self.clicks, "dialog episode reset after stuck");
        }
        self.tracker.clear();
        self.clicks = 0;
        self.observation_failures = 0;
        self.transition(DialogState::Observing);
    }

    fn finish_episode(&mut self) {
        self.transition(DialogState::Resolved);
        debug!(clicks = self.clicks, "dialog resolved");
        self.tracker.clear();
        self.clicks = 0;
        self.transition(DialogState::Observing);
    }

    fn enter_stuck(
        &mut self,
        reason: StuckReason,
        signature: Option<Signature>,
        occurrences: usize,
        last_error: Option<String>,
    ) -> DialogStuckError {
        self.transition(DialogState::Stuck);
        let dump = StuckDump {
            reason,
            signature,
            occurrences,
            threshold: self.settings.max_cycles,
            clicks: self.clicks,
            history: self.tracker.history().to_vec(),
            last_error,
        };
        warn!(
            %reason,
            signature = ?dump.signature.as_ref().map(Signature::as_str),
            occurrences,
            clicks = self.clicks,
            "dialog stuck"
        );
        DialogStuckError { dump }
    }

    fn transition(&mut self, to: DialogState) {
        if self.state != to {
            debug!(from = ?self.state, to = ?to, "dialog state");
            self.state = to;
        }
    }
}

/// Decide how to click a dialog.
///
/// A strategy preference wins when it names a card actually listed, otherwise
/// the profile picks by priority. A dialog without cards is simply confirmed.
pub fn choose_click(
    dialog: &DialogView,
    preference: Option<CardSelection>,
    profile: &Profile,
) -> DialogClick {
    if let Some(selection) = preference {
        if dialog.cards.get(selection.index) == Some(&selection.name) {
            return DialogClick::Pick(selection);
        }
        debug!(index = selection.index, name = %selection.name, "ignoring stale dialog preference");
    }
    match profile.pick_dialog_choice(&dialog.cards) {
        Some(selection) => DialogClick::Pick(selection),
        None => DialogClick::Confirm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UiElement;

    fn dialog(label: &str) -> Screen {
        Screen {
            dialog: Some(DialogView::with_cards([label])),
            ..Screen::default()
        }
    }

    fn clear() -> Screen {
        Screen::default()
    }

    fn resolver(max_cycles: usize) -> DialogResolver {
        DialogResolver::new(DialogSettings::new(max_cycles))
    }

    #[test]
    fn oversized_cycle_limit_saturates_window() {
        let settings = DialogSettings::new(usize::MAX);
        assert_eq!(settings.window, usize::MAX);
        let mut resolver = DialogResolver::new(settings);
        assert!(matches!(
            resolver.observe(&dialog("A")).unwrap(),
            DialogStep::Click { attempt: 1, .. }
        ));
    }

    #[test]
    fn idle_screen_stays_observing() {
        let mut resolver = resolver(3);
        assert_eq!(resolver.observe(&clear()).unwrap(), DialogStep::Idle);
        assert_eq!(resolver.state(), DialogState::Observing);
        assert!(resolver.history().is_empty());
    }

    #[test]
    fn dialog_enters_clicking_and_requests_click() {
        let mut resolver = resolver(3);
        let step = resolver.observe(&dialog("A")).unwrap();
        assert!(matches!(step, DialogStep::Click { attempt: 1, .. }));
        assert_eq!(resolver.state(), DialogState::Clicking);
        assert_eq!(resolver.history().len(), 1);
    }

    #[test]
    fn cleared_dialog_resolves_and_clears_history() {
        let mut resolver = resolver(3);
        resolver.observe(&dialog("A")).unwrap();
        resolver.observe(&dialog("B")).unwrap();
        assert_eq!(
            resolver.observe(&clear()).unwrap(),
            DialogStep::Resolved { clicks: 2 }
        );
        assert_eq!(resolver.state(), DialogState::Observing);
        assert!(resolver.history().is_empty());
        assert_eq!(resolver.clicks(), 0);
    }

    #[test]
    fn reobserving_cleared_screen_after_resolve_is_idle() {
        let mut resolver = resolver(3);
        resolver.observe(&dialog("A")).unwrap();
        resolver.observe(&clear()).unwrap();
        for _ in 0..5 {
            assert_eq!(resolver.observe(&clear()).unwrap(), DialogStep::Idle);
            assert_eq!(resolver.state(), DialogState::Observing);
        }
    }

    #[test]
    fn distinct_signatures_below_threshold_never_stick() {
        let mut resolver = resolver(4);
        for label in ["A", "B", "C"] {
            assert!(resolver.observe(&dialog(label)).is_ok());
        }
        assert_eq!(resolver.state(), DialogState::Clicking);
    }

    #[test]
    fn many_distinct_signatures_never_stick() {
        let mut resolver = resolver(3);
        for n in 0..50 {
            let step = resolver.observe(&dialog(&format!("card-{n}"))).unwrap();
            assert!(matches!(step, DialogStep::Click { .. }));
        }
    }

    #[test]
    fn frozen_dialog_sticks_at_threshold() {
        let mut resolver = resolver(3);
        assert!(resolver.observe(&dialog("A")).is_ok());
        assert!(resolver.observe(&dialog("A")).is_ok());
        let err = resolver.observe(&dialog("A")).unwrap_err();
        assert_eq!(err.dump.reason, StuckReason::RepeatedSignature);
        assert_eq!(err.dump.occurrences, 3);
        assert_eq!(err.dump.clicks, 2);
        assert_eq!(resolver.state(), DialogState::Stuck);
    }

    #[test]
    fn alternating_cycle_sticks_on_fifth_observation() {
        let mut resolver = resolver(3);
        let sequence = ["A", "B", "A", "B", "A"];
        let mut stuck_at = None;
        for (n, label) in sequence.iter().enumerate() {
            if let Err(err) = resolver.observe(&dialog(label)) {
                stuck_at = Some(n + 1);
                assert_eq!(err.dump.signature, Signature::of(&dialog("A")).ok());
                assert_eq!(err.dump.history.len(), 5);
            }
        }
        assert_eq!(stuck_at, Some(5));
    }

    #[test]
    fn stuck_is_reported_exactly_once() {
        let mut resolver = resolver(2);
        resolver.observe(&dialog("A")).unwrap();
        assert!(resolver.observe(&dialog("A")).is_err());
        for screen in [dialog("A"), dialog("B"), clear()] {
            assert_eq!(resolver.observe(&screen).unwrap(), DialogStep::Blocked);
        }
        assert_eq!(
            resolver
                .observation_failed(&ObservationError::EmptyDialog)
                .unwrap(),
            DialogStep::Blocked
        );
        assert_eq!(resolver.state(), DialogState::Stuck);
    }

    #[test]
    fn reset_after_stuck_returns_to_observing() {
        let mut resolver = resolver(2);
        resolver.observe(&dialog("A")).unwrap();
        assert!(resolver.observe(&dialog("A")).is_err());
        resolver.reset();
        assert_eq!(resolver.state(), DialogState::Observing);
        assert!(resolver.history().is_empty());
        assert!(matches!(
            resolver.observe(&dialog("A")).unwrap(),
            DialogStep::Click { attempt: 1, .. }
        ));
    }

    #[test]
    fn narrow_window_forgets_old_occurrences() {
        let settings = DialogSettings::new(3).with_window(3);
        let mut resolver = DialogResolver::new(settings);
        for label in ["A", "B", "A", "B", "A", "B"] {
            assert!(resolver.observe(&dialog(label)).is_ok());
        }
    }

    #[test]
    fn window_never_smaller_than_threshold() {
        assert_eq!(DialogSettings::new(4).with_window(1).window, 4);
        assert_eq!(DialogSettings::new(3).window, 5);
    }

    #[test]
    fn observation_failures_retry_then_stick() {
        let mut resolver = resolver(3);
        resolver.observe(&dialog("A")).unwrap();
        let err = ObservationError::Unreadable("timeout".to_string());
        assert_eq!(
            resolver.observation_failed(&err).unwrap(),
            DialogStep::Retry { failures: 1 }
        );
        assert_eq!(
            resolver.observation_failed(&err).unwrap(),
            DialogStep::Retry { failures: 2 }
        );
        let stuck = resolver.observation_failed(&err).unwrap_err();
        assert_eq!(stuck.dump.reason, StuckReason::ObservationFailures);
        assert_eq!(stuck.dump.last_error.as_deref(), Some("screen unreadable: timeout"));
    }

    #[test]
    fn board_read_failures_outside_episode_never_stick() {
        let mut resolver = resolver(3);
        let err = ObservationError::Unreadable("timeout".to_string());
        for failures in 1..=10 {
            assert_eq!(
                resolver.observation_failed(&err).unwrap(),
                DialogStep::Retry { failures }
            );
        }
        assert_eq!(resolver.state(), DialogState::Observing);
        assert_eq!(resolver.observe(&clear()).unwrap(), DialogStep::Idle);
    }

    #[test]
    fn unfingerprintable_dialog_opens_episode_and_can_stick() {
        let mut resolver = resolver(2);
        let empty = Screen {
            dialog: Some(DialogView::default()),
            ..Screen::default()
        };
        assert_eq!(
            resolver.observe(&empty).unwrap(),
            DialogStep::Retry { failures: 1 }
        );
        assert_eq!(resolver.state(), DialogState::Clicking);
        let stuck = resolver.observe(&empty).unwrap_err();
        assert_eq!(stuck.dump.reason, StuckReason::ObservationFailures);
    }

    #[test]
    fn successful_read_clears_failure_streak() {
        let mut resolver = resolver(2);
        let err = ObservationError::EmptyDialog;
        assert!(resolver.observation_failed(&err).is_ok());
        assert!(resolver.observe(&dialog("A")).is_ok());
        assert!(resolver.observation_failed(&err).is_ok());
    }

    #[test]
    fn unobservable_dialog_counts_as_failure() {
        let mut resolver = resolver(3);
        let mut screen = dialog("A");
        screen.dialog.as_mut().unwrap().elements = vec![UiElement::new("", 1, 1)];
        assert_eq!(
            resolver.observe(&screen).unwrap(),
            DialogStep::Retry { failures: 1 }
        );
    }

    #[test]
    fn choose_click_prefers_strategy_then_priority_then_first() {
        let view = DialogView::with_cards(["Mo Ye", "Taia", "Longyuan"]);
        let mut profile = Profile::from_names("swordsoul", ["Mo Ye", "Taia", "Longyuan"]);
        profile.dialog_pick_priority = vec!["Longyuan".to_string(), "Taia".to_string()];

        let preferred = CardSelection {
            index: 1,
            name: "Taia".to_string(),
        };
        assert_eq!(
            choose_click(&view, Some(preferred.clone()), &profile),
            DialogClick::Pick(preferred)
        );

        assert_eq!(
            choose_click(&view, None, &profile),
            DialogClick::Pick(CardSelection {
                index: 2,
                name: "Longyuan".to_string()
            })
        );

        profile.dialog_pick_priority.clear();
        assert_eq!(
            choose_click(&view, None, &profile),
            DialogClick::Pick(CardSelection {
                index: 0,
                name: "Mo Ye".to_string()
            })
        );
    }

    #[test]
    fn choose_click_ignores_stale_preference_and_confirms_empty_lists() {
        let profile = Profile::from_names("swordsoul", ["Mo Ye"]);
        let view = DialogView::with_cards(["Mo Ye"]);
        let stale = CardSelection {
            index: 3,
            name: "Taia".to_string(),
        };
        assert_eq!(
            choose_click(&view, Some(stale), &profile),
            DialogClick::Pick(CardSelection {
                index: 0,
                name: "Mo Ye".to_string()
            })
        );
        let buttons_only = DialogView {
            cards: Vec::new(),
            elements: vec![UiElement::new("ok", 0, 0)],
        };
        assert_eq!(choose_click(&buttons_only, None, &profile), DialogClick::Confirm);
    }
}
