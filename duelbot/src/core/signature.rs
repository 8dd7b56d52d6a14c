//! Screen fingerprints and the bounded history used for loop detection.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::ObservationError;
use crate::core::types::{DialogView, Screen};

/// Comparable fingerprint of an observed screen.
///
/// Equal signatures mean "same apparent dialog state".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Fingerprint a screen. Dialog screens hash the dialog contents only.
    pub fn of(screen: &Screen) -> Result<Self, ObservationError> {
        let mut hasher = Sha256::new();
        match &screen.dialog {
            Some(dialog) => hash_dialog(&mut hasher, dialog)?,
            None => {
                hasher.update(b"board\n");
                hasher.update(format!("turn:{:?}\n", screen.turn).as_bytes());
                hasher.update(format!("mine:{}\n", screen.my_turn).as_bytes());
                hasher.update(format!("phase:{:?}\n", screen.phase).as_bytes());
                for card in &screen.hand {
                    hasher.update(format!("hand:{}:{card}\n", card.len()).as_bytes());
                }
            }
        }
        let digest = hasher.finalize();
        Ok(Self(hex::encode(&digest[..8])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_dialog(hasher: &mut Sha256, dialog: &DialogView) -> Result<(), ObservationError> {
    if dialog.cards.is_empty() && dialog.elements.is_empty() {
        return Err(ObservationError::EmptyDialog);
    }
    hasher.update(b"dialog\n");
    for card in &dialog.cards {
        // Length prefix keeps ("ab","c") and ("a","bc") apart.
        hasher.update(format!("card:{}:{card}\n", card.len()).as_bytes());
    }
    for (index, element) in dialog.elements.iter().enumerate() {
        if element.id.trim().is_empty() {
            return Err(ObservationError::MissingElementId { index });
        }
        hasher.update(
            format!(
                "el:{}:{}@{},{}\n",
                element.id.len(),
                element.id,
                element.x,
                element.y
            )
            .as_bytes(),
        );
    }
    Ok(())
}

/// Entries allocated up front; larger windows grow on demand.
const PREALLOCATED_ENTRIES: usize = 64;

/// Bounded FIFO of recent signatures. The oldest entry is evicted when full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHistory {
    entries: VecDeque<Signature>,
    capacity: usize,
}

impl SignatureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(PREALLOCATED_ENTRIES)),
            capacity,
        }
    }

    /// Append `sig`, returning the evicted entry if the window was full.
    pub fn push(&mut self, sig: Signature) -> Option<Signature> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(sig);
        evicted
    }

    pub fn occurrences(&self, sig: &Signature) -> usize {
        self.entries.iter().filter(|entry| *entry == sig).count()
    }

    pub fn contains(&self, sig: &Signature) -> bool {
        self.entries.contains(sig)
    }

    pub fn last(&self) -> Option<&Signature> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest-first copy of the window.
    pub fn to_vec(&self) -> Vec<Signature> {
        self.entries.iter().cloned().collect()
    }
}

/// Computes signatures and records them into a bounded history.
#[derive(Debug, Clone)]
pub struct SignatureTracker {
    history: SignatureHistory,
}

impl SignatureTracker {
    pub fn new(window: usize) -> Self {
        Self {
            history: SignatureHistory::new(window),
        }
    }

    pub fn observe(&self, screen: &Screen) -> Result<Signature, ObservationError> {
        Signature::of(screen)
    }

    /// Record `sig`; returns whether it already occurred in the current window.
    pub fn record(&mut self, sig: Signature) -> bool {
        let is_repeat = self.history.contains(&sig);
        self.history.push(sig);
        is_repeat
    }

    pub fn occurrences(&self, sig: &Signature) -> usize {
        self.history.occurrences(sig)
    }

    pub fn history(&self) -> &SignatureHistory {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Phase, UiElement};

    fn dialog_screen(cards: &[&str]) -> Screen {
        Screen {
            dialog: Some(DialogView::with_cards(cards.iter().copied())),
            ..Screen::default()
        }
    }

    fn sig(label: &str) -> Signature {
        Signature::of(&dialog_screen(&[label])).expect("signature")
    }

    #[test]
    fn unchanged_dialog_yields_equal_signatures() {
        let a = dialog_screen(&["Mo Ye", "Taia"]);
        let b = dialog_screen(&["Mo Ye", "Taia"]);
        assert_eq!(Signature::of(&a).unwrap(), Signature::of(&b).unwrap());
    }

    #[test]
    fn card_order_and_boundaries_change_signature() {
        let base = Signature::of(&dialog_screen(&["ab", "c"])).unwrap();
        assert_ne!(base, Signature::of(&dialog_screen(&["a", "bc"])).unwrap());
        assert_ne!(base, Signature::of(&dialog_screen(&["c", "ab"])).unwrap());
    }

    #[test]
    fn element_position_changes_signature() {
        let mut a = dialog_screen(&["Mo Ye"]);
        let mut b = a.clone();
        a.dialog.as_mut().unwrap().elements = vec![UiElement::new("ok", 10, 20)];
        b.dialog.as_mut().unwrap().elements = vec![UiElement::new("ok", 10, 21)];
        assert_ne!(Signature::of(&a).unwrap(), Signature::of(&b).unwrap());
    }

    #[test]
    fn board_signature_tracks_phase() {
        let a = Screen {
            turn: Some(2),
            my_turn: true,
            phase: Some(Phase::Main1),
            ..Screen::default()
        };
        let mut b = a.clone();
        b.phase = Some(Phase::Battle);
        assert_ne!(Signature::of(&a).unwrap(), Signature::of(&b).unwrap());
        assert_eq!(Signature::of(&a).unwrap().as_str().len(), 16);
    }

    #[test]
    fn empty_dialog_cannot_be_observed() {
        let screen = Screen {
            dialog: Some(DialogView::default()),
            ..Screen::default()
        };
        assert_eq!(Signature::of(&screen), Err(ObservationError::EmptyDialog));
    }

    #[test]
    fn blank_element_id_cannot_be_observed() {
        let mut screen = dialog_screen(&["Mo Ye"]);
        screen.dialog.as_mut().unwrap().elements =
            vec![UiElement::new("ok", 0, 0), UiElement::new(" ", 0, 0)];
        assert_eq!(
            Signature::of(&screen),
            Err(ObservationError::MissingElementId { index: 1 })
        );
    }

    #[test]
    fn history_evicts_oldest_when_full() {
        let mut history = SignatureHistory::new(2);
        assert_eq!(history.push(sig("a")), None);
        assert_eq!(history.push(sig("b")), None);
        assert_eq!(history.push(sig("c")), Some(sig("a")));
        assert_eq!(history.to_vec(), vec![sig("b"), sig("c")]);
    }

    #[test]
    fn huge_window_does_not_allocate_up_front() {
        let mut history = SignatureHistory::new(usize::MAX);
        assert_eq!(history.capacity(), usize::MAX);
        history.push(sig("a"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn record_reports_repeat_within_window_only() {
        let mut tracker = SignatureTracker::new(2);
        assert!(!tracker.record(sig("a")));
        assert!(tracker.record(sig("a")));
        assert!(!tracker.record(sig("b")));
        // window is now [a, b]; a third distinct pushes a out
        assert!(!tracker.record(sig("c")));
        assert!(!tracker.record(sig("a")));
        assert_eq!(tracker.occurrences(&sig("a")), 1);
    }
}
