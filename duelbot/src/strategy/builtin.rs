//! Built-in strategies: profile-priority play and the noop fallback.

use std::collections::VecDeque;

use tracing::debug;

use crate::core::profile::{CardEntry, CardTag};
use crate::core::types::{ActionKind, ActionRequest, ActionTarget, Phase};
use crate::strategy::{GameView, Strategy};

/// Passes once per turn and never plays a card.
#[derive(Debug, Clone, Default)]
pub struct NoopStrategy {
    passed: bool,
}

impl NoopStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for NoopStrategy {
    fn name(&self) -> &str {
        "noop"
    }

    fn next_action(&mut self, view: &GameView<'_>) -> Option<ActionRequest> {
        if !view.screen.my_turn || self.passed {
            return None;
        }
        self.passed = true;
        Some(ActionRequest::new(ActionKind::Pass, "noop").with_description("noop strategy passes"))
    }

    fn on_new_turn(&mut self, _turn: u32) {
        self.passed = false;
    }
}

/// Plays hand cards in Main Phase 1 by profile priority, then passes.
///
/// The plan is built once per turn from the first Main 1 screen. Cards whose
/// hold priority outranks their play priority stay in hand, and only the
/// highest-ranked normal summon is kept.
#[derive(Debug, Clone, Default)]
pub struct PriorityStrategy {
    plan: VecDeque<ActionRequest>,
    planned: bool,
    planned_turn: Option<u32>,
}

impl PriorityStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_plan(&mut self, view: &GameView<'_>) {
        let mut candidates: Vec<(f64, usize, &str, &CardEntry)> = view
            .screen
            .hand
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let entry = view.profile.cards.get(name)?;
                let score = entry.main1_priority.max(entry.set_priority);
                (score > 0.0 && score > entry.hold_priority && !entry.has_tag(CardTag::Brick))
                    .then_some((score, index, name.as_str(), entry))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut normal_summoned = false;
        self.plan.clear();
        for (score, index, name, entry) in candidates {
            let kind = play_kind(entry);
            if kind == ActionKind::NormalSummon {
                if normal_summoned {
                    continue;
                }
                normal_summoned = true;
            }
            self.plan.push_back(
                ActionRequest::new(kind, "priority")
                    .with_card(name)
                    .with_target(ActionTarget::HandIndex(index))
                    .with_description(format!("{kind:?} {name} (priority {score})")),
            );
        }
        self.plan.push_back(
            ActionRequest::new(ActionKind::Pass, "priority").with_description("end main phase"),
        );
        self.planned = true;
        self.planned_turn = view.screen.turn;
        debug!(actions = self.plan.len(), turn = ?view.screen.turn, "built main phase plan");
    }
}

fn play_kind(entry: &CardEntry) -> ActionKind {
    if let Some(kind) = entry.play {
        return kind;
    }
    if entry.set_priority > entry.main1_priority {
        return ActionKind::SetSpellTrap;
    }
    if entry.has_tag(CardTag::Starter) || entry.has_tag(CardTag::Extender) {
        return ActionKind::NormalSummon;
    }
    ActionKind::ActivateHand
}

impl Strategy for PriorityStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn next_action(&mut self, view: &GameView<'_>) -> Option<ActionRequest> {
        if !view.screen.my_turn {
            return None;
        }
        if !matches!(view.screen.phase, None | Some(Phase::Main1)) {
            return None;
        }
        if !self.planned || (view.screen.turn.is_some() && view.screen.turn != self.planned_turn) {
            self.build_plan(view);
        }
        self.plan.pop_front()
    }

    fn on_new_turn(&mut self, _turn: u32) {
        self.plan.clear();
        self.planned = false;
    }
}
