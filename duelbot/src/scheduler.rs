//! Orchestration for a single scheduling tick.
//!
//! One tick reads the screen once. An open dialog preempts play: the tick
//! clicks at most once and executes nothing. Otherwise the strategy is asked
//! for proposals, which are filtered against the profile, spaced by the action
//! delay, and executed until the tick budget runs out.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::TickBudget;
use crate::core::dialog::{DialogResolver, DialogSettings, DialogStep, choose_click};
use crate::core::error::{DialogStuckError, ObservationError};
use crate::core::filter::ProfileFilter;
use crate::core::profile::Profile;
use crate::core::types::{ActionRequest, DialogClick, DialogView, ExecOutcome, Screen};
use crate::io::client::GameClient;
use crate::io::dump::{DumpRecord, DumpSink};
use crate::io::pacer::{Interrupted, Pacer};
use crate::strategy::{GameView, Strategy};

/// Confirm clicks sent after cancelling prompts during stuck recovery.
const RECOVERY_CONFIRMS: usize = 2;

/// Timing and gating knobs for the scheduler, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingSettings {
    pub action_delay: Duration,
    pub dialog_click_delay: Duration,
    pub observation_retry: Duration,
    pub max_actions_per_tick: u32,
    pub max_proposals_per_tick: u32,
    pub strict_profile: bool,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            action_delay: Duration::from_millis(200),
            dialog_click_delay: Duration::from_millis(400),
            observation_retry: Duration::from_millis(120),
            max_actions_per_tick: 3,
            max_proposals_per_tick: 16,
            strict_profile: true,
        }
    }
}

/// Why a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStop {
    DuelEnded,
    /// The tick was spent on dialog handling (click, retry, or blocked).
    Dialog,
    NotMyTurn,
    BudgetSpent,
    /// The strategy had no further proposal.
    Exhausted,
    TurnEnded,
    ProposalLimit,
    Stopped,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub turn: Option<u32>,
    pub new_turn: bool,
    pub dialog: Option<DialogStep>,
    pub click: Option<DialogClick>,
    pub executed: Vec<ActionRequest>,
    /// Actions that failed on every attempt. They still consumed budget.
    pub failed: Vec<ActionRequest>,
    pub rejected: Vec<ActionRequest>,
    /// Accepted proposal dropped because a stop arrived before it ran.
    pub interrupted: Option<ActionRequest>,
    pub stop: TickStop,
}

impl TickReport {
    fn new() -> Self {
        Self {
            turn: None,
            new_turn: false,
            dialog: None,
            click: None,
            executed: Vec::new(),
            failed: Vec::new(),
            rejected: Vec::new(),
            interrupted: None,
            stop: TickStop::Exhausted,
        }
    }
}

/// Drives one duel session tick by tick.
pub struct ActionScheduler<'p, C, P, D> {
    client: C,
    pacer: P,
    dumps: D,
    strategy: Box<dyn Strategy>,
    profile: &'p Profile,
    settings: PacingSettings,
    resolver: DialogResolver,
    budget: TickBudget,
    last_action_at: Option<Instant>,
    current_turn: Option<u32>,
}

impl<'p, C: GameClient, P: Pacer, D: DumpSink> ActionScheduler<'p, C, P, D> {
    pub fn new(
        client: C,
        pacer: P,
        dumps: D,
        strategy: Box<dyn Strategy>,
        profile: &'p Profile,
        settings: PacingSettings,
        dialog: DialogSettings,
    ) -> Self {
        let budget = TickBudget::new(settings.max_actions_per_tick);
        Self {
            client,
            pacer,
            dumps,
            strategy,
            profile,
            settings,
            resolver: DialogResolver::new(dialog),
            budget,
            last_action_at: None,
            current_turn: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    pub fn dumps(&self) -> &D {
        &self.dumps
    }

    pub fn resolver(&self) -> &DialogResolver {
        &self.resolver
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn current_turn(&self) -> Option<u32> {
        self.current_turn
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Run one tick.
    ///
    /// Returns `Err` only on the transition into a stuck dialog. The dump has
    /// already been handed to the sink by then.
    #[instrument(skip_all, fields(turn = ?self.current_turn))]
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, DialogStuckError> {
        let mut report = TickReport::new();
        if self.pacer.is_stopped() {
            report.stop = TickStop::Stopped;
            return Ok(report);
        }

        let screen = match self.client.read_screen() {
            Ok(screen) => screen,
            Err(err) => {
                let failure = ObservationError::Unreadable(format!("{err:#}"));
                let step = match self.resolver.observation_failed(&failure) {
                    Ok(step) => step,
                    Err(stuck) => return Err(self.report_stuck(stuck)),
                };
                report.stop = self.settle(&step);
                report.dialog = Some(step);
                return Ok(report);
            }
        };

        report.turn = screen.turn;
        if screen.duel_ended {
            info!(turn = ?screen.turn, "duel ended");
            report.stop = TickStop::DuelEnded;
            return Ok(report);
        }
        if let Some(turn) = screen.turn {
            if self.current_turn != Some(turn) {
                self.begin_turn(turn);
                report.new_turn = true;
            }
        }

        let step = match self.resolver.observe(&screen) {
            Ok(step) => step,
            Err(stuck) => return Err(self.report_stuck(stuck)),
        };
        match &step {
            DialogStep::Idle => {}
            DialogStep::Resolved { clicks } => {
                info!(clicks = *clicks, "dialog resolved");
                report.dialog = Some(step.clone());
            }
            DialogStep::Click { .. } => {
                let empty = DialogView::default();
                let dialog = screen.dialog.as_ref().unwrap_or(&empty);
                report.click = Some(self.click(dialog, &screen));
                report.stop = self.settle(&step);
                report.dialog = Some(step.clone());
                return Ok(report);
            }
            DialogStep::Blocked | DialogStep::Retry { .. } => {
                report.stop = self.settle(&step);
                report.dialog = Some(step.clone());
                return Ok(report);
            }
        }

        if !screen.my_turn {
            report.stop = TickStop::NotMyTurn;
            return Ok(report);
        }
        let stop = self.play(&screen, &mut report);
        report.stop = stop;
        debug!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            rejected = report.rejected.len(),
            stop = ?report.stop,
            elapsed_ms = u64::try_from(self.pacer.now().saturating_duration_since(now).as_millis())
                .unwrap_or(u64::MAX),
            "tick finished"
        );
        Ok(report)
    }

    /// Back out of a stuck dialog and start a fresh episode.
    ///
    /// Cancels pending prompts, then confirms twice to clear whatever the
    /// cancel left on screen. The episode is reset even if any step fails.
    pub fn recover_from_stuck(&mut self) -> Result<()> {
        let cancelled = self.client.cancel_prompts();
        let mut confirmed = Ok(());
        for _ in 0..RECOVERY_CONFIRMS {
            if let Err(err) = self.client.click_dialog(&DialogClick::Confirm) {
                confirmed = Err(err);
                break;
            }
            if self.pacer.wait(self.settings.dialog_click_delay).is_err() {
                break;
            }
        }
        self.resolver.reset();
        cancelled.context("cancel pending prompts")?;
        confirmed.context("confirm after cancel")
    }

    fn begin_turn(&mut self, turn: u32) {
        info!(turn, previous = ?self.current_turn, "new turn");
        if !self.resolver.is_observing() {
            debug!(state = ?self.resolver.state(), "resetting dialog episode on new turn");
        }
        self.resolver.reset();
        self.strategy.on_new_turn(turn);
        self.current_turn = Some(turn);
    }

    fn click(&mut self, dialog: &DialogView, screen: &Screen) -> DialogClick {
        let view = GameView {
            screen,
            profile: self.profile,
        };
        let preference = self.strategy.on_dialog(dialog, &view);
        let click = choose_click(dialog, preference, self.profile);
        match self.client.click_dialog(&click) {
            Ok(()) => debug!(?click, "clicked dialog"),
            // The next observation sees the same signature and counts it.
            Err(err) => warn!(?click, error = %format!("{err:#}"), "dialog click failed"),
        }
        click
    }

    /// Wait out the delay that follows a dialog step.
    fn settle(&self, step: &DialogStep) -> TickStop {
        let delay = match step {
            DialogStep::Click { .. } => self.settings.dialog_click_delay,
            DialogStep::Retry { .. } => self.settings.observation_retry,
            DialogStep::Idle | DialogStep::Resolved { .. } | DialogStep::Blocked => {
                return TickStop::Dialog;
            }
        };
        match self.pacer.wait(delay) {
            Ok(()) => TickStop::Dialog,
            Err(Interrupted) => TickStop::Stopped,
        }
    }

    fn play(&mut self, screen: &Screen, report: &mut TickReport) -> TickStop {
        self.budget.reset();
        let filter = ProfileFilter::new(self.profile, self.settings.strict_profile);
        let view = GameView {
            screen,
            profile: self.profile,
        };
        let mut proposals = 0u32;
        loop {
            if self.budget.is_exhausted() {
                return TickStop::BudgetSpent;
            }
            if proposals >= self.settings.max_proposals_per_tick {
                warn!(proposals, "proposal limit reached");
                return TickStop::ProposalLimit;
            }
            let Some(action) = self.strategy.next_action(&view) else {
                return TickStop::Exhausted;
            };
            proposals += 1;
            if !filter.accept(&action) {
                report.rejected.push(action);
                continue;
            }
            if self.pace().is_err() {
                debug!(action = %action.label(), "stop requested before action");
                report.interrupted = Some(action);
                return TickStop::Stopped;
            }
            self.budget.consume();
            match self.execute(&action) {
                Ok(Some(ExecOutcome::Done)) => report.executed.push(action),
                Ok(Some(ExecOutcome::TurnEnded)) => {
                    report.executed.push(action);
                    return TickStop::TurnEnded;
                }
                Ok(None) => report.failed.push(action),
                Err(Interrupted) => {
                    report.failed.push(action);
                    return TickStop::Stopped;
                }
            }
        }
    }

    /// Block until `action_delay` has passed since the last action finished.
    fn pace(&self) -> Result<(), Interrupted> {
        let Some(last) = self.last_action_at else {
            return Ok(());
        };
        let elapsed = self.pacer.now().saturating_duration_since(last);
        if elapsed < self.settings.action_delay {
            self.pacer.wait(self.settings.action_delay - elapsed)?;
        }
        Ok(())
    }

    /// Execute with retries. `Ok(None)` means every attempt failed.
    fn execute(&mut self, action: &ActionRequest) -> Result<Option<ExecOutcome>, Interrupted> {
        let attempts = action.retries.max(1);
        for attempt in 1..=attempts {
            match self.client.execute(action) {
                Ok(outcome) => {
                    self.last_action_at = Some(self.pacer.now());
                    info!(
                        action = %action.label(),
                        proposer = %action.proposer,
                        attempt,
                        ?outcome,
                        "executed action"
                    );
                    return Ok(Some(outcome));
                }
                Err(err) => {
                    warn!(
                        action = %action.label(),
                        attempt,
                        attempts,
                        error = %format!("{err:#}"),
                        "action failed"
                    );
                    if attempt < attempts {
                        self.pacer
                            .wait(Duration::from_millis(action.retry_delay_ms))?;
                    }
                }
            }
        }
        self.last_action_at = Some(self.pacer.now());
        Ok(None)
    }

    fn report_stuck(&self, stuck: DialogStuckError) -> DialogStuckError {
        let record = DumpRecord {
            captured_at: Utc::now(),
            deck: self.profile.deck_name.clone(),
            turn: self.current_turn,
            dump: stuck.dump.clone(),
        };
        if let Err(err) = self.dumps.collect(&record) {
            warn!(error = %format!("{err:#}"), "failed to collect stuck dump");
        }
        stuck
    }
}
