//! Test-only doubles: scripted client and strategy, a virtual-clock pacer,
//! recording dump sinks, and screen builders.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::types::{
    ActionKind, ActionRequest, CardSelection, DialogClick, DialogView, ExecOutcome, Phase, Screen,
};
use crate::io::client::GameClient;
use crate::io::dump::{DumpRecord, DumpSink};
use crate::io::pacer::{Interrupted, Pacer};
use crate::scheduler::PacingSettings;
use crate::strategy::{GameView, Strategy};

/// Own-turn Main 1 screen with `hand`.
pub fn my_turn_screen(turn: u32, hand: &[&str]) -> Screen {
    Screen {
        turn: Some(turn),
        my_turn: true,
        phase: Some(Phase::Main1),
        hand: hand.iter().map(|card| (*card).to_string()).collect(),
        ..Screen::default()
    }
}

pub fn opponent_screen(turn: u32) -> Screen {
    Screen {
        turn: Some(turn),
        my_turn: false,
        phase: Some(Phase::Main1),
        ..Screen::default()
    }
}

/// Own-turn screen with a dialog listing `cards`.
pub fn dialog_screen(turn: u32, cards: &[&str]) -> Screen {
    Screen {
        dialog: Some(DialogView::with_cards(cards.iter().copied())),
        ..my_turn_screen(turn, &[])
    }
}

pub fn ended_screen() -> Screen {
    Screen {
        duel_ended: true,
        ..Screen::default()
    }
}

/// Normal summon of `name`, proposed by "scripted".
pub fn card_action(name: &str) -> ActionRequest {
    ActionRequest::new(ActionKind::NormalSummon, "scripted").with_card(name)
}

pub fn settings_with(max_actions_per_tick: u32, strict_profile: bool) -> PacingSettings {
    PacingSettings {
        max_actions_per_tick,
        strict_profile,
        ..PacingSettings::default()
    }
}

#[derive(Debug, Clone)]
enum FrameSource {
    /// Serve queued frames, then report the duel as ended.
    Queue(VecDeque<Screen>),
    Repeat(Screen),
    /// Serve queued frames, then fail every read.
    QueueThenUnreadable(VecDeque<Screen>),
    Unreadable,
}

/// Game client that serves scripted screens and records every command.
#[derive(Debug, Clone)]
pub struct ScriptedClient {
    frames: FrameSource,
    outcomes: VecDeque<ExecOutcome>,
    failures_left: u32,
    pub executed: Vec<ActionRequest>,
    pub clicks: Vec<DialogClick>,
    pub cancels: u32,
}

impl ScriptedClient {
    fn with_source(frames: FrameSource) -> Self {
        Self {
            frames,
            outcomes: VecDeque::new(),
            failures_left: 0,
            executed: Vec::new(),
            clicks: Vec::new(),
            cancels: 0,
        }
    }

    pub fn new(frames: Vec<Screen>) -> Self {
        Self::with_source(FrameSource::Queue(frames.into()))
    }

    pub fn repeating(screen: Screen) -> Self {
        Self::with_source(FrameSource::Repeat(screen))
    }

    /// Every read fails.
    pub fn unreadable() -> Self {
        Self::with_source(FrameSource::Unreadable)
    }

    /// Serve `frames`, then fail every later read.
    pub fn unreadable_after(frames: Vec<Screen>) -> Self {
        Self::with_source(FrameSource::QueueThenUnreadable(frames.into()))
    }

    /// Make the next `count` executions fail.
    pub fn fail_next_executions(&mut self, count: u32) {
        self.failures_left = count;
    }

    /// Queue an outcome for the next successful execution.
    pub fn push_outcome(&mut self, outcome: ExecOutcome) {
        self.outcomes.push_back(outcome);
    }
}

impl GameClient for ScriptedClient {
    fn read_screen(&mut self) -> Result<Screen> {
        match &mut self.frames {
            FrameSource::Queue(frames) => Ok(frames.pop_front().unwrap_or_else(ended_screen)),
            FrameSource::Repeat(screen) => Ok(screen.clone()),
            FrameSource::QueueThenUnreadable(frames) => {
                frames.pop_front().ok_or_else(|| anyhow!("capture failed"))
            }
            FrameSource::Unreadable => Err(anyhow!("capture failed")),
        }
    }

    fn click_dialog(&mut self, click: &DialogClick) -> Result<()> {
        self.clicks.push(click.clone());
        Ok(())
    }

    fn execute(&mut self, action: &ActionRequest) -> Result<ExecOutcome> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            bail!("scripted failure for {}", action.label());
        }
        self.executed.push(action.clone());
        Ok(self.outcomes.pop_front().unwrap_or(ExecOutcome::Done))
    }

    fn cancel_prompts(&mut self) -> Result<()> {
        self.cancels += 1;
        Ok(())
    }
}

/// Strategy that hands out a fixed queue of proposals.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    queue: VecDeque<ActionRequest>,
    dialog_preference: Option<CardSelection>,
    turns: Rc<RefCell<Vec<u32>>>,
}

impl ScriptedStrategy {
    pub fn new(actions: Vec<ActionRequest>) -> Self {
        Self {
            queue: actions.into(),
            ..Self::default()
        }
    }

    pub fn with_dialog_preference(mut self, selection: CardSelection) -> Self {
        self.dialog_preference = Some(selection);
        self
    }

    /// Shared log of turns passed to `on_new_turn`.
    pub fn turns_seen(&self) -> Rc<RefCell<Vec<u32>>> {
        Rc::clone(&self.turns)
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn next_action(&mut self, _view: &GameView<'_>) -> Option<ActionRequest> {
        self.queue.pop_front()
    }

    fn on_dialog(&mut self, _dialog: &DialogView, _view: &GameView<'_>) -> Option<CardSelection> {
        self.dialog_preference.clone()
    }

    fn on_new_turn(&mut self, turn: u32) {
        self.turns.borrow_mut().push(turn);
    }
}

/// Pacer over a virtual clock. Waits return immediately and advance the clock.
#[derive(Debug)]
pub struct ManualPacer {
    origin: Instant,
    elapsed: Cell<Duration>,
    waits: RefCell<Vec<Duration>>,
    waits_before_stop: Cell<Option<usize>>,
    stopped: Cell<bool>,
}

impl ManualPacer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            waits: RefCell::new(Vec::new()),
            waits_before_stop: Cell::new(None),
            stopped: Cell::new(false),
        }
    }

    /// Non-zero waits completed so far.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }

    /// Let `count` more waits complete, then stop on the next one.
    pub fn stop_after_waits(&self, count: usize) {
        self.waits_before_stop.set(Some(count));
    }

    pub fn stop(&self) {
        self.stopped.set(true);
    }
}

impl Default for ManualPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer for ManualPacer {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn wait(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.stopped.get() {
            return Err(Interrupted);
        }
        match self.waits_before_stop.get() {
            Some(0) => {
                self.stopped.set(true);
                return Err(Interrupted);
            }
            Some(left) => self.waits_before_stop.set(Some(left - 1)),
            None => {}
        }
        if !duration.is_zero() {
            self.waits.borrow_mut().push(duration);
            self.elapsed.set(self.elapsed.get() + duration);
        }
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Dump sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct RecordingDumpSink {
    records: RefCell<Vec<DumpRecord>>,
}

impl RecordingDumpSink {
    pub fn records(&self) -> Vec<DumpRecord> {
        self.records.borrow().clone()
    }
}

impl DumpSink for RecordingDumpSink {
    fn collect(&self, record: &DumpRecord) -> Result<()> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}

/// Dump sink whose every write fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingDumpSink;

impl DumpSink for FailingDumpSink {
    fn collect(&self, _record: &DumpRecord) -> Result<()> {
        bail!("dump disk full")
    }
}

/// Temporary working directory with a `decks/` tree.
pub struct TempDecks {
    dir: TempDir,
}

impl TempDecks {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        fs::create_dir_all(dir.path().join("decks")).context("create decks dir")?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn decks_dir(&self) -> PathBuf {
        self.root().join("decks")
    }

    /// Write `<decks>/<deck>/profile.json`.
    pub fn write_profile(&self, deck: &str, contents: &str) -> Result<PathBuf> {
        let dir = self.decks_dir().join(deck);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join("profile.json");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write an arbitrary file relative to the root.
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
