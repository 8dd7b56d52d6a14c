//! Bot configuration stored in `duelbot.toml`, with `BOT_*` environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::dialog::DialogSettings;
use crate::scheduler::PacingSettings;
use crate::session::{Failsafe, SessionLimits};

/// Upper bound for `dialog.max_cycles`.
pub const MAX_DIALOG_CYCLES: usize = 1024;
/// Upper bound for `dialog.history_window`.
pub const MAX_HISTORY_WINDOW: usize = 2 * MAX_DIALOG_CYCLES;

/// Bot configuration (TOML).
///
/// Missing fields default to values that are safe against a live client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    /// Deck directory name under `decks_dir`, also the strategy registry key.
    pub deck: String,
    /// Strategy variant requested from the registry.
    pub strategy: String,
    pub decks_dir: PathBuf,
    /// Single-profile location used when the deck has no profile of its own.
    pub legacy_profile_path: PathBuf,
    /// Where stuck-dialog diagnostics are written.
    pub dump_dir: PathBuf,
    /// Reject actions naming cards outside the deck profile.
    pub strict_profile: bool,
    pub timing: TimingConfig,
    pub dialog: DialogConfig,
    pub failsafe: FailsafeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_interval_ms: u64,
    /// Minimum spacing between two executed actions.
    pub action_delay_ms: u64,
    /// Wait after each dialog click before observing again.
    pub dialog_click_delay_ms: u64,
    pub observation_retry_ms: u64,
    pub max_actions_per_tick: u32,
    /// Proposals (accepted or rejected) examined per tick before giving up.
    pub max_proposals_per_tick: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DialogConfig {
    /// Occurrences of one dialog signature that declare the episode stuck.
    pub max_cycles: usize,
    /// History capacity. Defaults to `2 * max_cycles - 1` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
    /// Stuck episodes tolerated before the session aborts.
    pub max_stuck_episodes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailsafeConfig {
    pub enabled: bool,
    pub action_limit: u32,
    pub turn_limit: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            action_delay_ms: 200,
            dialog_click_delay_ms: 400,
            observation_retry_ms: 120,
            max_actions_per_tick: 3,
            max_proposals_per_tick: 16,
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            history_window: None,
            max_stuck_episodes: 3,
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            action_limit: 120,
            turn_limit: 50,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            deck: "swordsoul_tenyi".to_string(),
            strategy: "default".to_string(),
            decks_dir: PathBuf::from("decks"),
            legacy_profile_path: PathBuf::from("profile.json"),
            dump_dir: PathBuf::from("bot_dumps"),
            strict_profile: true,
            timing: TimingConfig::default(),
            dialog: DialogConfig::default(),
            failsafe: FailsafeConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.deck.trim().is_empty() {
            return Err(anyhow!("deck must be non-empty"));
        }
        if self.strategy.trim().is_empty() {
            return Err(anyhow!("strategy must be non-empty"));
        }
        if self.timing.tick_interval_ms == 0 {
            return Err(anyhow!("timing.tick_interval_ms must be > 0"));
        }
        if self.timing.max_actions_per_tick == 0 {
            return Err(anyhow!("timing.max_actions_per_tick must be > 0"));
        }
        if self.timing.max_proposals_per_tick < self.timing.max_actions_per_tick {
            return Err(anyhow!(
                "timing.max_proposals_per_tick must be >= timing.max_actions_per_tick"
            ));
        }
        if !(2..=MAX_DIALOG_CYCLES).contains(&self.dialog.max_cycles) {
            return Err(anyhow!("dialog.max_cycles must be in 2..={MAX_DIALOG_CYCLES}"));
        }
        if let Some(window) = self.dialog.history_window {
            if window < self.dialog.max_cycles {
                return Err(anyhow!("dialog.history_window must be >= dialog.max_cycles"));
            }
            if window > MAX_HISTORY_WINDOW {
                return Err(anyhow!("dialog.history_window must be <= {MAX_HISTORY_WINDOW}"));
            }
        }
        if self.dialog.max_stuck_episodes == 0 {
            return Err(anyhow!("dialog.max_stuck_episodes must be > 0"));
        }
        if self.failsafe.enabled && (self.failsafe.action_limit == 0 || self.failsafe.turn_limit == 0)
        {
            return Err(anyhow!("failsafe limits must be > 0 when enabled"));
        }
        Ok(())
    }

    /// Apply `BOT_*` overrides read through `lookup`.
    ///
    /// Unparseable values are skipped with a warning so a typo never replaces a
    /// safe default with zero.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(deck) = read("BOT_DECK").or_else(|| read("BOT_RULESET")) {
            self.deck = deck;
        }
        if let Some(strategy) = read("BOT_STRATEGY") {
            self.strategy = strategy;
        }
        if let Some(dir) = read("BOT_DECKS_DIR") {
            self.decks_dir = PathBuf::from(dir);
        }
        if let Some(path) = read("BOT_PROFILE_PATH") {
            self.legacy_profile_path = PathBuf::from(path);
        }
        if let Some(dir) = read("BOT_DUMP_DIR") {
            self.dump_dir = PathBuf::from(dir);
        }
        override_flag(&mut self.strict_profile, "BOT_STRICT_PROFILE", read("BOT_STRICT_PROFILE"));
        override_number(&mut self.timing.tick_interval_ms, "BOT_TICK_MS", read("BOT_TICK_MS"));
        override_number(
            &mut self.timing.action_delay_ms,
            "BOT_ACTION_DELAY_MS",
            read("BOT_ACTION_DELAY_MS"),
        );
        override_number(
            &mut self.timing.dialog_click_delay_ms,
            "BOT_DIALOG_CLICK_DELAY_MS",
            read("BOT_DIALOG_CLICK_DELAY_MS"),
        );
        override_number(
            &mut self.timing.observation_retry_ms,
            "BOT_OBSERVATION_RETRY_MS",
            read("BOT_OBSERVATION_RETRY_MS"),
        );
        override_number(
            &mut self.timing.max_actions_per_tick,
            "BOT_MAX_ACTIONS_PER_TICK",
            read("BOT_MAX_ACTIONS_PER_TICK"),
        );
        let cycles_key = [
            "BOT_DIALOG_MAX_CYCLES",
            "BOT_STUCK_DIALOG_CYCLE_LIMIT",
            "BOT_DIALOG_MAX_REPEAT",
        ]
        .into_iter()
        .find(|key| read(key).is_some());
        if let Some(key) = cycles_key {
            override_number(&mut self.dialog.max_cycles, key, read(key));
        }
        if let Some(raw) = read("BOT_DIALOG_HISTORY_WINDOW") {
            match raw.parse::<usize>() {
                Ok(window) => self.dialog.history_window = Some(window),
                Err(_) => warn!(key = "BOT_DIALOG_HISTORY_WINDOW", value = %raw, "ignoring invalid override"),
            }
        }
        override_number(
            &mut self.dialog.max_stuck_episodes,
            "BOT_MAX_STUCK_EPISODES",
            read("BOT_MAX_STUCK_EPISODES"),
        );
        override_flag(
            &mut self.failsafe.enabled,
            "BOT_FAILSAFE_ENABLED",
            read("BOT_FAILSAFE_ENABLED"),
        );
        override_number(
            &mut self.failsafe.action_limit,
            "BOT_FAILSAFE_ACTION_LIMIT",
            read("BOT_FAILSAFE_ACTION_LIMIT"),
        );
        override_number(
            &mut self.failsafe.turn_limit,
            "BOT_FAILSAFE_TURN_LIMIT",
            read("BOT_FAILSAFE_TURN_LIMIT"),
        );
    }

    /// Location of the deck's own profile.
    pub fn deck_profile_path(&self) -> PathBuf {
        self.decks_dir.join(&self.deck).join("profile.json")
    }

    pub fn dialog_settings(&self) -> DialogSettings {
        let settings = DialogSettings::new(self.dialog.max_cycles);
        match self.dialog.history_window {
            Some(window) => settings.with_window(window),
            None => settings,
        }
    }

    pub fn pacing_settings(&self) -> PacingSettings {
        PacingSettings {
            action_delay: Duration::from_millis(self.timing.action_delay_ms),
            dialog_click_delay: Duration::from_millis(self.timing.dialog_click_delay_ms),
            observation_retry: Duration::from_millis(self.timing.observation_retry_ms),
            max_actions_per_tick: self.timing.max_actions_per_tick,
            max_proposals_per_tick: self.timing.max_proposals_per_tick,
            strict_profile: self.strict_profile,
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            tick_interval: Duration::from_millis(self.timing.tick_interval_ms),
            max_stuck_episodes: self.dialog.max_stuck_episodes,
            failsafe: self.failsafe.enabled.then_some(Failsafe {
                action_limit: self.failsafe.action_limit,
                turn_limit: self.failsafe.turn_limit,
            }),
        }
    }
}

fn override_number<T: std::str::FromStr>(slot: &mut T, key: &str, raw: Option<String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.parse::<T>() {
        Ok(value) => {
            debug!(key, value = %raw, "applied env override");
            *slot = value;
        }
        Err(_) => warn!(key, value = %raw, "ignoring invalid override"),
    }
}

fn override_flag(slot: &mut bool, key: &str, raw: Option<String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        _ => warn!(key, value = %raw, "ignoring invalid override"),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BotConfig::default()`.
pub fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        let cfg = BotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load the file, then apply process environment overrides and re-validate.
pub fn load_effective_config(path: &Path) -> Result<BotConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg.validate().context("config after BOT_* overrides")?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
