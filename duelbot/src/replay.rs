//! Orchestration for `duelbot replay`: a full session against a transcript.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::client::{ClientEvent, TranscriptClient, load_transcript};
use crate::io::config::BotConfig;
use crate::io::dump::FsDumpSink;
use crate::io::pacer::{StopSignal, ThreadPacer};
use crate::io::profile_store::load_deck_profile;
use crate::scheduler::ActionScheduler;
use crate::session::{SessionOutcome, run_session};
use crate::strategy::registry::StrategyRegistry;

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Skip every configured delay.
    pub instant: bool,
    pub stop: StopSignal,
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub session: SessionOutcome,
    pub events: Vec<ClientEvent>,
    pub profile_path: PathBuf,
    pub strategy: String,
}

pub fn run_replay(
    cfg: &BotConfig,
    transcript_path: &Path,
    registry: &StrategyRegistry,
    options: &ReplayOptions,
) -> Result<ReplayOutcome> {
    let loaded = load_deck_profile(&cfg.decks_dir, &cfg.deck, &cfg.legacy_profile_path)?;
    let transcript = load_transcript(transcript_path)
        .with_context(|| format!("load transcript {}", transcript_path.display()))?;
    let strategy = registry.get_strategy(&loaded.profile, &cfg.deck, &cfg.strategy);
    let strategy_name = strategy.name().to_string();

    let mut pacing = cfg.pacing_settings();
    let mut limits = cfg.session_limits();
    if options.instant {
        pacing.action_delay = Duration::ZERO;
        pacing.dialog_click_delay = Duration::ZERO;
        pacing.observation_retry = Duration::ZERO;
        limits.tick_interval = Duration::ZERO;
    }

    let mut scheduler = ActionScheduler::new(
        TranscriptClient::new(transcript),
        ThreadPacer::new(options.stop.clone()),
        FsDumpSink::new(&cfg.dump_dir),
        strategy,
        &loaded.profile,
        pacing,
        cfg.dialog_settings(),
    );
    let session = run_session(&mut scheduler, &limits, |report| {
        debug!(
            turn = ?report.turn,
            executed = report.executed.len(),
            stop = ?report.stop,
            "replay tick"
        );
    });

    Ok(ReplayOutcome {
        session,
        events: scheduler.into_client().into_events(),
        profile_path: loaded.path,
        strategy: strategy_name,
    })
}
