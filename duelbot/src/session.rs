//! Multi-tick session loop.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::io::client::GameClient;
use crate::io::dump::DumpSink;
use crate::io::pacer::Pacer;
use crate::scheduler::{ActionScheduler, TickReport, TickStop};

/// Hard caps that end a session even while the duel goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failsafe {
    pub action_limit: u32,
    pub turn_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    pub tick_interval: Duration,
    /// Stuck episodes after which the session gives up instead of recovering.
    pub max_stuck_episodes: u32,
    pub failsafe: Option<Failsafe>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            max_stuck_episodes: 3,
            failsafe: Some(Failsafe {
                action_limit: 120,
                turn_limit: 50,
            }),
        }
    }
}

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SessionStop {
    DuelEnded,
    /// The stop signal fired.
    Stopped,
    StuckLimit { episodes: u32 },
    ActionLimit { actions: u32 },
    TurnLimit { turns: u32 },
}

/// Summary of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub ticks: u32,
    pub actions_executed: u32,
    pub actions_failed: u32,
    pub actions_rejected: u32,
    pub dialog_clicks: u32,
    pub stuck_episodes: u32,
    pub turns_seen: u32,
    pub stop: SessionStop,
}

/// Tick until the duel ends, the stop signal fires, or a limit is reached.
///
/// A stuck dialog is recovered by cancelling prompts and resetting the episode,
/// up to `max_stuck_episodes` times.
pub fn run_session<C, P, D, F>(
    scheduler: &mut ActionScheduler<'_, C, P, D>,
    limits: &SessionLimits,
    mut on_tick: F,
) -> SessionOutcome
where
    C: GameClient,
    P: Pacer,
    D: DumpSink,
    F: FnMut(&TickReport),
{
    let mut outcome = SessionOutcome {
        ticks: 0,
        actions_executed: 0,
        actions_failed: 0,
        actions_rejected: 0,
        dialog_clicks: 0,
        stuck_episodes: 0,
        turns_seen: 0,
        stop: SessionStop::Stopped,
    };

    loop {
        let now = scheduler.pacer().now();
        outcome.ticks += 1;
        match scheduler.tick(now) {
            Ok(report) => {
                outcome.actions_executed += report.executed.len() as u32;
                outcome.actions_failed += report.failed.len() as u32;
                outcome.actions_rejected += report.rejected.len() as u32;
                outcome.dialog_clicks += u32::from(report.click.is_some());
                outcome.turns_seen += u32::from(report.new_turn);
                on_tick(&report);

                match report.stop {
                    TickStop::DuelEnded => {
                        outcome.stop = SessionStop::DuelEnded;
                        break;
                    }
                    TickStop::Stopped => {
                        outcome.stop = SessionStop::Stopped;
                        break;
                    }
                    _ => {}
                }
                if let Some(stop) = failsafe_stop(limits.failsafe, &outcome) {
                    warn!(?stop, "failsafe limit reached");
                    outcome.stop = stop;
                    break;
                }
            }
            Err(stuck) => {
                outcome.stuck_episodes += 1;
                error!(
                    error = %stuck,
                    episodes = outcome.stuck_episodes,
                    limit = limits.max_stuck_episodes,
                    "dialog episode stuck"
                );
                if outcome.stuck_episodes >= limits.max_stuck_episodes {
                    outcome.stop = SessionStop::StuckLimit {
                        episodes: outcome.stuck_episodes,
                    };
                    break;
                }
                if let Err(err) = scheduler.recover_from_stuck() {
                    warn!(error = %format!("{err:#}"), "stuck recovery incomplete");
                }
            }
        }

        if scheduler.pacer().wait(limits.tick_interval).is_err() {
            outcome.stop = SessionStop::Stopped;
            break;
        }
    }

    info!(
        ticks = outcome.ticks,
        actions = outcome.actions_executed,
        stuck = outcome.stuck_episodes,
        stop = ?outcome.stop,
        "session finished"
    );
    outcome
}

fn failsafe_stop(failsafe: Option<Failsafe>, outcome: &SessionOutcome) -> Option<SessionStop> {
    let failsafe = failsafe?;
    if outcome.actions_executed >= failsafe.action_limit {
        return Some(SessionStop::ActionLimit {
            actions: outcome.actions_executed,
        });
    }
    if outcome.turns_seen >= failsafe.turn_limit {
        return Some(SessionStop::TurnLimit {
            turns: outcome.turns_seen,
        });
    }
    None
}
