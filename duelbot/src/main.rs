use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use duelbot::exit_codes;
use duelbot::io::client::ClientEvent;
use duelbot::io::config::{BotConfig, load_effective_config, write_config};
use duelbot::io::decklist::import_decklists;
use duelbot::io::profile_store::load_deck_profile;
use duelbot::logging;
use duelbot::replay::{ReplayOptions, run_replay};
use duelbot::session::{SessionOutcome, SessionStop};
use duelbot::strategy::registry::StrategyRegistry;

#[derive(Parser)]
#[command(
    name = "duelbot",
    version,
    about = "Dialog-aware duel bot with paced action scheduling"
)]
struct Cli {
    /// Config file. Missing files fall back to defaults; `BOT_*` env vars override.
    #[arg(long, global = true, default_value = "duelbot.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full session against a recorded transcript.
    Replay {
        transcript: PathBuf,
        /// Skip all pacing delays.
        #[arg(long)]
        instant: bool,
        /// Print the outcome and client events as JSON.
        #[arg(long)]
        json: bool,
        /// Stop the session after this many seconds of wall-clock time.
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,
    },
    /// Deck profile tools.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Configuration tools.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Load and validate the deck profile the bot would use.
    Check {
        /// Deck to check instead of the configured one.
        #[arg(long)]
        deck: Option<String>,
    },
    /// Rebuild `dialog_pick_priority` from plain-text decklists.
    ImportDecklist {
        #[arg(long = "decklist", required = true)]
        decklists: Vec<PathBuf>,
        /// Profile to update. Defaults to the configured deck's profile.
        #[arg(long)]
        profile: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective config (file plus env overrides) as TOML.
    Show,
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            transcript,
            instant,
            json,
            time_limit,
        } => cmd_replay(&cli.config, &transcript, instant, json, time_limit),
        Command::Profile { command } => match command {
            ProfileCommand::Check { deck } => cmd_profile_check(&cli.config, deck),
            ProfileCommand::ImportDecklist { decklists, profile } => {
                cmd_import_decklist(&cli.config, &decklists, profile)
            }
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => cmd_config_show(&cli.config),
            ConfigCommand::Init { force } => cmd_config_init(&cli.config, force),
        },
    }
}

#[derive(Serialize)]
struct ReplayReport<'a> {
    strategy: &'a str,
    profile_path: &'a Path,
    outcome: &'a SessionOutcome,
    events: &'a [ClientEvent],
}

fn cmd_replay(
    config: &Path,
    transcript: &Path,
    instant: bool,
    json: bool,
    time_limit: Option<u64>,
) -> Result<i32> {
    let cfg = load_effective_config(config)?;
    let options = ReplayOptions {
        instant,
        ..ReplayOptions::default()
    };
    // Detached: the process exits when the replay returns.
    if let Some(secs) = time_limit {
        let _timer = options.stop.stop_after(Duration::from_secs(secs));
    }
    let replay = run_replay(&cfg, transcript, &StrategyRegistry::with_builtin(), &options)?;
    let outcome = &replay.session;

    if json {
        let report = ReplayReport {
            strategy: &replay.strategy,
            profile_path: &replay.profile_path,
            outcome,
            events: &replay.events,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize replay report")?
        );
    } else {
        println!(
            "stop={:?} ticks={} executed={} failed={} rejected={} clicks={} stuck={}",
            outcome.stop,
            outcome.ticks,
            outcome.actions_executed,
            outcome.actions_failed,
            outcome.actions_rejected,
            outcome.dialog_clicks,
            outcome.stuck_episodes
        );
    }

    Ok(match outcome.stop {
        SessionStop::DuelEnded | SessionStop::Stopped => exit_codes::OK,
        SessionStop::StuckLimit { .. } => exit_codes::STUCK,
        SessionStop::ActionLimit { .. } | SessionStop::TurnLimit { .. } => exit_codes::FAILSAFE,
    })
}

fn cmd_profile_check(config: &Path, deck: Option<String>) -> Result<i32> {
    let mut cfg = load_effective_config(config)?;
    if let Some(deck) = deck {
        cfg.deck = deck;
    }
    let loaded = load_deck_profile(&cfg.decks_dir, &cfg.deck, &cfg.legacy_profile_path)?;
    let profile = &loaded.profile;
    println!(
        "{}: {} main, {} extra, {} dialog priorities ({}{})",
        profile.deck_name,
        profile.cards.len(),
        profile.extra_deck.len(),
        profile.dialog_pick_priority.len(),
        loaded.path.display(),
        if loaded.legacy { ", legacy" } else { "" }
    );
    let registry = StrategyRegistry::with_builtin();
    if registry.try_get(profile, &cfg.deck, &cfg.strategy).is_err() {
        println!(
            "warning: no '{}' strategy for deck '{}'; sessions will use noop",
            cfg.strategy, cfg.deck
        );
    }
    Ok(exit_codes::OK)
}

fn cmd_import_decklist(
    config: &Path,
    decklists: &[PathBuf],
    profile: Option<PathBuf>,
) -> Result<i32> {
    let profile_path = match profile {
        Some(path) => path,
        None => load_effective_config(config)?.deck_profile_path(),
    };
    let summary = import_decklists(decklists, &profile_path)?;
    println!(
        "updated {} with {} cards from {} decklist(s)",
        summary.profile_path.display(),
        summary.cards,
        summary.decklists.len()
    );
    Ok(exit_codes::OK)
}

fn cmd_config_show(config: &Path) -> Result<i32> {
    let cfg = load_effective_config(config)?;
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config toml")?);
    Ok(exit_codes::OK)
}

fn cmd_config_init(config: &Path, force: bool) -> Result<i32> {
    if config.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config.display());
    }
    write_config(config, &BotConfig::default())?;
    println!("wrote {}", config.display());
    Ok(exit_codes::OK)
}
