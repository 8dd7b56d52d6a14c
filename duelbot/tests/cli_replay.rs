//! CLI tests for `duelbot replay`.
//!
//! Spawns the duelbot binary in a temp working directory and checks exit codes
//! for a clean duel, a frozen dialog, and a missing profile.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use duelbot::exit_codes;
use serde_json::Value;

const PROFILE: &str = r#"{
    "deck_name": "generic",
    "cards": {
        "Mo Ye": {"tags": ["starter"], "main1_priority": 9},
        "Taia": {"tags": ["extender"], "main1_priority": 7}
    },
    "dialog_pick_priority": ["Mo Ye"]
}"#;

fn duelbot(cwd: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_duelbot"));
    command.current_dir(cwd);
    for (key, _) in std::env::vars() {
        if key.starts_with("BOT_") {
            command.env_remove(key);
        }
    }
    command
}

fn setup(dir: &Path, with_profile: bool) {
    fs::write(dir.join("duelbot.toml"), "deck = \"generic\"\n").expect("write config");
    if with_profile {
        fs::create_dir_all(dir.join("decks/generic")).expect("decks dir");
        fs::write(dir.join("decks/generic/profile.json"), PROFILE).expect("write profile");
    }
}

fn replay(dir: &Path, transcript: &str) -> Output {
    fs::write(dir.join("t.json"), transcript).expect("write transcript");
    duelbot(dir)
        .args(["replay", "t.json", "--instant", "--json"])
        .output()
        .expect("duelbot replay")
}

#[test]
fn replay_to_duel_end_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path(), true);

    let output = replay(
        temp.path(),
        r#"{
            "frames": [
                {"turn": 1, "my_turn": true, "phase": "main1", "hand": ["Mo Ye", "Taia"]},
                {"turn": 2, "my_turn": false, "dialog": {"cards": ["Taia", "Mo Ye"]}},
                {"turn": 2, "my_turn": false}
            ],
            "outcomes": ["done", "turn_ended"]
        }"#,
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let report: Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["strategy"], "default");
    assert_eq!(report["outcome"]["actions_executed"], 2);
    assert_eq!(report["outcome"]["dialog_clicks"], 1);
    assert_eq!(report["outcome"]["stop"]["reason"], "duel_ended");
    assert_eq!(report["events"].as_array().map(Vec::len), Some(3));
    assert_eq!(report["events"][0]["action"]["card_name"], "Mo Ye");
}

#[test]
fn frozen_dialog_exits_stuck_with_dumps() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path(), true);
    let frame = r#"{"turn": 1, "my_turn": true, "dialog": {"cards": ["Taia"]}}"#;
    let frames = vec![frame; 10].join(",");

    let output = replay(temp.path(), &format!(r#"{{"frames": [{frames}]}}"#));

    assert_eq!(output.status.code(), Some(exit_codes::STUCK));
    let dumps = fs::read_dir(temp.path().join("bot_dumps")).expect("dump dir");
    assert_eq!(dumps.count(), 3);
}

#[test]
fn missing_profile_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path(), false);

    let output = replay(temp.path(), r#"{"frames": [{"duel_ended": true}]}"#);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(!output.stderr.is_empty());
}
