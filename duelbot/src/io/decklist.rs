//! Decklist import: turn plain-text deck lists into `dialog_pick_priority`.
//!
//! Accepted line shapes: `3 Mo Ye`, `3x Mo Ye`, `x3 Mo Ye`, `Mo Ye x3`,
//! `Mo Ye 3`, and bare names. Section headers, separators, and comments are
//! skipped. Trailing ` # note` and ` (set code)` suffixes are stripped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use serde_json::Value;
use tracing::info;

const SECTION_HEADERS: &[&str] = &[
    "main deck",
    "extra deck",
    "side deck",
    "monster",
    "monsters",
    "spell",
    "spells",
    "trap",
    "traps",
    "extra",
    "side",
];

static COUNT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:x?\d+)\s*x?\s*(.+)$").expect("count prefix regex")
});
static COUNT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+x?\d+$").expect("count suffix regex")
});

/// Card names in first-seen order, duplicates removed.
pub fn parse_decklist(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cards = Vec::new();
    for raw in text.lines() {
        let Some(name) = card_name(raw) else {
            continue;
        };
        if seen.insert(name.clone()) {
            cards.push(name);
        }
    }
    cards
}

fn card_name(raw: &str) -> Option<String> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
        return None;
    }
    if SECTION_HEADERS.contains(&normalize_header(line).as_str()) {
        return None;
    }
    if line.chars().all(|c| c == '-' || c == '=') {
        return None;
    }

    let mut line = line.split(" #").next().unwrap_or(line).trim();
    if let Some((head, _)) = line.split_once(" (") {
        line = head.trim();
    }
    let line = if let Some(caps) = COUNT_PREFIX.captures(line) {
        caps.get(1).map_or(line, |m| m.as_str()).trim()
    } else if let Some(caps) = COUNT_SUFFIX.captures(line) {
        caps.get(1).map_or(line, |m| m.as_str()).trim()
    } else {
        line
    };

    if line.is_empty() || !line.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(line.to_string())
}

fn normalize_header(line: &str) -> String {
    line.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub profile_path: PathBuf,
    pub decklists: Vec<PathBuf>,
    pub cards: usize,
}

/// Replace the profile's `dialog_pick_priority` with names from `decklists`.
///
/// Every other field in the profile document is kept as is.
pub fn import_decklists(decklists: &[PathBuf], profile_path: &Path) -> Result<ImportSummary> {
    if decklists.is_empty() {
        bail!("no decklist files given");
    }
    let mut seen = HashSet::new();
    let mut priority = Vec::new();
    for path in decklists {
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        for card in parse_decklist(&text) {
            if seen.insert(card.clone()) {
                priority.push(card);
            }
        }
    }
    if priority.is_empty() {
        bail!("no card names parsed from decklist(s)");
    }

    let raw = fs::read_to_string(profile_path)
        .with_context(|| format!("read {}", profile_path.display()))?;
    let mut document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", profile_path.display()))?;
    let root = document
        .as_object_mut()
        .ok_or_else(|| anyhow!("{} is not a JSON object", profile_path.display()))?;
    let cards = priority.len();
    root.insert(
        "dialog_pick_priority".to_string(),
        Value::Array(priority.into_iter().map(Value::String).collect()),
    );

    write_json_atomic(profile_path, &document)?;
    info!(path = %profile_path.display(), cards, "updated dialog pick priority");
    Ok(ImportSummary {
        profile_path: profile_path.to_path_buf(),
        decklists: decklists.to_vec(),
        cards,
    })
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize profile json")?;
    payload.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload)
        .with_context(|| format!("write temp profile {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace profile {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts_headers_and_comments() {
        let text = "\
Main Deck:
// staples
3 Swordsoul of Mo Ye
2x Swordsoul of Taia # tuner
Swordsoul Emergence x3
x1 Tenyi Spirit - Vishuda (MP22)
-----
Extra Deck
Swordsoul Grandmaster - Chixiao 2
3 Swordsoul of Mo Ye
1 1234
";
        assert_eq!(
            parse_decklist(text),
            vec![
                "Swordsoul of Mo Ye",
                "Swordsoul of Taia",
                "Swordsoul Emergence",
                "Tenyi Spirit - Vishuda",
                "Swordsoul Grandmaster - Chixiao",
            ]
        );
    }

    #[test]
    fn import_rewrites_only_priority() {
        let temp = tempfile::tempdir().expect("tempdir");
        let profile = temp.path().join("profile.json");
        fs::write(
            &profile,
            r#"{"deck_name": "swordsoul", "cards": {"A": {}}, "dialog_pick_priority": ["old"]}"#,
        )
        .expect("write");
        let first = temp.path().join("a.txt");
        let second = temp.path().join("b.txt");
        fs::write(&first, "3 Mo Ye\n2 Taia\n").expect("write");
        fs::write(&second, "Taia x1\nLongyuan\n").expect("write");

        let summary = import_decklists(&[first, second], &profile).expect("import");
        assert_eq!(summary.cards, 3);

        let value: Value =
            serde_json::from_str(&fs::read_to_string(&profile).expect("read")).expect("json");
        assert_eq!(value["deck_name"], "swordsoul");
        assert_eq!(value["cards"]["A"], serde_json::json!({}));
        assert_eq!(
            value["dialog_pick_priority"],
            serde_json::json!(["Mo Ye", "Taia", "Longyuan"])
        );
    }

    #[test]
    fn import_fails_when_nothing_parses() {
        let temp = tempfile::tempdir().expect("tempdir");
        let profile = temp.path().join("profile.json");
        fs::write(&profile, "{}").expect("write");
        let list = temp.path().join("list.txt");
        fs::write(&list, "# only comments\nMain Deck\n").expect("write");
        assert!(import_decklists(&[list], &profile).is_err());
    }
}
