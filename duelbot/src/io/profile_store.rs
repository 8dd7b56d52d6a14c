//! Deck profile loading: JSON Schema check, then normalization.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::profile::Profile;

pub const PROFILE_SCHEMA: &str = include_str!("../../schemas/profile.schema.json");

/// A profile plus the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    pub profile: Profile,
    pub path: PathBuf,
    /// `true` when the deck had no profile and the legacy path was used.
    pub legacy: bool,
}

/// Read, schema-check, and normalize one profile file.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_profile(&raw).with_context(|| format!("load profile {}", path.display()))
}

pub fn parse_profile(raw: &str) -> Result<Profile> {
    let instance: Value = serde_json::from_str(raw).context("parse profile json")?;
    let schema: Value = serde_json::from_str(PROFILE_SCHEMA).context("parse profile schema")?;
    validate_schema(&instance, &schema)?;
    Ok(Profile::from_value(&instance)?)
}

/// Pick the deck's own profile when present, otherwise the legacy path.
pub fn resolve_profile_path(decks_dir: &Path, deck: &str, legacy_path: &Path) -> (PathBuf, bool) {
    let deck_path = decks_dir.join(deck).join("profile.json");
    if deck_path.is_file() {
        return (deck_path, false);
    }
    warn!(
        deck,
        missing = %deck_path.display(),
        fallback = %legacy_path.display(),
        "deck profile missing, using legacy profile"
    );
    (legacy_path.to_path_buf(), true)
}

pub fn load_deck_profile(decks_dir: &Path, deck: &str, legacy_path: &Path) -> Result<LoadedProfile> {
    let (path, legacy) = resolve_profile_path(decks_dir, deck, legacy_path);
    let profile = load_profile(&path)?;
    info!(
        deck,
        path = %path.display(),
        cards = profile.eligible_count(),
        legacy,
        "loaded deck profile"
    );
    Ok(LoadedProfile {
        profile,
        path,
        legacy,
    })
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
