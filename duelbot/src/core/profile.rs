//! Deck profile: card eligibility and play heuristics.
//!
//! Profiles are hand-edited JSON, so entries are normalized leniently:
//! unknown tags are dropped, counts default to one, and priorities that are not
//! numbers become zero. The document shape itself is checked by the loader
//! before it reaches [`Profile::from_value`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::ProfileError;
use crate::core::types::{ActionKind, CardSelection};

/// Tags understood by strategies. Anything else in a profile is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTag {
    Opener,
    Extender,
    Starter,
    Disruption,
    Brick,
    Search,
    DiscardFodder,
}

impl CardTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "opener" => Some(CardTag::Opener),
            "extender" => Some(CardTag::Extender),
            "starter" => Some(CardTag::Starter),
            "disruption" => Some(CardTag::Disruption),
            "brick" => Some(CardTag::Brick),
            "search" => Some(CardTag::Search),
            "discard_fodder" => Some(CardTag::DiscardFodder),
            _ => None,
        }
    }
}

/// Normalized per-card metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardEntry {
    pub id: Option<u32>,
    pub count: u32,
    pub tags: Vec<CardTag>,
    pub main1_priority: f64,
    pub set_priority: f64,
    pub hold_priority: f64,
    /// Preferred way to play the card from hand, if the profile names one.
    pub play: Option<ActionKind>,
}

impl Default for CardEntry {
    fn default() -> Self {
        Self {
            id: None,
            count: 1,
            tags: Vec::new(),
            main1_priority: 0.0,
            set_priority: 0.0,
            hold_priority: 0.0,
            play: None,
        }
    }
}

impl CardEntry {
    fn from_map(data: &Map<String, Value>) -> Self {
        let tags = match data.get("tags") {
            Some(Value::Array(items)) => {
                let mut tags: Vec<CardTag> = items
                    .iter()
                    .filter_map(scalar_string)
                    .filter_map(|raw| CardTag::parse(&raw))
                    .collect();
                tags.dedup();
                tags
            }
            _ => Vec::new(),
        };
        Self {
            id: data.get("id").and_then(as_u32),
            count: data.get("count").and_then(as_u32).unwrap_or(1),
            tags,
            main1_priority: data.get("main1_priority").and_then(as_f64).unwrap_or(0.0),
            set_priority: data.get("set_priority").and_then(as_f64).unwrap_or(0.0),
            hold_priority: data.get("hold_priority").and_then(as_f64).unwrap_or(0.0),
            play: data
                .get("play")
                .and_then(|raw| serde_json::from_value(raw.clone()).ok()),
        }
    }

    pub fn has_tag(&self, tag: CardTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Read-only deck metadata for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub deck_name: String,
    pub cards: BTreeMap<String, CardEntry>,
    pub extra_deck: BTreeMap<String, CardEntry>,
    pub extra_deck_priority: Vec<String>,
    pub dialog_pick_priority: Vec<String>,
    pub priority_groups: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    cards_by_id: BTreeMap<u32, String>,
}

impl Profile {
    /// Normalize a parsed profile document.
    pub fn from_value(value: &Value) -> Result<Self, ProfileError> {
        let root = value.as_object().ok_or(ProfileError::NotAnObject)?;

        let deck_name = root
            .get("deck_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let cards = entries(root.get("cards"));
        let extra_deck = entries(root.get("extra_deck"));
        let extra_deck_priority = match root.get("extra_deck_priority") {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => extra_deck.keys().cloned().collect(),
        };
        let dialog_pick_priority = string_list(root.get("dialog_pick_priority"));
        let priority_groups = match root.get("priority_groups") {
            Some(Value::Object(groups)) => groups
                .iter()
                .map(|(name, members)| (name.clone(), string_list(Some(members))))
                .collect(),
            _ => BTreeMap::new(),
        };

        let mut profile = Self {
            deck_name,
            cards,
            extra_deck,
            extra_deck_priority,
            dialog_pick_priority,
            priority_groups,
            cards_by_id: BTreeMap::new(),
        };
        profile.index_ids();
        Ok(profile)
    }

    /// Minimal profile listing main-deck names with default metadata.
    pub fn from_names<I, S>(deck_name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cards = names
            .into_iter()
            .map(|name| (name.into(), CardEntry::default()))
            .collect();
        let mut profile = Self {
            deck_name: deck_name.into(),
            cards,
            extra_deck: BTreeMap::new(),
            extra_deck_priority: Vec::new(),
            dialog_pick_priority: Vec::new(),
            priority_groups: BTreeMap::new(),
            cards_by_id: BTreeMap::new(),
        };
        profile.index_ids();
        profile
    }

    fn index_ids(&mut self) {
        self.cards_by_id = self
            .cards
            .iter()
            .filter_map(|(name, entry)| entry.id.map(|id| (id, name.clone())))
            .collect();
    }

    /// Whether `name` is part of the deck (main or extra).
    pub fn is_eligible(&self, name: &str) -> bool {
        self.cards.contains_key(name) || self.extra_deck.contains_key(name)
    }

    pub fn eligible_count(&self) -> usize {
        self.cards.len() + self.extra_deck.len()
    }

    pub fn card(&self, name: &str) -> Option<&CardEntry> {
        self.cards.get(name).or_else(|| self.extra_deck.get(name))
    }

    pub fn name_for_id(&self, id: u32) -> Option<&str> {
        self.cards_by_id.get(&id).map(String::as_str)
    }

    /// Pick a dialog card by priority, falling back to the first listed card.
    pub fn pick_dialog_choice(&self, dialog_cards: &[String]) -> Option<CardSelection> {
        for wanted in &self.dialog_pick_priority {
            if let Some(index) = dialog_cards.iter().position(|card| card == wanted) {
                return Some(CardSelection {
                    index,
                    name: wanted.clone(),
                });
            }
        }
        dialog_cards.first().map(|name| CardSelection {
            index: 0,
            name: name.clone(),
        })
    }
}

fn entries(value: Option<&Value>) -> BTreeMap<String, CardEntry> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(name, data)| match data {
            Value::Object(fields) => Some((name.clone(), CardEntry::from_map(fields))),
            _ => None,
        })
        .collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
