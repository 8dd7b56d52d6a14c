//! Deck strategy registry.
//!
//! Each deck maps to a factory that builds a strategy variant by name. Lookup
//! never fails: an unknown deck or a failing factory yields the noop strategy
//! and an error record, so a session can still run (and pass) safely.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use tracing::{error, info};

use crate::core::profile::Profile;
use crate::strategy::Strategy;
use crate::strategy::builtin::{NoopStrategy, PriorityStrategy};

pub type StrategyFactory = fn(&Profile, &str) -> Result<Box<dyn Strategy>>;

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// Empty registry. Every lookup falls back to noop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the profile-driven decks shipped with the bot.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("generic", priority_factory);
        registry.register("swordsoul_tenyi", priority_factory);
        registry
    }

    pub fn register(&mut self, deck: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(deck.into(), factory);
    }

    pub fn decks(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build `name` for `deck`, or report why it could not be built.
    pub fn try_get(&self, profile: &Profile, deck: &str, name: &str) -> Result<Box<dyn Strategy>> {
        let Some(factory) = self.factories.get(deck) else {
            bail!("no strategy registered for deck '{deck}'");
        };
        factory(profile, name)
    }

    pub fn get_strategy(&self, profile: &Profile, deck: &str, name: &str) -> Box<dyn Strategy> {
        match self.try_get(profile, deck, name) {
            Ok(strategy) => {
                info!(deck, strategy = strategy.name(), "loaded strategy");
                strategy
            }
            Err(err) => {
                error!(deck, strategy = name, error = %format!("{err:#}"), "strategy load failed, using noop");
                Box::new(NoopStrategy::new())
            }
        }
    }
}

fn priority_factory(_profile: &Profile, name: &str) -> Result<Box<dyn Strategy>> {
    match name {
        "default" | "priority" => Ok(Box::new(PriorityStrategy::new())),
        "noop" => Ok(Box::new(NoopStrategy::new())),
        other => bail!("unknown strategy variant '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(_profile: &Profile, _name: &str) -> Result<Box<dyn Strategy>> {
        bail!("factory exploded")
    }

    #[test]
    fn builtin_decks_build_named_variants() {
        let registry = StrategyRegistry::with_builtin();
        let profile = Profile::from_names("generic", ["Mo Ye"]);
        assert_eq!(
            registry.get_strategy(&profile, "generic", "default").name(),
            "default"
        );
        assert_eq!(
            registry.get_strategy(&profile, "swordsoul_tenyi", "noop").name(),
            "noop"
        );
        assert_eq!(
            registry.decks().collect::<Vec<_>>(),
            vec!["generic", "swordsoul_tenyi"]
        );
    }

    #[test]
    fn unknown_deck_or_variant_falls_back_to_noop() {
        let registry = StrategyRegistry::with_builtin();
        let profile = Profile::from_names("x", ["Mo Ye"]);
        assert!(registry.try_get(&profile, "nope", "default").is_err());
        assert_eq!(registry.get_strategy(&profile, "nope", "default").name(), "noop");
        assert_eq!(registry.get_strategy(&profile, "generic", "wild").name(), "noop");
    }

    #[test]
    fn failing_factory_falls_back_to_noop() {
        let mut registry = StrategyRegistry::new();
        registry.register("broken", failing);
        let profile = Profile::from_names("broken", ["Mo Ye"]);
        let err = registry
            .try_get(&profile, "broken", "default")
            .err()
            .expect("error");
        assert!(err.to_string().contains("exploded"));
        assert_eq!(registry.get_strategy(&profile, "broken", "default").name(), "noop");
    }
}
