//! The map catalog: immutable definitions keyed by engine-level id.
//!
//! Definitions are values: all runtime-mutable state (cooldowns,
//! nominations, votes) lives in separate maps indexed by id, so a
//! definition can be shared across candidate lists and ballots without
//! aliasing hazards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Returned when an operation names a map the catalog has never seen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown map '{0}'")]
pub struct UnknownMapError(pub String);

fn default_true() -> bool {
    true
}

fn default_max_players() -> u32 {
    64
}

/// A single playable level and its rotation attributes.
///
/// `id` is the engine-level name (`de_dust2`, workshop file name, …)
/// and is unique and immutable. The cycle window bounds are kept as
/// the raw "HH:MM" strings from configuration; parsing happens at
/// eligibility-check time and fails open (see [`crate::selector`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Addressed by workshop content id rather than a local file.
    #[serde(default)]
    pub workshop: bool,
    #[serde(default)]
    pub workshop_id: Option<String>,
    /// Participates in automatic rotation.
    #[serde(default = "default_true")]
    pub cycle_enabled: bool,
    /// May appear on a ballot.
    #[serde(default = "default_true")]
    pub vote_eligible: bool,
    #[serde(default)]
    pub min_players: u32,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    /// Local time-of-day window start, "HH:MM". Empty means no window.
    #[serde(default)]
    pub cycle_start: String,
    /// Window end; may be earlier than start (wraps past midnight).
    #[serde(default)]
    pub cycle_end: String,
    /// Map loads to wait after being played before it is eligible again.
    #[serde(default)]
    pub cooldown_cycles: u32,
    /// Per-map round-limit override, if any.
    #[serde(default)]
    pub round_limit: Option<u32>,
    /// Per-map time-limit override in minutes, if any.
    #[serde(default)]
    pub time_limit: Option<f32>,
    /// Per-map cap on extend votes, overriding the engine default.
    #[serde(default)]
    pub max_extends: Option<u32>,
}

impl MapDefinition {
    /// Creates a definition with rotation-friendly defaults.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            workshop: false,
            workshop_id: None,
            cycle_enabled: true,
            vote_eligible: true,
            min_players: 0,
            max_players: default_max_players(),
            cycle_start: String::new(),
            cycle_end: String::new(),
            cooldown_cycles: 0,
            round_limit: None,
            time_limit: None,
            max_extends: None,
        }
    }

    /// Synthesizes a definition for a map loaded without one.
    ///
    /// Used the first time a workshop or otherwise unknown map is
    /// loaded; the result is persisted so the map joins the rotation.
    pub fn discovered(
        id: impl Into<String>,
        workshop_id: Option<&str>,
        cooldown_cycles: u32,
    ) -> Self {
        let mut def = Self::new(id);
        if let Some(wid) = workshop_id {
            def.workshop = true;
            def.workshop_id = Some(wid.to_string());
        }
        def.cooldown_cycles = cooldown_cycles;
        def
    }

    /// Returns true when `players` falls inside this map's bounds.
    pub fn allows_players(&self, players: u32) -> bool {
        self.min_players <= players && players <= self.max_players
    }
}

/// All known map definitions, keyed by id.
///
/// Iteration order is the id sort order, which keeps random sampling
/// reproducible under a seeded RNG.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    maps: BTreeMap<String, MapDefinition>,
}

impl Catalog {
    pub fn new(defs: impl IntoIterator<Item = MapDefinition>) -> Self {
        let mut maps = BTreeMap::new();
        for def in defs {
            maps.insert(def.id.clone(), def);
        }
        Self { maps }
    }

    pub fn get(&self, id: &str) -> Option<&MapDefinition> {
        self.maps.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.maps.contains_key(id)
    }

    /// Inserts or replaces a definition.
    pub fn insert(&mut self, def: MapDefinition) {
        self.maps.insert(def.id.clone(), def);
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapDefinition> {
        self.maps.values()
    }

    /// Maps participating in automatic rotation.
    pub fn cycle_maps(&self) -> impl Iterator<Item = &MapDefinition> {
        self.maps.values().filter(|m| m.cycle_enabled)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
