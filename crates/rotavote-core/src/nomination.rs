//! Player nominations.
//!
//! A bijective player ↔ map mapping: at most one live nomination per
//! player and at most one nominator per map. Validation lives in the
//! engine (it needs the catalog, cooldowns, and the clock); this
//! module owns only the mapping itself.

use std::collections::HashMap;

use crate::events::PlayerId;

/// Why a nomination was rejected. Hosts render these; the engine never
/// formats text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NominateError {
    #[error("player already has a live nomination")]
    AlreadyNominated,
    #[error("unknown map '{0}'")]
    UnknownMap(String),
    #[error("the current map cannot be nominated")]
    CurrentMap,
    #[error("map was already nominated by another player")]
    DuplicateNomination,
    #[error("map is not part of the vote rotation")]
    NotInCycle,
    #[error("player count {current} is outside {min}..={max}")]
    PlayerCount { min: u32, max: u32, current: u32 },
    #[error("map is outside its cycle time window")]
    TimeRestricted,
    #[error("map is on cooldown for {remaining} more cycles")]
    OnCooldown { remaining: u32 },
}

/// Live nominations for the current map.
#[derive(Debug, Clone, Default)]
pub struct NominationRegistry {
    by_player: HashMap<PlayerId, String>,
    by_map: HashMap<String, PlayerId>,
}

impl NominationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the player has no live nomination.
    pub fn can_nominate(&self, player: PlayerId) -> bool {
        !self.by_player.contains_key(&player)
    }

    pub fn contains_map(&self, map_id: &str) -> bool {
        self.by_map.contains_key(map_id)
    }

    pub fn nominator_of(&self, map_id: &str) -> Option<PlayerId> {
        self.by_map.get(map_id).copied()
    }

    pub fn map_for(&self, player: PlayerId) -> Option<&str> {
        self.by_player.get(&player).map(String::as_str)
    }

    /// Registers the bijective mapping. The caller has already
    /// validated eligibility.
    pub fn insert(&mut self, player: PlayerId, map_id: impl Into<String>) {
        let map_id = map_id.into();
        self.by_map.insert(map_id.clone(), player);
        self.by_player.insert(player, map_id);
    }

    /// Withdraws a player's nomination, returning the map it was for.
    pub fn remove_player(&mut self, player: PlayerId) -> Option<String> {
        let map_id = self.by_player.remove(&player)?;
        self.by_map.remove(&map_id);
        Some(map_id)
    }

    /// Nominated map ids, unordered.
    pub fn maps(&self) -> impl Iterator<Item = &str> {
        self.by_map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &str)> {
        self.by_player.iter().map(|(p, m)| (*p, m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }

    /// Clears everything. Invoked on every map load.
    pub fn reset_all(&mut self) {
        self.by_player.clear();
        self.by_map.clear();
    }
}
