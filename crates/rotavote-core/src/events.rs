//! The seams between the engine and its host.
//!
//! Everything outbound goes through [`Host`] as fire-and-forget calls:
//! semantic notifications for the presentation layer to localize, and
//! the two engine-control verbs (change map, adjust limit). Catalog
//! and cooldown persistence goes through [`CatalogStore`].

use crate::catalog::MapDefinition;
use crate::cooldown::CooldownLedger;
use crate::ledger::BallotEntry;

/// Stable identity for a connected player (steamid64-style).
pub type PlayerId = u64;

/// The map-change directive, in the addressing scheme the target needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapChange {
    /// Local map, changed by level name.
    Level(String),
    /// Workshop map with a known content id (preferred addressing).
    WorkshopId(String),
    /// Workshop map addressed by name; the host resolves the id.
    WorkshopName(String),
}

/// Lengthen the current map's limit by a configured amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitAdjust {
    Rounds(u32),
    Minutes(u32),
}

/// Semantic events for the presentation layer.
///
/// The engine never formats user-facing text; hosts localize these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    VoteStarted,
    /// A ballot produced a winner outright.
    VoteFinished { map: String, percent: u32 },
    /// Several candidates tied; one was picked at random.
    VoteTiedRandomPick { map: String },
    /// "Ignore vote" won; a random candidate was picked instead.
    IgnoreVoteRandomPick { map: String },
    /// "Extend map" won; the limit grew by `amount` rounds/minutes.
    ExtendApplied { amount: u32 },
    /// No eligible candidates; the ballot was suppressed.
    VoteSuppressed,
    /// No votes were cast (or no candidates existed); a fallback map
    /// was chosen from the full catalog.
    FallbackMapSelected { map: String },
    RtvProgress {
        player: PlayerId,
        current: u32,
        required: u32,
    },
    RtvTriggered,
    /// RTV honored an already-set next map instead of opening a ballot.
    RtvUsingNextMap { map: String },
    NominationAdded { player: PlayerId, map: String },
    NominationRemoved { player: PlayerId, map: String },
    /// An admin explicitly set the next map.
    NextMapSet { map: String },
    /// Transition wanted a map but none exists; current map keeps running.
    NoNextMapAvailable,
}

/// Outbound interface to the game server and presentation layer.
///
/// All calls are fire-and-forget; the engine does not await
/// confirmation and must stay consistent if the host ignores a call.
pub trait Host {
    /// Present this ballot to connected players. Selections come back
    /// through [`crate::Engine::cast_vote`].
    fn show_ballot(&mut self, entries: &[BallotEntry]);

    fn notify(&mut self, event: Notification);

    fn change_map(&mut self, change: &MapChange);

    fn adjust_limit(&mut self, adjust: LimitAdjust);
}

/// Persistence callbacks for dynamically discovered maps and cooldown
/// state. Implemented by `rotavote-store` for file-backed setups.
pub trait CatalogStore {
    fn persist_map(&mut self, def: &MapDefinition);

    fn persist_cooldowns(&mut self, cooldowns: &CooldownLedger);
}

/// Store that keeps nothing. Used when persistence is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl CatalogStore for NullStore {
    fn persist_map(&mut self, _def: &MapDefinition) {}

    fn persist_cooldowns(&mut self, _cooldowns: &CooldownLedger) {}
}
