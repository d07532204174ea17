//! Rock-the-vote request tracking.
//!
//! Counts distinct requesters against a player-count threshold. The
//! engine owns the decision of what happens at the threshold; this
//! module owns the who/when bookkeeping for one map session.

use std::collections::HashSet;

use crate::events::PlayerId;

/// Why an RTV request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtvError {
    #[error("rock the vote is disabled")]
    Disabled,
    #[error("rock the vote opens in {remaining_secs}s")]
    TooEarly { remaining_secs: u64 },
    #[error("player has already requested a vote")]
    AlreadyRequested,
    #[error("a vote is already in progress")]
    VoteInProgress,
}

/// Requests accumulated since the current map started.
#[derive(Debug, Clone, Default)]
pub struct RtvState {
    requesters: HashSet<PlayerId>,
    map_start_ms: u64,
    /// Set when an RTV ballot resolved with a deferred transition; the
    /// change happens at the next round end.
    triggered: bool,
}

impl RtvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets for a fresh map session.
    pub fn reset(&mut self, map_start_ms: u64) {
        self.requesters.clear();
        self.map_start_ms = map_start_ms;
        self.triggered = false;
    }

    /// Seconds left before requests open, 0 once the delay has passed.
    pub fn delay_remaining_secs(&self, now_ms: u64, delay_secs: u64) -> u64 {
        let open_at = self.map_start_ms.saturating_add(delay_secs * 1000);
        open_at.saturating_sub(now_ms).div_ceil(1000)
    }

    pub fn has_requested(&self, player: PlayerId) -> bool {
        self.requesters.contains(&player)
    }

    /// Registers a request; false if the player already counted.
    pub fn register(&mut self, player: PlayerId) -> bool {
        self.requesters.insert(player)
    }

    pub fn remove(&mut self, player: PlayerId) -> bool {
        self.requesters.remove(&player)
    }

    pub fn count(&self) -> u32 {
        self.requesters.len() as u32
    }

    /// Requesters needed for `total_players`: ceil(players * pct / 100),
    /// never below 1.
    pub fn required(total_players: u32, percentage: u32) -> u32 {
        let raw = (u64::from(total_players) * u64::from(percentage)).div_ceil(100) as u32;
        raw.max(1)
    }

    pub fn threshold_met(&self, total_players: u32, percentage: u32) -> bool {
        self.count() >= Self::required(total_players, percentage)
    }

    pub fn mark_triggered(&mut self) {
        self.triggered = true;
    }

    pub fn clear_triggered(&mut self) {
        self.triggered = false;
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }
}
