//! Engine configuration.
//!
//! Plain serde types so the host can load them from TOML/JSON however
//! it likes. Every field has a default matching common server setups.

use serde::{Deserialize, Serialize};

/// What "map end" is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitMode {
    /// Round-limited maps: limits and the trigger threshold count rounds.
    Rounds,
    /// Time-limited maps: limits count seconds, thresholds are minutes.
    Time,
}

/// Rock-the-vote settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtvConfig {
    pub enabled: bool,
    /// Seconds after map start before RTV requests are accepted.
    pub delay_secs: u64,
    /// Percentage of connected players required to trigger.
    pub required_percentage: u32,
    /// Change map the moment the RTV ballot resolves, instead of at
    /// the end of the current round.
    pub change_instantly: bool,
    /// When a next map is already explicitly set, skip the ballot and
    /// go straight to the transition.
    pub respect_next_map: bool,
}

impl Default for RtvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: 60,
            required_percentage: 60,
            change_instantly: false,
            respect_next_map: true,
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master switch for scheduled end-of-map ballots.
    pub vote_enabled: bool,
    /// Maximum candidates on a ballot.
    pub ballot_size: usize,
    /// How long a ballot stays open.
    pub vote_duration_secs: u64,
    /// Rounds (or minutes in time mode) before map end at which the
    /// scheduled ballot fires.
    pub trigger_before_end: u32,
    pub limit_mode: LimitMode,
    /// Offer the "ignore vote" sentinel on ballots.
    pub enable_ignore_vote: bool,
    /// Offer the "extend map" sentinel on ballots.
    pub enable_extend: bool,
    /// Rounds (or minutes in time mode) added per extend win.
    pub extend_amount: u32,
    /// Extend wins allowed per map, unless the map overrides it.
    pub max_extends: u32,
    pub cooldown_enabled: bool,
    /// Cooldown assigned to dynamically discovered maps.
    pub discovered_cooldown_cycles: u32,
    pub rtv: RtvConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vote_enabled: true,
            ballot_size: 5,
            vote_duration_secs: 15,
            trigger_before_end: 3,
            limit_mode: LimitMode::Rounds,
            enable_ignore_vote: true,
            enable_extend: true,
            extend_amount: 8,
            max_extends: 1,
            cooldown_enabled: true,
            discovered_cooldown_cycles: 10,
            rtv: RtvConfig::default(),
        }
    }
}
