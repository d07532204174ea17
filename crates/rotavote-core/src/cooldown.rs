//! Per-map cooldown bookkeeping.
//!
//! An out-of-band id → remaining-cycles ledger, deliberately separate
//! from [`crate::MapDefinition`] so definitions stay immutable values.
//! Unknown ids read as 0, i.e. always eligible.

use std::collections::HashMap;

/// Remaining cooldown cycles per map id.
#[derive(Debug, Clone, Default)]
pub struct CooldownLedger {
    remaining: HashMap<String, u32>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a ledger from persisted state.
    pub fn from_map(remaining: HashMap<String, u32>) -> Self {
        Self { remaining }
    }

    /// Remaining cycles for `id`; 0 for maps never put on cooldown.
    pub fn remaining(&self, id: &str) -> u32 {
        self.remaining.get(id).copied().unwrap_or(0)
    }

    /// True when the map has served its cooldown.
    pub fn is_ready(&self, id: &str) -> bool {
        self.remaining(id) == 0
    }

    /// Ticks every cooldown down by one. Called once per map load.
    pub fn decrement_all(&mut self) {
        for count in self.remaining.values_mut() {
            if *count > 0 {
                *count -= 1;
            }
        }
    }

    /// Puts `id` back on cooldown for `cycles` loads. Called when a
    /// map becomes the active map and when it wins a vote.
    pub fn reset(&mut self, id: &str, cycles: u32) {
        self.remaining.insert(id.to_string(), cycles);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.remaining.iter().map(|(id, n)| (id.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}
