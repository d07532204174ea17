//! The vote ledger: who voted for what in the current session.
//!
//! Entries are a tagged union rather than reserved map-name strings,
//! so sentinel options can never collide with a real map id and the
//! resolver's branching is exhaustive.

use std::collections::{HashMap, HashSet};

use crate::events::PlayerId;

/// One line on a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BallotEntry {
    /// A real map candidate, by id.
    Candidate(String),
    /// "Keep the vote out of it": winning triggers a random pick from
    /// the full candidate list.
    IgnoreVote,
    /// Lengthen the current map instead of changing.
    ExtendMap,
}

/// Why a vote was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("no ballot is currently open")]
    NotOpen,
    #[error("player has already voted in this session")]
    AlreadyVoted,
    #[error("option is not on the ballot")]
    UnknownEntry,
}

/// Append-only per-session record of entry → voters.
///
/// Invariant: a voter appears under at most one entry per session.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    votes: HashMap<BallotEntry, Vec<PlayerId>>,
    voters: HashSet<PlayerId>,
}

impl VoteLedger {
    /// Opens a ledger pre-registered with the ballot's entries. Votes
    /// for anything else are rejected.
    pub fn open(entries: impl IntoIterator<Item = BallotEntry>) -> Self {
        Self {
            votes: entries.into_iter().map(|e| (e, Vec::new())).collect(),
            voters: HashSet::new(),
        }
    }

    /// Records one vote. Each voter gets exactly one per session.
    pub fn record(&mut self, entry: &BallotEntry, voter: PlayerId) -> Result<(), VoteError> {
        if self.voters.contains(&voter) {
            return Err(VoteError::AlreadyVoted);
        }
        let slot = self.votes.get_mut(entry).ok_or(VoteError::UnknownEntry)?;
        slot.push(voter);
        self.voters.insert(voter);
        Ok(())
    }

    pub fn total_votes(&self) -> usize {
        self.voters.len()
    }

    pub fn count(&self, entry: &BallotEntry) -> usize {
        self.votes.get(entry).map(Vec::len).unwrap_or(0)
    }

    pub fn has_entry(&self, entry: &BallotEntry) -> bool {
        self.votes.contains_key(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &BallotEntry> {
        self.votes.keys()
    }

    /// Integer percentages per entry, round-half-up.
    ///
    /// Empty when no votes were cast. Entries that received zero votes
    /// still appear (at 0%), matching what a results screen shows.
    pub fn tally(&self) -> HashMap<BallotEntry, u32> {
        let total = self.total_votes() as u64;
        if total == 0 {
            return HashMap::new();
        }
        self.votes
            .iter()
            .map(|(entry, voters)| {
                let count = voters.len() as u64;
                // round(100 * count / total), half-up, in integers
                let percent = ((count * 200 + total) / (total * 2)) as u32;
                (entry.clone(), percent)
            })
            .collect()
    }

    /// Drops all votes and entries. The ledger is unusable until the
    /// next `open`.
    pub fn clear(&mut self) {
        self.votes.clear();
        self.voters.clear();
    }
}
