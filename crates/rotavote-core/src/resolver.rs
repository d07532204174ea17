//! Outcome resolution for a closed ballot.
//!
//! Pure function of the ledger, the candidate list, and an RNG for the
//! random picks. Sentinel entries outrank map candidates at equal vote
//! counts: "ignore vote" first, then "extend map", then a random
//! tie-break among the leading candidates.

use rand::Rng;

use crate::ledger::{BallotEntry, VoteLedger};

/// What a resolved ballot decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nobody voted. The caller falls back to a random rotation pick.
    NoVotes,
    /// A candidate won. `tie_break` marks a random pick among equals.
    Winner {
        map: String,
        percent: u32,
        tie_break: bool,
    },
    /// The "ignore vote" sentinel won; `pick` is a uniform draw over
    /// the full candidate list, `None` only if the list was empty.
    IgnoreVote { pick: Option<String> },
    /// The "extend map" sentinel won.
    Extend,
}

/// Resolves a closed ledger into an [`Outcome`].
///
/// `candidates` is the ballot's candidate id list, used both for the
/// ignore-vote random draw and for candidate tie-breaking.
pub fn resolve<R: Rng>(ledger: &VoteLedger, candidates: &[String], rng: &mut R) -> Outcome {
    if ledger.total_votes() == 0 {
        return Outcome::NoVotes;
    }

    let top = ledger
        .entries()
        .map(|entry| ledger.count(entry))
        .max()
        .unwrap_or(0);

    if ledger.has_entry(&BallotEntry::IgnoreVote) && ledger.count(&BallotEntry::IgnoreVote) == top {
        let pick = pick_uniform(candidates, rng);
        return Outcome::IgnoreVote { pick };
    }

    if ledger.has_entry(&BallotEntry::ExtendMap) && ledger.count(&BallotEntry::ExtendMap) == top {
        return Outcome::Extend;
    }

    let leaders: Vec<&String> = candidates
        .iter()
        .filter(|id| ledger.count(&BallotEntry::Candidate((*id).clone())) == top)
        .collect();

    match leaders.len() {
        0 => Outcome::NoVotes,
        1 => {
            let map = leaders[0].clone();
            let percent = ledger
                .tally()
                .get(&BallotEntry::Candidate(map.clone()))
                .copied()
                .unwrap_or(0);
            Outcome::Winner {
                map,
                percent,
                tie_break: false,
            }
        }
        n => {
            let map = leaders[rng.gen_range(0..n)].clone();
            let percent = ledger
                .tally()
                .get(&BallotEntry::Candidate(map.clone()))
                .copied()
                .unwrap_or(0);
            Outcome::Winner {
                map,
                percent,
                tie_break: true,
            }
        }
    }
}

fn pick_uniform<R: Rng>(candidates: &[String], rng: &mut R) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.gen_range(0..candidates.len())].clone())
}
