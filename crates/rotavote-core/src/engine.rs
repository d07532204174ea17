//! The engine context: one object owning all rotation state.
//!
//! The host drives it with discrete events (map start, round
//! boundaries, periodic ticks, player actions) on a single thread.
//! Deferred work (closing an open ballot) goes through an internal
//! task queue guarded by an epoch counter, so tasks scheduled for a
//! map that already ended can never fire into the next session.

use std::collections::HashMap;

use chrono::NaiveTime;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, MapDefinition, UnknownMapError};
use crate::config::{EngineConfig, LimitMode};
use crate::cooldown::CooldownLedger;
use crate::events::{
    CatalogStore, Host, LimitAdjust, MapChange, Notification, NullStore, PlayerId,
};
use crate::ledger::{BallotEntry, VoteError, VoteLedger};
use crate::nomination::{NominateError, NominationRegistry};
use crate::resolver::{self, Outcome};
use crate::rtv::{RtvError, RtvState};
use crate::selector;

/// Where the vote lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    /// No ballot pending.
    Idle,
    /// Candidates are chosen; the ballot opens at the next boundary.
    Armed,
    /// Players are voting.
    Open,
    /// The ballot is being tallied.
    Resolving,
}

/// Snapshot of host-side session state passed into every event.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    /// Monotonic session clock, milliseconds.
    pub now_ms: u64,
    /// Server-local wall clock, for cycle time windows.
    pub local_time: NaiveTime,
    /// Connected players.
    pub players: u32,
    /// Map limit: rounds in rounds mode, seconds in time mode. Zero or
    /// negative means unlimited.
    pub limit: f32,
    /// Progress toward the limit, same unit.
    pub elapsed: f32,
    /// Warmup periods never arm ballots.
    pub warmup: bool,
}

#[derive(Debug, Clone, Copy)]
enum TaskKind {
    ResolveBallot,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    fire_at_ms: u64,
    epoch: u64,
    kind: TaskKind,
}

/// The rotation and vote orchestration engine.
pub struct Engine {
    config: EngineConfig,
    catalog: Catalog,
    cooldowns: CooldownLedger,
    nominations: NominationRegistry,
    rtv: RtvState,
    ledger: VoteLedger,
    status: VoteStatus,
    candidates: Vec<String>,
    ballot_via_rtv: bool,
    current_map: String,
    last_map: Option<String>,
    next_map: Option<String>,
    voted_this_map: bool,
    extends_used: u32,
    epoch: u64,
    tasks: Vec<Task>,
    store: Box<dyn CatalogStore>,
    rng: SmallRng,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        catalog: Catalog,
        cooldowns: CooldownLedger,
        current_map: impl Into<String>,
    ) -> Self {
        Self {
            config,
            catalog,
            cooldowns,
            nominations: NominationRegistry::new(),
            rtv: RtvState::new(),
            ledger: VoteLedger::default(),
            status: VoteStatus::Idle,
            candidates: Vec::new(),
            ballot_via_rtv: false,
            current_map: current_map.into(),
            last_map: None,
            next_map: None,
            voted_this_map: false,
            extends_used: 0,
            epoch: 0,
            tasks: Vec::new(),
            store: Box::new(NullStore),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Attaches a persistence backend for discovered maps and cooldowns.
    pub fn with_store(mut self, store: Box<dyn CatalogStore>) -> Self {
        self.store = store;
        self
    }

    /// Fixes the RNG seed. Random picks become reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn status(&self) -> VoteStatus {
        self.status
    }

    pub fn current_map(&self) -> &str {
        &self.current_map
    }

    pub fn last_map(&self) -> Option<&str> {
        self.last_map.as_deref()
    }

    pub fn next_map(&self) -> Option<&str> {
        self.next_map.as_deref()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn extends_used(&self) -> u32 {
        self.extends_used
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cooldowns(&self) -> &CooldownLedger {
        &self.cooldowns
    }

    pub fn nominations(&self) -> &NominationRegistry {
        &self.nominations
    }

    pub fn rtv(&self) -> &RtvState {
        &self.rtv
    }

    /// Live percentages for the open ballot, for status commands.
    pub fn vote_tally(&self) -> HashMap<BallotEntry, u32> {
        self.ledger.tally()
    }

    /// Requests still needed to rock the vote at this player count.
    pub fn rtv_remaining(&self, players: u32) -> u32 {
        RtvState::required(players, self.config.rtv.required_percentage)
            .saturating_sub(self.rtv.count())
    }

    /// A new map session has begun.
    ///
    /// Bumps the task epoch (orphaning anything scheduled for the
    /// previous map), clears all per-map state, handles dynamic
    /// discovery of unlisted maps, and advances cooldowns.
    pub fn on_map_start(&mut self, map: &str, workshop_id: Option<&str>, now_ms: u64) {
        info!(map, "map session started");
        self.epoch += 1;
        self.tasks.clear();
        self.status = VoteStatus::Idle;
        self.ledger.clear();
        self.candidates.clear();
        self.ballot_via_rtv = false;
        self.nominations.reset_all();
        self.rtv.reset(now_ms);
        self.next_map = None;
        self.voted_this_map = false;
        self.extends_used = 0;
        if map != self.current_map {
            let prev = std::mem::replace(&mut self.current_map, map.to_string());
            self.last_map = Some(prev);
        }

        match self.catalog.get(map) {
            None => {
                let def = MapDefinition::discovered(
                    map,
                    workshop_id,
                    self.config.discovered_cooldown_cycles,
                );
                info!(map, "unlisted map loaded, adding to catalog");
                self.store.persist_map(&def);
                self.catalog.insert(def);
            }
            Some(existing) => {
                // learn the workshop id the first time the host reports it
                if let Some(wid) = workshop_id {
                    if existing.workshop_id.as_deref() != Some(wid) {
                        let mut updated = existing.clone();
                        updated.workshop = true;
                        updated.workshop_id = Some(wid.to_string());
                        debug!(map, workshop_id = wid, "updating workshop identity");
                        self.store.persist_map(&updated);
                        self.catalog.insert(updated);
                    }
                }
            }
        }

        self.cooldowns.decrement_all();
        if self.config.cooldown_enabled {
            let cycles = self
                .catalog
                .get(map)
                .map(|m| m.cooldown_cycles)
                .unwrap_or(0);
            if cycles > 0 {
                self.cooldowns.reset(map, cycles);
            }
        }
        self.store.persist_cooldowns(&self.cooldowns);
    }

    /// Round boundary: an armed ballot opens here in rounds mode.
    pub fn on_round_start(&mut self, input: &TickInput, host: &mut dyn Host) {
        if self.config.limit_mode == LimitMode::Rounds && self.status == VoteStatus::Armed {
            self.open_ballot(input, host, false);
        }
    }

    /// Round boundary: deferred RTV transitions commit here, and the
    /// scheduled ballot arms when the map is close enough to its end.
    pub fn on_round_end(&mut self, input: &TickInput, host: &mut dyn Host) {
        if self.rtv.is_triggered() {
            self.commit_transition(host);
            return;
        }
        if self.config.limit_mode == LimitMode::Rounds {
            self.try_arm(input, host);
        }
    }

    /// Periodic heartbeat. Fires due tasks; in time mode this is also
    /// where ballots arm and open.
    pub fn on_tick(&mut self, input: &TickInput, host: &mut dyn Host) {
        self.run_due_tasks(input, host);
        if self.config.limit_mode == LimitMode::Time {
            self.try_arm(input, host);
            if self.status == VoteStatus::Armed {
                self.open_ballot(input, host, false);
            }
        }
    }

    /// The map's limit was reached. Commits the pending transition, or
    /// picks a rotation map if no vote decided one.
    pub fn on_match_end(&mut self, host: &mut dyn Host) {
        self.commit_transition(host);
    }

    /// Records one player's ballot selection.
    pub fn cast_vote(&mut self, player: PlayerId, entry: &BallotEntry) -> Result<(), VoteError> {
        if self.status != VoteStatus::Open {
            return Err(VoteError::NotOpen);
        }
        self.ledger.record(entry, player)
    }

    /// One player asks to rock the vote.
    pub fn request_rtv(
        &mut self,
        player: PlayerId,
        input: &TickInput,
        host: &mut dyn Host,
    ) -> Result<(), RtvError> {
        if !self.config.rtv.enabled {
            return Err(RtvError::Disabled);
        }
        if self.status != VoteStatus::Idle {
            return Err(RtvError::VoteInProgress);
        }
        let remaining = self
            .rtv
            .delay_remaining_secs(input.now_ms, self.config.rtv.delay_secs);
        if remaining > 0 {
            return Err(RtvError::TooEarly {
                remaining_secs: remaining,
            });
        }
        if !self.rtv.register(player) {
            return Err(RtvError::AlreadyRequested);
        }

        let required = RtvState::required(input.players, self.config.rtv.required_percentage);
        let current = self.rtv.count();
        debug!(player, current, required, "rtv request registered");
        host.notify(Notification::RtvProgress {
            player,
            current,
            required,
        });
        if current >= required {
            self.start_rtv(input, host);
        }
        Ok(())
    }

    /// Admin override: trigger RTV without a player threshold.
    pub fn force_rtv(&mut self, input: &TickInput, host: &mut dyn Host) -> Result<(), RtvError> {
        if !self.config.rtv.enabled {
            return Err(RtvError::Disabled);
        }
        if self.status != VoteStatus::Idle {
            return Err(RtvError::VoteInProgress);
        }
        self.start_rtv(input, host);
        Ok(())
    }

    /// Nominates a map onto the next ballot, subject to the full
    /// eligibility checks.
    pub fn nominate(
        &mut self,
        player: PlayerId,
        map_id: &str,
        input: &TickInput,
        host: &mut dyn Host,
    ) -> Result<(), NominateError> {
        if !self.nominations.can_nominate(player) {
            return Err(NominateError::AlreadyNominated);
        }
        let def = self
            .catalog
            .get(map_id)
            .ok_or_else(|| NominateError::UnknownMap(map_id.to_string()))?;
        if def.id == self.current_map {
            return Err(NominateError::CurrentMap);
        }
        if self.nominations.contains_map(map_id) {
            return Err(NominateError::DuplicateNomination);
        }
        if !def.cycle_enabled || !def.vote_eligible {
            return Err(NominateError::NotInCycle);
        }
        if !def.allows_players(input.players) {
            return Err(NominateError::PlayerCount {
                min: def.min_players,
                max: def.max_players,
                current: input.players,
            });
        }
        if !selector::cycle_window_allows(def, input.local_time) {
            return Err(NominateError::TimeRestricted);
        }
        if self.config.cooldown_enabled {
            let remaining = self.cooldowns.remaining(map_id);
            if remaining > 0 {
                return Err(NominateError::OnCooldown { remaining });
            }
        }

        self.nominations.insert(player, map_id);
        info!(player, map = map_id, "nomination added");
        host.notify(Notification::NominationAdded {
            player,
            map: map_id.to_string(),
        });
        Ok(())
    }

    /// Admin nomination: skips player-count, time-window, cooldown, and
    /// vote-eligibility checks.
    pub fn force_nominate(
        &mut self,
        player: PlayerId,
        map_id: &str,
        host: &mut dyn Host,
    ) -> Result<(), NominateError> {
        if !self.nominations.can_nominate(player) {
            return Err(NominateError::AlreadyNominated);
        }
        let def = self
            .catalog
            .get(map_id)
            .ok_or_else(|| NominateError::UnknownMap(map_id.to_string()))?;
        if def.id == self.current_map {
            return Err(NominateError::CurrentMap);
        }
        if self.nominations.contains_map(map_id) {
            return Err(NominateError::DuplicateNomination);
        }
        if !def.cycle_enabled {
            return Err(NominateError::NotInCycle);
        }

        self.nominations.insert(player, map_id);
        info!(player, map = map_id, "nomination forced");
        host.notify(Notification::NominationAdded {
            player,
            map: map_id.to_string(),
        });
        Ok(())
    }

    /// Withdraws a player's nomination if they have one.
    pub fn remove_nomination(&mut self, player: PlayerId, host: &mut dyn Host) {
        if let Some(map) = self.nominations.remove_player(player) {
            debug!(player, map = %map, "nomination removed");
            host.notify(Notification::NominationRemoved { player, map });
        }
    }

    /// Drops the player's nomination and RTV request.
    pub fn on_player_disconnect(&mut self, player: PlayerId, host: &mut dyn Host) {
        self.rtv.remove(player);
        self.remove_nomination(player, host);
    }

    /// Admin override of the pending transition target. Also retires
    /// the scheduled ballot for this map, since the decision is made.
    pub fn set_next_map(&mut self, map_id: &str, host: &mut dyn Host) -> Result<(), UnknownMapError> {
        if !self.catalog.contains(map_id) {
            return Err(UnknownMapError(map_id.to_string()));
        }
        self.next_map = Some(map_id.to_string());
        self.voted_this_map = true;
        info!(map = map_id, "next map set");
        host.notify(Notification::NextMapSet {
            map: map_id.to_string(),
        });
        Ok(())
    }

    fn schedule(&mut self, fire_at_ms: u64, kind: TaskKind) {
        self.tasks.push(Task {
            fire_at_ms,
            epoch: self.epoch,
            kind,
        });
    }

    fn run_due_tasks(&mut self, input: &TickInput, host: &mut dyn Host) {
        let now = input.now_ms;
        let mut due = Vec::new();
        self.tasks.retain(|task| {
            if task.fire_at_ms <= now {
                due.push(*task);
                false
            } else {
                true
            }
        });
        for task in due {
            // tasks from an earlier map session are dead
            if task.epoch != self.epoch {
                continue;
            }
            match task.kind {
                TaskKind::ResolveBallot => self.resolve_ballot(input, host),
            }
        }
    }

    /// Arms the scheduled end-of-map ballot once the remaining limit
    /// drops inside the trigger threshold.
    fn try_arm(&mut self, input: &TickInput, host: &mut dyn Host) {
        if !self.config.vote_enabled
            || self.status != VoteStatus::Idle
            || self.voted_this_map
            || input.warmup
        {
            return;
        }
        if input.limit <= 0.0 {
            return;
        }
        let remaining = input.limit - input.elapsed;
        let threshold = match self.config.limit_mode {
            LimitMode::Rounds => self.config.trigger_before_end as f32,
            LimitMode::Time => (self.config.trigger_before_end * 60) as f32,
        };
        if remaining > threshold {
            return;
        }

        self.populate_candidates(input);
        if self.candidates.is_empty() {
            warn!("no eligible candidates, suppressing scheduled ballot");
            self.voted_this_map = true;
            host.notify(Notification::VoteSuppressed);
        } else {
            debug!(candidates = self.candidates.len(), "ballot armed");
            self.status = VoteStatus::Armed;
        }
    }

    fn populate_candidates(&mut self, input: &TickInput) {
        let cooldowns = self.config.cooldown_enabled.then_some(&self.cooldowns);
        self.candidates = selector::populate(
            &self.catalog,
            &self.nominations,
            &self.current_map,
            input.players,
            input.local_time,
            cooldowns,
            self.config.ballot_size,
            &mut self.rng,
        );
    }

    fn open_ballot(&mut self, input: &TickInput, host: &mut dyn Host, via_rtv: bool) {
        let mut entries = Vec::with_capacity(self.candidates.len() + 2);
        if self.config.enable_ignore_vote {
            entries.push(BallotEntry::IgnoreVote);
        }
        entries.extend(self.candidates.iter().cloned().map(BallotEntry::Candidate));
        let max_extends = self
            .catalog
            .get(&self.current_map)
            .and_then(|m| m.max_extends)
            .unwrap_or(self.config.max_extends);
        // an RTV ballot exists to leave the map; extending it is not an option
        if self.config.enable_extend && self.extends_used < max_extends && !via_rtv {
            entries.push(BallotEntry::ExtendMap);
        }

        self.ledger = VoteLedger::open(entries.iter().cloned());
        self.status = VoteStatus::Open;
        self.ballot_via_rtv = via_rtv;
        info!(entries = entries.len(), via_rtv, "ballot opened");
        host.show_ballot(&entries);
        host.notify(Notification::VoteStarted);
        self.schedule(
            input.now_ms + self.config.vote_duration_secs * 1000,
            TaskKind::ResolveBallot,
        );
    }

    fn resolve_ballot(&mut self, input: &TickInput, host: &mut dyn Host) {
        if self.status != VoteStatus::Open {
            return;
        }
        self.status = VoteStatus::Resolving;
        self.voted_this_map = true;

        let outcome = resolver::resolve(&self.ledger, &self.candidates, &mut self.rng);
        info!(?outcome, "ballot resolved");
        match outcome {
            Outcome::NoVotes | Outcome::IgnoreVote { pick: None } => {
                self.fallback_pick(input.players, host);
            }
            Outcome::Winner {
                map,
                percent,
                tie_break,
            } => {
                self.next_map = Some(map.clone());
                host.notify(if tie_break {
                    Notification::VoteTiedRandomPick { map }
                } else {
                    Notification::VoteFinished { map, percent }
                });
            }
            Outcome::IgnoreVote { pick: Some(map) } => {
                self.next_map = Some(map.clone());
                host.notify(Notification::IgnoreVoteRandomPick { map });
            }
            Outcome::Extend => {
                let amount = self.config.extend_amount;
                let adjust = match self.config.limit_mode {
                    LimitMode::Rounds => LimitAdjust::Rounds(amount),
                    LimitMode::Time => LimitAdjust::Minutes(amount),
                };
                host.adjust_limit(adjust);
                self.extends_used += 1;
                // the map goes on, so the scheduled ballot may rearm
                self.voted_this_map = false;
                host.notify(Notification::ExtendApplied { amount });
            }
        }

        self.ledger.clear();
        self.candidates.clear();
        self.status = VoteStatus::Idle;

        if self.ballot_via_rtv {
            self.ballot_via_rtv = false;
            if self.next_map.is_some() {
                if self.config.rtv.change_instantly {
                    self.commit_transition(host);
                } else {
                    self.rtv.mark_triggered();
                }
            }
        }
    }

    fn fallback_pick(&mut self, players: u32, host: &mut dyn Host) {
        match selector::random_by_players(&self.catalog, &self.current_map, players, &mut self.rng)
        {
            Some(map) => {
                info!(map = %map, "fallback map selected");
                self.next_map = Some(map.clone());
                host.notify(Notification::FallbackMapSelected { map });
            }
            None => {
                warn!("catalog has no fallback map");
                host.notify(Notification::NoNextMapAvailable);
            }
        }
    }

    fn start_rtv(&mut self, input: &TickInput, host: &mut dyn Host) {
        info!("rock the vote triggered");
        host.notify(Notification::RtvTriggered);

        if self.config.rtv.respect_next_map {
            if let Some(map) = self.next_map.clone() {
                host.notify(Notification::RtvUsingNextMap { map });
                if self.config.rtv.change_instantly {
                    self.commit_transition(host);
                } else {
                    self.rtv.mark_triggered();
                }
                return;
            }
        }

        self.populate_candidates(input);
        if self.candidates.is_empty() {
            warn!("no eligible candidates for rtv ballot");
            host.notify(Notification::VoteSuppressed);
            return;
        }
        self.open_ballot(input, host, true);
    }

    /// Hands the host a map-change directive for the pending target,
    /// or a random rotation map when nothing was decided.
    fn commit_transition(&mut self, host: &mut dyn Host) {
        self.rtv.clear_triggered();
        let target = match self.next_map.take() {
            Some(map) => Some(map),
            None => self.random_cycle_map(),
        };
        let target = match target {
            Some(map) => map,
            None => {
                warn!("no next map available, keeping current map");
                host.notify(Notification::NoNextMapAvailable);
                return;
            }
        };

        if self.config.cooldown_enabled {
            let cycles = self
                .catalog
                .get(&target)
                .map(|m| m.cooldown_cycles)
                .unwrap_or(0);
            if cycles > 0 {
                self.cooldowns.reset(&target, cycles);
            }
            self.store.persist_cooldowns(&self.cooldowns);
        }

        let change = match self.catalog.get(&target) {
            Some(def) if def.workshop => match def.workshop_id.as_deref() {
                Some(id) if !id.is_empty() => MapChange::WorkshopId(id.to_string()),
                _ => MapChange::WorkshopName(target.clone()),
            },
            _ => MapChange::Level(target.clone()),
        };
        info!(map = %target, "committing map transition");
        host.change_map(&change);
    }

    fn random_cycle_map(&mut self) -> Option<String> {
        let pool: Vec<&MapDefinition> = self
            .catalog
            .cycle_maps()
            .filter(|m| m.id != self.current_map)
            .collect();
        if pool.is_empty() {
            return None;
        }
        Some(pool[self.rng.gen_range(0..pool.len())].id.clone())
    }
}
