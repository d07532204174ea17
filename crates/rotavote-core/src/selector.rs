//! Candidate selection: who gets on the ballot.
//!
//! Derives a bounded candidate set from the catalog, current player
//! count, time-of-day windows, cooldowns, and nominations. Every
//! input-shape problem (bad window strings, missing definitions) fails
//! open, so a vote never becomes silently impossible because of a
//! config typo.

use chrono::NaiveTime;
use rand::Rng;
use tracing::{debug, warn};

use crate::catalog::{Catalog, MapDefinition};
use crate::cooldown::CooldownLedger;
use crate::nomination::NominationRegistry;

/// Checks a map's cycle time window against the local clock.
///
/// Empty bounds mean no window. Unparseable bounds are logged and
/// treated as no window. A start later than its end wraps past
/// midnight (23:00–05:00). Both ends are inclusive.
pub fn cycle_window_allows(map: &MapDefinition, now: NaiveTime) -> bool {
    let start_raw = map.cycle_start.trim();
    let end_raw = map.cycle_end.trim();
    if start_raw.is_empty() || end_raw.is_empty() {
        return true;
    }

    let start = match NaiveTime::parse_from_str(start_raw, "%H:%M") {
        Ok(t) => t,
        Err(_) => {
            warn!(map = %map.id, value = start_raw, "invalid cycle window start, ignoring window");
            return true;
        }
    };
    let end = match NaiveTime::parse_from_str(end_raw, "%H:%M") {
        Ok(t) => t,
        Err(_) => {
            warn!(map = %map.id, value = end_raw, "invalid cycle window end, ignoring window");
            return true;
        }
    };

    if start <= end {
        start <= now && now <= end
    } else {
        // overnight window: today's start through tomorrow's end
        now >= start || now <= end
    }
}

/// The base ballot predicate shared by selection and nomination.
///
/// Pass `cooldowns: None` to skip the cooldown clause (feature
/// disabled, or the fail-open retry).
pub fn eligible_for_ballot(
    map: &MapDefinition,
    current_map: &str,
    players: u32,
    now: NaiveTime,
    cooldowns: Option<&CooldownLedger>,
) -> bool {
    map.id != current_map
        && map.vote_eligible
        && map.allows_players(players)
        && cycle_window_allows(map, now)
        && cooldowns.map_or(true, |cd| cd.is_ready(&map.id))
}

/// Builds a ballot candidate list of at most `ballot_size` ids.
///
/// Nominated maps that pass the base predicate go in first; if they
/// alone fill the ballot the list is randomly down-sampled to exactly
/// `ballot_size`. Remaining slots are filled by uniform sampling
/// without replacement from the rest of the catalog. If nothing at all
/// is eligible and a cooldown filter was in effect, the whole pass is
/// retried without it so cooldown exhaustion can never suppress every
/// vote.
#[allow(clippy::too_many_arguments)]
pub fn populate<R: Rng>(
    catalog: &Catalog,
    nominations: &NominationRegistry,
    current_map: &str,
    players: u32,
    now: NaiveTime,
    cooldowns: Option<&CooldownLedger>,
    ballot_size: usize,
    rng: &mut R,
) -> Vec<String> {
    let picked = collect(
        catalog,
        nominations,
        current_map,
        players,
        now,
        cooldowns,
        ballot_size,
        rng,
    );
    if picked.is_empty() && cooldowns.is_some() {
        debug!("no candidates under cooldown filter, retrying without it");
        return collect(
            catalog,
            nominations,
            current_map,
            players,
            now,
            None,
            ballot_size,
            rng,
        );
    }
    picked
}

#[allow(clippy::too_many_arguments)]
fn collect<R: Rng>(
    catalog: &Catalog,
    nominations: &NominationRegistry,
    current_map: &str,
    players: u32,
    now: NaiveTime,
    cooldowns: Option<&CooldownLedger>,
    ballot_size: usize,
    rng: &mut R,
) -> Vec<String> {
    if ballot_size == 0 {
        return Vec::new();
    }

    // nominations first
    let mut picked: Vec<String> = nominations
        .maps()
        .filter_map(|id| catalog.get(id))
        .filter(|map| eligible_for_ballot(map, current_map, players, now, cooldowns))
        .map(|map| map.id.clone())
        .collect();

    if picked.len() >= ballot_size {
        // more nominations than slots: drop random ones
        while picked.len() > ballot_size {
            let victim = rng.gen_range(0..picked.len());
            picked.swap_remove(victim);
        }
        return picked;
    }

    // fill the rest from the catalog, uniformly without replacement
    let mut pool: Vec<&MapDefinition> = catalog
        .iter()
        .filter(|map| eligible_for_ballot(map, current_map, players, now, cooldowns))
        .filter(|map| !picked.iter().any(|id| id == &map.id))
        .collect();

    while picked.len() < ballot_size && !pool.is_empty() {
        let idx = rng.gen_range(0..pool.len());
        picked.push(pool.swap_remove(idx).id.clone());
    }

    picked
}

/// The fairness fallback when a vote produced no usable winner:
/// a uniform pick over the full catalog filtered only by player
/// bounds (and excluding the current map). Falls back to the first
/// cycle-enabled map if even that filter empties the pool.
pub fn random_by_players<R: Rng>(
    catalog: &Catalog,
    current_map: &str,
    players: u32,
    rng: &mut R,
) -> Option<String> {
    let pool: Vec<&MapDefinition> = catalog
        .iter()
        .filter(|map| map.id != current_map && map.allows_players(players))
        .collect();

    if pool.is_empty() {
        return catalog.cycle_maps().next().map(|map| map.id.clone());
    }
    Some(pool[rng.gen_range(0..pool.len())].id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    fn catalog_of(ids: &[&str]) -> Catalog {
        Catalog::new(ids.iter().map(|id| MapDefinition::new(*id)))
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn empty_window_always_allows() {
        let map = MapDefinition::new("de_dust2");
        assert!(cycle_window_allows(&map, noon()));
    }

    #[test]
    fn unparseable_window_fails_open() {
        let mut map = MapDefinition::new("de_dust2");
        map.cycle_start = "not-a-time".into();
        map.cycle_end = "18:00".into();
        assert!(cycle_window_allows(&map, noon()));
    }

    #[test]
    fn daytime_window_is_inclusive() {
        let mut map = MapDefinition::new("de_dust2");
        map.cycle_start = "09:00".into();
        map.cycle_end = "18:00".into();
        assert!(cycle_window_allows(&map, noon()));
        assert!(cycle_window_allows(
            &map,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        ));
        assert!(cycle_window_allows(
            &map,
            NaiveTime::from_hms_opt(18, 0, 0).unwrap()
        ));
        assert!(!cycle_window_allows(
            &map,
            NaiveTime::from_hms_opt(8, 59, 0).unwrap()
        ));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let mut map = MapDefinition::new("zm_night");
        map.cycle_start = "23:00".into();
        map.cycle_end = "05:00".into();
        assert!(cycle_window_allows(
            &map,
            NaiveTime::from_hms_opt(23, 30, 0).unwrap()
        ));
        assert!(cycle_window_allows(
            &map,
            NaiveTime::from_hms_opt(2, 0, 0).unwrap()
        ));
        assert!(!cycle_window_allows(&map, noon()));
    }

    #[test]
    fn populate_respects_size_and_excludes_current() {
        let catalog = catalog_of(&["a", "b", "c", "d", "e", "f", "g"]);
        let noms = NominationRegistry::new();
        let picked = populate(&catalog, &noms, "a", 10, noon(), None, 5, &mut rng());

        assert!(picked.len() <= 5);
        assert!(!picked.iter().any(|id| id == "a"));
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), picked.len(), "no duplicates");
    }

    #[test]
    fn nominations_take_priority() {
        let catalog = catalog_of(&["a", "b", "c", "d", "e", "f", "g"]);
        let mut noms = NominationRegistry::new();
        noms.insert(1, "f");
        noms.insert(2, "g");

        let picked = populate(&catalog, &noms, "a", 10, noon(), None, 5, &mut rng());
        assert!(picked.iter().any(|id| id == "f"));
        assert!(picked.iter().any(|id| id == "g"));
        assert_eq!(picked.len(), 5);
    }

    #[test]
    fn excess_nominations_down_sampled_to_ballot_size() {
        let catalog = catalog_of(&["a", "b", "c", "d", "e"]);
        let mut noms = NominationRegistry::new();
        for (player, id) in ["b", "c", "d", "e"].iter().enumerate() {
            noms.insert(player as u64, *id);
        }

        let picked = populate(&catalog, &noms, "a", 10, noon(), None, 3, &mut rng());
        assert_eq!(picked.len(), 3);
        for id in &picked {
            assert!(noms.contains_map(id));
        }
    }

    #[test]
    fn all_on_cooldown_falls_back_to_full_catalog() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let mut cooldowns = CooldownLedger::new();
        for id in ["b", "c", "d"] {
            cooldowns.reset(id, 3);
        }
        let noms = NominationRegistry::new();

        let picked = populate(
            &catalog,
            &noms,
            "a",
            10,
            noon(),
            Some(&cooldowns),
            5,
            &mut rng(),
        );
        assert!(
            !picked.is_empty(),
            "cooldown exhaustion must not suppress the vote"
        );
    }

    #[test]
    fn partially_cooled_catalog_prefers_ready_maps() {
        let catalog = catalog_of(&["a", "b", "c", "d"]);
        let mut cooldowns = CooldownLedger::new();
        cooldowns.reset("b", 2);
        let noms = NominationRegistry::new();

        let picked = populate(
            &catalog,
            &noms,
            "a",
            10,
            noon(),
            Some(&cooldowns),
            5,
            &mut rng(),
        );
        assert!(!picked.iter().any(|id| id == "b"));
        assert!(picked.iter().any(|id| id == "c"));
    }

    #[test]
    fn player_bounds_filter_candidates() {
        let mut big = MapDefinition::new("big_map");
        big.min_players = 20;
        let catalog = Catalog::new([MapDefinition::new("a"), MapDefinition::new("b"), big]);
        let noms = NominationRegistry::new();

        let picked = populate(&catalog, &noms, "a", 5, noon(), None, 5, &mut rng());
        assert!(!picked.iter().any(|id| id == "big_map"));
    }

    #[test]
    fn vote_ineligible_maps_never_appear() {
        let mut hidden = MapDefinition::new("admin_only");
        hidden.vote_eligible = false;
        let catalog = Catalog::new([MapDefinition::new("a"), MapDefinition::new("b"), hidden]);
        let noms = NominationRegistry::new();

        let picked = populate(&catalog, &noms, "a", 10, noon(), None, 5, &mut rng());
        assert!(!picked.iter().any(|id| id == "admin_only"));
    }

    #[test]
    fn random_by_players_excludes_current_map() {
        let catalog = catalog_of(&["a", "b"]);
        let pick = random_by_players(&catalog, "a", 5, &mut rng());
        assert_eq!(pick.as_deref(), Some("b"));
    }

    #[test]
    fn random_by_players_falls_back_to_first_cycle_map() {
        let mut small = MapDefinition::new("tiny");
        small.max_players = 2;
        let catalog = Catalog::new([small]);
        // player count out of bounds for every map except the fallback
        let pick = random_by_players(&catalog, "tiny", 30, &mut rng());
        assert_eq!(pick.as_deref(), Some("tiny"));
    }
}
