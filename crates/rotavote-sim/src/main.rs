//! Scripted session driver for the rotation engine.
//!
//! Simulates a round-based game server: maps load, rounds pass,
//! players vote and occasionally rock the vote, and the engine decides
//! what runs next. Useful for eyeballing engine behavior against a
//! real catalog without standing up a game server.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rotavote_core::{
    BallotEntry, Catalog, Engine, EngineConfig, Host, LimitAdjust, MapChange, MapDefinition,
    Notification, TickInput, VoteStatus,
};
use rotavote_store::{FileStore, StoreError};

#[derive(Debug, Parser)]
#[command(name = "rotavote-sim", about = "simulated game sessions for the rotavote engine")]
struct Args {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(long, env = "ROTAVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the catalog and cooldown state.
    #[arg(long, env = "ROTAVOTE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Map the first session starts on.
    #[arg(long, default_value = "de_dust2")]
    start_map: String,

    /// Simulated player count.
    #[arg(long, default_value_t = 10)]
    players: u32,

    /// Number of map sessions to run.
    #[arg(long, default_value_t = 3)]
    sessions: u32,

    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk configuration: engine settings plus an optional seed list
/// of maps to install into an empty catalog.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimConfig {
    engine: EngineConfig,
    maps: Vec<MapDefinition>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), SimError> {
    let config = load_config(args.config.as_deref())?;

    let store = FileStore::open(&args.data_dir)?;
    let mut catalog = store.load_catalog()?;
    let cooldowns = store.load_cooldowns()?;
    if catalog.is_empty() {
        if config.maps.is_empty() {
            warn!("catalog is empty and config seeds no maps, using a stock list");
            catalog = stock_catalog();
        } else {
            catalog = Catalog::new(config.maps.clone());
        }
        store.save_catalog(&catalog)?;
    }
    info!(maps = catalog.len(), data_dir = %args.data_dir.display(), "catalog ready");

    let seed = args.seed.unwrap_or_else(rand::random);
    info!(seed, "session rng seeded");
    let mut engine = Engine::new(config.engine, catalog, cooldowns, args.start_map.clone())
        .with_store(Box::new(store))
        .with_rng_seed(seed);

    let mut driver = Driver {
        rng: SmallRng::seed_from_u64(seed ^ 0x5eed),
        players: args.players,
        clock_ms: 0,
    };
    let mut map = args.start_map;
    for session in 1..=args.sessions {
        info!(session, map = %map, "=== session start ===");
        match driver.run_session(&mut engine, &map) {
            Some(next) => map = next,
            None => {
                warn!("session ended without a transition, stopping");
                break;
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<SimConfig, SimError> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| SimError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn stock_catalog() -> Catalog {
    let ids = [
        "de_ancient",
        "de_anubis",
        "de_dust2",
        "de_inferno",
        "de_mirage",
        "de_nuke",
        "de_overpass",
        "de_train",
        "de_vertigo",
    ];
    Catalog::new(ids.iter().map(|id| {
        let mut def = MapDefinition::new(*id);
        def.cooldown_cycles = 2;
        def
    }))
}

/// Logs every engine event and captures the ones the loop reacts to.
#[derive(Default)]
struct SimHost {
    ballot: Option<Vec<BallotEntry>>,
    change: Option<MapChange>,
    extra_rounds: u32,
}

impl Host for SimHost {
    fn show_ballot(&mut self, entries: &[BallotEntry]) {
        info!(options = entries.len(), "ballot shown to players");
        self.ballot = Some(entries.to_vec());
    }

    fn notify(&mut self, event: Notification) {
        info!(?event, "engine notification");
    }

    fn change_map(&mut self, change: &MapChange) {
        info!(?change, "server changing map");
        self.change = Some(change.clone());
    }

    fn adjust_limit(&mut self, adjust: LimitAdjust) {
        info!(?adjust, "map limit extended");
        if let LimitAdjust::Rounds(n) = adjust {
            self.extra_rounds = self.extra_rounds.saturating_add(n);
        }
    }
}

struct Driver {
    rng: SmallRng,
    players: u32,
    clock_ms: u64,
}

const ROUND_MS: u64 = 90_000;
const BASE_ROUNDS: u32 = 12;

impl Driver {
    /// Plays one map from load to transition. Returns the next map id
    /// the change directive points at, if the session produced one.
    fn run_session(&mut self, engine: &mut Engine, map: &str) -> Option<String> {
        let mut host = SimHost::default();
        engine.on_map_start(map, None, self.clock_ms);

        let base = engine
            .catalog()
            .get(map)
            .and_then(|def| def.round_limit)
            .unwrap_or(BASE_ROUNDS);

        let mut round = 0u32;
        while round < base + host.extra_rounds {
            round += 1;
            let limit = (base + host.extra_rounds) as f32;
            let input = self.input(limit, round as f32 - 1.0);
            engine.on_round_start(&input, &mut host);
            self.play_round(engine, &mut host, limit, round);
            if host.change.is_some() {
                break;
            }
            let input = self.input(limit, round as f32);
            engine.on_round_end(&input, &mut host);
            if host.change.is_some() {
                break;
            }
        }

        if host.change.is_none() {
            engine.on_match_end(&mut host);
        }
        host.change.as_ref().map(|change| match change {
            MapChange::Level(id) | MapChange::WorkshopName(id) => id.clone(),
            MapChange::WorkshopId(id) => self.resolve_workshop(engine, id),
        })
    }

    /// Advances the clock through one round, casting votes while a
    /// ballot is open and occasionally rocking the vote.
    fn play_round(&mut self, engine: &mut Engine, host: &mut SimHost, limit: f32, round: u32) {
        for tick in 0..9u64 {
            self.clock_ms += ROUND_MS / 9;
            let input = self.input(limit, round as f32 - 0.5);
            engine.on_tick(&input, host);

            if engine.status() == VoteStatus::Open {
                self.cast_votes(engine, host);
            } else if tick == 4 && self.rng.gen_bool(0.05) {
                let player = self.rng.gen_range(0..u64::from(self.players));
                if let Err(err) = engine.request_rtv(player, &input, host) {
                    info!(player, %err, "rtv request rejected");
                }
            }
        }
    }

    fn cast_votes(&mut self, engine: &mut Engine, host: &mut SimHost) {
        let Some(ballot) = host.ballot.take() else {
            return;
        };
        for player in 0..u64::from(self.players) {
            // a few players abstain
            if self.rng.gen_bool(0.2) {
                continue;
            }
            let entry = &ballot[self.rng.gen_range(0..ballot.len())];
            if engine.cast_vote(player, entry).is_ok() {
                info!(player, ?entry, "vote cast");
            }
        }
    }

    fn input(&self, limit: f32, elapsed: f32) -> TickInput {
        TickInput {
            now_ms: self.clock_ms,
            local_time: Local::now().time(),
            players: self.players,
            limit,
            elapsed,
            warmup: false,
        }
    }

    fn resolve_workshop(&self, engine: &Engine, workshop_id: &str) -> String {
        engine
            .catalog()
            .iter()
            .find(|def| def.workshop_id.as_deref() == Some(workshop_id))
            .map(|def| def.id.clone())
            .unwrap_or_else(|| workshop_id.to_string())
    }
}
