//! rotavote-core: the map rotation and vote orchestration engine.
//!
//! Decides which level a session server runs next: automatic rotation,
//! player-driven early votes ("rock the vote"), scheduled end-of-map
//! ballots, nominations, and a cooldown that deprioritizes recently
//! played maps. Designed around a single engine context object driven
//! by discrete host events (round boundaries, periodic ticks, player
//! actions) on one thread; there is no internal concurrency.
//!
//! The engine never talks to a game server or renders text itself; it
//! emits semantic [`Notification`]s and fire-and-forget directives
//! through the [`Host`] trait, and persists state through
//! [`CatalogStore`].

pub mod catalog;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod nomination;
pub mod resolver;
pub mod rtv;
pub mod selector;

pub use catalog::{Catalog, MapDefinition, UnknownMapError};
pub use config::{EngineConfig, LimitMode, RtvConfig};
pub use cooldown::CooldownLedger;
pub use engine::{Engine, TickInput, VoteStatus};
pub use events::{CatalogStore, Host, LimitAdjust, MapChange, Notification, NullStore, PlayerId};
pub use ledger::{BallotEntry, VoteError, VoteLedger};
pub use nomination::{NominateError, NominationRegistry};
pub use resolver::Outcome;
pub use rtv::{RtvError, RtvState};
