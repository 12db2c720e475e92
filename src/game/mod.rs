//! Game Logic Module
//!
//! All match simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `config`: Content definitions (enemies, towers, maps, levels) and loading
//! - `enemy`: Path walking, damage and death
//! - `tower`: Targeting, firing, upgrades
//! - `projectile`: Timed guaranteed-hit shots
//! - `wave`: Frame-indexed spawn schedules
//! - `map`: Live collections and the per-frame board update
//! - `action`: Player intents and why they get refused
//! - `state`: Match state, phases, economy
//! - `tick`: Authoritative simulation loop
//! - `events`: Game events for renderers and logs

pub mod config;
pub mod enemy;
pub mod tower;
pub mod projectile;
pub mod wave;
pub mod map;
pub mod action;
pub mod state;
pub mod tick;
pub mod events;

// Re-export key types
pub use config::{Catalog, ConfigError, MatchRules, PlayerProfile};
pub use action::{ActionRejected, PlayerAction};
pub use state::{MatchPhase, MatchSnapshot, MatchState, Outcome, PlayerMapState};
pub use tower::{AimStrategy, TowerIndex};
pub use tick::{tick, TickResult};
pub use events::{GameEvent, GameEventData};
