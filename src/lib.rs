//! # TD Sim
//!
//! Deterministic tower-defense match simulator with action-log replay.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TD SIM                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── geometry.rs - Points, paths, corridor containment       │
//! │  └── hash.rs     - State hashing for replay verification     │
//! │                                                              │
//! │  game/           - Match simulation (deterministic)          │
//! │  ├── config.rs   - Content catalog and match rules           │
//! │  ├── enemy.rs    - Path walking and damage                   │
//! │  ├── tower.rs    - Targeting, firing, upgrades               │
//! │  ├── projectile.rs - Timed guaranteed hits                   │
//! │  ├── wave.rs     - Spawn schedules                           │
//! │  ├── map.rs      - Per-frame board update                    │
//! │  ├── action.rs   - Player actions and rejections             │
//! │  ├── state.rs    - Match state and phases                    │
//! │  └── tick.rs     - Authoritative simulation loop             │
//! │                                                              │
//! │  replay/         - Action log, persistence, replay driver    │
//! │                                                              │
//! │  session/        - Async host (non-deterministic)            │
//! │  ├── host.rs     - Tick task, command queue, persistence     │
//! │  └── status.rs   - Status line refresh loop                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - No HashMap (BTreeMap and spawn-ordered arenas for sorted iteration)
//! - No system time or randomness inside a tick
//! - Player actions only take effect between ticks, stamped with the frame
//!
//! Given the same catalog, starting state and action log, a replay produces
//! the same state hash after every frame.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod replay;
pub mod session;

// Re-export commonly used types
pub use core::geometry::{Path, Point};
pub use core::hash::StateHash;
pub use game::{Catalog, MatchPhase, MatchState, Outcome, PlayerAction, PlayerProfile};
pub use replay::{ReplayError, ReplayStore, Watcher};
pub use session::{MatchSession, SessionConfig, SessionHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tick rate attack speeds are defined against (Hz)
pub const BASELINE_TPS: u32 = 60;

/// Tick rate when the player speeds the game up (Hz)
pub const FAST_TPS: u32 = 180;
