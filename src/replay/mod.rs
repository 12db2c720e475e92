//! Action Log Record and Replay
//!
//! Every accepted player action is recorded with its frame. Because the
//! simulation is a pure function of (catalog, starting state, actions), the
//! log alone rebuilds the whole match.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    REPLAY                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  watcher.rs  - Frame-stamped action log (JSON / bincode)    │
//! │  store.rs    - One file per match under a replay directory  │
//! │  driver.rs   - Re-run a fresh match from a log              │
//! │  error.rs    - Replay and persistence errors                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod watcher;
pub mod store;
pub mod driver;

// Re-export key types
pub use error::ReplayError;
pub use watcher::{Action, Watcher, WATCHER_VERSION};
pub use store::ReplayStore;
pub use driver::{replay, ReplayDriver, ReplayReport, ReplayStep};
