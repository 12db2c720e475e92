//! Session Layer
//!
//! Hosts one match on a tokio task. This layer is **non-deterministic**
//! (wall-clock pacing, command arrival), so everything that must replay
//! goes through `game/` and is recorded before it takes effect.
//!
//! ```text
//! ┌──────────────┐  SessionCommand (mpsc)   ┌────────────────────┐
//! │ SessionHandle│ ───────────────────────► │ tick task          │
//! │              │ ◄─── GameEvent (bcast) ─ │  drain → tick()    │
//! │              │ ◄─── MatchSnapshot ───── │  publish snapshot  │
//! └──────────────┘      (RwLock)            └─────────┬──────────┘
//!        ▲                                            │ stop (bcast)
//!        │ status line (watch)              ┌─────────▼──────────┐
//!        └──────────────────────────────────│ refresh loop       │
//!                                           └────────────────────┘
//! ```

pub mod host;
pub mod status;

pub use host::{
    MatchSession, SessionCommand, SessionConfig, SessionError, SessionHandle, SessionReport,
};
pub use status::status_line;
