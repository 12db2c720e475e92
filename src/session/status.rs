//! Status Line
//!
//! A background loop that turns the latest published snapshot into a short
//! human-readable line. It never touches the match itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::game::state::{MatchPhase, MatchSnapshot, Outcome};

/// Format a one-line summary of a snapshot.
pub fn status_line(snapshot: &MatchSnapshot) -> String {
    let phase = match snapshot.phase {
        MatchPhase::NextWaveReady => "ready",
        MatchPhase::Running => "running",
        MatchPhase::Ended(Outcome::Win) => "won",
        MatchPhase::Ended(Outcome::Loss) => "lost",
        MatchPhase::Ended(Outcome::Abandoned) => "abandoned",
    };
    let wave = snapshot.current_wave.map_or(0, |w| w + 1);

    format!(
        "{} | wave {}/{} | frame {} | health {} | money {} | enemies {} | {}",
        snapshot.level_name,
        wave,
        snapshot.wave_count,
        snapshot.frame,
        snapshot.player.health,
        snapshot.player.money,
        snapshot.enemies.len(),
        phase,
    )
}

/// Refresh `status` from `snapshot` every `period` until shutdown.
pub(crate) async fn refresh_loop(
    snapshot: Arc<RwLock<MatchSnapshot>>,
    status: watch::Sender<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = status_line(&*snapshot.read().await);
                // No receivers left is fine
                let _ = status.send(line);
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    // Last word reflects the final snapshot
    let _ = status.send(status_line(&*snapshot.read().await));
    debug!("status loop stopped");
}
