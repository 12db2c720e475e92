//! TD Sim
//!
//! Runs a scripted demo match, saves its action log and replays it to check
//! that the final state hash matches. Also replays saved logs.
//!
//! ```text
//! td-sim [demo]          scripted match, simulated as fast as possible
//! td-sim play            two-archer match hosted in real time (3x speed)
//! td-sim replay <file>   replay a saved log
//! td-sim list            list saved logs
//! ```
//!
//! `TD_SIM_CONFIG_DIR` points at a catalog directory (built-in demo content
//! otherwise); `TD_SIM_REPLAY_DIR` is where logs go (`Replays` by default);
//! `TD_SIM_PROFILE` holds won levels (`stats.json` by default).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use td_sim::{
    game::{tick, AimStrategy, GameEventData, TowerIndex},
    replay::{replay, ReplayStore},
    session::{SessionCommand, SessionConfig},
    Catalog, MatchPhase, MatchSession, MatchState, Outcome, PlayerAction, PlayerProfile,
    BASELINE_TPS, VERSION,
};

const DEMO_LEVEL: &str = "meadow";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("TD Sim v{}", VERSION);

    let catalog = Arc::new(load_catalog()?);
    let store = ReplayStore::new(
        std::env::var_os("TD_SIM_REPLAY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("Replays")),
    );

    let profile_path = std::env::var_os("TD_SIM_PROFILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("stats.json"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("demo") => demo_match(catalog, &store, &profile_path),
        Some("play") => hosted_match(catalog, store, &profile_path).await,
        Some("replay") => {
            let Some(path) = args.get(1) else {
                bail!("usage: td-sim replay <file>");
            };
            replay_file(catalog, path)
        }
        Some("list") => {
            for path in store.list()? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Some(other) => bail!("unknown command {:?}, expected demo, play, replay or list", other),
    }
}

fn load_catalog() -> Result<Catalog> {
    match std::env::var_os("TD_SIM_CONFIG_DIR") {
        Some(dir) => Catalog::load_dir(&dir)
            .with_context(|| format!("loading catalog from {}", PathBuf::from(&dir).display())),
        None => {
            info!("TD_SIM_CONFIG_DIR not set, using built-in content");
            Ok(Catalog::demo())
        }
    }
}

/// Record a won level in the saved profile.
fn record_outcome(
    profile_path: &Path,
    mut profile: PlayerProfile,
    outcome: Option<Outcome>,
) -> Result<()> {
    if outcome != Some(Outcome::Win) {
        return Ok(());
    }
    if profile.record_win(DEMO_LEVEL) {
        profile
            .save(profile_path)
            .with_context(|| format!("saving profile to {}", profile_path.display()))?;
        info!("Level {} completed, progress saved to {}", DEMO_LEVEL, profile_path.display());
    }
    Ok(())
}

/// The demo player's choice for the current frame, if any.
fn scripted_action(state: &MatchState) -> Option<PlayerAction> {
    let towers = state.map.towers.len();
    let next_wave = state.current_wave.map_or(0, |w| w + 1);
    let mage_aim = state.map.towers.get(&TowerIndex(2)).map(|t| t.aim);

    match (state.phase, towers) {
        (MatchPhase::NextWaveReady, 0) => Some(PlayerAction::PutTower {
            name: "archer".into(),
            x: 100,
            y: 600,
        }),
        (MatchPhase::NextWaveReady, 1) => Some(PlayerAction::PutTower {
            name: "archer".into(),
            x: 160,
            y: 480,
        }),
        (MatchPhase::NextWaveReady, 2) if next_wave >= 1 && state.player.money >= 250 => {
            Some(PlayerAction::PutTower { name: "mage".into(), x: 480, y: 300 })
        }
        (MatchPhase::NextWaveReady, 3) if mage_aim != Some(AimStrategy::Strongest) => {
            Some(PlayerAction::TuneStrong { index: TowerIndex(2) })
        }
        (MatchPhase::NextWaveReady, _) => Some(PlayerAction::StartWave),
        (MatchPhase::Running, _) if state.player.money >= 170 => {
            Some(PlayerAction::UpgradeTower { index: TowerIndex(0) })
        }
        _ => None,
    }
}

/// Simulate the scripted match, save it, replay it from disk.
fn demo_match(catalog: Arc<Catalog>, store: &ReplayStore, profile_path: &Path) -> Result<()> {
    info!("=== Starting Demo Match ===");

    let profile = PlayerProfile::load(profile_path)?;
    let mut state = MatchState::new(Arc::clone(&catalog), DEMO_LEVEL, &profile, Utc::now())?;

    let mut total_events = 0;
    while !state.is_ended() {
        // Keep acting until the script runs out of ideas for this frame
        while let Some(action) = scripted_action(&state) {
            let kind = action.kind();
            if let Err(reason) = state.apply(action) {
                if kind != "UpgradeTower" {
                    warn!(frame = state.frame, action = kind, %reason, "scripted action refused");
                }
                break;
            }
            if kind == "StartWave" || kind == "TuneStrong" {
                break;
            }
        }

        let result = tick(&mut state);
        total_events += result.events.len();
        for event in &result.events {
            if let GameEventData::WaveCleared { wave } = event.data {
                info!(
                    "Wave {} cleared at frame {} (health {}, money {})",
                    wave + 1,
                    event.frame,
                    state.player.health,
                    state.player.money
                );
            }
        }
    }

    info!("=== Match Results ===");
    let hash = state.compute_hash();
    info!("Outcome: {:?} after {} frames ({} s at {} TPS)",
          state.outcome(), state.frame, state.frame / BASELINE_TPS, BASELINE_TPS);
    info!("Total events: {}", total_events);
    info!("Final State Hash: {}", hex::encode(hash));
    record_outcome(profile_path, profile, state.outcome())?;

    let Some(watcher) = state.take_watcher() else {
        bail!("demo match was not recorded");
    };
    let path = store.save(&watcher)?;
    info!("Saved {} actions to {}", watcher.actions.len(), path.display());

    info!("=== Verifying Determinism ===");
    let loaded = ReplayStore::load(&path)?;
    let report = replay(catalog, loaded)?;
    info!("Replay State Hash: {}", hex::encode(report.final_hash));

    if report.final_hash == hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        bail!("DETERMINISM FAILURE: Hashes differ!")
    }
}

/// Host the scripted match in real time, printing the status line.
async fn hosted_match(catalog: Arc<Catalog>, store: ReplayStore, profile_path: &Path) -> Result<()> {
    let profile = PlayerProfile::load(profile_path)?;
    let state = MatchState::new(Arc::clone(&catalog), DEMO_LEVEL, &profile, Utc::now())?;
    let config = SessionConfig::for_rules(&catalog.rules).with_replay_store(store);
    let handle = MatchSession::spawn(state, config);
    info!("Session {} started", handle.id());

    handle.send(SessionCommand::SetSpeed { fast: true }).await?;
    for (x, y) in [(100, 600), (160, 480)] {
        handle.act(PlayerAction::PutTower { name: "archer".into(), x, y }).await?;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, abandoning match");
                handle.shutdown();
                break;
            }
        }

        println!("{}", handle.status());
        let snapshot = handle.snapshot().await;
        if snapshot.ended {
            break;
        }
        if snapshot.phase == MatchPhase::NextWaveReady {
            handle.act(PlayerAction::StartWave).await?;
        }
    }

    let report = handle.join().await?;
    info!("Outcome: {:?} after {} frames", report.outcome, report.frames);
    if let Some(err) = &report.persist_error {
        warn!("Replay not saved: {}", err);
    }
    record_outcome(profile_path, profile, report.outcome)?;

    let Some(watcher) = report.watcher else {
        bail!("hosted match was not recorded");
    };
    let replayed = replay(catalog, watcher)?;
    if replayed.final_hash != report.final_hash {
        bail!("DETERMINISM FAILURE: Hashes differ!");
    }
    info!("DETERMINISM VERIFIED: {}", hex::encode(report.final_hash));
    Ok(())
}

fn replay_file(catalog: Arc<Catalog>, path: &str) -> Result<()> {
    let watcher = ReplayStore::load(path).with_context(|| format!("loading {}", path))?;
    info!(
        "Replaying {} ({} actions, recorded {})",
        watcher.name,
        watcher.actions.len(),
        watcher.time
    );

    let report = replay(catalog, watcher)?;
    info!("Outcome: {:?} after {} frames", report.outcome, report.frames);
    info!("Health {}, money {}", report.player.health, report.player.money);
    info!("Final State Hash: {}", hex::encode(report.final_hash));
    Ok(())
}
