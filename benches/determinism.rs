//! Tick throughput and replay cost on the built-in level.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use td_sim::game::{tick, MatchPhase, MatchState, PlayerAction, PlayerProfile};
use td_sim::replay::{replay, Watcher};
use td_sim::Catalog;

fn defended_match(catalog: &Arc<Catalog>) -> MatchState {
    let mut state = MatchState::new(
        Arc::clone(catalog),
        "meadow",
        &PlayerProfile::default(),
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    )
    .unwrap();
    for (x, y) in [(100, 600), (160, 480), (480, 300)] {
        state
            .apply(PlayerAction::PutTower { name: "archer".into(), x, y })
            .unwrap();
    }
    state
}

/// Play the whole level, releasing each wave immediately.
fn play_out(state: &mut MatchState) {
    while !state.is_ended() {
        if state.phase == MatchPhase::NextWaveReady {
            let _ = state.apply(PlayerAction::StartWave);
        }
        tick(state);
    }
}

fn recorded(catalog: &Arc<Catalog>) -> Watcher {
    let mut state = defended_match(catalog);
    play_out(&mut state);
    state.take_watcher().unwrap()
}

fn bench_tick(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::demo());
    let mut running = defended_match(&catalog);
    running.apply(PlayerAction::StartWave).unwrap();
    // Get some enemies and projectiles on the board
    for _ in 0..600 {
        tick(&mut running);
    }

    c.bench_function("tick_mid_wave", |b| {
        b.iter_batched(
            || running.clone(),
            |mut state| black_box(tick(&mut state)),
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("compute_hash", |b| b.iter(|| black_box(running.compute_hash())));
}

fn bench_full_match(c: &mut Criterion) {
    let catalog = Arc::new(Catalog::demo());
    let watcher = recorded(&catalog);

    c.bench_function("full_match_live", |b| {
        b.iter(|| {
            let mut state = defended_match(&catalog);
            play_out(&mut state);
            black_box(state.compute_hash())
        })
    });

    c.bench_function("full_match_replay", |b| {
        b.iter(|| black_box(replay(Arc::clone(&catalog), watcher.clone()).unwrap()))
    });
}

criterion_group!(benches, bench_tick, bench_full_match);
criterion_main!(benches);
