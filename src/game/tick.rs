//! Authoritative Simulation Tick
//!
//! The core game loop. One call advances exactly one logical frame and must
//! be a pure function of the match state: no clock, no randomness, no I/O.

use crate::game::events::{GameEvent, GameEventData};
use crate::game::map::MapUpdate;
use crate::game::state::{MatchPhase, MatchState, Outcome};

/// Result of a tick.
#[derive(Debug)]
#[derive(Default)]
pub struct TickResult {
    /// Events generated this tick (and by actions applied before it)
    pub events: Vec<GameEvent>,
    /// Whether the match is over after this tick
    pub match_ended: bool,
    /// Outcome, once ended
    pub outcome: Option<Outcome>,
    /// Wave cleared this tick
    pub wave_cleared: Option<usize>,
}

/// Run one simulation tick.
///
/// # Order
///
/// 1. Map update (enemies, towers, projectiles)
/// 2. Settle casualties (leak damage and kill rewards, each paid once)
/// 3. Loss check
/// 4. Wave-cleared check
/// 5. Spawn this frame's enemies
///
/// Casualties are settled before the wave check so the last enemy of a wave
/// always pays out.
pub fn tick(state: &mut MatchState) -> TickResult {
    let mut result = TickResult::default();

    if let MatchPhase::Ended(outcome) = state.phase {
        result.match_ended = true;
        result.outcome = Some(outcome);
        return result;
    }

    // 0. Advance frame counter
    state.frame += 1;

    if state.phase == MatchPhase::NextWaveReady {
        result.events = collect_events(state);
        return result;
    }

    // 1. Update the board
    let baseline_tps = state.catalog().rules.baseline_tps;
    let update = state.map.update(baseline_tps);
    for &tower in &update.launched {
        state.push_event(GameEvent::new(state.frame, GameEventData::ProjectileLaunched { tower }));
    }

    // 2. Pay out deaths
    settle_casualties(state, &update);

    // 3. Loss check
    if state.player.is_dead() {
        state.end(Outcome::Loss);
    } else {
        // 4. Wave cleared?
        result.wave_cleared = check_wave_cleared(state);

        // 5. Spawn
        if state.phase == MatchPhase::Running {
            spawn_enemies(state);
        }
    }

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(
        frame = state.frame,
        enemies = state.map.enemies.len(),
        projectiles = state.map.projectiles.len(),
        health = state.player.health,
        money = state.player.money,
        "tick"
    );

    result.match_ended = state.is_ended();
    result.outcome = state.outcome();
    result.events = collect_events(state);
    result
}

/// Apply leak damage and kill rewards for enemies that died this frame.
///
/// Every death is reported by exactly one `advance`, and both amounts are
/// consumed from the enemy, so nothing is paid twice.
fn settle_casualties(state: &mut MatchState, update: &MapUpdate) {
    let frame = state.frame;
    let mut events = Vec::with_capacity(update.killed.len() + update.leaked.len());

    for &id in &update.leaked {
        if let Some(enemy) = state.map.enemies.get_mut(id) {
            let damage = enemy.take_damage_to_player();
            state.player.health = state.player.health.saturating_sub(damage);
            events.push(GameEvent::enemy_leaked(frame, enemy.spawn_seq, damage));
        }
    }

    for &id in &update.killed {
        if let Some(enemy) = state.map.enemies.get_mut(id) {
            let reward = enemy.take_reward();
            state.player.money = state.player.money.saturating_add(reward);
            events.push(GameEvent::enemy_killed(frame, enemy.spawn_seq, reward));
        }
    }

    for event in events {
        state.push_event(event);
    }
}

/// Close the wave once it has fully spawned and nothing is left alive.
fn check_wave_cleared(state: &mut MatchState) -> Option<usize> {
    let wave_index = state.current_wave?;
    let wave = state.rule.get(wave_index)?;

    if !wave.ended() || state.map.has_alive_enemies() {
        return None;
    }

    state.map.clear_wave();
    state.push_event(GameEvent::new(state.frame, GameEventData::WaveCleared { wave: wave_index }));

    if state.is_last_wave() {
        state.end(Outcome::Win);
    } else {
        state.phase = MatchPhase::NextWaveReady;
    }
    Some(wave_index)
}

/// Spawn whatever the current wave emits this frame.
fn spawn_enemies(state: &mut MatchState) {
    let Some(wave_index) = state.current_wave else {
        return;
    };
    let names = match state.rule.get_mut(wave_index) {
        Some(wave) => wave.call_enemies(),
        None => return,
    };

    let catalog = std::sync::Arc::clone(state.catalog());
    for name in names {
        // Validated catalogs resolve every swarm name
        let Some(config) = catalog.enemies.get(&name) else {
            tracing::warn!(enemy = %name, "swarm references unknown enemy");
            continue;
        };
        let id = state.map.spawn(config);
        let spawn_seq = state.map.enemies[id].spawn_seq;
        state.push_event(GameEvent::new(
            state.frame,
            GameEventData::EnemySpawned { spawn_seq, name },
        ));
    }
}

fn collect_events(state: &mut MatchState) -> Vec<GameEvent> {
    let mut events = state.take_events();
    events.sort_by_key(GameEvent::sort_key);
    events
}
