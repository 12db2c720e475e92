//! Wave Scheduling
//!
//! A wave is a set of swarms sharing a wave-local clock. Each swarm emits one
//! enemy name every `interval` frames starting at `timeout`, until it has
//! emitted `max_calls` times.

use serde::{Serialize, Deserialize};

use crate::game::config::{LevelConfig, SwarmConfig, WaveConfig};

/// One spawn schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySwarm {
    /// Enemy type emitted
    pub enemy_name: String,
    /// First emission frame (wave-local)
    pub timeout: u32,
    /// Frames between emissions
    pub interval: u32,
    /// Total emissions
    pub max_calls: u32,
    /// Emissions so far
    pub calls: u32,
}

impl EnemySwarm {
    /// Create from config.
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            enemy_name: config.enemy_name.clone(),
            timeout: config.timeout,
            interval: config.interval,
            max_calls: config.max_calls,
            calls: 0,
        }
    }

    /// Poll at wave-local frame `t`.
    pub fn update(&mut self, t: u32) -> Option<&str> {
        if self.exhausted() || t < self.timeout {
            return None;
        }
        // Config validation rejects a zero interval; treat one as "every frame".
        if (t - self.timeout) % self.interval.max(1) != 0 {
            return None;
        }
        self.calls += 1;
        Some(self.enemy_name.as_str())
    }

    /// True once every call has been made.
    #[inline]
    pub fn exhausted(&self) -> bool {
        self.calls >= self.max_calls
    }
}

/// One wave in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    /// Concurrent swarms
    pub swarms: Vec<EnemySwarm>,
    /// Wave-local frame counter
    pub time: u32,
}

impl Wave {
    /// Create from config with the clock at zero.
    pub fn new(config: &WaveConfig) -> Self {
        Self {
            swarms: config.swarms.iter().map(EnemySwarm::new).collect(),
            time: 0,
        }
    }

    /// Enemy names to spawn this frame, then advance the clock.
    pub fn call_enemies(&mut self) -> Vec<String> {
        let t = self.time;
        let names = self
            .swarms
            .iter_mut()
            .filter_map(|swarm| swarm.update(t).map(str::to_owned))
            .collect();
        self.time = self.time.saturating_add(1);
        names
    }

    /// All swarms exhausted. Once true, stays true.
    pub fn ended(&self) -> bool {
        self.swarms.iter().all(EnemySwarm::exhausted)
    }
}

/// The ordered waves of one level.
pub type GameRule = Vec<Wave>;

/// Build the waves of a level, each with a fresh clock.
pub fn game_rule(level: &LevelConfig) -> GameRule {
    level.game_rule.iter().map(Wave::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn swarm(timeout: u32, interval: u32, max_calls: u32) -> SwarmConfig {
        SwarmConfig {
            enemy_name: "grunt".into(),
            timeout,
            interval,
            max_calls,
        }
    }

    #[test]
    fn test_swarm_emits_on_schedule() {
        let mut wave = Wave::new(&WaveConfig { swarms: vec![swarm(10, 5, 3)] });

        let mut emitted = Vec::new();
        for _ in 0..100 {
            let t = wave.time;
            if !wave.call_enemies().is_empty() {
                emitted.push(t);
            }
        }

        assert_eq!(emitted, vec![10, 15, 20]);
        assert!(wave.ended());
    }

    #[test]
    fn test_concurrent_swarms_emit_in_order() {
        let mut wave = Wave::new(&WaveConfig {
            swarms: vec![
                swarm(0, 2, 2),
                SwarmConfig { enemy_name: "runner".into(), ..swarm(0, 3, 1) },
            ],
        });

        assert_eq!(wave.call_enemies(), vec!["grunt".to_string(), "runner".to_string()]);
        assert!(wave.call_enemies().is_empty());
        assert_eq!(wave.call_enemies(), vec!["grunt".to_string()]);
        assert!(wave.ended());
    }

    #[test]
    fn test_empty_wave_has_ended() {
        let wave = Wave::new(&WaveConfig::default());
        assert!(wave.ended());
    }

    #[test]
    fn test_zero_calls_never_emits() {
        let mut swarm = EnemySwarm::new(&swarm(0, 1, 0));
        assert!(swarm.exhausted());
        assert_eq!(swarm.update(0), None);
    }

    proptest! {
        #[test]
        fn prop_ended_is_monotonic(
            timeout in 0u32..20,
            interval in 1u32..10,
            max_calls in 0u32..6,
            frames in 1usize..200,
        ) {
            let mut wave = Wave::new(&WaveConfig { swarms: vec![swarm(timeout, interval, max_calls)] });
            let mut was_ended = wave.ended();
            let mut total = 0;
            for _ in 0..frames {
                total += wave.call_enemies().len();
                let now = wave.ended();
                prop_assert!(!was_ended || now);
                was_ended = now;
            }
            prop_assert!(total as u32 <= max_calls);
        }
    }
}
