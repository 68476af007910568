//! Adversarial workloads
//!
//! The fork bomb proposes new attacker children every `spawn_every` ticks
//! until the process table reaches `max_procs`. Whether the children are
//! actually admitted, and at what price, is up to the scheduler.

use serde::{Deserialize, Serialize};

use crate::config::SpawnerConfig;
use crate::types::{DemandModel, Pid, Process, Tick};

/// Fork-bomb growth model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkBombSpawner {
    pub spawn_every: i64,
    pub spawn_count: usize,
    pub max_procs: usize,
    pub child_demand_ms: i64,
    pub spawn_fee_ms: u64,
    pub child_start_budget_ms: u64,
}

impl ForkBombSpawner {
    pub fn new(config: SpawnerConfig) -> Self {
        ForkBombSpawner {
            spawn_every: config.spawn_every,
            spawn_count: config.spawn_count,
            max_procs: config.max_procs,
            child_demand_ms: config.child_demand_ms,
            spawn_fee_ms: config.spawn_fee_ms,
            child_start_budget_ms: config.child_start_budget_ms,
        }
    }

    /// Same attacker, different per-fork price
    pub fn with_fee(mut self, spawn_fee_ms: u64) -> Self {
        self.spawn_fee_ms = spawn_fee_ms;
        self
    }

    /// How many children the attacker wants at `tick`
    pub fn new_children(&self, tick: Tick, current_total: usize) -> usize {
        if current_total >= self.max_procs || self.spawn_every <= 0 {
            return 0;
        }
        if tick % self.spawn_every as u64 != 0 {
            return 0;
        }
        self.spawn_count.min(self.max_procs - current_total)
    }

    /// Build the attacker child that will carry `pid`
    pub fn child_process(&self, pid: Pid) -> Process {
        Process::new(
            pid,
            format!("attacker-{pid}"),
            DemandModel::constant(self.child_demand_ms),
        )
    }
}

impl Default for ForkBombSpawner {
    fn default() -> Self {
        ForkBombSpawner::new(SpawnerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawner(spawn_every: i64, spawn_count: usize, max_procs: usize) -> ForkBombSpawner {
        ForkBombSpawner {
            spawn_every,
            spawn_count,
            max_procs,
            ..ForkBombSpawner::default()
        }
    }

    #[test]
    fn test_spawns_on_schedule() {
        let s = spawner(3, 2, 100);
        assert_eq!(s.new_children(0, 5), 2);
        assert_eq!(s.new_children(1, 5), 0);
        assert_eq!(s.new_children(2, 5), 0);
        assert_eq!(s.new_children(3, 5), 2);
    }

    #[test]
    fn test_respects_population_cap() {
        let s = spawner(1, 3, 10);
        assert_eq!(s.new_children(0, 8), 2);
        assert_eq!(s.new_children(0, 10), 0);
        assert_eq!(s.new_children(0, 12), 0);
    }

    #[test]
    fn test_disabled_when_interval_not_positive() {
        assert_eq!(spawner(0, 3, 10).new_children(0, 1), 0);
        assert_eq!(spawner(-2, 3, 10).new_children(4, 1), 0);
    }

    #[test]
    fn test_child_process() {
        let s = ForkBombSpawner::default();
        let child = s.child_process(42);

        assert_eq!(child.pid, 42);
        assert_eq!(child.name, "attacker-42");
        assert!(child.is_runnable());
        assert_eq!(child.requested_ms(7), 10);
    }

    #[test]
    fn test_with_fee() {
        let s = ForkBombSpawner::default().with_fee(10);
        assert_eq!(s.spawn_fee_ms, 10);
        assert_eq!(s.spawn_count, 3);
    }
}
