//! Simulation configuration
//!
//! Defaults mirror the constants the fork-bomb experiment was tuned with.
//! A [`SimConfig`] can be loaded from JSON and is validated before a run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SimError};
use crate::types::{Pid, Tick};

/// Budget level at or below which bids are penalized
pub const THROTTLE_AT_MS: u64 = 50;
/// Bid scaling under throttle: `bid * NUM / DEN`
pub const THROTTLE_PENALTY_NUM: u64 = 1;
pub const THROTTLE_PENALTY_DEN: u64 = 2;
/// Initial budget of every process present at setup
pub const DEFAULT_BUDGET_MS: u64 = 200;
/// Maximum grant per dispatch
pub const DEFAULT_SLICE_MS: u64 = 10;
/// Budget debited from the parent per admitted child
pub const SPAWN_FEE_MS: u64 = 5;
/// Budget seeded into each spawned child
pub const CHILD_START_BUDGET_MS: u64 = 20;

pub const DEFAULT_TICKS: Tick = 80;
pub const DEFAULT_CRITICAL_PID: Pid = 1;
pub const DEFAULT_ATTACKER_PID: Pid = 3;

/// Market scheduler parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub slice_ms: u64,
    pub default_budget_ms: u64,
    pub throttle_at_ms: u64,
    pub throttle_penalty_num: u64,
    pub throttle_penalty_den: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            slice_ms: DEFAULT_SLICE_MS,
            default_budget_ms: DEFAULT_BUDGET_MS,
            throttle_at_ms: THROTTLE_AT_MS,
            throttle_penalty_num: THROTTLE_PENALTY_NUM,
            throttle_penalty_den: THROTTLE_PENALTY_DEN,
        }
    }
}

impl SchedulerConfig {
    /// Apply the throttle penalty to a bid (integer truncation, may reach zero)
    ///
    /// The product is taken in `u128` and saturates at `u64::MAX`.
    pub fn penalize(&self, bid: u64) -> u64 {
        let scaled = u128::from(bid) * u128::from(self.throttle_penalty_num)
            / u128::from(self.throttle_penalty_den);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.throttle_penalty_den == 0 {
            return Err(SimError::config("throttle_penalty_den must be positive"));
        }
        if self.slice_ms == 0 {
            return Err(SimError::config("slice_ms must be positive"));
        }
        if self.throttle_penalty_num > self.throttle_penalty_den {
            warn!(
                num = self.throttle_penalty_num,
                den = self.throttle_penalty_den,
                "throttle penalty boosts bids instead of reducing them"
            );
        }
        Ok(())
    }
}

/// Fork-bomb attacker parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    pub spawn_every: i64,
    pub spawn_count: usize,
    pub max_procs: usize,
    pub child_demand_ms: i64,
    pub spawn_fee_ms: u64,
    pub child_start_budget_ms: u64,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        SpawnerConfig {
            spawn_every: 1,
            spawn_count: 3,
            max_procs: 60,
            child_demand_ms: 10,
            spawn_fee_ms: SPAWN_FEE_MS,
            child_start_budget_ms: CHILD_START_BUDGET_MS,
        }
    }
}

impl SpawnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_procs == 0 {
            return Err(SimError::config("max_procs must be positive"));
        }
        if self.spawn_every <= 0 {
            warn!(spawn_every = self.spawn_every, "spawner disabled");
        }
        Ok(())
    }
}

/// Full configuration of a fork-bomb experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub scheduler: SchedulerConfig,
    pub spawner: SpawnerConfig,
    pub ticks: Tick,
    pub critical_pid: Pid,
    pub attacker_pid: Pid,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            scheduler: SchedulerConfig::default(),
            spawner: SpawnerConfig::default(),
            ticks: DEFAULT_TICKS,
            critical_pid: DEFAULT_CRITICAL_PID,
            attacker_pid: DEFAULT_ATTACKER_PID,
        }
    }
}

impl SimConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load = || -> Result<Self> {
            let raw = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        };
        load().map_err(|e| SimError::config_file(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.spawner.validate()?;
        if self.ticks == 0 {
            warn!("ticks = 0, runs will record no events");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_penalize_truncates() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.penalize(10), 5);
        assert_eq!(cfg.penalize(3), 1);
        // A 1ms bid legitimately rounds to zero
        assert_eq!(cfg.penalize(1), 0);
    }

    #[test]
    fn test_penalize_huge_numerator_saturates() {
        let cfg = SchedulerConfig {
            throttle_penalty_num: u64::MAX,
            throttle_penalty_den: 2,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.penalize(2), u64::MAX);
        assert_eq!(cfg.penalize(10), u64::MAX);
        assert_eq!(cfg.penalize(0), 0);

        let cfg = SchedulerConfig {
            throttle_penalty_num: u64::MAX,
            throttle_penalty_den: u64::MAX,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.penalize(10), 10);
    }

    #[test]
    fn test_zero_penalty_den_rejected() {
        let cfg = SchedulerConfig {
            throttle_penalty_den: 0,
            ..SchedulerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_zero_max_procs_rejected() {
        let cfg = SimConfig {
            spawner: SpawnerConfig {
                max_procs: 0,
                ..SpawnerConfig::default()
            },
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: SimConfig =
            serde_json::from_str(r#"{"ticks": 12, "spawner": {"spawn_fee_ms": 10}}"#).unwrap();

        assert_eq!(cfg.ticks, 12);
        assert_eq!(cfg.spawner.spawn_fee_ms, 10);
        assert_eq!(cfg.spawner.spawn_count, 3);
        assert_eq!(cfg.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        fs::write(&path, r#"{"scheduler": {"slice_ms": 4}}"#).unwrap();

        let cfg = SimConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.scheduler.slice_ms, 4);

        let missing = SimConfig::from_json_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SimError::ConfigFile { .. })));
    }
}
