//! Fork-bomb demo scenario
//!
//! Three starting processes: a latency-sensitive burst job, a light benign
//! job and the attacker root that forks every tick.

use std::collections::BTreeSet;

use crate::config::SimConfig;
use crate::policies::{MarketScheduler, RoundRobinScheduler};
use crate::simulator::{SimulationResult, Simulator};
use crate::types::{DemandModel, Process};
use crate::workloads::ForkBombSpawner;

/// Fees always compared, on top of the configured one
pub const COMPARISON_FEES: [u64; 2] = [1, 10];

/// Starting process table
pub fn base_processes() -> Vec<Process> {
    vec![
        Process::new(1, "critical-burst", DemandModel::burst(10, 10, 2)),
        Process::new(2, "benign", DemandModel::constant(3)),
        Process::new(3, "attacker-root", DemandModel::constant(10)),
    ]
}

/// Round robin against the fork bomb; forks cost nothing
pub fn run_rr_forkbomb(config: &SimConfig) -> SimulationResult {
    let mut sim = Simulator::new(
        RoundRobinScheduler::new(),
        base_processes(),
        ForkBombSpawner::new(config.spawner),
        config,
        "forkbomb_rr",
    );
    sim.run(config.ticks)
}

/// Market scheduler against the fork bomb, charging `spawn_fee_ms` per fork
pub fn run_market_with_fee(config: &SimConfig, spawn_fee_ms: u64) -> SimulationResult {
    let processes = base_processes();
    let market = MarketScheduler::for_processes(&processes, config.scheduler);
    let mut sim = Simulator::new(
        market,
        processes,
        ForkBombSpawner::new(config.spawner).with_fee(spawn_fee_ms),
        config,
        format!("forkbomb_market_fee_{spawn_fee_ms}"),
    );
    sim.run(config.ticks)
}

/// Sorted, de-duplicated fees for the market runs
pub fn comparison_fees(config: &SimConfig) -> Vec<u64> {
    let fees: BTreeSet<u64> = COMPARISON_FEES
        .iter()
        .copied()
        .chain([config.spawner.spawn_fee_ms])
        .collect();
    fees.into_iter().collect()
}

/// One round-robin run followed by one market run per comparison fee
pub fn forkbomb_comparison(config: &SimConfig) -> Vec<SimulationResult> {
    let mut results = vec![run_rr_forkbomb(config)];
    for fee in comparison_fees(config) {
        results.push(run_market_with_fee(config, fee));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnerConfig;

    #[test]
    fn test_base_processes() {
        let procs = base_processes();
        let pids: Vec<u32> = procs.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2, 3]);
        assert_eq!(procs[0].requested_ms(0), 10);
        assert_eq!(procs[0].requested_ms(5), 0);
        assert_eq!(procs[2].name, "attacker-root");
    }

    #[test]
    fn test_comparison_fees_dedup() {
        assert_eq!(comparison_fees(&SimConfig::default()), vec![1, 5, 10]);

        let config = SimConfig {
            spawner: SpawnerConfig {
                spawn_fee_ms: 10,
                ..SpawnerConfig::default()
            },
            ..SimConfig::default()
        };
        assert_eq!(comparison_fees(&config), vec![1, 10]);
    }

    #[test]
    fn test_forkbomb_comparison() {
        let results = forkbomb_comparison(&SimConfig::default());
        let names: Vec<&str> = results.iter().map(|r| r.summary.run_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "forkbomb_rr",
                "forkbomb_market_fee_1",
                "forkbomb_market_fee_5",
                "forkbomb_market_fee_10",
            ]
        );

        // The burst job keeps its slot under the market: every burst tick is served
        for market in &results[1..] {
            let crit = market.summary.critical.as_ref().unwrap();
            assert_eq!(crit.runs, 16);
            assert_eq!(crit.max_gap_ticks, Some(9));
        }

        // Round robin lets the fork bomb swamp the table
        assert_eq!(results[0].summary.max_procs, 60);
    }
}
