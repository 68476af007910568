//! Dispatch policies for the CPU allocation simulator
//!
//! Implements the two policies under comparison:
//! - Round robin: fairness-agnostic rotation over whoever currently wants CPU
//! - Market: sealed-bid auction re-run every tick, backed by per-process budgets
//!
//! Both are fully deterministic. Neither uses randomness for selection or
//! tie-breaking.

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::ledger::{Ledger, LedgerRecord, LedgerState};
use crate::types::{Dispatch, Pid, Process, Tick, max_pid};
use crate::workloads::ForkBombSpawner;

/// Scheduling policy trait
pub trait Scheduler {
    /// Pick at most one process to run this tick and how long it runs
    fn select(&mut self, processes: &[Process], tick: Tick, slice_ms: u64) -> Dispatch;

    /// Let `parent_pid` fork whatever the policy allows this tick
    ///
    /// Appends admitted children to `processes` and returns how many were
    /// admitted.
    fn admit_spawns(
        &mut self,
        processes: &mut Vec<Process>,
        tick: Tick,
        spawner: &ForkBombSpawner,
        parent_pid: Pid,
    ) -> usize;

    /// Budget accounts, for policies that keep them
    fn ledger(&self) -> Option<&Ledger> {
        None
    }

    /// Short tag written into every event ("RR", "MARKET")
    fn label(&self) -> &str;

    /// Get policy name
    fn name(&self) -> &str;
}

/// Round robin over the processes that want CPU this tick
///
/// The cursor indexes the *filtered* eligible list, not a pid. When the
/// eligible set grows, shrinks or reorders between ticks, the rotation can
/// skip or repeat a process compared to pid-keyed rotation. Under a fork
/// bomb that is exactly the weakness being measured, so it stays.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    cursor: usize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Scheduler for RoundRobinScheduler {
    fn select(&mut self, processes: &[Process], tick: Tick, slice_ms: u64) -> Dispatch {
        let runnable: Vec<&Process> = processes
            .iter()
            .filter(|p| p.is_runnable() && p.requested_ms(tick) > 0)
            .collect();

        if runnable.is_empty() {
            return Dispatch::idle();
        }

        self.cursor %= runnable.len();
        let p = runnable[self.cursor];
        self.cursor = (self.cursor + 1) % runnable.len();

        Dispatch::to(p.pid, p.requested_ms(tick).min(slice_ms))
    }

    fn admit_spawns(
        &mut self,
        processes: &mut Vec<Process>,
        tick: Tick,
        spawner: &ForkBombSpawner,
        _parent_pid: Pid,
    ) -> usize {
        // Forking is free here; only the population cap applies
        let to_spawn = spawner.new_children(tick, processes.len());
        for _ in 0..to_spawn {
            let pid = max_pid(processes) + 1;
            processes.push(spawner.child_process(pid));
        }
        if to_spawn > 0 {
            debug!(tick, spawned = to_spawn, total = processes.len(), "rr admitted children");
        }
        to_spawn
    }

    fn label(&self) -> &str {
        "RR"
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}

/// Budgeted-bid scheduler
///
/// Every tick is a fresh single-round, highest-bid-wins auction. Losers keep
/// their budget but nothing about their bid carries over. A winner pays its
/// grant out of its budget; an emptied budget is bankruptcy, which is final.
#[derive(Debug)]
pub struct MarketScheduler {
    ledger: Ledger,
    config: SchedulerConfig,
}

impl MarketScheduler {
    pub fn new(ledger: Ledger, config: SchedulerConfig) -> Self {
        MarketScheduler { ledger, config }
    }

    /// Open an account with the default budget for every process
    pub fn for_processes(processes: &[Process], config: SchedulerConfig) -> Self {
        let mut ledger = Ledger::new();
        for p in processes {
            ledger.open(p.pid, config.default_budget_ms);
        }
        Self::new(ledger, config)
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Fork children on behalf of `parent_pid`, paying `spawn_fee_ms` each
    ///
    /// The parent can only fork what its budget covers. The fee that empties
    /// the budget still buys its child, then the parent is Bankrupt and the
    /// loop stops; a Bankrupt parent never forks again.
    pub fn forkbomb_spawn(
        &mut self,
        processes: &mut Vec<Process>,
        tick: Tick,
        spawner: &ForkBombSpawner,
        parent_pid: Pid,
    ) -> usize {
        let fee = spawner.spawn_fee_ms;

        let budget = match self.ledger.get(parent_pid) {
            Some(parent) if parent.is_eligible() => parent.budget,
            _ => return 0,
        };

        let desired = spawner.new_children(tick, processes.len());
        let allowed = if fee > 0 {
            desired.min((budget / fee) as usize)
        } else {
            desired
        };

        let mut spawned = 0;
        for _ in 0..allowed {
            let Some(parent) = self.ledger.get_mut(parent_pid) else {
                break;
            };
            if fee > 0 {
                parent.charge(fee);
            }
            let bankrupt = parent.is_bankrupt();

            // Stale accounts may outlive their process; never reuse their pids
            let pid = max_pid(processes).max(self.ledger.max_pid()) + 1;
            processes.push(spawner.child_process(pid));
            self.ledger.insert(LedgerRecord::new(pid, spawner.child_start_budget_ms));
            spawned += 1;

            if bankrupt {
                debug!(tick, parent_pid, spawned, "parent bankrupted itself forking");
                break;
            }
        }

        if spawned > 0 {
            debug!(tick, parent_pid, spawned, desired, fee, "market admitted children");
        }
        spawned
    }
}

impl Scheduler for MarketScheduler {
    fn select(&mut self, processes: &[Process], tick: Tick, slice_ms: u64) -> Dispatch {
        let mut best: Option<(Pid, u64)> = None;

        for p in processes {
            if !p.is_runnable() {
                continue;
            }

            // No account means not eligible, not an error
            let Some(record) = self.ledger.get_mut(p.pid) else {
                continue;
            };
            if record.is_bankrupt() {
                continue;
            }

            let requested = p.requested_ms(tick);
            if requested == 0 || record.budget == 0 {
                continue;
            }

            record.refresh_state(self.config.throttle_at_ms);

            let mut bid = requested.min(record.budget).min(slice_ms);
            if record.state == LedgerState::Throttled {
                bid = self.config.penalize(bid);
            }
            record.last_bid = bid;

            // Strictly greater: on equal bids the earlier process keeps the lead
            let leads = match best {
                None => bid > 0,
                Some((_, best_bid)) => bid > best_bid,
            };
            if leads {
                best = Some((p.pid, bid));
            }
        }

        let Some((pid, bid)) = best else {
            return Dispatch::idle();
        };
        let Some(record) = self.ledger.get_mut(pid) else {
            return Dispatch::idle();
        };

        let grant = record.charge(bid);
        if record.is_bankrupt() {
            debug!(tick, pid, "market winner spent its last budget");
        }

        Dispatch::to(pid, grant)
    }

    fn admit_spawns(
        &mut self,
        processes: &mut Vec<Process>,
        tick: Tick,
        spawner: &ForkBombSpawner,
        parent_pid: Pid,
    ) -> usize {
        self.forkbomb_spawn(processes, tick, spawner, parent_pid)
    }

    fn ledger(&self) -> Option<&Ledger> {
        Some(&self.ledger)
    }

    fn label(&self) -> &str {
        "MARKET"
    }

    fn name(&self) -> &str {
        "Market"
    }
}
