//! Post-processing over the event trace of a run
//!
//! The recorder only accumulates events. Every statistic is a pure pass
//! over the ordered events and reads just the fields it needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerState;
use crate::types::{Pid, Tick};

/// What produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// One scheduling decision
    #[default]
    Tick,
    /// A ledger transition outside of dispatch (e.g. a parent forking itself broke)
    Ledger,
}

/// One entry of the event trace
///
/// Optional fields are left out of the JSON form when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Event {
    pub tick: Tick,
    #[serde(default)]
    pub kind: EventKind,
    #[serde(default)]
    pub scheduler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_fee_ms: Option<u64>,
    #[serde(default)]
    pub procs: usize,
    pub dispatch_pid: Option<Pid>,
    #[serde(default)]
    pub granted_ms: u64,
    #[serde(default)]
    pub waiting_latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned: Option<usize>,
    /// Subject of a ledger event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Pid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_after: Option<LedgerState>,
}

impl Event {
    /// Does this event concern `pid`, either as dispatch or as subject?
    pub fn references(&self, pid: Pid) -> bool {
        self.dispatch_pid == Some(pid) || self.pid == Some(pid)
    }
}

/// Dispatch regularity of the designated critical process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalResponsiveness {
    pub critical_pid: Pid,
    pub runs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_tick: Option<Tick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<Tick>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gap_ticks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_gap_ticks: Option<f64>,
}

impl CriticalResponsiveness {
    /// Result for a process that never ran
    pub fn never_ran(critical_pid: Pid) -> Self {
        CriticalResponsiveness {
            critical_pid,
            runs: 0,
            first_tick: None,
            last_tick: None,
            max_gap_ticks: None,
            mean_gap_ticks: None,
        }
    }
}

/// Aggregate statistics of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_name: String,
    pub event_count: usize,
    pub dispatch_count: usize,
    pub max_procs: usize,
    pub fairness_jain_index: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_fee_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<CriticalResponsiveness>,
    pub critical_wait_max: Option<u64>,
    pub critical_wait_mean: Option<f64>,
    pub attacker_bankrupt_tick: Option<Tick>,
    pub total_spawned: usize,
}

/// Accumulates the event trace of a single run
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    run_name: String,
    events: Vec<Event>,
}

impl MetricsRecorder {
    pub fn new(run_name: impl Into<String>) -> Self {
        MetricsRecorder {
            run_name: run_name.into(),
            events: Vec::new(),
        }
    }

    pub fn add(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Counts and fairness over everything recorded so far
    pub fn summary(&self) -> RunSummary {
        let dispatch_count = self
            .events
            .iter()
            .filter(|e| e.dispatch_pid.is_some())
            .count();
        let max_procs = self.events.iter().map(|e| e.procs).max().unwrap_or(0);
        let total_spawned: usize = self.events.iter().filter_map(|e| e.spawned).sum();

        let totals: Vec<u64> = grant_totals(&self.events).into_values().collect();

        RunSummary {
            run_name: self.run_name.clone(),
            event_count: self.events.len(),
            dispatch_count,
            max_procs,
            fairness_jain_index: jain_fairness_index(&totals),
            spawn_fee_ms: None,
            critical: None,
            critical_wait_max: None,
            critical_wait_mean: None,
            attacker_bankrupt_tick: None,
            total_spawned,
        }
    }
}

/// Total granted milliseconds per dispatched pid
pub fn grant_totals(events: &[Event]) -> BTreeMap<Pid, u64> {
    let mut totals = BTreeMap::new();
    for e in events {
        if let Some(pid) = e.dispatch_pid {
            *totals.entry(pid).or_insert(0) += e.granted_ms;
        }
    }
    totals
}

/// Jain's fairness index: `(Σt)² / (n·Σt²)`
///
/// 1.0 is a perfectly even split, `1/n` is one claimant taking everything.
/// Returns 0.0 for no claimants or all-zero totals.
pub fn jain_fairness_index(totals: &[u64]) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }

    let sum: f64 = totals.iter().map(|&t| t as f64).sum();
    let sum_sq: f64 = totals.iter().map(|&t| (t as f64) * (t as f64)).sum();
    if sum_sq == 0.0 {
        return 0.0;
    }

    (sum * sum) / (totals.len() as f64 * sum_sq)
}

/// Run count and dispatch gaps of `critical_pid`
pub fn critical_responsiveness(events: &[Event], critical_pid: Pid) -> CriticalResponsiveness {
    let ticks: Vec<Tick> = events
        .iter()
        .filter(|e| e.dispatch_pid == Some(critical_pid))
        .map(|e| e.tick)
        .collect();

    let (Some(&first), Some(&last)) = (ticks.first(), ticks.last()) else {
        return CriticalResponsiveness::never_ran(critical_pid);
    };

    let gaps: Vec<u64> = ticks.windows(2).map(|w| w[1] - w[0]).collect();
    let max_gap = gaps.iter().copied().max().unwrap_or(0);
    let mean_gap = if gaps.is_empty() {
        0.0
    } else {
        gaps.iter().sum::<u64>() as f64 / gaps.len() as f64
    };

    CriticalResponsiveness {
        critical_pid,
        runs: ticks.len(),
        first_tick: Some(first),
        last_tick: Some(last),
        max_gap_ticks: Some(max_gap),
        mean_gap_ticks: Some(mean_gap),
    }
}

/// First tick at which `pid` is reported Bankrupt, if ever
pub fn compute_bankruptcy_tick(events: &[Event], pid: Pid) -> Option<Tick> {
    events
        .iter()
        .find(|e| e.references(pid) && e.state_after == Some(LedgerState::Bankrupt))
        .map(|e| e.tick)
}

/// Max and mean of waiting-latency samples; `None` if there are none
pub fn waiting_latency_stats(samples: &[u64]) -> Option<(u64, f64)> {
    let max = samples.iter().copied().max()?;
    let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
    Some((max, mean))
}
