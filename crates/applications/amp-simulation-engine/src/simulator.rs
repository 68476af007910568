//! Tick-driven simulator for CPU allocation under a fork bomb
//!
//! Each tick runs, in order:
//! 1. the attacker's fork attempt (admitted or not by the scheduler),
//! 2. runnable-since bookkeeping for waiting latency,
//! 3. one scheduling decision,
//! 4. event + trace recording.
//!
//! Everything a tick mutates is applied before the next tick starts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimConfig;
use crate::ledger::LedgerState;
use crate::metrics::{
    Event, EventKind, MetricsRecorder, RunSummary, compute_bankruptcy_tick,
    critical_responsiveness, waiting_latency_stats,
};
use crate::policies::Scheduler;
use crate::types::{Dispatch, Pid, Process, Tick};
use crate::workloads::ForkBombSpawner;

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub summary: RunSummary,
    pub header: String,
    pub trace: Vec<String>,
    pub events: Vec<Event>,
}

/// Single-run simulator, generic over the dispatch policy
pub struct Simulator<S: Scheduler> {
    scheduler: S,
    processes: Vec<Process>,
    spawner: ForkBombSpawner,
    slice_ms: u64,
    critical_pid: Pid,
    attacker_pid: Pid,
    current_tick: Tick,

    // Waiting-latency tracking
    runnable_since: BTreeMap<Pid, Tick>,
    waiting_latency: BTreeMap<Pid, Vec<u64>>,

    // Output
    recorder: MetricsRecorder,
    trace: Vec<String>,
}

impl<S: Scheduler> Simulator<S> {
    pub fn new(
        scheduler: S,
        processes: Vec<Process>,
        spawner: ForkBombSpawner,
        config: &SimConfig,
        run_name: impl Into<String>,
    ) -> Self {
        Simulator {
            scheduler,
            processes,
            spawner,
            slice_ms: config.scheduler.slice_ms,
            critical_pid: config.critical_pid,
            attacker_pid: config.attacker_pid,
            current_tick: 0,
            runnable_since: BTreeMap::new(),
            waiting_latency: BTreeMap::new(),
            recorder: MetricsRecorder::new(run_name),
            trace: Vec::new(),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn events(&self) -> &[Event] {
        self.recorder.events()
    }

    /// Does the scheduler charge for forks and CPU?
    fn is_metered(&self) -> bool {
        self.scheduler.ledger().is_some()
    }

    fn parent_state(&self) -> Option<LedgerState> {
        self.scheduler
            .ledger()
            .and_then(|l| l.state_of(self.attacker_pid))
    }

    /// Run `ticks` more ticks and summarize everything recorded so far
    pub fn run(&mut self, ticks: Tick) -> SimulationResult {
        info!(
            run = self.recorder.run_name(),
            scheduler = self.scheduler.name(),
            ticks,
            "starting run"
        );

        for _ in 0..ticks {
            self.step();
        }

        let result = self.collect_results();
        info!(
            run = %result.summary.run_name,
            dispatches = result.summary.dispatch_count,
            max_procs = result.summary.max_procs,
            fairness = result.summary.fairness_jain_index,
            "run finished"
        );
        result
    }

    /// Advance the simulation by one tick
    pub fn step(&mut self) -> Dispatch {
        let tick = self.current_tick;
        self.current_tick += 1;

        // 1. Fork attempt
        let parent_before = self.parent_state();
        let spawned = self.scheduler.admit_spawns(
            &mut self.processes,
            tick,
            &self.spawner,
            self.attacker_pid,
        );
        let parent_after = self.parent_state();
        if parent_after == Some(LedgerState::Bankrupt) && parent_before != parent_after {
            self.recorder.add(Event {
                tick,
                kind: EventKind::Ledger,
                scheduler: self.scheduler.label().to_string(),
                spawn_fee_ms: Some(self.spawner.spawn_fee_ms),
                procs: self.processes.len(),
                pid: Some(self.attacker_pid),
                state_after: parent_after,
                ..Event::default()
            });
        }

        // 2. Runnable-since bookkeeping
        // Raw demand, not gated by process state
        for p in &self.processes {
            if p.demand.demand_ms(tick) > 0 {
                self.runnable_since.entry(p.pid).or_insert(tick);
            } else {
                self.runnable_since.remove(&p.pid);
            }
        }

        // 3. Dispatch
        let dispatch = self.scheduler.select(&self.processes, tick, self.slice_ms);

        let latency = dispatch
            .pid
            .and_then(|pid| self.runnable_since.get(&pid).map(|&since| (pid, tick - since)));
        if let Some((pid, waited)) = latency {
            self.waiting_latency.entry(pid).or_default().push(waited);
        }

        // 4. Record
        let state_after = dispatch
            .pid
            .and_then(|pid| self.scheduler.ledger().and_then(|l| l.state_of(pid)));
        let metered = self.is_metered();

        self.recorder.add(Event {
            tick,
            kind: EventKind::Tick,
            scheduler: self.scheduler.label().to_string(),
            spawn_fee_ms: metered.then_some(self.spawner.spawn_fee_ms),
            procs: self.processes.len(),
            dispatch_pid: dispatch.pid,
            granted_ms: dispatch.granted_ms,
            waiting_latency: latency.map(|(_, waited)| waited),
            spawned: Some(spawned),
            pid: None,
            state_after,
        });
        self.trace.push(trace_line(tick, self.processes.len(), &dispatch));

        debug!(tick, pid = ?dispatch.pid, granted_ms = dispatch.granted_ms, spawned, "tick");
        dispatch
    }

    fn trace_header(&self) -> String {
        if self.is_metered() {
            format!("=== Market (Fork Bomb) fee={} ===", self.spawner.spawn_fee_ms)
        } else {
            "=== Round Robin (Fork Bomb) ===".to_string()
        }
    }

    /// Collect simulation results
    fn collect_results(&self) -> SimulationResult {
        let events = self.recorder.events();
        let mut summary = self.recorder.summary();

        summary.critical = Some(critical_responsiveness(events, self.critical_pid));

        let samples = self
            .waiting_latency
            .get(&self.critical_pid)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if let Some((max, mean)) = waiting_latency_stats(samples) {
            summary.critical_wait_max = Some(max);
            summary.critical_wait_mean = Some(mean);
        }

        if self.is_metered() {
            summary.spawn_fee_ms = Some(self.spawner.spawn_fee_ms);
            summary.attacker_bankrupt_tick = compute_bankruptcy_tick(events, self.attacker_pid);
        }

        SimulationResult {
            summary,
            header: self.trace_header(),
            trace: self.trace.clone(),
            events: events.to_vec(),
        }
    }
}

/// One human-readable line per tick
pub fn trace_line(tick: Tick, procs: usize, dispatch: &Dispatch) -> String {
    let pid = match dispatch.pid {
        Some(pid) => pid.to_string(),
        None => "None".to_string(),
    };
    format!(
        "tick={tick:02} procs={procs:02} dispatch pid={pid} grant_ms={}",
        dispatch.granted_ms
    )
}
