//! Core types for the simulation engine

use serde::{Deserialize, Serialize};

/// Process identifier, unique within one simulation run
pub type Pid = u32;

/// Discrete unit of simulated time
pub type Tick = u64;

/// Lifecycle state of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessState {
    #[default]
    Runnable,
    Blocked,
    Exited,
}

/// How many milliseconds a process asks for at a given tick
///
/// Demand is a pure function of the tick. Values are signed so a negative
/// configuration is representable; [`Process::requested_ms`] clamps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandModel {
    /// Same demand every tick
    Constant { ms: i64 },

    /// `burst_ms` for the first `duty` ticks of every `period`, zero otherwise
    Burst { burst_ms: i64, period: u64, duty: u64 },
}

impl DemandModel {
    pub fn constant(ms: i64) -> Self {
        DemandModel::Constant { ms }
    }

    pub fn burst(burst_ms: i64, period: u64, duty: u64) -> Self {
        DemandModel::Burst { burst_ms, period, duty }
    }

    /// Requested milliseconds at `tick`
    pub fn demand_ms(&self, tick: Tick) -> i64 {
        match *self {
            DemandModel::Constant { ms } => ms,
            DemandModel::Burst { burst_ms, period, duty } => {
                if period == 0 {
                    return 0;
                }
                if tick % period < duty { burst_ms } else { 0 }
            }
        }
    }
}

/// A simulated process competing for the CPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub demand: DemandModel,
    pub state: ProcessState,
}

impl Process {
    pub fn new(pid: Pid, name: impl Into<String>, demand: DemandModel) -> Self {
        Process {
            pid,
            name: name.into(),
            demand,
            state: ProcessState::Runnable,
        }
    }

    pub fn with_state(mut self, state: ProcessState) -> Self {
        self.state = state;
        self
    }

    pub fn is_runnable(&self) -> bool {
        self.state == ProcessState::Runnable
    }

    /// Milliseconds requested at `tick`; zero unless runnable
    pub fn requested_ms(&self, tick: Tick) -> u64 {
        if !self.is_runnable() {
            return 0;
        }
        self.demand.demand_ms(tick).max(0) as u64
    }
}

/// Scheduler decision for one tick
///
/// `pid == None` means no process was eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub pid: Option<Pid>,
    pub granted_ms: u64,
}

impl Dispatch {
    pub fn to(pid: Pid, granted_ms: u64) -> Self {
        Dispatch { pid: Some(pid), granted_ms }
    }

    pub fn idle() -> Self {
        Dispatch { pid: None, granted_ms: 0 }
    }
}

/// Highest pid in `processes`, or 0 for an empty table
pub fn max_pid(processes: &[Process]) -> Pid {
    processes.iter().map(|p| p.pid).max().unwrap_or(0)
}
