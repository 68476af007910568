//! Budget accounts backing the market scheduler
//!
//! Every process known to the market scheduler has one [`LedgerRecord`].
//! Budgets are unsigned so they can never go negative; a record whose
//! budget reaches zero becomes [`LedgerState::Bankrupt`] and stays there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Pid;

/// Execution state of a ledger account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerState {
    #[default]
    Active,
    /// Budget at or below the throttle level; bids are penalized
    Throttled,
    /// Budget exhausted. Terminal.
    Bankrupt,
}

/// Per-process economic account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub pid: Pid,
    pub budget: u64,     // Remaining milliseconds
    pub spent: u64,      // Cumulative milliseconds charged (grants + spawn fees)
    pub state: LedgerState,
    pub last_bid: u64,   // Diagnostic only
}

impl LedgerRecord {
    pub fn new(pid: Pid, budget: u64) -> Self {
        LedgerRecord {
            pid,
            budget,
            spent: 0,
            state: LedgerState::Active,
            last_bid: 0,
        }
    }

    pub fn is_bankrupt(&self) -> bool {
        self.state == LedgerState::Bankrupt
    }

    /// Can this account still bid or spawn?
    pub fn is_eligible(&self) -> bool {
        !self.is_bankrupt() && self.budget > 0
    }

    /// Re-evaluate Active/Throttled against the current budget
    ///
    /// Not sticky: a record moves back to Active if its budget is above the
    /// threshold again. Bankrupt records are left alone.
    pub fn refresh_state(&mut self, throttle_at_ms: u64) {
        if self.is_bankrupt() {
            return;
        }
        self.state = if self.budget <= throttle_at_ms {
            LedgerState::Throttled
        } else {
            LedgerState::Active
        };
    }

    /// Debit up to `ms` from the budget and credit it to `spent`
    ///
    /// Returns the amount actually charged. Draining the budget forces the
    /// record into Bankrupt.
    pub fn charge(&mut self, ms: u64) -> u64 {
        if self.is_bankrupt() {
            return 0;
        }

        let charged = ms.min(self.budget);
        self.budget -= charged;
        self.spent += charged;

        if self.budget == 0 {
            self.state = LedgerState::Bankrupt;
            debug!(pid = self.pid, spent = self.spent, "ledger account bankrupt");
        }

        charged
    }
}

/// All ledger records of one simulation run, ordered by pid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    records: BTreeMap<Pid, LedgerRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account for `pid` unless one already exists
    pub fn open(&mut self, pid: Pid, budget: u64) -> &mut LedgerRecord {
        self.records
            .entry(pid)
            .or_insert_with(|| LedgerRecord::new(pid, budget))
    }

    /// Store `record`, replacing any existing account for its pid
    pub fn insert(&mut self, record: LedgerRecord) -> Option<LedgerRecord> {
        self.records.insert(record.pid, record)
    }

    pub fn get(&self, pid: Pid) -> Option<&LedgerRecord> {
        self.records.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut LedgerRecord> {
        self.records.get_mut(&pid)
    }

    pub fn state_of(&self, pid: Pid) -> Option<LedgerState> {
        self.get(pid).map(|r| r.state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest pid holding an account, or 0 for an empty ledger
    pub fn max_pid(&self) -> Pid {
        self.records.keys().next_back().copied().unwrap_or(0)
    }

    pub fn bankrupt_pids(&self) -> Vec<Pid> {
        self.iter()
            .filter(|r| r.is_bankrupt())
            .map(|r| r.pid)
            .collect()
    }
}

impl FromIterator<LedgerRecord> for Ledger {
    fn from_iter<I: IntoIterator<Item = LedgerRecord>>(iter: I) -> Self {
        Ledger {
            records: iter.into_iter().map(|r| (r.pid, r)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_record() {
        let r = LedgerRecord::new(3, 100);
        assert_eq!(r.budget, 100);
        assert_eq!(r.spent, 0);
        assert_eq!(r.state, LedgerState::Active);
        assert!(r.is_eligible());
    }

    #[test]
    fn test_refresh_state_threshold() {
        let mut r = LedgerRecord::new(1, 50);
        r.refresh_state(50);
        assert_eq!(r.state, LedgerState::Throttled);

        r.budget = 51;
        r.refresh_state(50);
        assert_eq!(r.state, LedgerState::Active);
    }

    #[test]
    fn test_charge_to_zero_bankrupts() {
        let mut r = LedgerRecord::new(1, 10);

        assert_eq!(r.charge(4), 4);
        assert_eq!(r.budget, 6);
        assert_eq!(r.state, LedgerState::Active);

        // Overdraw is capped at the remaining budget
        assert_eq!(r.charge(20), 6);
        assert_eq!(r.budget, 0);
        assert_eq!(r.spent, 10);
        assert_eq!(r.state, LedgerState::Bankrupt);
        assert!(!r.is_eligible());
    }

    #[test]
    fn test_bankrupt_is_terminal() {
        let mut r = LedgerRecord::new(1, 5);
        r.charge(5);
        assert!(r.is_bankrupt());

        r.budget = 500; // even a stray top-up does not revive it
        r.refresh_state(50);
        assert_eq!(r.state, LedgerState::Bankrupt);
        assert_eq!(r.charge(10), 0);
        assert_eq!(r.spent, 5);
    }

    #[test]
    fn test_ledger_open_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.open(1, 100);
        ledger.get_mut(1).unwrap().charge(30);
        ledger.open(1, 100);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(1).unwrap().budget, 70);
    }

    #[test]
    fn test_insert_replaces_existing_account() {
        let mut ledger = Ledger::new();
        ledger.open(4, 100).charge(100);
        assert!(ledger.get(4).unwrap().is_bankrupt());

        let old = ledger.insert(LedgerRecord::new(4, 20)).unwrap();
        assert_eq!(old.state, LedgerState::Bankrupt);

        let fresh = ledger.get(4).unwrap();
        assert_eq!(fresh.budget, 20);
        assert_eq!(fresh.spent, 0);
        assert_eq!(fresh.state, LedgerState::Active);
    }

    #[test]
    fn test_max_pid() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.max_pid(), 0);
        ledger.open(7, 10);
        ledger.open(2, 10);
        assert_eq!(ledger.max_pid(), 7);
    }

    #[test]
    fn test_bankrupt_pids() {
        let mut ledger: Ledger = [LedgerRecord::new(2, 5), LedgerRecord::new(1, 5)]
            .into_iter()
            .collect();
        ledger.get_mut(2).unwrap().charge(5);

        assert_eq!(ledger.bankrupt_pids(), vec![2]);
        assert_eq!(ledger.state_of(1), Some(LedgerState::Active));
        assert_eq!(ledger.state_of(9), None);
    }

    #[test]
    fn test_state_serializes_uppercase() {
        let json = serde_json::to_string(&LedgerState::Bankrupt).unwrap();
        assert_eq!(json, "\"BANKRUPT\"");
    }

    proptest! {
        #[test]
        fn prop_charges_conserve_budget(
            start in 0u64..1_000,
            charges in proptest::collection::vec(0u64..200, 0..40),
        ) {
            let mut r = LedgerRecord::new(1, start);
            let mut was_bankrupt = false;

            for ms in charges {
                let charged = r.charge(ms);
                prop_assert!(charged <= ms);
                prop_assert_eq!(r.budget + r.spent, start);
                if was_bankrupt {
                    prop_assert_eq!(charged, 0);
                    prop_assert!(r.is_bankrupt());
                }
                was_bankrupt = r.is_bankrupt();
            }
        }
    }
}
