use std::collections::HashSet;
use std::mem;

use ethereum_types::Address;

use ember_common::types::Log;

/// Execution substate accumulated during a transaction: accounts scheduled
/// for deletion, emitted logs and the gas refund counter.
///
/// Nested calls push a backup before running; a failing child reverts to it,
/// a succeeding child merges into it. Data modifications are append-only so
/// the backup chain stays consistent.
#[derive(Debug, Default)]
pub struct Substate {
    parent: Option<Box<Substate>>,
    selfdestruct_set: HashSet<Address>,
    logs: Vec<Log>,
    pub refunded_gas: u64,
}

impl Substate {
    /// Push a checkpoint that can be either reverted or committed.
    pub fn push_backup(&mut self) {
        let parent = mem::take(self);
        self.refunded_gas = parent.refunded_gas;
        self.parent = Some(Box::new(parent));
    }

    /// Pop the last backup, keeping everything recorded since.
    pub fn commit_backup(&mut self) {
        if let Some(parent) = self.parent.as_mut() {
            let mut merged = mem::take(parent);
            mem::swap(self, &mut merged);
            let child = merged;
            self.selfdestruct_set.extend(child.selfdestruct_set);
            self.logs.extend(child.logs);
            self.refunded_gas = child.refunded_gas;
        }
    }

    /// Pop the last backup, discarding everything recorded since.
    pub fn revert_backup(&mut self) {
        if let Some(parent) = self.parent.as_mut() {
            *self = mem::take(parent);
        }
    }

    /// Marks an account as self-destructed; returns whether it already was.
    pub fn add_selfdestruct(&mut self, address: Address) -> bool {
        if self.is_selfdestruct(&address) {
            return true;
        }
        self.selfdestruct_set.insert(address);
        false
    }

    pub fn is_selfdestruct(&self, address: &Address) -> bool {
        self.selfdestruct_set.contains(address)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_selfdestruct(address))
    }

    /// All accounts scheduled for deletion, backups included.
    pub fn selfdestruct_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.selfdestruct_set.iter().copied().collect();
        if let Some(parent) = self.parent.as_deref() {
            addresses.extend(parent.selfdestruct_addresses());
        }
        addresses
    }

    pub fn add_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    pub fn add_refund(&mut self, gas: u64) {
        self.refunded_gas += gas;
    }

    /// All logs in emission order, backups included.
    pub fn extract_logs(&self) -> Vec<Log> {
        fn collect(substate: &Substate, target: &mut Vec<Log>) {
            if let Some(parent) = substate.parent.as_deref() {
                collect(parent, target);
            }
            target.extend_from_slice(&substate.logs);
        }
        let mut logs = Vec::new();
        collect(self, &mut logs);
        logs
    }
}
