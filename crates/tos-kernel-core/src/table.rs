//! Process table and terminal-group table
//!
//! The process table is a fixed-capacity arena: slot `i` holds the process
//! with pid `i + 1`, so lookups are a bounds check and a freed slot's pid
//! comes back on the next spawn that lands there.

use alloc::vec::Vec;

use crate::types::{Process, ProcessId, TerminalGroup};

/// Fixed-capacity registry of process descriptors
#[derive(Clone, Debug)]
pub struct ProcessTable {
    slots: Vec<Option<Process>>,
}

impl ProcessTable {
    /// Create an empty table with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Pid the next insertion would get, if any slot is free.
    pub fn next_free(&self) -> Option<ProcessId> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(ProcessId::from_slot)
    }

    /// Store `process` in the slot its pid names. Returns the process back
    /// if that slot is taken or out of range.
    pub fn insert(&mut self, process: Process) -> Result<ProcessId, Process> {
        let pid = process.pid;
        match self.slots.get_mut(pid.slot()) {
            Some(slot) if slot.is_none() && pid.0 > 0 => {
                *slot = Some(process);
                Ok(pid)
            }
            _ => Err(process),
        }
    }

    /// Free the slot holding `pid`.
    pub fn remove(&mut self, pid: ProcessId) -> Option<Process> {
        let slot = self.slots.get_mut(pid.slot())?;
        if slot.as_ref().map(|p| p.pid) == Some(pid) {
            slot.take()
        } else {
            None
        }
    }

    /// Whether `pid` names a live process.
    pub fn exists(&self, pid: ProcessId) -> bool {
        self.get(pid).is_some()
    }

    /// Get a process by pid.
    pub fn get(&self, pid: ProcessId) -> Option<&Process> {
        if pid.0 == 0 {
            return None;
        }
        self.slots
            .get(pid.slot())
            .and_then(Option::as_ref)
            .filter(|p| p.pid == pid)
    }

    /// Get a mutable process by pid.
    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        if pid.0 == 0 {
            return None;
        }
        self.slots
            .get_mut(pid.slot())
            .and_then(Option::as_mut)
            .filter(|p| p.pid == pid)
    }

    /// Live processes in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Live processes with the slot each one occupies.
    pub fn iter_slots(&self) -> impl Iterator<Item = (usize, &Process)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|p| (slot, p)))
    }

    /// Mutable live processes in table order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Pids of live processes in table order.
    pub fn pids(&self) -> Vec<ProcessId> {
        self.iter().map(|p| p.pid).collect()
    }
}

/// Terminal group assignment: group → owning pid
#[derive(Clone, Debug)]
pub struct TerminalTable {
    owners: Vec<Option<ProcessId>>,
}

impl TerminalTable {
    /// Create a table of `groups` unbound terminal groups.
    pub fn new(groups: usize) -> Self {
        Self {
            owners: alloc::vec![None; groups],
        }
    }

    /// Number of terminal groups.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether there are no terminal groups at all.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Bind the first free group to `pid`.
    pub fn bind(&mut self, pid: ProcessId) -> Option<TerminalGroup> {
        let index = self.owners.iter().position(Option::is_none)?;
        self.owners[index] = Some(pid);
        Some(TerminalGroup(index as u8))
    }

    /// Release every group bound to `pid`; returns the group that was bound.
    pub fn release(&mut self, pid: ProcessId) -> Option<TerminalGroup> {
        let mut released = None;
        for (index, owner) in self.owners.iter_mut().enumerate() {
            if *owner == Some(pid) {
                *owner = None;
                released = Some(TerminalGroup(index as u8));
            }
        }
        released
    }

    /// Owner of `group`.
    pub fn owner(&self, group: TerminalGroup) -> Option<ProcessId> {
        self.owners.get(group.0 as usize).copied().flatten()
    }

    /// (group, owner) pairs for every bound group.
    pub fn bindings(&self) -> impl Iterator<Item = (TerminalGroup, ProcessId)> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.map(|pid| (TerminalGroup(i as u8), pid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_QUANTUM;

    fn proc_at(table: &ProcessTable, name: &str) -> Process {
        let pid = table.next_free().unwrap();
        Process::new(pid, name, 100, DEFAULT_QUANTUM, 0)
    }

    #[test]
    fn test_table_creation() {
        let table = ProcessTable::new(5);
        assert_eq!(table.capacity(), 5);
        assert_eq!(table.live_count(), 0);
        assert!(table.is_empty());
        assert!(!table.is_full());
        assert_eq!(table.next_free(), Some(ProcessId(1)));
    }

    #[test]
    fn test_insert_fills_first_free_slot() {
        let mut table = ProcessTable::new(3);
        let p = proc_at(&table, "a");
        assert_eq!(table.insert(p).unwrap(), ProcessId(1));
        let p = proc_at(&table, "b");
        assert_eq!(table.insert(p).unwrap(), ProcessId(2));

        assert_eq!(table.live_count(), 2);
        assert_eq!(table.get(ProcessId(2)).unwrap().name, "b");
        assert_eq!(table.pids(), alloc::vec![ProcessId(1), ProcessId(2)]);
    }

    #[test]
    fn test_insert_into_taken_slot_fails() {
        let mut table = ProcessTable::new(2);
        let p = proc_at(&table, "a");
        table.insert(p).unwrap();

        let dup = Process::new(ProcessId(1), "dup", 0, DEFAULT_QUANTUM, 0);
        assert!(table.insert(dup).is_err());
        let out_of_range = Process::new(ProcessId(9), "x", 0, DEFAULT_QUANTUM, 0);
        assert!(table.insert(out_of_range).is_err());
    }

    #[test]
    fn test_full_table() {
        let mut table = ProcessTable::new(2);
        for name in ["a", "b"] {
            let p = proc_at(&table, name);
            table.insert(p).unwrap();
        }
        assert!(table.is_full());
        assert_eq!(table.next_free(), None);
    }

    #[test]
    fn test_remove_frees_slot_for_reuse() {
        let mut table = ProcessTable::new(3);
        for name in ["a", "b", "c"] {
            let p = proc_at(&table, name);
            table.insert(p).unwrap();
        }

        let removed = table.remove(ProcessId(2)).unwrap();
        assert_eq!(removed.name, "b");
        assert!(!table.exists(ProcessId(2)));
        assert_eq!(table.remove(ProcessId(2)).map(|p| p.pid), None);

        assert_eq!(table.next_free(), Some(ProcessId(2)));
        let p = proc_at(&table, "d");
        table.insert(p).unwrap();
        assert_eq!(table.get(ProcessId(2)).unwrap().name, "d");
    }

    #[test]
    fn test_iter_slots_skips_holes() {
        let mut table = ProcessTable::new(3);
        for name in ["a", "b", "c"] {
            let p = proc_at(&table, name);
            table.insert(p).unwrap();
        }
        table.remove(ProcessId(1));

        let slots: Vec<(usize, ProcessId)> =
            table.iter_slots().map(|(slot, p)| (slot, p.pid)).collect();
        assert_eq!(slots, alloc::vec![(1, ProcessId(2)), (2, ProcessId(3))]);
    }

    #[test]
    fn test_pid_zero_is_never_live() {
        let mut table = ProcessTable::new(2);
        let p = proc_at(&table, "a");
        table.insert(p).unwrap();
        assert!(!table.exists(ProcessId(0)));
        assert!(table.get_mut(ProcessId(0)).is_none());
    }

    #[test]
    fn test_terminal_bind_and_release() {
        let mut terms = TerminalTable::new(2);
        assert_eq!(terms.bind(ProcessId(1)), Some(TerminalGroup(0)));
        assert_eq!(terms.bind(ProcessId(2)), Some(TerminalGroup(1)));
        assert_eq!(terms.bind(ProcessId(3)), None);

        assert_eq!(terms.release(ProcessId(1)), Some(TerminalGroup(0)));
        assert_eq!(terms.release(ProcessId(1)), None);
        assert_eq!(terms.owner(TerminalGroup(0)), None);
        assert_eq!(terms.owner(TerminalGroup(1)), Some(ProcessId(2)));

        assert_eq!(terms.bind(ProcessId(3)), Some(TerminalGroup(0)));
        assert_eq!(terms.bindings().count(), 2);
    }
}
