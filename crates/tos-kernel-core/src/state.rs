//! Kernel state - pure data structure holding all kernel state
//!
//! This module contains the KernelState struct which holds all mutable kernel
//! state. It has NO HAL dependency - loading images, touching registers and
//! talking to devices is done by the runtime wrapper (`tos-kernel`), which
//! calls the transitions here once the outside world has been consulted.

use alloc::vec::Vec;

use crate::ready::ReadyQueue;
use crate::scheduler::{update_priority, SchedulerPolicy};
use crate::table::{ProcessTable, TerminalTable};
use crate::types::{
    BlockReason, Process, ProcessId, ProcessState, TerminalGroup, DEFAULT_CAPACITY,
    DEFAULT_QUANTUM, DEFAULT_TERMINAL_GROUPS,
};

/// Errors raised by pure state transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// Every process slot is taken
    NoSlot,
    /// No live process with that pid
    NoSuchProcess,
    /// The process is not in the state the transition needs
    WrongState,
}

/// Result of admitting a new process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admitted {
    /// Pid of the new process
    pub pid: ProcessId,
    /// Terminal group bound to it, if one was free
    pub terminal: Option<TerminalGroup>,
}

/// Result of terminating a process
#[derive(Clone, Debug)]
pub struct Termination {
    /// The removed descriptor, in state Terminated
    pub process: Process,
    /// Terminal group released by the termination
    pub released_terminal: Option<TerminalGroup>,
    /// Processes that were waiting on it and are now Ready
    pub woken: Vec<ProcessId>,
}

/// The pure kernel state - no HAL, no I/O, no side effects.
pub struct KernelState {
    /// Process table
    pub table: ProcessTable,
    /// Ready queue
    pub ready: ReadyQueue,
    /// The Running process, if any
    pub current: Option<ProcessId>,
    /// Terminal group assignment
    pub terminals: TerminalTable,
    /// Sticky kernel-internal error flag; forces a halt on dispatch
    pub internal_error: bool,
    /// Scheduling policy
    pub policy: SchedulerPolicy,
    /// Quantum given to every process, in clock ticks
    pub quantum: u32,
    /// Every live process is blocked
    pub idle: bool,
    /// Clock ticks since boot
    pub ticks: u64,
}

impl KernelState {
    /// Create an empty kernel state.
    pub fn new(capacity: usize, terminal_groups: usize, quantum: u32, policy: SchedulerPolicy) -> Self {
        Self {
            table: ProcessTable::new(capacity),
            ready: ReadyQueue::new(),
            current: None,
            terminals: TerminalTable::new(terminal_groups),
            internal_error: false,
            policy,
            quantum: quantum.max(1),
            idle: false,
            ticks: 0,
        }
    }

    // ========================================================================
    // Read-only accessors
    // ========================================================================

    /// Get process info
    pub fn get_process(&self, pid: ProcessId) -> Option<&Process> {
        self.table.get(pid)
    }

    /// Get mutable process info
    pub fn get_process_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.table.get_mut(pid)
    }

    /// Whether `pid` names a live process
    pub fn exists(&self, pid: ProcessId) -> bool {
        self.table.exists(pid)
    }

    /// The Running process
    pub fn current_process(&self) -> Option<&Process> {
        self.current.and_then(|pid| self.table.get(pid))
    }

    /// The Running process, mutably
    pub fn current_process_mut(&mut self) -> Option<&mut Process> {
        let pid = self.current?;
        self.table.get_mut(pid)
    }

    /// Whether the current process still owns the CPU
    pub fn current_is_running(&self) -> bool {
        self.current_process()
            .map(|p| p.state == ProcessState::Running)
            .unwrap_or(false)
    }

    /// At least one live process and all of them blocked
    pub fn all_blocked(&self) -> bool {
        let mut live = self.table.iter().peekable();
        live.peek().is_some() && live.all(Process::is_blocked)
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Put a new Ready process in the first free slot, bind a terminal group
    /// if one is free, and append it to the ready queue.
    pub fn admit(&mut self, name: &str, entry: i32) -> Result<Admitted, CoreError> {
        let pid = self.table.next_free().ok_or(CoreError::NoSlot)?;
        let mut process = Process::new(pid, name, entry, self.quantum, self.ticks);
        let terminal = self.terminals.bind(pid);
        process.terminal = terminal;

        if let Err(process) = self.table.insert(process) {
            self.terminals.release(process.pid);
            return Err(CoreError::NoSlot);
        }
        self.ready.push(pid);
        Ok(Admitted { pid, terminal })
    }

    /// Terminate `pid`: free its slot and terminal group, drop it from the
    /// ready queue, and wake every process waiting on it.
    pub fn terminate(&mut self, pid: ProcessId) -> Result<Termination, CoreError> {
        let mut process = self.table.remove(pid).ok_or(CoreError::NoSuchProcess)?;
        process.set_state(ProcessState::Terminated);
        process.metrics.terminated_at = Some(self.ticks);

        let released_terminal = self.terminals.release(pid);
        self.ready.remove(pid);
        if self.current == Some(pid) {
            self.current = None;
        }

        let mut woken = Vec::new();
        for waiter in self.table.iter_mut() {
            if waiter.blocked_on == Some(BlockReason::Process(pid)) {
                waiter.set_state(ProcessState::Ready);
                woken.push(waiter.pid);
            }
        }
        for &w in &woken {
            self.ready.push(w);
        }

        Ok(Termination {
            process,
            released_terminal,
            woken,
        })
    }

    /// Give the CPU to a Ready process.
    pub fn promote(&mut self, pid: ProcessId) -> Result<(), CoreError> {
        let process = self.table.get_mut(pid).ok_or(CoreError::NoSuchProcess)?;
        if process.state != ProcessState::Ready {
            return Err(CoreError::WrongState);
        }
        process.set_state(ProcessState::Running);
        self.ready.remove(pid);
        self.current = Some(pid);
        Ok(())
    }

    /// Block the Running process on `reason`. It loses the CPU, so its
    /// priority is recomputed from the ticks it used and its quantum refilled.
    pub fn block_current(&mut self, reason: BlockReason) -> Result<ProcessId, CoreError> {
        let quantum = self.quantum;
        let process = self.current_process_mut().ok_or(CoreError::NoSuchProcess)?;
        let consumed = quantum.saturating_sub(process.quantum);
        process.priority = update_priority(process.priority, consumed, quantum);
        process.quantum = quantum;
        process.block(reason);

        let pid = process.pid;
        self.ready.remove(pid);
        self.current = None;
        Ok(pid)
    }

    /// Move a Blocked process back to Ready and enqueue it.
    pub fn unblock(&mut self, pid: ProcessId) -> Result<(), CoreError> {
        let process = self.table.get_mut(pid).ok_or(CoreError::NoSuchProcess)?;
        if process.state != ProcessState::Blocked {
            return Err(CoreError::WrongState);
        }
        process.set_state(ProcessState::Ready);
        self.ready.push(pid);
        Ok(())
    }

    /// Charge one clock tick to the Running process. When its quantum runs
    /// out it goes back to the ready-queue tail; returns its pid in that case.
    pub fn tick_current(&mut self) -> Option<ProcessId> {
        let quantum = self.quantum;
        let process = self.current_process_mut()?;
        if process.state != ProcessState::Running {
            return None;
        }
        process.quantum = process.quantum.saturating_sub(1);
        if process.quantum > 0 {
            return None;
        }

        process.quantum = quantum;
        process.priority = update_priority(process.priority, quantum, quantum);
        process.set_state(ProcessState::Ready);
        process.metrics.preemptions += 1;

        let pid = process.pid;
        self.current = None;
        self.ready.push(pid);
        Some(pid)
    }

    /// Advance the tick counter and charge a tick to every live process.
    pub fn account_tick(&mut self) {
        self.ticks += 1;
        for process in self.table.iter_mut() {
            process.account_tick();
        }
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new(
            DEFAULT_CAPACITY,
            DEFAULT_TERMINAL_GROUPS,
            DEFAULT_QUANTUM,
            SchedulerPolicy::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IoDirection;
    use alloc::vec;

    fn state_with(n: usize) -> KernelState {
        let mut state = KernelState::new(5, 4, 10, SchedulerPolicy::RoundRobin);
        for i in 0..n {
            state.admit("p.maq", 100 * (i as i32 + 1)).unwrap();
        }
        state
    }

    fn device_block() -> BlockReason {
        BlockReason::Device {
            terminal: TerminalGroup(0),
            direction: IoDirection::Input,
        }
    }

    #[test]
    fn test_state_creation() {
        let state = KernelState::default();
        assert_eq!(state.table.capacity(), 5);
        assert_eq!(state.terminals.len(), 4);
        assert_eq!(state.quantum, 10);
        assert!(state.current.is_none());
        assert!(!state.internal_error);
    }

    #[test]
    fn test_admit_binds_terminal_and_enqueues() {
        let mut state = KernelState::default();
        let admitted = state.admit("init.maq", 100).unwrap();

        assert_eq!(admitted.pid, ProcessId(1));
        assert_eq!(admitted.terminal, Some(TerminalGroup(0)));
        assert_eq!(state.ready.to_vec(), vec![ProcessId(1)]);
        assert_eq!(state.get_process(ProcessId(1)).unwrap().regs.pc, 100);
    }

    #[test]
    fn test_admit_without_free_terminal_is_degraded_not_fatal() {
        let mut state = KernelState::new(5, 1, 10, SchedulerPolicy::RoundRobin);
        state.admit("a", 0).unwrap();
        let second = state.admit("b", 0).unwrap();
        assert_eq!(second.terminal, None);
        assert_eq!(state.get_process(second.pid).unwrap().terminal, None);
    }

    #[test]
    fn test_admit_full_table() {
        let mut state = state_with(5);
        assert_eq!(state.admit("six", 0), Err(CoreError::NoSlot));
        assert_eq!(state.table.live_count(), 5);
    }

    #[test]
    fn test_promote_removes_from_ready_queue() {
        let mut state = state_with(2);
        state.promote(ProcessId(1)).unwrap();
        assert_eq!(state.current, Some(ProcessId(1)));
        assert!(state.current_is_running());
        assert_eq!(state.ready.to_vec(), vec![ProcessId(2)]);
        assert_eq!(state.promote(ProcessId(1)), Err(CoreError::WrongState));
    }

    #[test]
    fn test_block_current_updates_priority_and_clears_current() {
        let mut state = state_with(1);
        state.promote(ProcessId(1)).unwrap();
        for _ in 0..4 {
            state.tick_current();
        }
        let pid = state.block_current(device_block()).unwrap();

        let p = state.get_process(pid).unwrap();
        assert_eq!(p.state, ProcessState::Blocked);
        assert_eq!(p.blocked_on, Some(device_block()));
        // (0.5 + 4/10) / 2
        assert!((p.priority - 0.45).abs() < 1e-6);
        assert_eq!(p.quantum, 10);
        assert!(state.current.is_none());
        assert!(state.ready.is_empty());
    }

    #[test]
    fn test_block_without_current_fails() {
        let mut state = state_with(1);
        assert_eq!(
            state.block_current(device_block()),
            Err(CoreError::NoSuchProcess)
        );
    }

    #[test]
    fn test_unblock_requeues() {
        let mut state = state_with(1);
        state.promote(ProcessId(1)).unwrap();
        state.block_current(device_block()).unwrap();

        state.unblock(ProcessId(1)).unwrap();
        let p = state.get_process(ProcessId(1)).unwrap();
        assert!(p.is_ready());
        assert_eq!(p.blocked_on, None);
        assert_eq!(state.ready.to_vec(), vec![ProcessId(1)]);
        assert_eq!(state.unblock(ProcessId(1)), Err(CoreError::WrongState));
    }

    #[test]
    fn test_tick_current_expires_quantum() {
        let mut state = state_with(2);
        state.promote(ProcessId(1)).unwrap();

        for _ in 0..9 {
            assert_eq!(state.tick_current(), None);
        }
        assert_eq!(state.tick_current(), Some(ProcessId(1)));

        let p = state.get_process(ProcessId(1)).unwrap();
        assert!(p.is_ready());
        assert_eq!(p.quantum, 10);
        assert_eq!(p.metrics.preemptions, 1);
        assert!((p.priority - 0.75).abs() < 1e-6);
        assert_eq!(state.ready.to_vec(), vec![ProcessId(2), ProcessId(1)]);
        assert!(state.current.is_none());
    }

    #[test]
    fn test_terminate_frees_everything() {
        let mut state = state_with(2);
        state.promote(ProcessId(1)).unwrap();

        let t = state.terminate(ProcessId(1)).unwrap();
        assert_eq!(t.process.state, ProcessState::Terminated);
        assert_eq!(t.released_terminal, Some(TerminalGroup(0)));
        assert!(t.woken.is_empty());
        assert!(!state.exists(ProcessId(1)));
        assert!(state.current.is_none());
        assert_eq!(state.terminals.owner(TerminalGroup(0)), None);
        assert_eq!(state.terminate(ProcessId(1)).map(|t| t.woken), Err(CoreError::NoSuchProcess));
    }

    #[test]
    fn test_terminate_wakes_waiters() {
        let mut state = state_with(3);
        state.promote(ProcessId(2)).unwrap();
        state.block_current(BlockReason::Process(ProcessId(1))).unwrap();
        state.promote(ProcessId(3)).unwrap();
        state.block_current(BlockReason::Process(ProcessId(1))).unwrap();

        let t = state.terminate(ProcessId(1)).unwrap();
        assert_eq!(t.woken, vec![ProcessId(2), ProcessId(3)]);
        assert_eq!(state.ready.to_vec(), vec![ProcessId(2), ProcessId(3)]);
        for pid in [ProcessId(2), ProcessId(3)] {
            assert!(state.get_process(pid).unwrap().is_ready());
            assert_eq!(state.ready.count(pid), 1);
        }
    }

    #[test]
    fn test_terminate_blocked_process_drops_relationship() {
        let mut state = state_with(2);
        state.promote(ProcessId(2)).unwrap();
        state.block_current(BlockReason::Process(ProcessId(1))).unwrap();

        let t = state.terminate(ProcessId(2)).unwrap();
        assert_eq!(t.process.blocked_on, None);
        assert!(state.ready.to_vec() == vec![ProcessId(1)]);
    }

    #[test]
    fn test_all_blocked() {
        let mut state = state_with(1);
        assert!(!state.all_blocked());
        state.promote(ProcessId(1)).unwrap();
        state.block_current(device_block()).unwrap();
        assert!(state.all_blocked());

        let empty = KernelState::default();
        assert!(!empty.all_blocked());
    }

    #[test]
    fn test_account_tick() {
        let mut state = state_with(2);
        state.promote(ProcessId(1)).unwrap();
        state.account_tick();
        assert_eq!(state.ticks, 1);
        assert_eq!(state.get_process(ProcessId(1)).unwrap().metrics.ticks_running, 1);
        assert_eq!(state.get_process(ProcessId(2)).unwrap().metrics.ticks_ready, 1);
    }
}
