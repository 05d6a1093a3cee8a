//! Runtime-checkable kernel invariants
//!
//! These should hold after every completed interrupt. The kernel checks them
//! in debug builds and the tests check them after each scenario.
//!
//! # Invariants
//!
//! 1. **Single Running**: At most one process is Running, and it is `current`
//! 2. **Block Reason Consistency**: A reason is recorded exactly when Blocked
//! 3. **Ready Queue Consistency**: Queued pids are live, Ready and unique
//! 4. **Terminal Consistency**: Every bound group belongs to a live process
//! 5. **Slot Identity**: Every descriptor sits in the slot its pid names

use alloc::string::String;
use alloc::vec::Vec;

use crate::state::KernelState;
use crate::types::{BlockReason, ProcessId, ProcessState};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all kernel invariants.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_all_invariants(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    violations.extend(check_single_running(state));
    violations.extend(check_block_reasons(state));
    violations.extend(check_ready_queue(state));
    violations.extend(check_terminals(state));
    violations.extend(check_slot_identity(state));

    violations
}

/// Invariant 1: At most one Running process, and `current` names it
fn check_single_running(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let running: Vec<ProcessId> = state
        .table
        .iter()
        .filter(|p| p.state == ProcessState::Running)
        .map(|p| p.pid)
        .collect();

    if running.len() > 1 {
        violations.push(InvariantViolation {
            invariant: "single_running",
            description: alloc::format!("{} processes are Running: {:?}", running.len(), running),
        });
    }

    if running.first().copied() != state.current {
        violations.push(InvariantViolation {
            invariant: "single_running",
            description: alloc::format!(
                "current is {:?} but Running set is {:?}",
                state.current,
                running
            ),
        });
    }

    violations
}

/// Invariant 2: `blocked_on` is set exactly when the process is Blocked,
/// and a process never waits on itself
fn check_block_reasons(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for process in state.table.iter() {
        let blocked = process.state == ProcessState::Blocked;
        if blocked != process.blocked_on.is_some() {
            violations.push(InvariantViolation {
                invariant: "block_reason_consistency",
                description: alloc::format!(
                    "Process {} is {:?} with block reason {:?}",
                    process.pid,
                    process.state,
                    process.blocked_on
                ),
            });
        }

        if process.blocked_on == Some(BlockReason::Process(process.pid)) {
            violations.push(InvariantViolation {
                invariant: "block_reason_consistency",
                description: alloc::format!("Process {} is waiting on itself", process.pid),
            });
        }
    }

    violations
}

/// Invariant 3: Every queued pid is live and Ready and appears once
fn check_ready_queue(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for &pid in state.ready.iter() {
        match state.table.get(pid) {
            None => violations.push(InvariantViolation {
                invariant: "ready_queue_consistency",
                description: alloc::format!("Ready queue holds dead pid {}", pid),
            }),
            Some(p) if p.state != ProcessState::Ready => violations.push(InvariantViolation {
                invariant: "ready_queue_consistency",
                description: alloc::format!("Ready queue holds pid {} in state {:?}", pid, p.state),
            }),
            Some(_) => {}
        }

        if state.ready.count(pid) > 1 {
            violations.push(InvariantViolation {
                invariant: "ready_queue_consistency",
                description: alloc::format!("Pid {} is queued more than once", pid),
            });
        }
    }

    violations
}

/// Invariant 4: Every bound terminal group belongs to a live process that
/// records the same binding
fn check_terminals(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (group, pid) in state.terminals.bindings() {
        let recorded = state.table.get(pid).and_then(|p| p.terminal);
        if recorded != Some(group) {
            violations.push(InvariantViolation {
                invariant: "terminal_consistency",
                description: alloc::format!(
                    "Terminal group {} bound to pid {} which records {:?}",
                    group.0,
                    pid,
                    recorded
                ),
            });
        }
    }

    for process in state.table.iter() {
        if let Some(group) = process.terminal {
            if state.terminals.owner(group) != Some(process.pid) {
                violations.push(InvariantViolation {
                    invariant: "terminal_consistency",
                    description: alloc::format!(
                        "Process {} records terminal group {} it does not own",
                        process.pid,
                        group.0
                    ),
                });
            }
        }
    }

    violations
}

/// Invariant 5: pid and slot agree for every live descriptor
fn check_slot_identity(state: &KernelState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    for (slot, process) in state.table.iter_slots() {
        if process.pid.0 == 0 || process.pid.slot() >= state.table.capacity() {
            violations.push(InvariantViolation {
                invariant: "slot_identity",
                description: alloc::format!(
                    "Slot {} holds out-of-range pid {}",
                    slot,
                    process.pid
                ),
            });
        } else if process.pid.slot() != slot {
            violations.push(InvariantViolation {
                invariant: "slot_identity",
                description: alloc::format!(
                    "Slot {} holds PID {}, which belongs in slot {}",
                    slot,
                    process.pid,
                    process.pid.slot()
                ),
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{schedule, SchedulerPolicy};
    use crate::types::{IoDirection, TerminalGroup};

    fn names(violations: &[InvariantViolation]) -> Vec<&'static str> {
        violations.iter().map(|v| v.invariant).collect()
    }

    #[test]
    fn test_fresh_state_is_consistent() {
        let state = KernelState::default();
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_transitions_keep_invariants() {
        let mut state = KernelState::new(5, 4, 10, SchedulerPolicy::RoundRobin);
        for _ in 0..3 {
            state.admit("p.maq", 0).unwrap();
        }
        schedule(&mut state);
        assert!(check_all_invariants(&state).is_empty());

        state
            .block_current(BlockReason::Process(ProcessId(2)))
            .unwrap();
        schedule(&mut state);
        assert!(check_all_invariants(&state).is_empty());

        state.block_current(BlockReason::Device {
            terminal: TerminalGroup(1),
            direction: IoDirection::Output,
        })
        .unwrap();
        schedule(&mut state);
        state.terminate(ProcessId(3)).unwrap();
        schedule(&mut state);
        assert!(check_all_invariants(&state).is_empty());
    }

    #[test]
    fn test_detects_two_running() {
        let mut state = KernelState::default();
        state.admit("a", 0).unwrap();
        state.admit("b", 0).unwrap();
        state.promote(ProcessId(1)).unwrap();
        state
            .get_process_mut(ProcessId(2))
            .unwrap()
            .set_state(ProcessState::Running);

        assert!(names(&check_all_invariants(&state)).contains(&"single_running"));
    }

    #[test]
    fn test_detects_missing_block_reason() {
        let mut state = KernelState::default();
        state.admit("a", 0).unwrap();
        state.ready.remove(ProcessId(1));
        state
            .get_process_mut(ProcessId(1))
            .unwrap()
            .set_state(ProcessState::Blocked);

        assert_eq!(
            names(&check_all_invariants(&state)),
            alloc::vec!["block_reason_consistency"]
        );
    }

    #[test]
    fn test_detects_stale_ready_entry() {
        let mut state = KernelState::default();
        state.admit("a", 0).unwrap();
        state.get_process_mut(ProcessId(1)).unwrap().block(BlockReason::Device {
            terminal: TerminalGroup(0),
            direction: IoDirection::Input,
        });

        assert_eq!(
            names(&check_all_invariants(&state)),
            alloc::vec!["ready_queue_consistency"]
        );
    }

    #[test]
    fn test_detects_terminal_mismatch() {
        let mut state = KernelState::default();
        state.admit("a", 0).unwrap();
        state.get_process_mut(ProcessId(1)).unwrap().terminal = Some(TerminalGroup(3));

        assert!(names(&check_all_invariants(&state)).contains(&"terminal_consistency"));
    }

    #[test]
    fn test_detects_descriptor_in_wrong_slot() {
        let mut state = KernelState::default();
        state.admit("a", 0).unwrap();
        state.admit("b", 0).unwrap();
        state.terminate(ProcessId(1)).unwrap();
        assert!(check_all_invariants(&state).is_empty());

        // slot 1 claims a pid that maps to slot 3
        if let Some(p) = state.get_process_mut(ProcessId(2)) {
            p.pid = ProcessId(4);
        }

        assert!(names(&check_all_invariants(&state)).contains(&"slot_identity"));
    }
}
