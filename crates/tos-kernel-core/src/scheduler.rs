//! Process selection
//!
//! `schedule` runs at the end of every interrupt. It leaves a still-Running
//! process alone; otherwise it picks the next process according to the
//! configured policy and hands it the CPU.

use serde::{Deserialize, Serialize};

use crate::state::KernelState;
use crate::types::{ProcessId, ProcessState};

/// How the next process is chosen when the CPU is free
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPolicy {
    /// Head of the ready queue, with quantum preemption
    RoundRobin,
    /// Lowest priority score among Ready processes
    #[default]
    Priority,
    /// First Ready process in table order
    FirstReady,
}

/// Outcome of a scheduling pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The Running process keeps the CPU
    Continue(ProcessId),
    /// A new process was given the CPU
    Switch(ProcessId),
    /// Processes exist but every one of them is blocked
    Idle,
    /// The process table is empty
    Empty,
}

impl Decision {
    /// Process that owns the CPU after this decision.
    pub fn running(self) -> Option<ProcessId> {
        match self {
            Decision::Continue(pid) | Decision::Switch(pid) => Some(pid),
            Decision::Idle | Decision::Empty => None,
        }
    }
}

/// New priority score after a process gives up the CPU having used
/// `consumed` of its `quantum` ticks.
pub fn update_priority(old: f32, consumed: u32, quantum: u32) -> f32 {
    let quantum = quantum.max(1);
    let used = consumed.min(quantum) as f32 / quantum as f32;
    (old + used) / 2.0
}

/// Pick the next process without changing any state other than the ready
/// queue entries that turn out to be stale.
pub fn select(state: &mut KernelState) -> Option<ProcessId> {
    match state.policy {
        SchedulerPolicy::RoundRobin => select_round_robin(state),
        SchedulerPolicy::Priority => select_lowest_score(state).or_else(|| first_ready(state)),
        SchedulerPolicy::FirstReady => first_ready(state),
    }
}

/// Run one scheduling pass and record whether the system is idle.
pub fn schedule(state: &mut KernelState) -> Decision {
    if let Some(pid) = state.current {
        if state.current_is_running() {
            state.idle = false;
            return Decision::Continue(pid);
        }
        state.current = None;
    }

    let decision = match select(state) {
        Some(pid) if state.promote(pid).is_ok() => Decision::Switch(pid),
        _ if state.table.is_empty() => Decision::Empty,
        _ => Decision::Idle,
    };
    state.idle = decision == Decision::Idle && state.all_blocked();
    decision
}

/// Pop the ready-queue head, discarding pids that are no longer Ready.
fn select_round_robin(state: &mut KernelState) -> Option<ProcessId> {
    while let Some(pid) = state.ready.pop() {
        let runnable = state
            .table
            .get(pid)
            .map(|p| p.state == ProcessState::Ready)
            .unwrap_or(false);
        if runnable {
            return Some(pid);
        }
    }
    None
}

/// Ready process with the strictly lowest score; ties go to table order.
fn select_lowest_score(state: &KernelState) -> Option<ProcessId> {
    let mut best: Option<(ProcessId, f32)> = None;
    for process in state.table.iter().filter(|p| p.is_ready()) {
        match best {
            Some((_, score)) if process.priority >= score => {}
            _ => best = Some((process.pid, process.priority)),
        }
    }
    best.map(|(pid, _)| pid)
}

fn first_ready(state: &KernelState) -> Option<ProcessId> {
    state.table.iter().find(|p| p.is_ready()).map(|p| p.pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockReason, IoDirection, TerminalGroup};
    use alloc::vec;

    fn state_with(policy: SchedulerPolicy, n: usize) -> KernelState {
        let mut state = KernelState::new(5, 4, 10, policy);
        for _ in 0..n {
            state.admit("p.maq", 0).unwrap();
        }
        state
    }

    fn input_block() -> BlockReason {
        BlockReason::Device {
            terminal: TerminalGroup(0),
            direction: IoDirection::Input,
        }
    }

    #[test]
    fn test_update_priority() {
        assert!((update_priority(0.5, 0, 10) - 0.25).abs() < 1e-6);
        assert!((update_priority(0.5, 10, 10) - 0.75).abs() < 1e-6);
        assert!((update_priority(0.5, 5, 10) - 0.5).abs() < 1e-6);
        // Over-consumption is clamped to a full quantum
        assert!((update_priority(0.0, 40, 10) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_update_priority_monotonic_in_consumption() {
        let mut last = update_priority(0.5, 0, 10);
        for consumed in 1..=10 {
            let next = update_priority(0.5, consumed, 10);
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_running_process_continues() {
        let mut state = state_with(SchedulerPolicy::RoundRobin, 2);
        assert_eq!(schedule(&mut state), Decision::Switch(ProcessId(1)));
        assert_eq!(schedule(&mut state), Decision::Continue(ProcessId(1)));
        assert_eq!(state.ready.to_vec(), vec![ProcessId(2)]);
    }

    #[test]
    fn test_round_robin_rotation() {
        let mut state = state_with(SchedulerPolicy::RoundRobin, 3);
        schedule(&mut state);

        for _ in 0..10 {
            state.tick_current();
        }
        assert_eq!(schedule(&mut state), Decision::Switch(ProcessId(2)));
        assert_eq!(state.ready.to_vec(), vec![ProcessId(3), ProcessId(1)]);
    }

    #[test]
    fn test_round_robin_skips_stale_entries() {
        let mut state = state_with(SchedulerPolicy::RoundRobin, 2);
        // Force a stale entry: pid 1 Blocked but still queued
        state.get_process_mut(ProcessId(1)).unwrap().block(input_block());
        assert_eq!(select(&mut state), Some(ProcessId(2)));
        assert!(state.ready.is_empty());
    }

    #[test]
    fn test_priority_picks_lowest_score() {
        let mut state = state_with(SchedulerPolicy::Priority, 3);
        state.get_process_mut(ProcessId(1)).unwrap().priority = 0.9;
        state.get_process_mut(ProcessId(2)).unwrap().priority = 0.2;
        state.get_process_mut(ProcessId(3)).unwrap().priority = 0.4;

        assert_eq!(schedule(&mut state), Decision::Switch(ProcessId(2)));
        assert!(!state.ready.contains(ProcessId(2)));
    }

    #[test]
    fn test_priority_ties_go_to_table_order() {
        let mut state = state_with(SchedulerPolicy::Priority, 3);
        assert_eq!(select(&mut state), Some(ProcessId(1)));
    }

    #[test]
    fn test_first_ready_ignores_queue_order() {
        let mut state = state_with(SchedulerPolicy::FirstReady, 3);
        state.ready.remove(ProcessId(1));
        state.ready.push(ProcessId(1));
        assert_eq!(schedule(&mut state), Decision::Switch(ProcessId(1)));
    }

    #[test]
    fn test_idle_when_all_blocked() {
        let mut state = state_with(SchedulerPolicy::RoundRobin, 1);
        schedule(&mut state);
        state.block_current(input_block()).unwrap();

        assert_eq!(schedule(&mut state), Decision::Idle);
        assert!(state.idle);
        assert!(state.current.is_none());

        state.unblock(ProcessId(1)).unwrap();
        assert_eq!(schedule(&mut state), Decision::Switch(ProcessId(1)));
        assert!(!state.idle);
    }

    #[test]
    fn test_empty_table() {
        let mut state = state_with(SchedulerPolicy::Priority, 0);
        assert_eq!(schedule(&mut state), Decision::Empty);
        assert!(!state.idle);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let p: SchedulerPolicy = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(p, SchedulerPolicy::RoundRobin);
        let p: SchedulerPolicy = serde_json::from_str("\"first_ready\"").unwrap();
        assert_eq!(p, SchedulerPolicy::FirstReady);
        assert_eq!(SchedulerPolicy::default(), SchedulerPolicy::Priority);
    }
}
