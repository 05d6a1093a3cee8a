//! Core kernel types
//!
//! This module contains the fundamental types used throughout the kernel core.
//! All types here are pure data - no behavior that depends on HAL.

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Clock ticks a process may run before it is requeued
pub const DEFAULT_QUANTUM: u32 = 10;

/// Priority score given to a freshly spawned process
pub const NEUTRAL_PRIORITY: f32 = 0.5;

/// Process table capacity
pub const DEFAULT_CAPACITY: usize = 5;

/// Number of terminal groups that can be bound to processes
pub const DEFAULT_TERMINAL_GROUPS: usize = 4;

/// Process identifier (always positive)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Pid of the process living in table slot `slot`.
    pub fn from_slot(slot: usize) -> Self {
        ProcessId(slot as u32 + 1)
    }

    /// Table slot this pid lives in.
    pub fn slot(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    /// Interpret a register value as a pid; zero and negatives are not pids.
    pub fn from_register(value: i32) -> Option<Self> {
        if value > 0 {
            Some(ProcessId(value as u32))
        } else {
            None
        }
    }

    /// Register encoding of this pid.
    pub fn as_register(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a terminal group (a bundle of four devices)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerminalGroup(pub u8);

/// Direction of a terminal transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoDirection {
    /// Keyboard read
    Input,
    /// Screen write
    Output,
}

/// Why a process is blocked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    /// Waiting for a terminal channel to become ready
    Device {
        terminal: TerminalGroup,
        direction: IoDirection,
    },
    /// Waiting for another process to terminate
    Process(ProcessId),
}

/// Process state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Runnable, waiting for the CPU
    Ready,
    /// Owns the CPU
    Running,
    /// Waiting for a device or another process
    Blocked,
    /// Finished; the slot is freed in the same step
    Terminated,
}

/// Saved CPU registers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Program counter
    pub pc: i32,
    /// Accumulator
    pub a: i32,
    /// Index register
    pub x: i32,
    /// Error register
    pub err: i32,
}

/// Per-process accounting
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    /// Times the process entered Ready
    pub ready_entries: u64,
    /// Times the process entered Blocked
    pub blocked_entries: u64,
    /// Times the process was given the CPU
    pub dispatches: u64,
    /// Times the process lost the CPU to quantum exhaustion
    pub preemptions: u64,
    /// Clock ticks spent Ready
    pub ticks_ready: u64,
    /// Clock ticks spent Running
    pub ticks_running: u64,
    /// Clock ticks spent Blocked
    pub ticks_blocked: u64,
    /// Clock tick at creation
    pub created_at: u64,
    /// Clock tick at termination
    pub terminated_at: Option<u64>,
}

impl ProcessMetrics {
    /// Ticks between creation and termination.
    pub fn turnaround(&self) -> Option<u64> {
        self.terminated_at
            .map(|end| end.saturating_sub(self.created_at))
    }
}

/// Process descriptor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Process {
    /// Process ID
    pub pid: ProcessId,
    /// Executable name
    pub name: String,
    /// Saved registers
    pub regs: Registers,
    /// Current state
    pub state: ProcessState,
    /// Bound terminal group, if one was free at spawn
    pub terminal: Option<TerminalGroup>,
    /// Set exactly when `state` is Blocked
    pub blocked_on: Option<BlockReason>,
    /// Clock ticks left in the current quantum
    pub quantum: u32,
    /// Scheduling score, lower runs first
    pub priority: f32,
    /// Accounting
    pub metrics: ProcessMetrics,
}

impl Process {
    /// Create a Ready process starting at `entry`.
    pub fn new(pid: ProcessId, name: &str, entry: i32, quantum: u32, now: u64) -> Self {
        Self {
            pid,
            name: String::from(name),
            regs: Registers {
                pc: entry,
                ..Default::default()
            },
            state: ProcessState::Ready,
            terminal: None,
            blocked_on: None,
            quantum,
            priority: NEUTRAL_PRIORITY,
            metrics: ProcessMetrics {
                ready_entries: 1,
                created_at: now,
                ..Default::default()
            },
        }
    }

    /// Move to `to`, keeping the block reason and the entry counters in step.
    pub fn set_state(&mut self, to: ProcessState) {
        if self.state == to {
            return;
        }
        self.state = to;
        if to != ProcessState::Blocked {
            self.blocked_on = None;
        }
        match to {
            ProcessState::Ready => self.metrics.ready_entries += 1,
            ProcessState::Running => self.metrics.dispatches += 1,
            ProcessState::Blocked => self.metrics.blocked_entries += 1,
            ProcessState::Terminated => {}
        }
    }

    /// Block on `reason`.
    pub fn block(&mut self, reason: BlockReason) {
        self.set_state(ProcessState::Blocked);
        self.blocked_on = Some(reason);
    }

    /// Whether the process can be picked by the scheduler.
    pub fn is_ready(&self) -> bool {
        self.state == ProcessState::Ready
    }

    /// Whether the process is waiting on something.
    pub fn is_blocked(&self) -> bool {
        self.state == ProcessState::Blocked
    }

    /// Charge one clock tick to the counter of the current state.
    pub fn account_tick(&mut self) {
        match self.state {
            ProcessState::Ready => self.metrics.ticks_ready += 1,
            ProcessState::Running => self.metrics.ticks_running += 1,
            ProcessState::Blocked => self.metrics.ticks_blocked += 1,
            ProcessState::Terminated => {}
        }
    }
}
