//! Trap OS Kernel Core - Pure Process-Management State
//!
//! This crate contains the **HAL-free** part of the Trap OS kernel: the
//! process table, the ready queue, terminal-group assignment and the
//! scheduler.
//!
//! # Design Principles
//!
//! 1. **No HAL dependency**: Register save/restore, program loading and
//!    device access live in `tos-kernel`
//! 2. **No I/O**: Every transition is a plain state change on `KernelState`
//! 3. **Deterministic**: The same sequence of transitions always yields the
//!    same schedule
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    tos-kernel-core                          │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │  KernelState  │    │  schedule()   │                   │
//! │   │  - table      │───▶│  RR/priority/ │                   │
//! │   │  - ready      │    │  first-ready  │                   │
//! │   │  - terminals  │    └───────────────┘                   │
//! │   └───────────────┘                                         │
//! │                        ┌───────────────┐                   │
//! │                        │  Invariants   │                   │
//! │                        └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tos-kernel                             │
//! │                                                             │
//! │   - Trap entry, IRQ routing, syscalls                       │
//! │   - Pending-device reconciliation                           │
//! │   - Program loading, metrics                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Process descriptor, pids, block reasons
//! - `table` - Fixed-capacity process table and terminal-group table
//! - `ready` - FIFO ready queue
//! - `scheduler` - Policies, priority update and `schedule()`
//! - `state` - KernelState and its transitions
//! - `invariants` - Consistency checks

#![no_std]

extern crate alloc;

pub mod invariants;
pub mod ready;
pub mod scheduler;
pub mod state;
pub mod table;
pub mod types;

// Re-export all public types for convenient access
pub use invariants::{check_all_invariants, InvariantViolation};
pub use ready::ReadyQueue;
pub use scheduler::{schedule, select, update_priority, Decision, SchedulerPolicy};
pub use state::{Admitted, CoreError, KernelState, Termination};
pub use table::{ProcessTable, TerminalTable};
pub use types::{
    BlockReason, IoDirection, Process, ProcessId, ProcessMetrics, ProcessState, Registers,
    TerminalGroup, DEFAULT_CAPACITY, DEFAULT_QUANTUM, DEFAULT_TERMINAL_GROUPS, NEUTRAL_PRIORITY,
};
