//! Kernel configuration
//!
//! Every field has a default matching the stock simulator setup, so a
//! config document only needs to name what it overrides.

use alloc::string::String;
use serde::{Deserialize, Serialize};
use tos_hal::{CPU_ADDR_TRAP_HANDLER, TERMINAL_COUNT};
use tos_kernel_core::{SchedulerPolicy, DEFAULT_CAPACITY, DEFAULT_QUANTUM};

/// Clock ticks between timer interrupts, in executed instructions
pub const DEFAULT_CLOCK_INTERVAL: i32 = 50;

/// Longest executable name a Spawn syscall may pass, terminator included
pub const DEFAULT_NAME_BUDGET: usize = 100;

/// How the pending-device pass treats blocked processes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Unblock only once the deferred transfer completed or the awaited
    /// process is gone
    #[default]
    Gated,
    /// Unblock every blocked process on each pass; transfers still happen
    /// only when the device is ready
    Legacy,
}

/// Kernel configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Process table capacity
    pub capacity: usize,
    /// Quantum in clock ticks
    pub quantum: u32,
    /// Timer interval written to the clock on reset and on every tick
    pub clock_interval: i32,
    /// Number of terminal groups handed out to processes
    pub terminal_count: usize,
    /// Scheduling policy
    pub policy: SchedulerPolicy,
    /// Pending-device pass behaviour
    pub reconcile: ReconcileMode,
    /// Trap handler executable
    pub trap_handler_image: String,
    /// Address the trap handler must be loaded at
    pub trap_handler_address: usize,
    /// First user program
    pub init_image: String,
    /// Name copy budget for Spawn, in memory cells
    pub name_budget: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            quantum: DEFAULT_QUANTUM,
            clock_interval: DEFAULT_CLOCK_INTERVAL,
            terminal_count: TERMINAL_COUNT,
            policy: SchedulerPolicy::default(),
            reconcile: ReconcileMode::default(),
            trap_handler_image: String::from("trata_int.maq"),
            trap_handler_address: CPU_ADDR_TRAP_HANDLER,
            init_image: String::from("init.maq"),
            name_budget: DEFAULT_NAME_BUDGET,
        }
    }
}

impl KernelConfig {
    /// Parse a JSON config document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the scheduling policy.
    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the pending-device pass behaviour.
    pub fn with_reconcile(mut self, mode: ReconcileMode) -> Self {
        self.reconcile = mode;
        self
    }

    /// Set the process table capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
