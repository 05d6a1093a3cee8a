//! Trap OS Kernel
//!
//! This crate is the runtime wrapper around `tos-kernel-core`. It owns the
//! HAL and is entered exactly once per CPU trap:
//! - Save the interrupted process's registers
//! - Route the interrupt (reset, CPU error, syscall, clock, unknown)
//! - Resolve pending device transfers and waits
//! - Schedule and dispatch the next process
//!
//! The kernel is a plain context object. It holds no globals and no locks,
//! so any number of kernels can run side by side in one test binary.

#![no_std]
extern crate alloc;

pub mod config;
pub mod error;
pub mod irq;
mod loader;
pub mod metrics;
mod reconcile;
pub mod syscall;

use alloc::string::String;
use tos_hal::{CpuSlot, HAL};
use tos_kernel_core::{schedule, Decision, KernelState};

pub use config::{KernelConfig, ReconcileMode};
pub use error::KernelError;
pub use irq::Irq;
pub use metrics::{FinishedProcess, IrqCounts, KernelMetrics};
pub use syscall::Syscall;

// Re-export HAL and core types
pub use tos_hal::{HalError, HAL as HalTrait};
pub use tos_kernel_core::{
    check_all_invariants, BlockReason, IoDirection, InvariantViolation, Process, ProcessId,
    ProcessState, Registers, SchedulerPolicy, TerminalGroup,
};

/// What the trap handler program should do once the kernel returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum TrapSignal {
    /// Return from the interrupt into the dispatched process
    Resume = 0,
    /// Stop the CPU until the next interrupt
    Halt = 1,
}

impl TrapSignal {
    /// Value handed back to the trap handler program.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The kernel, generic over HAL implementation.
pub struct Kernel<H: HAL> {
    /// Simulated machine
    hal: H,
    /// Boot-time configuration
    config: KernelConfig,
    /// Process table, ready queue, scheduler state
    state: KernelState,
    /// Run counters
    metrics: KernelMetrics,
    /// CPU registers as saved on the last trap
    cpu: Registers,
    /// The end-of-run report was written
    report_emitted: bool,
}

impl<H: HAL> Kernel<H> {
    /// Create a kernel over `hal`. Nothing runs until the reset trap.
    pub fn new(hal: H, config: KernelConfig) -> Self {
        let state = KernelState::new(
            config.capacity,
            config.terminal_count,
            config.quantum,
            config.policy,
        );
        Self {
            hal,
            config,
            state,
            metrics: KernelMetrics::new(),
            cpu: Registers::default(),
            report_emitted: false,
        }
    }

    /// Create a kernel with the default configuration.
    pub fn with_defaults(hal: H) -> Self {
        Self::new(hal, KernelConfig::default())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get a reference to the HAL
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Active configuration
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Pure kernel state
    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// Run counters
    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    /// Whether a kernel-internal error has been recorded
    pub fn internal_error(&self) -> bool {
        self.state.internal_error
    }

    /// The Running process
    pub fn current_pid(&self) -> Option<ProcessId> {
        self.state.current
    }

    /// Get process info
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.state.get_process(pid)
    }

    /// Registers saved from the CPU on the last trap
    pub fn saved_cpu(&self) -> Registers {
        self.cpu
    }

    /// Serialize the run counters to JSON.
    pub fn metrics_report(&self) -> Result<String, serde_json::Error> {
        self.metrics.to_json()
    }

    // ========================================================================
    // Trap entry
    // ========================================================================

    /// Handle one CPU trap and tell the trap handler how to continue.
    pub fn handle_trap(&mut self, code: i32) -> TrapSignal {
        self.save_registers();

        let irq = Irq::from_code(code);
        self.metrics.record_irq(irq);
        self.route_irq(irq);

        self.reconcile_pending();
        self.run_scheduler();
        let signal = self.dispatch();

        #[cfg(debug_assertions)]
        self.report_invariants();

        signal
    }

    /// Copy the CPU-visible registers into the Running descriptor.
    fn save_registers(&mut self) {
        if !self.state.current_is_running() {
            return;
        }

        let mut regs = Registers::default();
        for slot in CpuSlot::ALL {
            let value = match self.hal.read_cpu_slot(slot) {
                Ok(v) => v,
                Err(_) => {
                    self.fail(KernelError::MemoryAccessFailure, "saving registers");
                    return;
                }
            };
            match slot {
                CpuSlot::ProgramCounter => regs.pc = value,
                CpuSlot::Accumulator => regs.a = value,
                CpuSlot::Error => regs.err = value,
                CpuSlot::Index => regs.x = value,
            }
        }

        self.cpu = regs;
        if let Some(process) = self.state.current_process_mut() {
            process.regs = regs;
        }
    }

    /// Pick who runs next and record the outcome.
    fn run_scheduler(&mut self) {
        let decision = schedule(&mut self.state);
        self.metrics.idle = self.state.idle;

        match decision {
            Decision::Switch(pid) => {
                self.metrics.dispatches += 1;
                self.hal
                    .debug_write(&alloc::format!("[sched] Dispatching PID {}", pid));
            }
            Decision::Idle => {
                self.hal.debug_write("[sched] All processes blocked, CPU idle");
            }
            Decision::Empty => self.finish_run(),
            Decision::Continue(_) => {}
        }
    }

    /// Write the Running descriptor's registers back to the CPU slots.
    fn dispatch(&mut self) -> TrapSignal {
        if self.state.internal_error {
            return TrapSignal::Halt;
        }

        let regs = match self.state.current_process() {
            Some(p) if p.state == ProcessState::Running => p.regs,
            _ => return TrapSignal::Halt,
        };

        let slots = [
            (CpuSlot::ProgramCounter, regs.pc),
            (CpuSlot::Accumulator, regs.a),
            (CpuSlot::Error, regs.err),
            (CpuSlot::Index, regs.x),
        ];
        for (slot, value) in slots {
            if self.hal.write_cpu_slot(slot, value).is_err() {
                self.fail(KernelError::MemoryAccessFailure, "dispatching registers");
                return TrapSignal::Halt;
            }
        }

        self.cpu = regs;
        TrapSignal::Resume
    }

    /// Emit the end-of-run report once the last process is gone.
    fn finish_run(&mut self) {
        if self.report_emitted || self.metrics.processes_created == 0 {
            return;
        }
        self.report_emitted = true;

        self.hal.debug_write(&alloc::format!(
            "[kernel] All processes finished ({} created)",
            self.metrics.processes_created
        ));
        match self.metrics_report() {
            Ok(json) => self
                .hal
                .debug_write(&alloc::format!("[kernel] Metrics: {}", json)),
            Err(_) => self.hal.debug_write("[kernel] Metrics report unavailable"),
        }
    }

    #[cfg(debug_assertions)]
    fn report_invariants(&self) {
        for v in check_all_invariants(&self.state) {
            self.hal.debug_write(&alloc::format!(
                "[kernel] Invariant {} violated: {}",
                v.invariant,
                v.description
            ));
        }
    }

    // ========================================================================
    // Process lifecycle
    // ========================================================================

    /// Terminate `pid`, or the Running process when `pid` is 0.
    ///
    /// Waiters on the terminated process become Ready with a zero
    /// accumulator. Returns the pid that was terminated.
    pub fn terminate(&mut self, pid: ProcessId) -> Result<ProcessId, KernelError> {
        let target = match (pid.0, self.state.current) {
            (0, Some(current)) => current,
            (0, None) => {
                self.hal
                    .debug_write("[kernel] Cannot terminate PID 0: no running process");
                return Err(KernelError::NoSuchProcess);
            }
            _ => pid,
        };

        let termination = match self.state.terminate(target) {
            Ok(t) => t,
            Err(e) => {
                self.hal.debug_write(&alloc::format!(
                    "[kernel] Cannot terminate PID {}: no such process",
                    target
                ));
                return Err(e.into());
            }
        };

        self.hal.debug_write(&alloc::format!(
            "[kernel] Terminated process: {} (PID {})",
            termination.process.name,
            target
        ));

        for &waiter in &termination.woken {
            if let Some(p) = self.state.get_process_mut(waiter) {
                p.regs.a = 0;
            }
            self.hal.debug_write(&alloc::format!(
                "[sched] PID {} woken by exit of PID {}",
                waiter,
                target
            ));
        }

        self.metrics.record_finished(&termination.process);
        Ok(target)
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Record a kernel-internal error: log it and set the persistent flag.
    pub(crate) fn fail(&mut self, err: KernelError, context: &str) {
        self.hal.debug_write(&alloc::format!(
            "[kernel] Internal error: {} while {}",
            err.name(),
            context
        ));
        self.state.internal_error = true;
    }

    /// Set the register a process sees in its accumulator on next dispatch.
    pub(crate) fn set_accumulator(&mut self, pid: ProcessId, value: i32) {
        if let Some(p) = self.state.get_process_mut(pid) {
            p.regs.a = value;
        }
    }
}
