//! Interrupt routing and the non-syscall handlers

use tos_hal::{ClockPort, CpuFault, DeviceId, HAL};

use crate::{Kernel, KernelError};

/// Interrupt request kinds, decoded from the trap code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Irq {
    /// CPU power-on
    Reset,
    /// CPU detected a fault in the running program
    CpuError,
    /// Running program made a system call
    Syscall,
    /// Clock timer expired
    Clock,
    /// Anything else, keyboard and screen included
    Unknown(i32),
}

impl Irq {
    /// Decode a trap code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Irq::Reset,
            1 => Irq::CpuError,
            2 => Irq::Syscall,
            3 => Irq::Clock,
            other => Irq::Unknown(other),
        }
    }

    /// Trap code for this interrupt.
    pub fn code(self) -> i32 {
        match self {
            Irq::Reset => 0,
            Irq::CpuError => 1,
            Irq::Syscall => 2,
            Irq::Clock => 3,
            Irq::Unknown(code) => code,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Irq::Reset => "reset",
            Irq::CpuError => "cpu error",
            Irq::Syscall => "syscall",
            Irq::Clock => "clock",
            Irq::Unknown(4) => "keyboard",
            Irq::Unknown(5) => "screen",
            Irq::Unknown(_) => "unknown",
        }
    }
}

impl<H: HAL> Kernel<H> {
    pub(crate) fn route_irq(&mut self, irq: Irq) {
        match irq {
            Irq::Reset => self.handle_reset(),
            Irq::CpuError => self.handle_cpu_error(),
            Irq::Syscall => self.handle_syscall(),
            Irq::Clock => self.handle_clock(),
            Irq::Unknown(code) => self.handle_unknown(code),
        }
    }

    /// Load the trap handler, arm the timer and start init.
    fn handle_reset(&mut self) {
        self.hal.debug_write("[irq] Reset");

        let handler = self.config.trap_handler_image.clone();
        match self.load_image(&handler) {
            Ok(base) if base == self.config.trap_handler_address => {}
            Ok(base) => {
                let context = alloc::format!(
                    "loading {} (landed at {}, expected {})",
                    handler,
                    base,
                    self.config.trap_handler_address
                );
                self.fail(KernelError::LoadFailure, &context);
            }
            Err(e) => self.fail(e, "loading the trap handler"),
        }

        if self
            .hal
            .write_device(DeviceId::Clock(ClockPort::Timer), self.config.clock_interval)
            .is_err()
        {
            self.fail(KernelError::DeviceAccessFailure, "arming the timer");
        }

        let init = self.config.init_image.clone();
        let pid = match self.spawn(&init) {
            Ok(pid) => pid,
            Err(e) => {
                self.fail(e, "spawning init");
                return;
            }
        };

        // init runs first without going through the scheduler
        if self.state.current.is_none() && self.state.promote(pid).is_ok() {
            self.set_accumulator(pid, pid.as_register());
            self.metrics.dispatches += 1;
            self.hal
                .debug_write(&alloc::format!("[kernel] Booted {} as PID {}", init, pid));
        }
    }

    /// The running program faulted: report the fault and kill it. The kernel
    /// stops after a CPU error.
    fn handle_cpu_error(&mut self) {
        match self.state.current_process() {
            Some(p) => {
                let pid = p.pid;
                self.hal.debug_write(&alloc::format!(
                    "[irq] CPU error in PID {}: {}",
                    pid,
                    CpuFault::describe(p.regs.err)
                ));
                if let Err(e) = self.terminate(pid) {
                    self.hal.debug_write(&alloc::format!(
                        "[irq] Faulted PID {} not terminated: {}",
                        pid,
                        e.name()
                    ));
                }
            }
            None => self.hal.debug_write("[irq] CPU error with no running process"),
        }
        self.state.internal_error = true;
    }

    /// Acknowledge and rearm the clock, then charge the tick.
    fn handle_clock(&mut self) {
        let ack = self
            .hal
            .write_device(DeviceId::Clock(ClockPort::Interrupt), 0);
        let arm = self
            .hal
            .write_device(DeviceId::Clock(ClockPort::Timer), self.config.clock_interval);
        if ack.is_err() || arm.is_err() {
            self.fail(KernelError::DeviceAccessFailure, "rearming the clock");
        }

        self.metrics.clock_ticks += 1;
        if self.state.idle {
            self.metrics.idle_ticks += 1;
        }
        self.state.account_tick();

        if let Some(pid) = self.state.tick_current() {
            self.metrics.preemptions += 1;
            self.hal
                .debug_write(&alloc::format!("[sched] Quantum expired for PID {}", pid));
        }
    }

    fn handle_unknown(&mut self, code: i32) {
        self.hal.debug_write(&alloc::format!(
            "[irq] Cannot handle IRQ {} ({})",
            code,
            Irq::Unknown(code).name()
        ));
        self.fail(KernelError::UnknownInterrupt, "routing an interrupt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_from_code() {
        assert_eq!(Irq::from_code(0), Irq::Reset);
        assert_eq!(Irq::from_code(1), Irq::CpuError);
        assert_eq!(Irq::from_code(2), Irq::Syscall);
        assert_eq!(Irq::from_code(3), Irq::Clock);
        assert_eq!(Irq::from_code(4), Irq::Unknown(4));
        assert_eq!(Irq::from_code(-7), Irq::Unknown(-7));
    }

    #[test]
    fn test_irq_code_roundtrip() {
        for code in -1..8 {
            assert_eq!(Irq::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_irq_names() {
        assert_eq!(Irq::Clock.name(), "clock");
        assert_eq!(Irq::Unknown(4).name(), "keyboard");
        assert_eq!(Irq::Unknown(5).name(), "screen");
        assert_eq!(Irq::Unknown(42).name(), "unknown");
    }
}
