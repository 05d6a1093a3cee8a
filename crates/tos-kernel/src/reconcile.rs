//! Pending-device pass
//!
//! Runs on every trap, after the interrupt itself was handled. Each blocked
//! process gets one look at whatever it is waiting for; if that is now
//! available the deferred transfer is carried out and the process is made
//! Ready again.

use alloc::vec::Vec;
use tos_hal::{Channel, DeviceId, HAL};
use tos_kernel_core::{BlockReason, IoDirection, ProcessId, TerminalGroup};

use crate::{Kernel, KernelError, ReconcileMode};

/// Status channel polled before a transfer in `direction`.
pub(crate) fn status_device(terminal: TerminalGroup, direction: IoDirection) -> DeviceId {
    match direction {
        IoDirection::Input => DeviceId::terminal(terminal.0, Channel::InputStatus),
        IoDirection::Output => DeviceId::terminal(terminal.0, Channel::OutputStatus),
    }
}

/// Data channel used by a transfer in `direction`.
pub(crate) fn data_device(terminal: TerminalGroup, direction: IoDirection) -> DeviceId {
    match direction {
        IoDirection::Input => DeviceId::terminal(terminal.0, Channel::InputData),
        IoDirection::Output => DeviceId::terminal(terminal.0, Channel::OutputData),
    }
}

impl<H: HAL> Kernel<H> {
    /// Give every blocked process, in table order, one chance to resume.
    pub(crate) fn reconcile_pending(&mut self) {
        let blocked: Vec<(ProcessId, BlockReason)> = self
            .state
            .table
            .iter()
            .filter_map(|p| p.blocked_on.map(|reason| (p.pid, reason)))
            .collect();

        for (pid, reason) in blocked {
            let resolved = match reason {
                BlockReason::Device {
                    terminal,
                    direction,
                } => match self.poll_device(pid, terminal, direction) {
                    Ok(done) => done,
                    Err(e) => {
                        self.fail(e, "completing a pending transfer");
                        return;
                    }
                },
                BlockReason::Process(target) => !self.state.exists(target),
            };

            if resolved || self.config.reconcile == ReconcileMode::Legacy {
                if self.state.unblock(pid).is_ok() {
                    self.hal
                        .debug_write(&alloc::format!("[sched] PID {} unblocked", pid));
                }
            }
        }
    }

    /// Poll the status channel and, if it is ready, finish the transfer.
    fn poll_device(
        &mut self,
        pid: ProcessId,
        terminal: TerminalGroup,
        direction: IoDirection,
    ) -> Result<bool, KernelError> {
        let ready = self
            .hal
            .read_device(status_device(terminal, direction))
            .map_err(|_| KernelError::DeviceAccessFailure)?;
        if ready == 0 {
            return Ok(false);
        }

        self.complete_transfer(pid, terminal, direction)?;
        match direction {
            IoDirection::Input => self.metrics.deferred_reads += 1,
            IoDirection::Output => self.metrics.deferred_writes += 1,
        }
        Ok(true)
    }

    /// Move one value between the process and its terminal. A read lands
    /// in the accumulator; a write sends the index register and clears the
    /// accumulator.
    pub(crate) fn complete_transfer(
        &mut self,
        pid: ProcessId,
        terminal: TerminalGroup,
        direction: IoDirection,
    ) -> Result<(), KernelError> {
        let device = data_device(terminal, direction);
        match direction {
            IoDirection::Input => {
                let value = self
                    .hal
                    .read_device(device)
                    .map_err(|_| KernelError::DeviceAccessFailure)?;
                self.set_accumulator(pid, value);
            }
            IoDirection::Output => {
                let value = self
                    .state
                    .get_process(pid)
                    .map(|p| p.regs.x)
                    .ok_or(KernelError::NoSuchProcess)?;
                self.hal
                    .write_device(device, value)
                    .map_err(|_| KernelError::DeviceAccessFailure)?;
                self.set_accumulator(pid, 0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_mapping() {
        let t = TerminalGroup(2);
        assert_eq!(
            status_device(t, IoDirection::Input),
            DeviceId::terminal(2, Channel::InputStatus)
        );
        assert_eq!(
            data_device(t, IoDirection::Output),
            DeviceId::terminal(2, Channel::OutputData)
        );
        assert_eq!(status_device(t, IoDirection::Output).bus_address(), 11);
        assert_eq!(data_device(t, IoDirection::Input).bus_address(), 8);
    }
}
