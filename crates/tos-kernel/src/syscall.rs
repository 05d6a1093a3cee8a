//! System calls
//!
//! The call id is in the caller's accumulator and the argument, if any, in
//! its index register. Results go back in the accumulator.
//!
//! | Id | Call  | Argument           | Result                         |
//! |----|-------|--------------------|--------------------------------|
//! | 1  | Read  | -                  | value read                     |
//! | 2  | Write | value to write     | 0                              |
//! | 7  | Spawn | address of name    | new pid, or -1                 |
//! | 8  | Kill  | pid (0 = self)     | 0, or -1 if no such process    |
//! | 9  | Wait  | pid                | 0 once the target has exited   |
//!
//! Read and Write on a terminal that is not ready block the caller; the
//! transfer is finished later by the pending-device pass.

use tos_hal::HAL;
use tos_kernel_core::{BlockReason, IoDirection, ProcessId, ProcessState};

use crate::reconcile::status_device;
use crate::{Kernel, KernelError};

/// Read one value from the caller's terminal
pub const SYS_READ: i32 = 1;
/// Write one value to the caller's terminal
pub const SYS_WRITE: i32 = 2;
/// Create a process from a named executable
pub const SYS_SPAWN: i32 = 7;
/// Terminate a process
pub const SYS_KILL: i32 = 8;
/// Block until a process terminates
pub const SYS_WAIT: i32 = 9;

/// Decoded system call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    Spawn,
    Kill,
    Wait,
}

impl Syscall {
    /// Decode a call id.
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            SYS_READ => Some(Syscall::Read),
            SYS_WRITE => Some(Syscall::Write),
            SYS_SPAWN => Some(Syscall::Spawn),
            SYS_KILL => Some(Syscall::Kill),
            SYS_WAIT => Some(Syscall::Wait),
            _ => None,
        }
    }

    /// Call id.
    pub fn id(self) -> i32 {
        match self {
            Syscall::Read => SYS_READ,
            Syscall::Write => SYS_WRITE,
            Syscall::Spawn => SYS_SPAWN,
            Syscall::Kill => SYS_KILL,
            Syscall::Wait => SYS_WAIT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Syscall::Read => "read",
            Syscall::Write => "write",
            Syscall::Spawn => "spawn",
            Syscall::Kill => "kill",
            Syscall::Wait => "wait",
        }
    }
}

impl<H: HAL> Kernel<H> {
    pub(crate) fn handle_syscall(&mut self) {
        let caller = self
            .state
            .current_process()
            .filter(|p| p.state == ProcessState::Running)
            .map(|p| (p.pid, p.regs.a));
        let (pid, id) = match caller {
            Some(caller) => caller,
            None => {
                self.hal.debug_write("[syscall] Syscall with no running process");
                self.state.internal_error = true;
                return;
            }
        };

        let call = match Syscall::from_id(id) {
            Some(call) => call,
            None => {
                self.hal.debug_write(&alloc::format!(
                    "[syscall] PID {} made unknown syscall {}",
                    pid,
                    id
                ));
                if let Err(e) = self.terminate(pid) {
                    self.hal.debug_write(&alloc::format!(
                        "[syscall] PID {} not terminated: {}",
                        pid,
                        e.name()
                    ));
                }
                self.fail(KernelError::UnknownSyscall, "dispatching a syscall");
                return;
            }
        };

        self.hal.debug_write(&alloc::format!(
            "[syscall] PID {}: {}",
            pid,
            call.name()
        ));

        match call {
            Syscall::Read => self.sys_transfer(pid, IoDirection::Input),
            Syscall::Write => self.sys_transfer(pid, IoDirection::Output),
            Syscall::Spawn => self.sys_spawn(pid),
            Syscall::Kill => self.sys_kill(pid),
            Syscall::Wait => self.sys_wait(pid),
        }
    }

    /// Read or Write: try once, block if the terminal is not ready.
    fn sys_transfer(&mut self, pid: ProcessId, direction: IoDirection) {
        let terminal = match self.state.get_process(pid).and_then(|p| p.terminal) {
            Some(t) => t,
            None => {
                self.hal.debug_write(&alloc::format!(
                    "[syscall] PID {} has no terminal",
                    pid
                ));
                self.set_accumulator(pid, -1);
                return;
            }
        };

        let outcome = match self.hal.read_device(status_device(terminal, direction)) {
            Ok(0) => Ok(false),
            Ok(_) => self.complete_transfer(pid, terminal, direction).map(|_| true),
            Err(_) => Err(KernelError::DeviceAccessFailure),
        };

        let done = match outcome {
            Ok(done) => done,
            Err(e) => {
                self.fail(e, "accessing a terminal");
                false
            }
        };

        if !done {
            let reason = BlockReason::Device {
                terminal,
                direction,
            };
            if self.state.block_current(reason).is_ok() {
                self.hal.debug_write(&alloc::format!(
                    "[sched] PID {} blocked on terminal {}",
                    pid,
                    terminal.0
                ));
            }
        }
    }

    fn sys_spawn(&mut self, pid: ProcessId) {
        let addr = self.state.get_process(pid).map(|p| p.regs.x).unwrap_or(-1);

        let result = self.copy_name(addr).and_then(|name| self.spawn(&name));
        let value = match result {
            Ok(child) => child.as_register(),
            Err(e) => {
                self.hal.debug_write(&alloc::format!(
                    "[syscall] PID {} spawn failed: {}",
                    pid,
                    e.name()
                ));
                if e.is_fatal() {
                    self.fail(e, "spawning a process");
                }
                -1
            }
        };
        self.set_accumulator(pid, value);
    }

    fn sys_kill(&mut self, pid: ProcessId) {
        let arg = self.state.get_process(pid).map(|p| p.regs.x).unwrap_or(-1);
        let target = if arg == 0 {
            Some(pid)
        } else {
            ProcessId::from_register(arg)
        };

        let result = match target {
            Some(target) => self.terminate(target),
            None => Err(KernelError::NoSuchProcess),
        };

        match result {
            Ok(killed) if killed == pid => {}
            Ok(_) => self.set_accumulator(pid, 0),
            Err(_) => self.set_accumulator(pid, -1),
        }
    }

    fn sys_wait(&mut self, pid: ProcessId) {
        let arg = self.state.get_process(pid).map(|p| p.regs.x).unwrap_or(-1);

        match ProcessId::from_register(arg) {
            Some(target) if target != pid && self.state.exists(target) => {
                if self.state.block_current(BlockReason::Process(target)).is_ok() {
                    self.hal.debug_write(&alloc::format!(
                        "[sched] PID {} waiting for PID {}",
                        pid,
                        target
                    ));
                }
            }
            _ => {
                self.hal.debug_write(&alloc::format!(
                    "[syscall] PID {} cannot wait for {}",
                    pid,
                    arg
                ));
                self.set_accumulator(pid, -1);
                self.fail(KernelError::InvalidSyscallTarget, "waiting for a process");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_ids() {
        for call in [
            Syscall::Read,
            Syscall::Write,
            Syscall::Spawn,
            Syscall::Kill,
            Syscall::Wait,
        ] {
            assert_eq!(Syscall::from_id(call.id()), Some(call));
        }
        assert_eq!(Syscall::from_id(3), None);
        assert_eq!(Syscall::from_id(0), None);
        assert_eq!(Syscall::Spawn.id(), 7);
    }
}
