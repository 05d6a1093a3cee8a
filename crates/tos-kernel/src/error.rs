//! Kernel errors

use tos_hal::HalError;
use tos_kernel_core::CoreError;

/// Kernel errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Process table is full
    NoSlot,
    /// Executable image missing or malformed
    LoadFailure,
    /// Memory read or write failed
    MemoryAccessFailure,
    /// Wait on self or on a pid that does not exist
    InvalidSyscallTarget,
    /// Interrupt code the kernel does not handle
    UnknownInterrupt,
    /// Syscall id the kernel does not handle
    UnknownSyscall,
    /// Terminal or clock access failed
    DeviceAccessFailure,
    /// No live process with that pid
    NoSuchProcess,
}

impl KernelError {
    /// Whether the error leaves the kernel unable to continue. Fatal errors
    /// set the persistent internal-error flag; the others are reported to
    /// the calling process only.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::MemoryAccessFailure
                | KernelError::UnknownInterrupt
                | KernelError::UnknownSyscall
                | KernelError::DeviceAccessFailure
        )
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            KernelError::NoSlot => "no free process slot",
            KernelError::LoadFailure => "load failure",
            KernelError::MemoryAccessFailure => "memory access failure",
            KernelError::InvalidSyscallTarget => "invalid syscall target",
            KernelError::UnknownInterrupt => "unknown interrupt",
            KernelError::UnknownSyscall => "unknown syscall",
            KernelError::DeviceAccessFailure => "device access failure",
            KernelError::NoSuchProcess => "no such process",
        }
    }
}

impl From<HalError> for KernelError {
    fn from(e: HalError) -> Self {
        match e {
            HalError::InvalidAddress => KernelError::MemoryAccessFailure,
            HalError::DeviceNotFound | HalError::DeviceBusy => KernelError::DeviceAccessFailure,
            HalError::ProgramNotFound | HalError::InvalidProgram => KernelError::LoadFailure,
            HalError::NotSupported => KernelError::DeviceAccessFailure,
        }
    }
}

impl From<CoreError> for KernelError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NoSlot => KernelError::NoSlot,
            CoreError::NoSuchProcess | CoreError::WrongState => KernelError::NoSuchProcess,
        }
    }
}
