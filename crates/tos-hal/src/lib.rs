//! Hardware Abstraction Layer trait for Trap OS
//!
//! This crate defines the HAL trait that lets the kernel drive the
//! simulated machine without knowing how it is implemented: the CPU
//! simulator, its memory, the device bus and the program loader.
//!
//! # Platform Implementations
//!
//! - **Simulator**: the CPU simulator owns memory and devices and calls
//!   into the kernel on every trap
//! - **Mock**: `tos-hal-mock`, an in-memory machine for tests

#![no_std]

extern crate alloc;

pub mod device;

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

pub use device::{Channel, ClockPort, DeviceId, TERMINAL_COUNT, DEVICES_PER_TERMINAL};

/// Memory address where the CPU dumps its program counter on a trap.
pub const CPU_ADDR_PC: usize = 0;
/// Memory address where the CPU dumps its accumulator on a trap.
pub const CPU_ADDR_A: usize = 1;
/// Memory address where the CPU dumps its error register on a trap.
pub const CPU_ADDR_ERR: usize = 2;
/// Address the trap handler program must be loaded at.
pub const CPU_ADDR_TRAP_HANDLER: usize = 10;
/// Scratch cell where the trap handler program parks the index register.
pub const CPU_ADDR_X: usize = 59;

/// CPU-visible register slots exchanged across the trap boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuSlot {
    /// Program counter
    ProgramCounter,
    /// Accumulator (register A)
    Accumulator,
    /// Error register
    Error,
    /// Index register (register X), carried through a scratch cell
    Index,
}

impl CpuSlot {
    /// All slots, in the order they are saved and restored.
    pub const ALL: [CpuSlot; 4] = [
        CpuSlot::ProgramCounter,
        CpuSlot::Accumulator,
        CpuSlot::Error,
        CpuSlot::Index,
    ];

    /// Memory address backing this slot.
    pub fn address(self) -> usize {
        match self {
            CpuSlot::ProgramCounter => CPU_ADDR_PC,
            CpuSlot::Accumulator => CPU_ADDR_A,
            CpuSlot::Error => CPU_ADDR_ERR,
            CpuSlot::Index => CPU_ADDR_X,
        }
    }
}

/// An executable image returned by the loader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Load address of the first cell
    pub base: usize,
    /// Memory cells, copied to `base..base + cells.len()`
    pub cells: Vec<i32>,
}

impl ProgramImage {
    /// Create an image loaded at `base`.
    pub fn new(base: usize, cells: Vec<i32>) -> Self {
        Self { base, cells }
    }

    /// One past the last address covered by the image.
    pub fn end(&self) -> usize {
        self.base + self.cells.len()
    }
}

/// Hardware Abstraction Layer trait
///
/// Implementations provide the simulated machine:
/// - Memory cell access (the CPU-visible registers live in memory too)
/// - Device bus access (terminals and the clock)
/// - Program loading
/// - Debug output
///
/// Every access reports success or failure explicitly; the kernel never
/// retries a failed access within the same trap.
pub trait HAL {
    // === Memory ===

    /// Read the memory cell at `addr`
    ///
    /// # Returns
    /// * `Ok(value)` - Cell contents
    /// * `Err(HalError::InvalidAddress)` - Address outside memory
    fn read_memory(&self, addr: usize) -> Result<i32, HalError>;

    /// Write `value` to the memory cell at `addr`
    fn write_memory(&self, addr: usize, value: i32) -> Result<(), HalError>;

    /// Read a CPU-visible register slot
    fn read_cpu_slot(&self, slot: CpuSlot) -> Result<i32, HalError> {
        self.read_memory(slot.address())
    }

    /// Write a CPU-visible register slot
    fn write_cpu_slot(&self, slot: CpuSlot, value: i32) -> Result<(), HalError> {
        self.write_memory(slot.address(), value)
    }

    // === Devices ===

    /// Read from a device
    ///
    /// Status channels return 0 when the device is not ready.
    ///
    /// # Returns
    /// * `Ok(value)` - Value read
    /// * `Err(HalError::DeviceNotFound)` - No such device on the bus
    /// * `Err(HalError::DeviceBusy)` - Device refused the access
    fn read_device(&self, device: DeviceId) -> Result<i32, HalError>;

    /// Write to a device
    fn write_device(&self, device: DeviceId, value: i32) -> Result<(), HalError>;

    // === Loader ===

    /// Look up an executable image by name
    ///
    /// The kernel copies the returned cells into memory itself.
    ///
    /// # Returns
    /// * `Ok(ProgramImage)` - Image and its load address
    /// * `Err(HalError::ProgramNotFound)` - No such executable
    fn load_program(&self, name: &str) -> Result<ProgramImage, HalError>;

    // === Debug ===

    /// Write a debug message to the simulator console
    fn debug_write(&self, msg: &str);
}

/// Fault codes the CPU leaves in its error register after a CPU-error trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuFault {
    /// No fault
    None,
    /// Memory access outside the address space
    InvalidAddress,
    /// Unknown opcode
    InvalidOperation,
    /// Device refused the access
    DeviceBusy,
    /// CPU executed a halt instruction
    Halted,
    /// Privileged instruction in user mode
    PrivilegedInstruction,
    /// Malformed instruction
    InvalidInstruction,
}

impl CpuFault {
    /// Decode the error register.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CpuFault::None),
            1 => Some(CpuFault::InvalidAddress),
            2 => Some(CpuFault::InvalidOperation),
            3 => Some(CpuFault::DeviceBusy),
            4 => Some(CpuFault::Halted),
            5 => Some(CpuFault::PrivilegedInstruction),
            6 => Some(CpuFault::InvalidInstruction),
            _ => None,
        }
    }

    /// Short human-readable name, used in kernel log lines.
    pub fn name(self) -> &'static str {
        match self {
            CpuFault::None => "ok",
            CpuFault::InvalidAddress => "invalid address",
            CpuFault::InvalidOperation => "invalid operation",
            CpuFault::DeviceBusy => "device busy",
            CpuFault::Halted => "cpu halted",
            CpuFault::PrivilegedInstruction => "privileged instruction",
            CpuFault::InvalidInstruction => "invalid instruction",
        }
    }

    /// Name for a raw error register value.
    pub fn describe(code: i32) -> &'static str {
        CpuFault::from_code(code).map_or("unknown fault", CpuFault::name)
    }
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalError {
    /// Memory address out of range
    InvalidAddress,
    /// No device at this bus address
    DeviceNotFound,
    /// Device refused the access
    DeviceBusy,
    /// Executable image not found
    ProgramNotFound,
    /// Executable image malformed
    InvalidProgram,
    /// Operation not supported on this platform
    NotSupported,
}

impl HalError {
    /// Short human-readable name, used in kernel log lines.
    pub fn name(&self) -> &'static str {
        match self {
            HalError::InvalidAddress => "invalid address",
            HalError::DeviceNotFound => "device not found",
            HalError::DeviceBusy => "device busy",
            HalError::ProgramNotFound => "program not found",
            HalError::InvalidProgram => "invalid program",
            HalError::NotSupported => "not supported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_cpu_slot_addresses() {
        assert_eq!(CpuSlot::ProgramCounter.address(), 0);
        assert_eq!(CpuSlot::Accumulator.address(), 1);
        assert_eq!(CpuSlot::Error.address(), 2);
        assert_eq!(CpuSlot::Index.address(), 59);
    }

    #[test]
    fn test_cpu_slots_do_not_overlap_trap_handler() {
        for slot in CpuSlot::ALL {
            assert_ne!(slot.address(), CPU_ADDR_TRAP_HANDLER);
        }
    }

    #[test]
    fn test_program_image_end() {
        let image = ProgramImage::new(100, vec![1, 2, 3]);
        assert_eq!(image.end(), 103);

        let empty = ProgramImage::new(7, vec![]);
        assert_eq!(empty.end(), 7);
    }

    #[test]
    fn test_cpu_fault_names() {
        assert_eq!(CpuFault::from_code(1), Some(CpuFault::InvalidAddress));
        assert_eq!(CpuFault::describe(2), "invalid operation");
        assert_eq!(CpuFault::describe(99), "unknown fault");
        assert_eq!(CpuFault::from_code(-1), None);
    }
}
