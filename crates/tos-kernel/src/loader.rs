//! Program loading and process creation

use alloc::string::String;
use tos_hal::HAL;
use tos_kernel_core::ProcessId;

use crate::{Kernel, KernelError};

impl<H: HAL> Kernel<H> {
    /// Load `name` and admit it as a new Ready process.
    ///
    /// The table is checked before anything is copied, so a failed spawn
    /// never consumes a slot.
    pub fn spawn(&mut self, name: &str) -> Result<ProcessId, KernelError> {
        if self.state.table.is_full() {
            self.hal.debug_write(&alloc::format!(
                "[kernel] Cannot spawn {}: process table full",
                name
            ));
            return Err(KernelError::NoSlot);
        }

        let entry = self.load_image(name)?;
        let entry = i32::try_from(entry).map_err(|_| {
            self.hal.debug_write(&alloc::format!(
                "[kernel] Cannot load {}: entry point {} out of range",
                name,
                entry
            ));
            KernelError::LoadFailure
        })?;
        let admitted = self.state.admit(name, entry)?;
        self.metrics.processes_created += 1;

        self.hal.debug_write(&alloc::format!(
            "[kernel] Spawned process: {} (PID {})",
            name,
            admitted.pid
        ));
        if admitted.terminal.is_none() {
            self.hal.debug_write(&alloc::format!(
                "[kernel] PID {} has no terminal, I/O disabled",
                admitted.pid
            ));
        }

        Ok(admitted.pid)
    }

    /// Copy an executable image into memory; returns its load address.
    pub(crate) fn load_image(&mut self, name: &str) -> Result<usize, KernelError> {
        let image = self.hal.load_program(name).map_err(|e| {
            self.hal.debug_write(&alloc::format!(
                "[kernel] Cannot load {}: {}",
                name,
                e.name()
            ));
            KernelError::LoadFailure
        })?;

        for (offset, &cell) in image.cells.iter().enumerate() {
            let addr = image.base + offset;
            if self.hal.write_memory(addr, cell).is_err() {
                self.hal.debug_write(&alloc::format!(
                    "[kernel] Cannot load {}: write to {} failed",
                    name,
                    addr
                ));
                return Err(KernelError::MemoryAccessFailure);
            }
        }

        Ok(image.base)
    }

    /// Read a zero-terminated name out of process memory.
    ///
    /// At most `name_budget` cells are read, the terminator included, and
    /// every cell must hold a byte value.
    pub(crate) fn copy_name(&self, addr: i32) -> Result<String, KernelError> {
        if addr < 0 {
            return Err(KernelError::LoadFailure);
        }
        let base = addr as usize;

        let mut name = String::new();
        for offset in 0..self.config.name_budget {
            let cell = self
                .hal
                .read_memory(base + offset)
                .map_err(|_| KernelError::LoadFailure)?;
            match cell {
                0 => return Ok(name),
                1..=255 => name.push(cell as u8 as char),
                _ => return Err(KernelError::LoadFailure),
            }
        }

        Err(KernelError::LoadFailure)
    }
}
