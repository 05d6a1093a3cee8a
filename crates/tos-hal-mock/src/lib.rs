//! Mock HAL implementation for testing Trap OS
//!
//! This provides an in-memory simulated machine implementing the HAL trait
//! so the kernel can be exercised without the CPU simulator. Tests play the
//! CPU's part: they write registers into the CPU slots, call the kernel's
//! trap entry, and inspect memory, terminals and the captured debug log.

#![no_std]
extern crate alloc;

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use tos_hal::{
    Channel, ClockPort, CpuSlot, DeviceId, HalError, ProgramImage, HAL, TERMINAL_COUNT,
};

/// Default number of memory cells
pub const DEFAULT_MEMORY_SIZE: usize = 10_000;

/// Simulated terminal state
#[derive(Default)]
struct MockTerminal {
    /// Keys waiting to be read
    pending_input: VecDeque<i32>,
    /// Whether the screen accepts output
    output_ready: bool,
    /// Everything written to the screen
    output: Vec<i32>,
}

/// Simulated clock state
#[derive(Default)]
struct MockClock {
    instructions: i32,
    timer: i32,
    interrupt: i32,
    /// Number of times the timer was armed
    arm_count: u64,
    /// Number of times the interrupt flag was acknowledged
    ack_count: u64,
}

/// Mock HAL for unit testing
///
/// Provides simulated memory, terminals, a clock and a program registry
/// for testing kernel logic without the CPU simulator.
pub struct MockHal {
    /// Memory cells
    memory: RefCell<Vec<i32>>,
    /// Terminals, indexed by terminal number
    terminals: RefCell<Vec<MockTerminal>>,
    /// Clock device
    clock: RefCell<MockClock>,
    /// Executable images by name
    programs: RefCell<BTreeMap<String, ProgramImage>>,
    /// Captured debug messages
    debug_log: RefCell<Vec<String>>,
    /// Memory addresses that fail on access
    failing_addresses: RefCell<BTreeSet<usize>>,
    /// Devices that fail on access
    failing_devices: RefCell<BTreeSet<usize>>,
    /// Number of memory writes performed
    memory_writes: Cell<u64>,
}

impl MockHal {
    /// Create a new mock HAL with the default memory size
    pub fn new() -> Self {
        Self::with_memory_size(DEFAULT_MEMORY_SIZE)
    }

    /// Create a mock HAL with a specific number of memory cells
    pub fn with_memory_size(cells: usize) -> Self {
        let mut terminals = Vec::with_capacity(TERMINAL_COUNT);
        for _ in 0..TERMINAL_COUNT {
            terminals.push(MockTerminal {
                output_ready: true,
                ..Default::default()
            });
        }
        Self {
            memory: RefCell::new(vec![0; cells]),
            terminals: RefCell::new(terminals),
            clock: RefCell::new(MockClock::default()),
            programs: RefCell::new(BTreeMap::new()),
            debug_log: RefCell::new(Vec::new()),
            failing_addresses: RefCell::new(BTreeSet::new()),
            failing_devices: RefCell::new(BTreeSet::new()),
            memory_writes: Cell::new(0),
        }
    }

    // ========================================================================
    // Programs
    // ========================================================================

    /// Register an executable image under `name`
    pub fn add_program(&self, name: &str, base: usize, cells: Vec<i32>) {
        self.programs
            .borrow_mut()
            .insert(String::from(name), ProgramImage::new(base, cells));
    }

    /// Register the standard boot images: a trap handler at the trap
    /// handler address and an `init.maq` at `init_base`
    pub fn with_boot_images(self, init_base: usize) -> Self {
        self.add_program("trata_int.maq", tos_hal::CPU_ADDR_TRAP_HANDLER, vec![0; 8]);
        self.add_program("init.maq", init_base, vec![0; 4]);
        self
    }

    // ========================================================================
    // Memory and CPU slots
    // ========================================================================

    /// Read a memory cell, ignoring fault injection
    pub fn peek(&self, addr: usize) -> i32 {
        self.memory.borrow().get(addr).copied().unwrap_or(0)
    }

    /// Write a memory cell, ignoring fault injection
    pub fn poke(&self, addr: usize, value: i32) {
        if let Some(cell) = self.memory.borrow_mut().get_mut(addr) {
            *cell = value;
        }
    }

    /// Write a zero-terminated string into memory at `addr`
    pub fn poke_str(&self, addr: usize, s: &str) {
        for (i, b) in s.bytes().enumerate() {
            self.poke(addr + i, b as i32);
        }
        self.poke(addr + s.len(), 0);
    }

    /// Value the CPU would load for `slot` when returning from the trap
    pub fn cpu_slot(&self, slot: CpuSlot) -> i32 {
        self.peek(slot.address())
    }

    /// Play the CPU's part: store `value` into `slot` before raising a trap
    pub fn set_cpu_slot(&self, slot: CpuSlot, value: i32) {
        self.poke(slot.address(), value);
    }

    /// Number of successful memory writes so far
    pub fn memory_write_count(&self) -> u64 {
        self.memory_writes.get()
    }

    // ========================================================================
    // Terminals
    // ========================================================================

    /// Queue a key on terminal `index`
    pub fn push_input(&self, index: usize, value: i32) {
        if let Some(term) = self.terminals.borrow_mut().get_mut(index) {
            term.pending_input.push_back(value);
        }
    }

    /// Make the screen of terminal `index` accept or refuse output
    pub fn set_output_ready(&self, index: usize, ready: bool) {
        if let Some(term) = self.terminals.borrow_mut().get_mut(index) {
            term.output_ready = ready;
        }
    }

    /// Everything written to the screen of terminal `index`
    pub fn output(&self, index: usize) -> Vec<i32> {
        self.terminals
            .borrow()
            .get(index)
            .map(|t| t.output.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Current timer interval
    pub fn timer(&self) -> i32 {
        self.clock.borrow().timer
    }

    /// Number of times the timer was armed
    pub fn timer_arm_count(&self) -> u64 {
        self.clock.borrow().arm_count
    }

    /// Number of times the clock interrupt was acknowledged
    pub fn interrupt_ack_count(&self) -> u64 {
        self.clock.borrow().ack_count
    }

    /// Raise the clock interrupt flag
    pub fn raise_clock_interrupt(&self) {
        self.clock.borrow_mut().interrupt = 1;
    }

    /// Advance the instruction counter
    pub fn advance_instructions(&self, n: i32) {
        self.clock.borrow_mut().instructions += n;
    }

    // ========================================================================
    // Fault injection
    // ========================================================================

    /// Make every access to `addr` fail
    pub fn fail_memory(&self, addr: usize) {
        self.failing_addresses.borrow_mut().insert(addr);
    }

    /// Make every access to `device` fail
    pub fn fail_device(&self, device: DeviceId) {
        self.failing_devices.borrow_mut().insert(device.bus_address());
    }

    /// Clear all injected faults
    pub fn clear_faults(&self) {
        self.failing_addresses.borrow_mut().clear();
        self.failing_devices.borrow_mut().clear();
    }

    // ========================================================================
    // Debug log
    // ========================================================================

    /// Get all captured debug messages
    pub fn get_debug_log(&self) -> Vec<String> {
        self.debug_log.borrow().clone()
    }

    /// Clear the debug log
    pub fn clear_debug_log(&self) {
        self.debug_log.borrow_mut().clear();
    }

    /// Check if a specific message was logged
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.debug_log
            .borrow()
            .iter()
            .any(|msg| msg.contains(substr))
    }

    /// Count messages containing `substr`
    pub fn count_log_containing(&self, substr: &str) -> usize {
        self.debug_log
            .borrow()
            .iter()
            .filter(|msg| msg.contains(substr))
            .count()
    }

    fn check_device(&self, device: DeviceId) -> Result<(), HalError> {
        if self.failing_devices.borrow().contains(&device.bus_address()) {
            return Err(HalError::DeviceBusy);
        }
        Ok(())
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl HAL for MockHal {
    fn read_memory(&self, addr: usize) -> Result<i32, HalError> {
        if self.failing_addresses.borrow().contains(&addr) {
            return Err(HalError::InvalidAddress);
        }
        self.memory
            .borrow()
            .get(addr)
            .copied()
            .ok_or(HalError::InvalidAddress)
    }

    fn write_memory(&self, addr: usize, value: i32) -> Result<(), HalError> {
        if self.failing_addresses.borrow().contains(&addr) {
            return Err(HalError::InvalidAddress);
        }
        let mut memory = self.memory.borrow_mut();
        let cell = memory.get_mut(addr).ok_or(HalError::InvalidAddress)?;
        *cell = value;
        self.memory_writes.set(self.memory_writes.get() + 1);
        Ok(())
    }

    fn read_device(&self, device: DeviceId) -> Result<i32, HalError> {
        self.check_device(device)?;
        match device {
            DeviceId::Terminal { index, channel } => {
                let mut terminals = self.terminals.borrow_mut();
                let term = terminals
                    .get_mut(index as usize)
                    .ok_or(HalError::DeviceNotFound)?;
                match channel {
                    Channel::InputStatus => Ok(!term.pending_input.is_empty() as i32),
                    Channel::InputData => term.pending_input.pop_front().ok_or(HalError::DeviceBusy),
                    Channel::OutputStatus => Ok(term.output_ready as i32),
                    Channel::OutputData => Err(HalError::NotSupported),
                }
            }
            DeviceId::Clock(port) => {
                let clock = self.clock.borrow();
                match port {
                    ClockPort::Instructions => Ok(clock.instructions),
                    ClockPort::RealTime => Ok(clock.instructions / 10),
                    ClockPort::Timer => Ok(clock.timer),
                    ClockPort::Interrupt => Ok(clock.interrupt),
                }
            }
        }
    }

    fn write_device(&self, device: DeviceId, value: i32) -> Result<(), HalError> {
        self.check_device(device)?;
        match device {
            DeviceId::Terminal { index, channel } => {
                let mut terminals = self.terminals.borrow_mut();
                let term = terminals
                    .get_mut(index as usize)
                    .ok_or(HalError::DeviceNotFound)?;
                match channel {
                    Channel::OutputData if term.output_ready => {
                        term.output.push(value);
                        Ok(())
                    }
                    Channel::OutputData => Err(HalError::DeviceBusy),
                    _ => Err(HalError::NotSupported),
                }
            }
            DeviceId::Clock(port) => {
                let mut clock = self.clock.borrow_mut();
                match port {
                    ClockPort::Timer => {
                        clock.timer = value;
                        clock.arm_count += 1;
                        Ok(())
                    }
                    ClockPort::Interrupt => {
                        clock.interrupt = value;
                        clock.ack_count += 1;
                        Ok(())
                    }
                    _ => Err(HalError::NotSupported),
                }
            }
        }
    }

    fn load_program(&self, name: &str) -> Result<ProgramImage, HalError> {
        self.programs
            .borrow()
            .get(name)
            .cloned()
            .ok_or(HalError::ProgramNotFound)
    }

    fn debug_write(&self, msg: &str) {
        self.debug_log.borrow_mut().push(String::from(msg));
    }
}
