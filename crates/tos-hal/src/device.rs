//! Device bus addressing
//!
//! Devices are named by a tagged value instead of raw bus numbers. The
//! legacy numbering (four consecutive addresses per terminal, then the
//! clock ports) is kept behind `bus_address` for simulators that need it.

use serde::{Deserialize, Serialize};

/// Number of terminals on the bus
pub const TERMINAL_COUNT: usize = 4;

/// Bus addresses occupied by each terminal
pub const DEVICES_PER_TERMINAL: usize = 4;

/// First bus address after the terminals
const CLOCK_BASE: usize = TERMINAL_COUNT * DEVICES_PER_TERMINAL;

/// One of the four channels of a terminal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Keyboard data
    InputData,
    /// Keyboard status (non-zero when a key is available)
    InputStatus,
    /// Screen data
    OutputData,
    /// Screen status (non-zero when the screen accepts a character)
    OutputStatus,
}

impl Channel {
    fn offset(self) -> usize {
        match self {
            Channel::InputData => 0,
            Channel::InputStatus => 1,
            Channel::OutputData => 2,
            Channel::OutputStatus => 3,
        }
    }

    fn from_offset(offset: usize) -> Option<Self> {
        match offset {
            0 => Some(Channel::InputData),
            1 => Some(Channel::InputStatus),
            2 => Some(Channel::OutputData),
            3 => Some(Channel::OutputStatus),
            _ => None,
        }
    }
}

/// Ports of the clock device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockPort {
    /// Instructions executed since power-on (read-only)
    Instructions,
    /// Real time in milliseconds (read-only)
    RealTime,
    /// Countdown timer; writing arms it with an interval in instructions
    Timer,
    /// Pending clock interrupt flag; writing 0 acknowledges it
    Interrupt,
}

impl ClockPort {
    fn offset(self) -> usize {
        match self {
            ClockPort::Instructions => 0,
            ClockPort::RealTime => 1,
            ClockPort::Timer => 2,
            ClockPort::Interrupt => 3,
        }
    }

    fn from_offset(offset: usize) -> Option<Self> {
        match offset {
            0 => Some(ClockPort::Instructions),
            1 => Some(ClockPort::RealTime),
            2 => Some(ClockPort::Timer),
            3 => Some(ClockPort::Interrupt),
            _ => None,
        }
    }
}

/// A device on the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceId {
    /// A channel of terminal `index` (0-based)
    Terminal { index: u8, channel: Channel },
    /// A clock port
    Clock(ClockPort),
}

impl DeviceId {
    /// Shorthand for a terminal channel.
    pub fn terminal(index: u8, channel: Channel) -> Self {
        DeviceId::Terminal { index, channel }
    }

    /// Legacy bus address of this device.
    pub fn bus_address(self) -> usize {
        match self {
            DeviceId::Terminal { index, channel } => {
                index as usize * DEVICES_PER_TERMINAL + channel.offset()
            }
            DeviceId::Clock(port) => CLOCK_BASE + port.offset(),
        }
    }

    /// Decode a legacy bus address.
    pub fn from_bus_address(addr: usize) -> Option<Self> {
        if addr < CLOCK_BASE {
            let index = (addr / DEVICES_PER_TERMINAL) as u8;
            let channel = Channel::from_offset(addr % DEVICES_PER_TERMINAL)?;
            Some(DeviceId::Terminal { index, channel })
        } else {
            ClockPort::from_offset(addr - CLOCK_BASE).map(DeviceId::Clock)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_bus_layout() {
        assert_eq!(DeviceId::terminal(0, Channel::InputData).bus_address(), 0);
        assert_eq!(DeviceId::terminal(0, Channel::InputStatus).bus_address(), 1);
        assert_eq!(DeviceId::terminal(0, Channel::OutputData).bus_address(), 2);
        assert_eq!(DeviceId::terminal(0, Channel::OutputStatus).bus_address(), 3);
        assert_eq!(DeviceId::terminal(2, Channel::InputData).bus_address(), 8);
        assert_eq!(DeviceId::terminal(3, Channel::OutputStatus).bus_address(), 15);
    }

    #[test]
    fn test_clock_bus_layout() {
        assert_eq!(DeviceId::Clock(ClockPort::Instructions).bus_address(), 16);
        assert_eq!(DeviceId::Clock(ClockPort::Timer).bus_address(), 18);
        assert_eq!(DeviceId::Clock(ClockPort::Interrupt).bus_address(), 19);
    }

    #[test]
    fn test_from_bus_address_inverts_layout() {
        for addr in 0..CLOCK_BASE + 4 {
            let device = DeviceId::from_bus_address(addr).unwrap();
            assert_eq!(device.bus_address(), addr);
        }
        assert_eq!(DeviceId::from_bus_address(CLOCK_BASE + 4), None);
    }
}
