//! Run metrics
//!
//! The kernel only writes these counters; nothing in the scheduling or
//! syscall paths reads them back. When the last process terminates the
//! whole set is serialized to JSON and written to the debug console.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use tos_kernel_core::{Process, ProcessId, ProcessMetrics};

use crate::irq::Irq;

/// Interrupts received, by kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqCounts {
    pub reset: u64,
    pub cpu_error: u64,
    pub syscall: u64,
    pub clock: u64,
    pub unknown: u64,
}

impl IrqCounts {
    /// Sum over every kind.
    pub fn total(&self) -> u64 {
        self.reset + self.cpu_error + self.syscall + self.clock + self.unknown
    }
}

/// Accounting kept for a process after it terminated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishedProcess {
    pub pid: ProcessId,
    pub name: String,
    /// Priority score at termination
    pub priority: f32,
    pub metrics: ProcessMetrics,
}

impl From<&Process> for FinishedProcess {
    fn from(p: &Process) -> Self {
        Self {
            pid: p.pid,
            name: p.name.clone(),
            priority: p.priority,
            metrics: p.metrics.clone(),
        }
    }
}

/// Kernel-wide counters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelMetrics {
    /// Successful spawns, the boot spawn included
    pub processes_created: u64,
    /// Interrupts by kind
    pub irqs: IrqCounts,
    /// Quantum expirations that sent a process back to the ready queue
    pub preemptions: u64,
    /// Times the scheduler handed the CPU to a process
    pub dispatches: u64,
    /// Clock interrupts handled
    pub clock_ticks: u64,
    /// Clock interrupts that found every process blocked
    pub idle_ticks: u64,
    /// Every live process was blocked after the last scheduling pass
    pub idle: bool,
    /// Keyboard reads completed by the pending-device pass
    pub deferred_reads: u64,
    /// Screen writes completed by the pending-device pass
    pub deferred_writes: u64,
    /// Terminated processes, in termination order
    pub finished: Vec<FinishedProcess>,
}

impl KernelMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an interrupt.
    pub fn record_irq(&mut self, irq: Irq) {
        match irq {
            Irq::Reset => self.irqs.reset += 1,
            Irq::CpuError => self.irqs.cpu_error += 1,
            Irq::Syscall => self.irqs.syscall += 1,
            Irq::Clock => self.irqs.clock += 1,
            Irq::Unknown(_) => self.irqs.unknown += 1,
        }
    }

    /// Keep the accounting of a terminated process.
    pub fn record_finished(&mut self, process: &Process) {
        self.finished.push(FinishedProcess::from(process));
    }

    /// Serialize to a JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_irq() {
        let mut m = KernelMetrics::new();
        m.record_irq(Irq::Reset);
        m.record_irq(Irq::Clock);
        m.record_irq(Irq::Clock);
        m.record_irq(Irq::Unknown(9));

        assert_eq!(m.irqs.reset, 1);
        assert_eq!(m.irqs.clock, 2);
        assert_eq!(m.irqs.unknown, 1);
        assert_eq!(m.irqs.total(), 4);
    }

    #[test]
    fn test_report_is_json() {
        let mut m = KernelMetrics::new();
        m.processes_created = 3;
        m.record_finished(&Process::new(ProcessId(2), "p2.maq", 0, 10, 0));

        let json = m.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["processes_created"], 3);
        assert_eq!(value["finished"][0]["name"], "p2.maq");
        assert_eq!(value["finished"][0]["pid"], 2);
    }
}
