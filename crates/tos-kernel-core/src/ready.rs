//! Ready queue - FIFO of runnable pids feeding round-robin scheduling

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::types::ProcessId;

/// FIFO of Ready pids. A pid appears at most once.
#[derive(Clone, Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<ProcessId>,
}

impl ReadyQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append `pid` at the tail unless it is already queued.
    pub fn push(&mut self, pid: ProcessId) -> bool {
        if self.queue.contains(&pid) {
            return false;
        }
        self.queue.push_back(pid);
        true
    }

    /// Take the head.
    pub fn pop(&mut self) -> Option<ProcessId> {
        self.queue.pop_front()
    }

    /// Look at the head without taking it.
    pub fn peek(&self) -> Option<ProcessId> {
        self.queue.front().copied()
    }

    /// Drop `pid` wherever it sits.
    pub fn remove(&mut self, pid: ProcessId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&p| p != pid);
        self.queue.len() != before
    }

    /// Whether `pid` is queued.
    pub fn contains(&self, pid: ProcessId) -> bool {
        self.queue.contains(&pid)
    }

    /// Occurrences of `pid` (0 or 1 while the queue is consistent).
    pub fn count(&self, pid: ProcessId) -> usize {
        self.queue.iter().filter(|&&p| p == pid).count()
    }

    /// Number of queued pids.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue contents, head first.
    pub fn to_vec(&self) -> Vec<ProcessId> {
        self.queue.iter().copied().collect()
    }

    /// Iterate head first.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessId> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_fifo_order() {
        let mut q = ReadyQueue::new();
        q.push(ProcessId(1));
        q.push(ProcessId(2));
        q.push(ProcessId(3));

        assert_eq!(q.peek(), Some(ProcessId(1)));
        assert_eq!(q.pop(), Some(ProcessId(1)));
        assert_eq!(q.pop(), Some(ProcessId(2)));
        assert_eq!(q.pop(), Some(ProcessId(3)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut q = ReadyQueue::new();
        assert!(q.push(ProcessId(1)));
        assert!(!q.push(ProcessId(1)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.count(ProcessId(1)), 1);
    }

    #[test]
    fn test_remove_from_middle() {
        let mut q = ReadyQueue::new();
        for pid in 1..=3 {
            q.push(ProcessId(pid));
        }
        assert!(q.remove(ProcessId(2)));
        assert!(!q.remove(ProcessId(2)));
        assert_eq!(q.to_vec(), vec![ProcessId(1), ProcessId(3)]);
        assert!(!q.contains(ProcessId(2)));
    }
}
