//! Outbound queue.
//!
//! Holds serialized frames while the transport is not ready. A drain takes
//! ownership of everything queued at that instant, so frames enqueued while a
//! flush is in progress land in the queue proper and wait for the next drain.

use std::collections::VecDeque;

use crate::config::DEFAULT_QUEUE_CAPACITY;

/// What to do when a bounded queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Evict the oldest frame to make room.
    #[default]
    DropOldest,
    /// Refuse the new frame.
    RejectNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePolicy {
    /// `None` means unbounded.
    pub capacity: Option<usize>,
    pub overflow: Overflow,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_QUEUE_CAPACITY),
            overflow: Overflow::DropOldest,
        }
    }
}

impl QueuePolicy {
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            overflow: Overflow::DropOldest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFrame {
    /// Enqueue order, unique for the life of the queue.
    pub seq: u64,
    pub frame: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The frame was queued and this older frame was evicted.
    DroppedOldest(QueuedFrame),
    Rejected,
}

#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedFrame>,
    policy: QueuePolicy,
    next_seq: u64,
}

impl OutboundQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            entries: VecDeque::new(),
            policy,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enqueue(&mut self, frame: String) -> EnqueueOutcome {
        let mut evicted = None;
        if let Some(capacity) = self.policy.capacity {
            if self.entries.len() >= capacity {
                match self.policy.overflow {
                    Overflow::RejectNew => {
                        tracing::warn!(capacity, "Outbound queue full, rejecting frame");
                        return EnqueueOutcome::Rejected;
                    }
                    Overflow::DropOldest => {
                        evicted = self.entries.pop_front();
                        if capacity == 0 {
                            tracing::warn!("Outbound queue has zero capacity, rejecting frame");
                            return EnqueueOutcome::Rejected;
                        }
                    }
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(QueuedFrame { seq, frame });

        match evicted {
            Some(old) => {
                tracing::warn!(seq = old.seq, "Outbound queue full, dropped oldest frame");
                EnqueueOutcome::DroppedOldest(old)
            }
            None => EnqueueOutcome::Queued,
        }
    }

    /// Take every frame queued right now, oldest first.
    pub fn drain(&mut self) -> Drain {
        Drain {
            entries: std::mem::take(&mut self.entries),
        }
    }

    /// Put frames a drain did not get to back in front of newer arrivals.
    pub fn restore(&mut self, drain: Drain) {
        let mut unsent = drain.entries;
        if unsent.is_empty() {
            return;
        }
        unsent.append(&mut self.entries);
        self.entries = unsent;
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(QueuePolicy::default())
    }
}

/// Snapshot produced by [`OutboundQueue::drain`]. Yields frames lazily.
#[derive(Debug)]
pub struct Drain {
    entries: VecDeque<QueuedFrame>,
}

impl Drain {
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Return a frame taken from this drain that could not be sent.
    pub fn put_back(&mut self, entry: QueuedFrame) {
        self.entries.push_front(entry);
    }
}

impl Iterator for Drain {
    type Item = QueuedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.entries.len(), Some(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(drain: Drain) -> Vec<String> {
        drain.map(|entry| entry.frame).collect()
    }

    #[test]
    fn drain_is_fifo_and_empties_the_queue() {
        let mut queue = OutboundQueue::new(QueuePolicy::unbounded());
        for frame in ["a", "b", "c"] {
            assert_eq!(queue.enqueue(frame.to_string()), EnqueueOutcome::Queued);
        }

        assert_eq!(frames(queue.drain()), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        assert_eq!(queue.drain().count(), 0);
    }

    #[test]
    fn frames_enqueued_mid_drain_wait_for_next_drain() {
        let mut queue = OutboundQueue::new(QueuePolicy::unbounded());
        queue.enqueue("first".into());
        queue.enqueue("second".into());

        let mut drain = queue.drain();
        let mut sent = vec![drain.next().expect("first frame").frame];
        queue.enqueue("late".into());
        sent.extend(drain.map(|entry| entry.frame));

        assert_eq!(sent, vec!["first", "second"]);
        assert_eq!(frames(queue.drain()), vec!["late"]);
    }

    #[test]
    fn restore_puts_unsent_frames_before_newer_ones() {
        let mut queue = OutboundQueue::new(QueuePolicy::unbounded());
        queue.enqueue("a".into());
        queue.enqueue("b".into());
        queue.enqueue("c".into());

        let mut drain = queue.drain();
        assert_eq!(drain.next().map(|e| e.frame).as_deref(), Some("a"));
        queue.enqueue("d".into());
        queue.restore(drain);

        assert_eq!(frames(queue.drain()), vec!["b", "c", "d"]);
    }

    #[test]
    fn put_back_frame_is_restored_first() {
        let mut queue = OutboundQueue::new(QueuePolicy::unbounded());
        queue.enqueue("a".into());
        queue.enqueue("b".into());

        let mut drain = queue.drain();
        let failed = drain.next().expect("first frame");
        drain.put_back(failed);
        queue.restore(drain);

        assert_eq!(frames(queue.drain()), vec!["a", "b"]);
    }

    #[test]
    fn sequence_numbers_follow_enqueue_order() {
        let mut queue = OutboundQueue::default();
        queue.enqueue("x".into());
        queue.enqueue("y".into());
        let seqs: Vec<u64> = queue.drain().map(|e| e.seq).collect();
        queue.enqueue("z".into());
        let later: Vec<u64> = queue.drain().map(|e| e.seq).collect();

        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(later, vec![2]);
    }

    #[test]
    fn drop_oldest_keeps_the_newest_frames() {
        let mut queue = OutboundQueue::new(QueuePolicy {
            capacity: Some(2),
            overflow: Overflow::DropOldest,
        });
        queue.enqueue("a".into());
        queue.enqueue("b".into());

        match queue.enqueue("c".into()) {
            EnqueueOutcome::DroppedOldest(old) => assert_eq!(old.frame, "a"),
            other => panic!("expected eviction, got {other:?}"),
        }
        assert_eq!(frames(queue.drain()), vec!["b", "c"]);
    }

    #[test]
    fn reject_new_keeps_the_oldest_frames() {
        let mut queue = OutboundQueue::new(QueuePolicy {
            capacity: Some(1),
            overflow: Overflow::RejectNew,
        });
        queue.enqueue("a".into());

        assert_eq!(queue.enqueue("b".into()), EnqueueOutcome::Rejected);
        assert_eq!(frames(queue.drain()), vec!["a"]);
    }
}
