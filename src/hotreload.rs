//! The hot-reload channel (C8): a bounded, single-producer/single-consumer
//! FIFO of [`FileId`]s, realized with `crossbeam_channel` in place of a
//! hand-rolled `Mutex<VecDeque<_>>`.
//!
//! The producer side is [`crate::Filesystem::tick`] itself (it resolves a
//! `modified` watcher event to a `FileID` and pushes it here); the consumer
//! side, also `tick`, drains the queue in the same call and invokes the
//! user's reimport callback once per entry, in order.

/// Default channel capacity. Generous enough that a burst of saves (e.g. a
/// mass `git checkout`) does not block the watcher thread; `tick()` is
/// expected to be called frequently enough to keep the queue from filling.
pub const DEFAULT_CAPACITY: usize = 4096;

pub struct HotReloadQueue {
    tx: crossbeam_channel::Sender<u64>,
    rx: crossbeam_channel::Receiver<u64>,
}

impl HotReloadQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Pushes `file_id` onto the queue. No deduplication is performed: a file
    /// modified twice before the next `tick()` is delivered twice, preserving
    /// at-least-once delivery per observed modification.
    pub fn push(&self, file_id: u64) {
        if self.tx.try_send(file_id).is_err() {
            tracing::warn!(file_id, "hot-reload queue full, dropping modification event");
        }
    }

    /// Drains every queued file id, in FIFO order.
    pub fn drain(&self) -> Vec<u64> {
        self.rx.try_iter().collect()
    }
}

impl Default for HotReloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let queue = HotReloadQueue::new();
        queue.push(10);
        queue.push(20);
        assert_eq!(queue.drain(), vec![10, 20]);
        assert!(queue.drain().is_empty());
    }
}
