//! Full memory barrier shared by worker and controller threads
//!
//! A worker that was paused must observe everything other threads wrote in
//! the meantime. Every control transition publishes with [`MemorySync::sync_write`]
//! and every woken worker re-acquires with [`MemorySync::sync_read`].

use std::sync::atomic::{fence, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MemorySync {
    epoch: AtomicU64,
}

impl MemorySync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish all writes made so far by the calling thread
    pub fn sync_write(&self) {
        fence(Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Observe all writes published before the latest `sync_write`
    pub fn sync_read(&self) -> u64 {
        let epoch = self.epoch.load(Ordering::SeqCst);
        fence(Ordering::SeqCst);
        epoch
    }
}
