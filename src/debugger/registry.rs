//! Registry of running worker threads and their control state

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use super::context::ThreadContext;
use crate::common::{Error, Result};
use crate::message::ThreadState;
use crate::sync::SyncBarrier;

/// Stop threshold meaning "never pause because of depth"
pub const NO_THRESHOLD: i64 = -1;

/// Stop threshold meaning "pause at the next pause point"
pub const ALWAYS_STOP: i64 = i64::MAX;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique id of the calling native thread
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

fn encode_state(state: ThreadState) -> u8 {
    match state {
        ThreadState::Running => 0,
        ThreadState::Suspended => 1,
        ThreadState::Finished => 2,
        ThreadState::Error => 3,
    }
}

fn decode_state(raw: u8) -> ThreadState {
    match raw {
        0 => ThreadState::Running,
        1 => ThreadState::Suspended,
        2 => ThreadState::Finished,
        _ => ThreadState::Error,
    }
}

/// Control block of one worker thread
#[derive(Debug)]
pub struct ThreadInfo {
    thread_id: u64,
    context: Arc<ThreadContext>,
    state: AtomicU8,
    stop_threshold: AtomicI64,
    /// One party for the paused worker, one for the resume
    barrier: SyncBarrier,
    lock: Mutex<()>,
}

impl ThreadInfo {
    pub fn new(thread_id: u64, context: Arc<ThreadContext>) -> Self {
        Self {
            thread_id,
            context,
            state: AtomicU8::new(encode_state(ThreadState::Running)),
            stop_threshold: AtomicI64::new(NO_THRESHOLD),
            barrier: SyncBarrier::new(2, true),
            lock: Mutex::new(()),
        }
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn context(&self) -> &Arc<ThreadContext> {
        &self.context
    }

    pub fn state(&self) -> ThreadState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: ThreadState) {
        self.state.store(encode_state(state), Ordering::SeqCst);
    }

    pub fn stop_threshold(&self) -> i64 {
        self.stop_threshold.load(Ordering::SeqCst)
    }

    pub fn set_stop_threshold(&self, threshold: i64) {
        self.stop_threshold.store(threshold, Ordering::SeqCst);
    }

    pub fn barrier(&self) -> &SyncBarrier {
        &self.barrier
    }

    /// Serializes pausing against resume/step for this thread
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

/// Concurrent map from thread id to [`ThreadInfo`]
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: DashMap<u64, Arc<ThreadInfo>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: Arc<ThreadInfo>) {
        self.threads.insert(info.thread_id(), info);
    }

    pub fn remove(&self, thread_id: u64) -> Option<Arc<ThreadInfo>> {
        self.threads.remove(&thread_id).map(|(_, info)| info)
    }

    pub fn get(&self, thread_id: u64) -> Option<Arc<ThreadInfo>> {
        self.threads.get(&thread_id).map(|entry| entry.value().clone())
    }

    /// Like [`get`](Self::get) but fails with `NoSuchThread`
    pub fn find(&self, thread_id: u64) -> Result<Arc<ThreadInfo>> {
        self.get(thread_id).ok_or(Error::NoSuchThread(thread_id))
    }

    /// Copy of all entries, ordered by thread id
    pub fn all(&self) -> Vec<Arc<ThreadInfo>> {
        let mut infos: Vec<_> = self.threads.iter().map(|e| e.value().clone()).collect();
        infos.sort_by_key(|info| info.thread_id());
        infos
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_ids_differ_per_thread() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());
        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_new_info_defaults() {
        let info = ThreadInfo::new(1, ThreadContext::new());
        assert_eq!(info.state(), ThreadState::Running);
        assert_eq!(info.stop_threshold(), NO_THRESHOLD);
        assert_eq!(info.barrier().count(), 2);
    }

    #[test]
    fn test_find_unknown_thread() {
        let registry = ThreadRegistry::new();
        registry.insert(Arc::new(ThreadInfo::new(5, ThreadContext::new())));
        assert!(registry.find(5).is_ok());
        assert!(matches!(registry.find(6), Err(Error::NoSuchThread(6))));
        assert!(registry.remove(5).is_some());
        assert!(registry.is_empty());
    }
}
