//! Synchronization primitives for pausing and resuming worker threads

pub mod barrier;
pub mod fence;

pub use barrier::{SyncBarrier, WaitOutcome};
pub use fence::MemorySync;
