//! Reusable countdown barrier used for pause/resume rendezvous
//!
//! A barrier holds a party count and a generation number. Driving the count
//! to zero advances the generation and releases everyone waiting on the old
//! generation. With auto-reset the count is re-armed to the last value given
//! to [`SyncBarrier::reset`] inside the same critical section, so waiters of
//! the previous generation are released exactly once and the next cycle
//! starts with a full count.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// How a blocking wait on a [`SyncBarrier`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The generation the caller waited on completed
    Released,
    /// The timeout elapsed first
    TimedOut,
}

impl WaitOutcome {
    pub fn is_released(self) -> bool {
        self == WaitOutcome::Released
    }
}

#[derive(Debug)]
struct BarrierState {
    count: u32,
    reset_value: u32,
    generation: u64,
}

/// Countdown barrier with optional auto-reset
#[derive(Debug)]
pub struct SyncBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
    auto_reset: bool,
}

impl SyncBarrier {
    /// Create a barrier waiting for `count` parties
    pub fn new(count: u16, auto_reset: bool) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                count: count as u32,
                reset_value: count as u32,
                generation: 0,
            }),
            cond: Condvar::new(),
            auto_reset,
        }
    }

    /// Arrive without waiting. No-op when the count is already zero.
    pub fn countdown(&self) {
        let mut state = self.state.lock();
        if state.count == 0 {
            return;
        }
        state.count -= 1;
        if state.count == 0 {
            self.advance(&mut state);
        }
    }

    /// Arrive and wait for the rest of the current generation
    pub fn countdown_and_await(&self) -> WaitOutcome {
        self.arrive_and_wait(None)
    }

    /// Arrive and wait at most `timeout` for the rest of the current generation
    pub fn countdown_and_await_timeout(&self, timeout: Duration) -> WaitOutcome {
        self.arrive_and_wait(Some(Instant::now() + timeout))
    }

    /// Wait until the current generation completes without arriving
    pub fn await_zero(&self) -> WaitOutcome {
        self.wait_only(None)
    }

    /// Like [`await_zero`](Self::await_zero) with a timeout
    pub fn await_timeout(&self, timeout: Duration) -> WaitOutcome {
        self.wait_only(Some(Instant::now() + timeout))
    }

    /// Set a new party count and remember it as the auto-reset value.
    ///
    /// Lowering the count to zero completes the current generation but does
    /// not re-arm it.
    pub fn reset(&self, count: u16) {
        let mut state = self.state.lock();
        let count = count as u32;
        state.reset_value = count;
        if state.count == count {
            return;
        }
        state.count = count;
        if count == 0 {
            state.generation = state.generation.wrapping_add(1);
            self.cond.notify_all();
        }
    }

    /// Current party count
    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    fn advance(&self, state: &mut BarrierState) {
        state.generation = state.generation.wrapping_add(1);
        if self.auto_reset {
            state.count = state.reset_value;
        }
        self.cond.notify_all();
    }

    fn arrive_and_wait(&self, deadline: Option<Instant>) -> WaitOutcome {
        let mut state = self.state.lock();
        if state.count == 0 {
            return WaitOutcome::Released;
        }
        let generation = state.generation;
        state.count -= 1;
        if state.count == 0 {
            self.advance(&mut state);
            return WaitOutcome::Released;
        }
        self.block_until_advanced(&mut state, generation, deadline)
    }

    fn wait_only(&self, deadline: Option<Instant>) -> WaitOutcome {
        let mut state = self.state.lock();
        if state.count == 0 {
            return WaitOutcome::Released;
        }
        let generation = state.generation;
        self.block_until_advanced(&mut state, generation, deadline)
    }

    fn block_until_advanced(
        &self,
        state: &mut parking_lot::MutexGuard<'_, BarrierState>,
        generation: u64,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        loop {
            if state.generation != generation {
                return WaitOutcome::Released;
            }
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(state, deadline).timed_out()
                        && state.generation == generation
                    {
                        return WaitOutcome::TimedOut;
                    }
                }
                None => self.cond.wait(state),
            }
        }
    }
}
