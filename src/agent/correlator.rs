//! Turns an outbound queue and an inbound response stream into a blocking call
//!
//! The caller registers a single-use barrier under the command id, enqueues
//! the command and blocks. Whichever thread receives the response hands it
//! to [`CommandCorrelator::notify`], which stores it and releases the caller.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::message::{MessageId, SimulatorResp, TextIoResp};
use crate::sync::SyncBarrier;

/// Response that can be matched to the command it answers
pub trait Correlated: Send + Sync {
    fn correlation_id(&self) -> MessageId;
}

impl Correlated for TextIoResp {
    fn correlation_id(&self) -> MessageId {
        self.id()
    }
}

impl Correlated for SimulatorResp {
    fn correlation_id(&self) -> MessageId {
        self.id
    }
}

struct Slot<R> {
    barrier: Arc<SyncBarrier>,
    response: Option<R>,
}

/// Pending calls keyed by command id
///
/// The barrier and the response of a call share one map entry, so a
/// response either reaches a waiting caller or is rejected.
pub struct CommandCorrelator<R> {
    pending: DashMap<MessageId, Slot<R>>,
}

impl<R: Correlated> Default for CommandCorrelator<R> {
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }
}

impl<R: Correlated> CommandCorrelator<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a command with `enqueue` and block until its response arrives.
    ///
    /// Returns `None` if `enqueue` reports failure or the call was cancelled.
    /// Without cancellation this waits indefinitely.
    pub fn call(&self, id: MessageId, enqueue: impl FnOnce() -> bool) -> Option<R> {
        self.call_inner(id, enqueue, None)
    }

    /// Like [`call`](Self::call) but gives up after `timeout`
    pub fn call_timeout(
        &self,
        id: MessageId,
        timeout: Duration,
        enqueue: impl FnOnce() -> bool,
    ) -> Option<R> {
        self.call_inner(id, enqueue, Some(timeout))
    }

    fn call_inner(
        &self,
        id: MessageId,
        enqueue: impl FnOnce() -> bool,
        timeout: Option<Duration>,
    ) -> Option<R> {
        // Register before sending so a fast response cannot be missed
        let barrier = Arc::new(SyncBarrier::new(1, false));
        self.pending.insert(
            id,
            Slot {
                barrier: barrier.clone(),
                response: None,
            },
        );

        if !enqueue() {
            self.pending.remove(&id);
            tracing::debug!(id, "Command could not be enqueued");
            return None;
        }

        let outcome = match timeout {
            Some(timeout) => barrier.await_timeout(timeout),
            None => barrier.await_zero(),
        };
        let response = self.pending.remove(&id).and_then(|(_, slot)| slot.response);
        if !outcome.is_released() && response.is_none() {
            tracing::warn!(id, "Timed out waiting for response");
        }
        response
    }

    /// Deliver a response. Returns false if no call is waiting for it.
    pub fn notify(&self, response: R) -> bool {
        let id = response.correlation_id();
        let barrier = match self.pending.get_mut(&id) {
            Some(mut slot) => {
                slot.response = Some(response);
                slot.barrier.clone()
            }
            None => {
                tracing::warn!(id, "Received response for unknown command");
                return false;
            }
        };
        barrier.countdown();
        true
    }

    /// Answer every pending call with the response built by `make`
    pub fn resolve_pending(&self, make: impl Fn(MessageId) -> Option<R>) {
        for id in self.pending_ids() {
            if let Some(response) = make(id) {
                self.notify(response);
            }
        }
    }

    /// Release every pending call without a response
    pub fn cancel_all(&self) {
        for id in self.pending_ids() {
            let barrier = self.pending.get(&id).map(|slot| slot.barrier.clone());
            if let Some(barrier) = barrier {
                barrier.countdown();
            }
        }
    }

    /// True while a call is registered under `id` and has no response yet
    pub fn is_awaiting(&self, id: MessageId) -> bool {
        self.pending
            .get(&id)
            .is_some_and(|slot| slot.response.is_none())
    }

    /// Number of calls still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn pending_ids(&self) -> Vec<MessageId> {
        self.pending.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::next_message_id;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Echo {
        id: MessageId,
        payload: String,
    }

    impl Correlated for Echo {
        fn correlation_id(&self) -> MessageId {
            self.id
        }
    }

    #[test]
    fn test_each_caller_gets_its_own_response() {
        let correlator = Arc::new(CommandCorrelator::<Echo>::new());
        let (tx, rx) = unbounded::<Echo>();

        // Responder answers in whatever order commands arrive
        let responder = {
            let correlator = correlator.clone();
            thread::spawn(move || {
                for cmd in rx.iter().take(1000) {
                    assert!(correlator.notify(cmd));
                }
            })
        };

        let callers: Vec<_> = (0..8)
            .map(|n| {
                let correlator = correlator.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..125 {
                        let id = next_message_id();
                        let payload = format!("{n}-{i}");
                        let cmd = Echo {
                            id,
                            payload: payload.clone(),
                        };
                        let resp = correlator
                            .call_timeout(id, Duration::from_secs(10), || tx.send(cmd).is_ok())
                            .unwrap();
                        assert_eq!(resp.id, id);
                        assert_eq!(resp.payload, payload);
                    }
                })
            })
            .collect();

        for caller in callers {
            caller.join().unwrap();
        }
        responder.join().unwrap();
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_failed_enqueue_leaves_nothing_pending() {
        let correlator = CommandCorrelator::<Echo>::new();
        assert!(correlator.call(1, || false).is_none());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_unknown_response_is_rejected() {
        let correlator = CommandCorrelator::<Echo>::new();
        assert!(!correlator.notify(Echo {
            id: 77,
            payload: String::new()
        }));
    }

    #[test]
    fn test_cancel_releases_waiter() {
        let correlator = Arc::new(CommandCorrelator::<Echo>::new());
        let caller = {
            let correlator = correlator.clone();
            thread::spawn(move || correlator.call(5, || true))
        };

        while correlator.pending_count() == 0 {
            thread::yield_now();
        }
        correlator.cancel_all();
        assert!(caller.join().unwrap().is_none());
    }

    #[test]
    fn test_timeout_returns_none() {
        let correlator = CommandCorrelator::<Echo>::new();
        assert!(correlator
            .call_timeout(9, Duration::from_millis(20), || true)
            .is_none());
        assert_eq!(correlator.pending_count(), 0);
    }
}
