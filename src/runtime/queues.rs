//! Bounded queues between the runtime and the controller

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::time::Duration;

use crate::common::config::Config;
use crate::debugger::NotificationSink;
use crate::message::{Notification, Response};

/// Named bounded queue
pub struct Queue<T> {
    name: &'static str,
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Queue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { name, tx, rx }
    }

    /// Enqueue, waiting at most `timeout` for free space
    pub fn push(&self, item: T, timeout: Duration) -> bool {
        match self.tx.send_timeout(item, timeout) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                tracing::warn!(queue = self.name, "Queue full, message dropped");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }

    /// Dequeue, waiting at most `timeout`
    pub fn pop(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }
}

/// The four queues: messages and responses in each direction
pub struct MessageQueues {
    /// Runtime to controller
    pub outbound_msgs: Queue<Notification>,
    pub outbound_resps: Queue<Response>,
    /// Controller to runtime
    pub inbound_msgs: Queue<Notification>,
    pub inbound_resps: Queue<Response>,
}

impl MessageQueues {
    pub fn new(config: &Config) -> Self {
        let capacity = config.queues.max_messages;
        Self {
            outbound_msgs: Queue::new("outbound_msgs", capacity),
            outbound_resps: Queue::new("outbound_resps", capacity),
            inbound_msgs: Queue::new("inbound_msgs", capacity),
            inbound_resps: Queue::new("inbound_resps", capacity),
        }
    }
}

/// Notification sink that enqueues with a push timeout
pub struct Outbox {
    tx: Sender<Notification>,
    timeout: Duration,
}

impl Outbox {
    pub fn new(queue: &Queue<Notification>, timeout: Duration) -> Self {
        Self {
            tx: queue.sender(),
            timeout,
        }
    }
}

impl NotificationSink for Outbox {
    fn send(&self, msg: Notification) -> bool {
        self.tx.send_timeout(msg, self.timeout).is_ok()
    }
}
