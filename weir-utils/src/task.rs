//
// Copyright (c) The Weir Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::error;

/// A single-consumer queue of typed work requests.
///
/// Requests are enqueued from arbitrary contexts and dequeued by exactly one
/// owner, serializing all processing into a total order. Dequeuing can be
/// paused with [`WorkQueue::disable`]; already-enqueued requests are retained
/// while paused and become visible again after [`WorkQueue::enable`].
#[derive(Debug)]
pub struct WorkQueue<R> {
    tx: UnboundedSender<R>,
    rx: UnboundedReceiver<R>,
    disabled: bool,
}

/// A coalescing work trigger.
///
/// Multiple activations before the owner services the trigger collapse into
/// a single run. Like [`WorkQueue`], a disabled trigger remembers pending
/// activations without servicing them.
#[derive(Debug, Default)]
pub struct TaskTrigger {
    pending: bool,
    disabled: bool,
}

// ===== impl WorkQueue =====

impl<R> WorkQueue<R> {
    pub fn new() -> WorkQueue<R> {
        let (tx, rx) = mpsc::unbounded_channel();
        WorkQueue {
            tx,
            rx,
            disabled: false,
        }
    }

    pub fn enqueue(&self, request: R) {
        if self.tx.send(request).is_err() {
            error!("failed to enqueue work request");
        }
    }

    /// Takes the next request, unless the queue is disabled or empty.
    pub fn dequeue(&mut self) -> Option<R> {
        if self.disabled {
            return None;
        }
        match self.rx.try_recv() {
            Ok(request) => Some(request),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

impl<R> Default for WorkQueue<R> {
    fn default() -> WorkQueue<R> {
        WorkQueue::new()
    }
}

// ===== impl TaskTrigger =====

impl TaskTrigger {
    pub fn activate(&mut self) {
        self.pending = true;
    }

    /// Consumes a pending activation, returning whether the owner should run
    /// the triggered work now.
    pub fn take(&mut self) -> bool {
        if self.disabled || !self.pending {
            return false;
        }
        self.pending = false;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }
}
