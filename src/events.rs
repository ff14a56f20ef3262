//! Events and event queues.
//!
//! An [`EventQueue`] is the application-owned channel where the engine
//! delivers admin results and client-level notifications. Queues are
//! thread-safe and versioned: senders captured by in-flight requests carry
//! the version current at submission, and [`EventQueue::invalidate`]
//! silently discards anything those stale senders later deliver.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::admin::result::AdminResult;
use crate::log::trace;
use crate::util::{lock_poisoned, Timeout};

/// An event delivered on an [`EventQueue`].
#[derive(Debug)]
pub enum Event {
    /// The outcome of an admin request.
    AdminResult(AdminResult),
    /// The broker asked the client to slow down.
    Throttle {
        /// The broker that reported the throttle.
        broker_id: i32,
        /// How long the request was held server-side.
        throttle: Duration,
    },
}

struct QueueShared {
    q: Mutex<VecDeque<Event>>,
    cond: Condvar,
    version: AtomicU32,
}

/// A thread-safe event channel. Clones share the same underlying queue.
#[derive(Clone)]
pub struct EventQueue {
    shared: Arc<QueueShared>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    /// Creates a new, empty event queue.
    pub fn new() -> EventQueue {
        EventQueue {
            shared: Arc::new(QueueShared {
                q: Mutex::new(VecDeque::new()),
                cond: Condvar::new(),
                version: AtomicU32::new(0),
            }),
        }
    }

    /// Waits for the next event, up to `timeout`.
    pub fn poll<T: Into<Timeout>>(&self, timeout: T) -> Option<Event> {
        let deadline = match timeout.into() {
            Timeout::Never => None,
            Timeout::After(d) => Some(Instant::now() + d),
        };
        let mut q = lock_poisoned(&self.shared.q);
        loop {
            if let Some(event) = q.pop_front() {
                return Some(event);
            }
            match deadline {
                None => {
                    q = match self.shared.cond.wait(q) {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return None;
                    }
                    q = match self.shared.cond.wait_timeout(q, left) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                }
            }
        }
    }

    /// The number of events waiting to be polled.
    pub fn len(&self) -> usize {
        lock_poisoned(&self.shared.q).len()
    }

    /// Reports whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidates every sender handed out so far: events they deliver
    /// from now on are dropped. Events already queued stay pollable.
    pub fn invalidate(&self) {
        self.shared.version.fetch_add(1, Ordering::AcqRel);
    }

    /// A sender bound to the queue's current version.
    pub(crate) fn sender(&self) -> ReplySender {
        ReplySender {
            shared: Arc::clone(&self.shared),
            version: self.shared.version.load(Ordering::Acquire),
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventQueue").field("len", &self.len()).finish()
    }
}

/// A versioned producer handle onto an [`EventQueue`].
#[derive(Clone)]
pub(crate) struct ReplySender {
    shared: Arc<QueueShared>,
    version: u32,
}

impl ReplySender {
    /// Delivers `event`, unless the queue was invalidated after this
    /// sender was created. Returns whether the event was enqueued.
    pub(crate) fn enq(&self, event: Event) -> bool {
        if self.shared.version.load(Ordering::Acquire) != self.version {
            trace!("Dropping event for outdated queue version {}", self.version);
            return false;
        }
        lock_poisoned(&self.shared.q).push_back(event);
        self.shared.cond.notify_one();
        true
    }
}
