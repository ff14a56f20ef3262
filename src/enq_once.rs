//! Enqueue-once: a single-firing wake-up primitive.
//!
//! An admin request in flight can be completed by several independent
//! asynchronous sources at once: the deadline timer, a broker state change,
//! the protocol response handler. Each of them holds a reference to the
//! request's `EnqueueOnce`, but only the first one to trigger after an
//! arming gets to re-post the request on the driver queue; the rest become
//! no-ops. The driver re-arms the same object every time it parks the
//! request for another asynchronous wait.

use std::sync::{Arc, Mutex};

use crate::admin::request::AdminRequest;
use crate::client::{Op, OpSender};
use crate::error::ErrorCode;
use crate::log::{debug, trace};
use crate::util::lock_poisoned;

struct EnqOnceInner {
    /// The parked request. `Some` while armed; taken by the winning
    /// trigger or by `disable`.
    item: Option<Box<AdminRequest>>,
    ops: OpSender,
    /// Names of the asynchronous sources that may still trigger. Purely
    /// diagnostic accounting.
    sources: Vec<&'static str>,
}

/// See the module docs. Shared between the driver and every pending
/// asynchronous source through an `Arc`.
pub(crate) struct EnqueueOnce {
    inner: Mutex<EnqOnceInner>,
}

impl EnqueueOnce {
    /// Creates a disarmed instance posting to `ops`.
    pub(crate) fn new(ops: OpSender) -> Arc<EnqueueOnce> {
        Arc::new(EnqueueOnce {
            inner: Mutex::new(EnqOnceInner {
                item: None,
                ops,
                sources: Vec::new(),
            }),
        })
    }

    /// Records that a source named `name` may trigger later.
    pub(crate) fn add_source(&self, name: &'static str) {
        let mut inner = lock_poisoned(&self.inner);
        inner.sources.push(name);
    }

    /// Drops the source accounting entry added by [`EnqueueOnce::add_source`].
    pub(crate) fn del_source(&self, name: &'static str) {
        let mut inner = lock_poisoned(&self.inner);
        if let Some(pos) = inner.sources.iter().position(|s| *s == name) {
            inner.sources.remove(pos);
        }
    }

    /// Attempts to complete the current arming on behalf of `source`.
    ///
    /// The first trigger since the last arming stamps `err` on the parked
    /// request and posts it to the driver queue; any later trigger only
    /// drops its source entry. Never blocks beyond the queue post.
    pub(crate) fn trigger(&self, source: &'static str, err: ErrorCode, reason: &str) {
        let (item, ops) = {
            let mut inner = lock_poisoned(&self.inner);
            if let Some(pos) = inner.sources.iter().position(|s| *s == source) {
                inner.sources.remove(pos);
            }
            match inner.item.take() {
                None => {
                    trace!("Lost trigger from {}: {}", source, reason);
                    return;
                }
                Some(item) => (item, inner.ops.clone()),
            }
        };
        let mut item = item;
        item.err = err;
        debug!(
            "{} triggered by {} ({}): {}",
            item.kind, source, reason, err
        );
        if ops.send(Op::Admin(item)).is_err() {
            trace!("Trigger from {} dropped: driver queue is gone", source);
        }
    }

    /// Atomically claims the parked request back, winning the current
    /// arming. Returns `None` if another source already won.
    pub(crate) fn disable(&self) -> Option<Box<AdminRequest>> {
        lock_poisoned(&self.inner).item.take()
    }

    /// Parks `item` and arms for another round of triggers.
    pub(crate) fn reenable(&self, item: Box<AdminRequest>) {
        let mut inner = lock_poisoned(&self.inner);
        debug_assert!(inner.item.is_none());
        inner.item = Some(item);
    }

    /// Drops any parked request and disarms permanently. Outstanding
    /// source references remain valid; their triggers become no-ops.
    pub(crate) fn destroy(&self) {
        let mut inner = lock_poisoned(&self.inner);
        inner.item = None;
    }
}
