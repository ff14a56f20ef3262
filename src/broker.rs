//! Cluster membership, broker lookups, and the transport interface.
//!
//! The engine never talks to a socket itself. It resolves a
//! [`BrokerHandle`] through the [`Cluster`] directory, hands a serialized
//! request to the [`Transport`], and gets the reply re-posted onto the
//! driver queue through a [`ReplyDelivery`]. Metadata discovery keeps the
//! directory current by calling the `Cluster` update methods; every update
//! wakes the admin requests parked on a broker or controller lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::{Op, OpSender};
use crate::enq_once::EnqueueOnce;
use crate::error::ErrorCode;
use crate::log::trace;
use crate::protocol::{ApiKey, ReplyBuf, RequestBuf};
use crate::util::lock_poisoned;

/// Identifies a broker; assigned by the cluster.
pub type BrokerId = i32;

/// The id used to address "whoever currently is the controller".
pub(crate) const CONTROLLER_ID: BrokerId = -1;

/// Connection-level state of a broker, as tracked by the metadata layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BrokerState {
    /// Known from metadata, connection not established.
    Down,
    /// Connection established and usable.
    Up,
}

/// A cluster member.
#[derive(Debug)]
pub struct Broker {
    id: BrokerId,
    name: String,
    state: Mutex<BrokerState>,
    api_versions: Mutex<HashMap<ApiKey, i16>>,
}

impl Broker {
    fn new(id: BrokerId, name: &str) -> Broker {
        Broker {
            id,
            name: name.to_owned(),
            state: Mutex::new(BrokerState::Down),
            api_versions: Mutex::new(HashMap::new()),
        }
    }

    /// The broker id.
    pub fn id(&self) -> BrokerId {
        self.id
    }

    /// The broker's advertised name, typically `host:port/id`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current connection state.
    pub fn state(&self) -> BrokerState {
        *lock_poisoned(&self.state)
    }

    /// The request version to use for `key` against this broker: the
    /// newest version both sides support.
    pub fn api_version(&self, key: ApiKey) -> i16 {
        let versions = lock_poisoned(&self.api_versions);
        versions
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.max_version())
            .min(key.max_version())
    }
}

/// A reference-counted broker handle.
pub type BrokerHandle = Arc<Broker>;

struct ClusterInner {
    brokers: HashMap<BrokerId, BrokerHandle>,
    controller_id: BrokerId,
    /// Admin requests parked until any broker state changes.
    waiters: Vec<Arc<EnqueueOnce>>,
}

/// The cluster membership directory.
///
/// Lookups are asynchronous: when the wanted broker is not usable yet, the
/// caller's enqueue-once is registered and triggered on the next state
/// change, whereupon the caller retries the lookup.
pub struct Cluster {
    inner: Mutex<ClusterInner>,
}

impl Cluster {
    pub(crate) fn new() -> Cluster {
        Cluster {
            inner: Mutex::new(ClusterInner {
                brokers: HashMap::new(),
                controller_id: CONTROLLER_ID,
                waiters: Vec::new(),
            }),
        }
    }

    /// Adds a broker in state [`BrokerState::Down`], or returns the
    /// existing handle for `id`.
    pub fn add_broker(&self, id: BrokerId, name: &str) -> BrokerHandle {
        let handle = {
            let mut inner = lock_poisoned(&self.inner);
            Arc::clone(
                inner
                    .brokers
                    .entry(id)
                    .or_insert_with(|| Arc::new(Broker::new(id, name))),
            )
        };
        self.broker_state_change();
        handle
    }

    /// Updates the connection state of broker `id`.
    pub fn set_broker_state(&self, id: BrokerId, state: BrokerState) {
        {
            let inner = lock_poisoned(&self.inner);
            if let Some(broker) = inner.brokers.get(&id) {
                *lock_poisoned(&broker.state) = state;
            }
        }
        self.broker_state_change();
    }

    /// Records which member currently is the controller.
    pub fn set_controller(&self, id: BrokerId) {
        lock_poisoned(&self.inner).controller_id = id;
        self.broker_state_change();
    }

    /// The current controller id, or -1 if unknown.
    pub fn controller_id(&self) -> BrokerId {
        lock_poisoned(&self.inner).controller_id
    }

    /// Caps the request version used for `key` against broker `id`.
    pub fn set_api_version(&self, id: BrokerId, key: ApiKey, version: i16) {
        let inner = lock_poisoned(&self.inner);
        if let Some(broker) = inner.brokers.get(&id) {
            lock_poisoned(&broker.api_versions).insert(key, version);
        }
    }

    /// Asynchronously looks up broker `id` in state [`BrokerState::Up`].
    ///
    /// Returns the handle if it is usable right now; otherwise registers
    /// `eonce` to be triggered on the next broker state change and returns
    /// `None`, and the caller retries when re-posted.
    pub(crate) fn broker_get_async(
        &self,
        id: BrokerId,
        eonce: &Arc<EnqueueOnce>,
    ) -> Option<BrokerHandle> {
        let mut inner = lock_poisoned(&self.inner);
        let usable = inner
            .brokers
            .get(&id)
            .filter(|b| b.state() == BrokerState::Up)
            .map(Arc::clone);
        if usable.is_none() {
            eonce.add_source("broker availability");
            inner.waiters.push(Arc::clone(eonce));
        }
        usable
    }

    /// Asynchronously looks up the controller in state
    /// [`BrokerState::Up`]; same contract as
    /// [`Cluster::broker_get_async`].
    pub(crate) fn controller_async(&self, eonce: &Arc<EnqueueOnce>) -> Option<BrokerHandle> {
        let mut inner = lock_poisoned(&self.inner);
        let controller_id = inner.controller_id;
        let usable = if controller_id == CONTROLLER_ID {
            None
        } else {
            inner
                .brokers
                .get(&controller_id)
                .filter(|b| b.state() == BrokerState::Up)
                .map(Arc::clone)
        };
        if usable.is_none() {
            eonce.add_source("broker availability");
            inner.waiters.push(Arc::clone(eonce));
        }
        usable
    }

    /// Wakes every parked lookup so it can retry.
    fn broker_state_change(&self) {
        let waiters = {
            let mut inner = lock_poisoned(&self.inner);
            std::mem::take(&mut inner.waiters)
        };
        if !waiters.is_empty() {
            trace!("Broker state change wakes {} waiter(s)", waiters.len());
        }
        for eonce in waiters {
            eonce.trigger("broker availability", ErrorCode::NoError, "broker state change");
        }
    }
}

/// Completion path handed to a [`Transport`] along with a request.
///
/// The transport invokes [`ReplyDelivery::respond`] exactly once, from any
/// thread, when the reply (or a transport-level error) is available.
/// Dropping the delivery without responding is allowed; the request's
/// deadline timer then completes it.
pub struct ReplyDelivery {
    ops: OpSender,
    eonce: Arc<EnqueueOnce>,
}

impl ReplyDelivery {
    pub(crate) fn new(ops: OpSender, eonce: Arc<EnqueueOnce>) -> ReplyDelivery {
        ReplyDelivery { ops, eonce }
    }

    /// Delivers the parsed reply buffer, or a transport-level error code
    /// with no buffer, back to the engine.
    pub fn respond(self, err: ErrorCode, reply: Option<ReplyBuf>) {
        let ok = self
            .ops
            .send(Op::Response {
                eonce: self.eonce,
                err,
                reply,
            })
            .is_ok();
        if !ok {
            trace!("Reply dropped: driver queue is gone");
        }
    }
}

/// Broker I/O, as seen by the engine.
///
/// Implementations serialize and frame the request, enqueue it on the
/// broker's transmit queue, and later hand the parsed reply body to the
/// [`ReplyDelivery`]. Returning an error means the request was never
/// enqueued and no reply will be delivered.
pub trait Transport: Send + Sync + 'static {
    /// Enqueues `request` for transmission to `broker`.
    fn send(
        &self,
        broker: &BrokerHandle,
        request: RequestBuf,
        reply: ReplyDelivery,
    ) -> Result<(), String>;
}
