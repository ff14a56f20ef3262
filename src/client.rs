//! Common client functionality.
//!
//! The [`Client`] owns the driver thread that runs every admin request's
//! state machine. Application threads, the timer thread, and the
//! transport's I/O threads never touch a request directly; they re-post it
//! onto the driver's work queue through its enqueue-once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::admin::request::{admin_worker, handle_response, AdminRequest};
use crate::broker::{Cluster, Transport};
use crate::config::ClientConfig;
use crate::enq_once::EnqueueOnce;
use crate::error::{ClientResult, ErrorCode};
use crate::events::EventQueue;
use crate::log::{debug, trace, warn};
use crate::protocol::ReplyBuf;
use crate::timer::Timers;
use crate::util::lock_poisoned;

/// A work item on the driver queue.
pub(crate) enum Op {
    /// Run (or re-run) an admin request's state machine step.
    Admin(Box<AdminRequest>),
    /// A reply, or transport error, for the request owning `eonce`.
    Response {
        eonce: Arc<EnqueueOnce>,
        err: ErrorCode,
        reply: Option<ReplyBuf>,
    },
    /// Stop the driver after draining the queue.
    Terminate,
}

pub(crate) type OpSender = mpsc::Sender<Op>;

pub(crate) struct ClientInner {
    pub(crate) cluster: Cluster,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) timers: Timers,
    pub(crate) main_events: EventQueue,
    pub(crate) default_request_timeout: Duration,
    ops: Mutex<OpSender>,
    terminating: AtomicBool,
}

impl ClientInner {
    pub(crate) fn ops_sender(&self) -> OpSender {
        lock_poisoned(&self.ops).clone()
    }

    pub(crate) fn terminating(&self) -> bool {
        self.terminating.load(Ordering::Relaxed)
    }
}

/// A client handle for a broker cluster.
///
/// Submission methods for the admin APIs live in the [`admin`](crate::admin)
/// module and are implemented on this type.
pub struct Client {
    inner: Arc<ClientInner>,
    driver: Option<JoinHandle<()>>,
}

impl Client {
    /// Creates a new client from a configuration and a transport.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<Client> {
        let default_request_timeout = config.admin_request_timeout()?;
        debug!(
            "Creating client \"{}\" (log level {:?})",
            config.get("client.id").unwrap_or("loghub"),
            config.log_level
        );
        let (ops_tx, ops_rx) = mpsc::channel();
        let inner = Arc::new(ClientInner {
            cluster: Cluster::new(),
            transport,
            timers: Timers::new(),
            main_events: EventQueue::new(),
            default_request_timeout,
            ops: Mutex::new(ops_tx),
            terminating: AtomicBool::new(false),
        });
        let driver = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("loghub driver thread".into())
                .spawn(move || driver_loop(inner, ops_rx))
                .expect("Failed to start driver thread")
        };
        Ok(Client {
            inner,
            driver: Some(driver),
        })
    }

    /// The cluster membership directory. The metadata layer keeps it
    /// current; admin requests resolve brokers through it.
    pub fn cluster(&self) -> &Cluster {
        &self.inner.cluster
    }

    /// The client's main event queue, carrying cluster-level notifications
    /// such as throttling hints.
    pub fn events(&self) -> &EventQueue {
        &self.inner.main_events
    }

    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        trace!("Terminating client");
        self.inner.terminating.store(true, Ordering::Relaxed);
        let _ = self.inner.ops_sender().send(Op::Terminate);
        if let Some(driver) = self.driver.take() {
            match driver.join() {
                Ok(()) => trace!("Driver stopped"),
                Err(e) => warn!("Failure while terminating driver thread: {:?}", e),
            }
        }
        self.inner.timers.shutdown();
    }
}

fn driver_loop(inner: Arc<ClientInner>, ops: Receiver<Op>) {
    trace!("Driver thread loop started");
    loop {
        let op = match ops.recv() {
            Ok(op) => op,
            Err(_) => break,
        };
        match op {
            Op::Admin(rko) => admin_worker(&inner, rko),
            Op::Response { eonce, err, reply } => handle_response(&inner, &eonce, err, reply),
            Op::Terminate => {
                // Outstanding items observe the terminating flag inside
                // the worker and are destroyed silently.
                debug!("Driver draining work queue for termination");
                for op in ops.try_iter() {
                    match op {
                        Op::Admin(rko) => admin_worker(&inner, rko),
                        Op::Response { eonce, err, reply } => {
                            handle_response(&inner, &eonce, err, reply)
                        }
                        Op::Terminate => (),
                    }
                }
                break;
            }
        }
    }
    trace!("Driver thread loop terminated");
}
