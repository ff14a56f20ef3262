//! The admin request work item and its driver-side state machine.
//!
//! Every submitted admin operation becomes one [`AdminRequest`] stepped by
//! [`admin_worker`] on the driver thread. The worker never blocks: each
//! step either advances synchronously or parks the request in its
//! enqueue-once and returns, to be re-run when a timer, broker state
//! change, or protocol response re-posts it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admin::configs::ResourceType;
use crate::admin::result::{AdminResult, ResultItems};
use crate::admin::{AdminOp, AdminOptions};
use crate::broker::{BrokerHandle, BrokerId, ReplyDelivery, CONTROLLER_ID};
use crate::client::ClientInner;
use crate::enq_once::EnqueueOnce;
use crate::error::ErrorCode;
use crate::events::{Event, EventQueue, ReplySender};
use crate::log::{debug, error, trace};
use crate::protocol::{ApiKey, ReplyBuf, RequestBuf};

#[cfg(test)]
use crate::client::OpSender;

/// The deep-copied input elements of an admin request.
pub(crate) enum AdminArgs {
    NewTopics(Vec<crate::admin::topics::NewTopic>),
    DeleteTopics(Vec<crate::admin::topics::DeleteTopic>),
    NewPartitions(Vec<crate::admin::topics::NewPartitions>),
    ConfigResources(Vec<crate::admin::configs::ConfigResource>),
}

impl AdminArgs {
    /// The number of input elements.
    pub(crate) fn len(&self) -> usize {
        match self {
            AdminArgs::NewTopics(v) => v.len(),
            AdminArgs::DeleteTopics(v) => v.len(),
            AdminArgs::NewPartitions(v) => v.len(),
            AdminArgs::ConfigResources(v) => v.len(),
        }
    }

    /// The submission index of the element named `topic`, for the
    /// topic-shaped APIs.
    pub(crate) fn topic_index(&self, topic: &str) -> Option<usize> {
        match self {
            AdminArgs::NewTopics(v) => v.iter().position(|t| t.topic() == topic),
            AdminArgs::DeleteTopics(v) => v.iter().position(|t| t.topic() == topic),
            AdminArgs::NewPartitions(v) => v.iter().position(|t| t.topic() == topic),
            AdminArgs::ConfigResources(_) => None,
        }
    }

    /// The submission index of the resource identified by
    /// `(rtype, name)`, for the config-shaped APIs.
    pub(crate) fn resource_index(&self, rtype: ResourceType, name: &str) -> Option<usize> {
        match self {
            AdminArgs::ConfigResources(v) => v
                .iter()
                .position(|r| r.resource_type() == rtype && r.name() == name),
            _ => None,
        }
    }
}

/// Where an admin request currently is in its lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum AdminState {
    Init,
    WaitBroker,
    WaitController,
    ConstructRequest,
    WaitResponse,
}

impl AdminState {
    /// Descriptive string, embedded in failure messages.
    pub(crate) fn desc(self) -> &'static str {
        match self {
            AdminState::Init => "initializing",
            AdminState::WaitBroker => "waiting for broker",
            AdminState::WaitController => "waiting for controller",
            AdminState::ConstructRequest => "constructing request",
            AdminState::WaitResponse => "waiting for response from broker",
        }
    }
}

/// An encoder failure: the request never left the client.
pub(crate) type EncodeFail = (ErrorCode, String);

/// A decoder failure: the reply did not match the request.
pub(crate) type DecodeFail = (ErrorCode, String);

/// Context handed to response decoders.
pub(crate) struct DecodeCtx<'a> {
    /// The client's main event queue, for throttle forwarding.
    pub(crate) main_events: &'a EventQueue,
}

pub(crate) type EncodeFn =
    fn(&BrokerHandle, &AdminArgs, &AdminRequest) -> Result<RequestBuf, EncodeFail>;
pub(crate) type DecodeFn =
    fn(&AdminRequest, &mut ReplyBuf, &DecodeCtx) -> Result<ResultItems, DecodeFail>;

/// The request/response codec pair bound to an admin API.
pub(crate) struct AdminCodec {
    pub(crate) encode: EncodeFn,
    pub(crate) decode: DecodeFn,
}

/// One in-flight admin operation.
pub(crate) struct AdminRequest {
    pub(crate) kind: AdminOp,
    pub(crate) state: AdminState,
    /// Error stamped by an asynchronous completion source, observed by
    /// the worker on its next step.
    pub(crate) err: ErrorCode,
    pub(crate) args: AdminArgs,
    pub(crate) options: AdminOptions,
    /// Target broker; [`CONTROLLER_ID`] means "the controller".
    pub(crate) broker_id: BrokerId,
    pub(crate) reply: ReplySender,
    pub(crate) eonce: Arc<EnqueueOnce>,
    pub(crate) timer: Option<crate::timer::TimerHandle>,
    /// Present exactly while a successfully received reply awaits
    /// decoding in [`AdminState::WaitResponse`].
    pub(crate) reply_buf: Option<ReplyBuf>,
    pub(crate) deadline: Instant,
    pub(crate) codec: &'static AdminCodec,
}

impl AdminRequest {
    pub(crate) fn new(
        kind: AdminOp,
        args: AdminArgs,
        options: AdminOptions,
        default_timeout: Duration,
        reply: ReplySender,
        ops: crate::client::OpSender,
        codec: &'static AdminCodec,
    ) -> Box<AdminRequest> {
        let timeout = options.request_timeout_or(default_timeout);
        Box::new(AdminRequest {
            kind,
            state: AdminState::Init,
            err: ErrorCode::NoError,
            args,
            options,
            broker_id: CONTROLLER_ID,
            reply,
            eonce: EnqueueOnce::new(ops),
            timer: None,
            reply_buf: None,
            deadline: Instant::now() + timeout,
            codec,
        })
    }

    #[cfg(test)]
    pub(crate) fn stub(kind: AdminOp, ops: OpSender) -> Box<AdminRequest> {
        AdminRequest::new(
            kind,
            AdminArgs::DeleteTopics(Vec::new()),
            AdminOptions::new(),
            Duration::from_secs(5),
            EventQueue::new().sender(),
            ops,
            &crate::admin::topics::DELETE_TOPICS_CODEC,
        )
    }
}

/// Builds the failure result and delivers it on the request's reply queue.
pub(crate) fn result_fail(rko: &mut AdminRequest, err: ErrorCode, errstr: String) {
    debug!("Admin {} result error: {}", rko.kind, errstr);
    let result = AdminResult::new(
        rko.kind,
        err,
        Some(errstr),
        rko.options.take_opaque(),
        ResultItems::empty_for(rko.kind),
    );
    if !rko.reply.enq(Event::AdminResult(result)) {
        trace!("Admin {} failure dropped: reply queue invalidated", rko.kind);
    }
}

/// Releases the request's timer and enqueue-once.
///
/// If the timer had not fired, its source accounting entry is dropped
/// here, since its callback will never run. Outstanding references to the
/// enqueue-once stay valid; it simply no longer holds the request.
pub(crate) fn destroy(inner: &Arc<ClientInner>, mut rko: Box<AdminRequest>) {
    if let Some(timer) = rko.timer.take() {
        if inner.timers.stop(&timer) {
            rko.eonce.del_source("timeout timer");
        }
    }
    rko.eonce.destroy();
}

/// The admin state machine, run on the driver thread for every delivery
/// of an [`AdminRequest`].
pub(crate) fn admin_worker(inner: &Arc<ClientInner>, mut rko: Box<AdminRequest>) {
    let name = rko.kind.name();

    if inner.terminating() {
        debug!(
            "{} worker called in state {}: handle is terminating: {}",
            name,
            rko.state.desc(),
            rko.err
        );
        return destroy(inner, rko);
    }

    if rko.err == ErrorCode::Destroy {
        return destroy(inner, rko);
    }

    debug!(
        "{} worker called in state {}: {}",
        name,
        rko.state.desc(),
        rko.err
    );

    // Errors raised asynchronously, e.g. by the deadline timer.
    if rko.err.is_error() {
        let err = rko.err;
        let errstr = format!("Failed while {}: {}", rko.state.desc(), err);
        result_fail(&mut rko, err, errstr);
        return destroy(inner, rko);
    }

    let timeout_in = rko.deadline.saturating_duration_since(Instant::now());
    if timeout_in.is_zero() {
        let errstr = format!("Timed out {}", rko.state.desc());
        result_fail(&mut rko, ErrorCode::TimedOut, errstr);
        return destroy(inner, rko);
    }

    loop {
        match rko.state {
            AdminState::Init => {
                rko.eonce.add_source("timeout timer");
                rko.timer = Some(inner.timers.start_oneshot(timeout_in, Arc::clone(&rko.eonce)));

                if let Some(broker_id) = rko.options.broker_target() {
                    debug!(
                        "{} using explicitly set broker id {} rather than {}",
                        name, broker_id, rko.broker_id
                    );
                    rko.broker_id = broker_id;
                }

                rko.state = if rko.broker_id != CONTROLLER_ID {
                    AdminState::WaitBroker
                } else {
                    AdminState::WaitController
                };
                // Trigger the next state immediately.
            }

            AdminState::WaitBroker => {
                debug!("{}: looking up broker {}", name, rko.broker_id);
                let broker_id = rko.broker_id;
                let eonce = Arc::clone(&rko.eonce);
                // Park the request before the lookup: if the broker is
                // not usable, any subsequent state change re-posts it and
                // this code runs again.
                eonce.reenable(rko);
                let Some(rkb) = inner.cluster.broker_get_async(broker_id, &eonce) else {
                    return;
                };
                let Some(taken) = eonce.disable() else {
                    // The deadline timer won the arming while the lookup
                    // completed; its delivery finishes the request.
                    return;
                };
                rko = taken;
                debug!("{}: broker {} is {}", name, broker_id, rkb.name());
                rko.state = AdminState::ConstructRequest;
                return construct_request(inner, rko, rkb);
            }

            AdminState::WaitController => {
                debug!("{}: looking up controller", name);
                let eonce = Arc::clone(&rko.eonce);
                eonce.reenable(rko);
                let Some(rkb) = inner.cluster.controller_async(&eonce) else {
                    return;
                };
                let Some(taken) = eonce.disable() else {
                    return;
                };
                rko = taken;
                debug!("{}: controller is {}", name, rkb.name());
                rko.state = AdminState::ConstructRequest;
                return construct_request(inner, rko, rkb);
            }

            AdminState::ConstructRequest => {
                // Only entered synchronously from a successful lookup; a
                // queue delivery in this state means the item escaped
                // while the request was being sent.
                error!("{} worker delivered in state {}", name, rko.state.desc());
                return destroy(inner, rko);
            }

            AdminState::WaitResponse => {
                let Some(mut reply) = rko.reply_buf.take() else {
                    let errstr = format!(
                        "{} worker woke up in state {} without a reply buffer",
                        name,
                        rko.state.desc()
                    );
                    result_fail(&mut rko, ErrorCode::BadMessage, errstr);
                    return destroy(inner, rko);
                };
                let ctx = DecodeCtx {
                    main_events: &inner.main_events,
                };
                match (rko.codec.decode)(&rko, &mut reply, &ctx) {
                    Ok(items) => {
                        let result = AdminResult::new(
                            rko.kind,
                            ErrorCode::NoError,
                            None,
                            rko.options.take_opaque(),
                            items,
                        );
                        if !rko.reply.enq(Event::AdminResult(result)) {
                            trace!("Admin {} result dropped: reply queue invalidated", name);
                        }
                    }
                    Err((code, errstr)) => {
                        let errstr =
                            format!("{} worker failed to parse response: {}", name, errstr);
                        result_fail(&mut rko, code, errstr);
                    }
                }
                return destroy(inner, rko);
            }
        }
    }
}

/// Encodes and hands the request to the transport, then waits
/// asynchronously for the response to trigger the enqueue-once.
fn construct_request(inner: &Arc<ClientInner>, mut rko: Box<AdminRequest>, rkb: BrokerHandle) {
    let name = rko.kind.name();

    let buf = match (rko.codec.encode)(&rkb, &rko.args, &rko) {
        Ok(buf) => buf,
        Err((code, errstr)) => {
            result_fail(&mut rko, code, errstr);
            return destroy(inner, rko);
        }
    };

    // The enqueue-once must stay armed across the send: the request may
    // time out while the response is in flight, in which case the
    // response handler finds it already disabled.
    rko.eonce.add_source("send");
    rko.state = AdminState::WaitResponse;
    let eonce = Arc::clone(&rko.eonce);
    let delivery = ReplyDelivery::new(inner.ops_sender(), Arc::clone(&eonce));
    eonce.reenable(rko);

    let sent = inner.transport.send(&rkb, buf, delivery);
    drop(rkb);

    if let Err(errstr) = sent {
        eonce.del_source("send");
        match eonce.disable() {
            None => (), // raced by the deadline timer; nothing left to do
            Some(mut rko) => {
                result_fail(
                    &mut rko,
                    ErrorCode::Transport,
                    format!("{} request failed: {}", name, errstr),
                );
                destroy(inner, rko);
            }
        }
    }
}

/// Completion path for transport replies: claims the request back from
/// its enqueue-once and re-runs the worker with the reply attached.
///
/// A reply whose request already completed (e.g. by deadline) finds the
/// enqueue-once empty and is dropped.
pub(crate) fn handle_response(
    inner: &Arc<ClientInner>,
    eonce: &Arc<EnqueueOnce>,
    err: ErrorCode,
    reply: Option<ReplyBuf>,
) {
    eonce.del_source("send");
    match eonce.disable() {
        None => {
            debug!(
                "Dropping outdated {} response with return code {}",
                reply.as_ref().map(|r| r.api_key().name()).unwrap_or("???"),
                err
            );
        }
        Some(mut rko) => {
            rko.reply_buf = reply;
            if err.is_error() {
                rko.err = err;
            }
            admin_worker(inner, rko);
        }
    }
}

/// Raises a response-parse failure: the detail goes to the log, the
/// caller-visible error string stays canonical.
pub(crate) fn parse_fail(api: ApiKey, detail: String) -> DecodeFail {
    error!("{}: {}", api.name(), detail);
    (
        ErrorCode::BadMessage,
        format!(
            "{} response protocol parse failure: {}",
            api.name(),
            ErrorCode::BadMessage
        ),
    )
}

/// Reads the reply's throttle field and forwards a positive hint to the
/// client's main event queue.
pub(crate) fn read_throttle(
    api: ApiKey,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<(), DecodeFail> {
    let throttle_ms = reply
        .read_i32()
        .map_err(|e| parse_fail(api, format!("reading throttle time: {}", e)))?;
    if throttle_ms > 0 {
        ctx.main_events.sender().enq(Event::Throttle {
            broker_id: reply.broker_id(),
            throttle: Duration::from_millis(throttle_ms as u64),
        });
    }
    Ok(())
}
