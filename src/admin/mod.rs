//! Admin client.
//!
//! The admin APIs are completely asynchronous: a submission call copies
//! its inputs, enqueues a work item on the client's driver thread, and
//! returns immediately. The driver advances the item through a small
//! state machine (look up the controller or an explicitly addressed
//! broker, wait for its connection to become usable, encode and transmit
//! the wire request, decode the response) and delivers a typed
//! [`AdminResult`] event on the reply queue passed at submission. A
//! deadline timer races every step; whichever of the timer, a broker
//! state change, or the protocol response fires first gets to complete
//! the step, and the rest become no-ops.
//!
//! Two interfaces are exposed:
//!
//! - the channel-level submission methods on [`Client`]
//!   (e.g. [`Client::create_topics`]), which deliver results on an
//!   [`EventQueue`] owned by the application;
//! - the [`AdminClient`] facade, whose methods return futures resolved by
//!   a background thread polling such a queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::{ready, FutureExt};

pub mod configs;
pub(crate) mod request;
pub mod result;
pub mod topics;

pub use configs::{AlterOperation, ConfigEntry, ConfigResource, ConfigSource, ResourceType};
pub use result::{AdminResult, Opaque};
pub use topics::{DeleteTopic, NewPartitions, NewTopic, TopicResult, BROKERS_MAX, PARTITIONS_MAX};

use crate::broker::{BrokerId, Transport};
use crate::client::{Client, Op};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{Event, EventQueue};
use crate::log::{trace, warn};
use crate::protocol::ApiKey;
use crate::util::duration_to_millis;

use self::configs::single_broker_id;
use self::request::{destroy, result_fail, AdminArgs, AdminCodec, AdminRequest};

/// The admin APIs this client implements.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AdminOp {
    /// Create one or more topics.
    CreateTopics,
    /// Delete one or more topics.
    DeleteTopics,
    /// Grow the partition count of one or more topics.
    CreatePartitions,
    /// Alter configuration for one or more resources.
    AlterConfigs,
    /// Describe configuration for one or more resources.
    DescribeConfigs,
}

impl AdminOp {
    /// The API's canonical name.
    pub fn name(self) -> &'static str {
        self.api_key().name()
    }

    pub(crate) fn api_key(self) -> ApiKey {
        match self {
            AdminOp::CreateTopics => ApiKey::CreateTopics,
            AdminOp::DeleteTopics => ApiKey::DeleteTopics,
            AdminOp::CreatePartitions => ApiKey::CreatePartitions,
            AdminOp::AlterConfigs => ApiKey::AlterConfigs,
            AdminOp::DescribeConfigs => ApiKey::DescribeConfigs,
        }
    }
}

impl std::fmt::Display for AdminOp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//
// ********** ADMIN OPTIONS **********
//

/// The longest accepted timeout, one hour in milliseconds.
const TIMEOUT_MAX_MS: u64 = 3_600_000;

/// Options for an admin API request.
///
/// Options are validated against the API the bag was created for: setting
/// an option the target API does not support fails without mutating the
/// bag. A bag created with [`AdminOptions::new`] accepts every option.
pub struct AdminOptions {
    for_api: Option<AdminOp>,
    request_timeout: Option<Duration>,
    operation_timeout: Option<i32>,
    validate_only: bool,
    incremental: bool,
    broker: Option<BrokerId>,
    opaque: Option<Opaque>,
}

impl Default for AdminOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminOptions {
    /// Creates an option bag accepting every option.
    pub fn new() -> AdminOptions {
        AdminOptions {
            for_api: None,
            request_timeout: None,
            operation_timeout: None,
            validate_only: false,
            incremental: false,
            broker: None,
            opaque: None,
        }
    }

    /// Creates an option bag scoped to `api`; setters for options the API
    /// does not recognize will fail.
    pub fn for_api(api: AdminOp) -> AdminOptions {
        AdminOptions {
            for_api: Some(api),
            ..AdminOptions::new()
        }
    }

    fn check_api(&self, option: &'static str, applicable: &[AdminOp]) -> ClientResult<()> {
        match self.for_api {
            None => Ok(()),
            Some(api) if applicable.contains(&api) => Ok(()),
            Some(api) => Err(ClientError::UnsupportedOption { option, api }),
        }
    }

    /// Sets the overall request timeout, including broker lookup, request
    /// transmission, operation time on broker, and response.
    ///
    /// Defaults to the `socket.timeout.ms` configuration parameter.
    pub fn request_timeout(mut self, timeout: Duration) -> ClientResult<AdminOptions> {
        if duration_to_millis(timeout) > TIMEOUT_MAX_MS {
            return Err(ClientError::AdminOpCreation(format!(
                "request_timeout out of expected range 0..{}",
                TIMEOUT_MAX_MS
            )));
        }
        self.request_timeout = Some(timeout);
        Ok(self)
    }

    /// Sets the broker's operation timeout in milliseconds, such as the
    /// timeout for CreateTopics to complete the creation of topics on the
    /// controller before returning a result to the application.
    ///
    /// Zero, the default, returns immediately after triggering the
    /// operation; server-side per-element `RequestTimedOut` errors are
    /// then hidden since the operation is still in progress.
    ///
    /// Only the CreateTopics, DeleteTopics, and CreatePartitions API
    /// calls respect this option.
    pub fn operation_timeout(mut self, timeout_ms: i32) -> ClientResult<AdminOptions> {
        self.check_api(
            "operation_timeout",
            &[
                AdminOp::CreateTopics,
                AdminOp::DeleteTopics,
                AdminOp::CreatePartitions,
            ],
        )?;
        if !(-1..=TIMEOUT_MAX_MS as i32).contains(&timeout_ms) {
            return Err(ClientError::AdminOpCreation(format!(
                "operation_timeout out of expected range -1..{}",
                TIMEOUT_MAX_MS
            )));
        }
        self.operation_timeout = Some(timeout_ms);
        Ok(self)
    }

    /// Tells the broker to only validate the request, without performing
    /// the requested operation.
    ///
    /// Defaults to false.
    pub fn validate_only(mut self, validate_only: bool) -> ClientResult<AdminOptions> {
        self.check_api(
            "validate_only",
            &[
                AdminOp::CreateTopics,
                AdminOp::CreatePartitions,
                AdminOp::AlterConfigs,
            ],
        )?;
        self.validate_only = validate_only;
        Ok(self)
    }

    /// Requests incremental alteration semantics. Reserved: accepted only
    /// for AlterConfigs and rejected at request construction until broker
    /// support lands.
    pub fn incremental(mut self, incremental: bool) -> ClientResult<AdminOptions> {
        self.check_api("incremental", &[AdminOp::AlterConfigs])?;
        self.incremental = incremental;
        Ok(self)
    }

    /// Overrides which broker the admin request is sent to instead of the
    /// controller.
    pub fn broker(mut self, broker_id: BrokerId) -> ClientResult<AdminOptions> {
        if broker_id < 0 {
            return Err(ClientError::AdminOpCreation(format!(
                "broker id out of expected range 0..{}",
                BrokerId::MAX
            )));
        }
        self.broker = Some(broker_id);
        Ok(self)
    }

    /// Attaches a caller cookie, handed back in the result event.
    pub fn opaque(mut self, opaque: Opaque) -> AdminOptions {
        self.opaque = Some(opaque);
        self
    }

    pub(crate) fn request_timeout_or(&self, default: Duration) -> Duration {
        self.request_timeout.unwrap_or(default)
    }

    pub(crate) fn operation_timeout_ms(&self) -> i32 {
        self.operation_timeout.unwrap_or(0)
    }

    pub(crate) fn is_validate_only(&self) -> bool {
        self.validate_only
    }

    pub(crate) fn is_incremental(&self) -> bool {
        self.incremental
    }

    pub(crate) fn broker_target(&self) -> Option<BrokerId> {
        self.broker
    }

    pub(crate) fn take_opaque(&mut self) -> Option<Opaque> {
        self.opaque.take()
    }

    /// A copy of every plain option; the opaque, which is not clonable,
    /// stays behind.
    pub(crate) fn clone_plain(&self) -> AdminOptions {
        AdminOptions {
            for_api: self.for_api,
            request_timeout: self.request_timeout,
            operation_timeout: self.operation_timeout,
            validate_only: self.validate_only,
            incremental: self.incremental,
            broker: self.broker,
            opaque: None,
        }
    }
}

impl std::fmt::Debug for AdminOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("AdminOptions")
            .field("for_api", &self.for_api)
            .field("request_timeout", &self.request_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("validate_only", &self.validate_only)
            .field("incremental", &self.incremental)
            .field("broker", &self.broker)
            .field("opaque", &self.opaque.as_ref().map(|_| "..."))
            .finish()
    }
}

//
// ********** SUBMISSION **********
//

impl Client {
    /// Creates new topics according to the provided `NewTopic`
    /// specifications.
    ///
    /// Note that while the API supports creating multiple topics at once,
    /// it is not transactional. Creation of some topics may succeed while
    /// others fail. Be sure to check the result of each individual
    /// operation.
    pub fn create_topics(&self, topics: &[NewTopic], options: AdminOptions, reply: &EventQueue) {
        self.admin_submit(
            AdminOp::CreateTopics,
            AdminArgs::NewTopics(topics.to_vec()),
            options,
            reply,
            &topics::CREATE_TOPICS_CODEC,
        );
    }

    /// Deletes the named topics.
    pub fn delete_topics(&self, topics: &[DeleteTopic], options: AdminOptions, reply: &EventQueue) {
        self.admin_submit(
            AdminOp::DeleteTopics,
            AdminArgs::DeleteTopics(topics.to_vec()),
            options,
            reply,
            &topics::DELETE_TOPICS_CODEC,
        );
    }

    /// Adds partitions to existing topics according to the provided
    /// `NewPartitions` specifications.
    pub fn create_partitions(
        &self,
        partitions: &[NewPartitions],
        options: AdminOptions,
        reply: &EventQueue,
    ) {
        self.admin_submit(
            AdminOp::CreatePartitions,
            AdminArgs::NewPartitions(partitions.to_vec()),
            options,
            reply,
            &topics::CREATE_PARTITIONS_CODEC,
        );
    }

    /// Sets configuration parameters for the specified resources.
    ///
    /// A single resource of type [`ResourceType::Broker`] routes the
    /// request to that broker instead of the controller; more than one is
    /// a conflict.
    pub fn alter_configs(
        &self,
        configs: &[ConfigResource],
        options: AdminOptions,
        reply: &EventQueue,
    ) {
        self.admin_submit(
            AdminOp::AlterConfigs,
            AdminArgs::ConfigResources(configs.to_vec()),
            options,
            reply,
            &configs::ALTER_CONFIGS_CODEC,
        );
    }

    /// Retrieves configuration parameters for the specified resources,
    /// with the same broker-addressing rule as [`Client::alter_configs`].
    pub fn describe_configs(
        &self,
        configs: &[ConfigResource],
        options: AdminOptions,
        reply: &EventQueue,
    ) {
        self.admin_submit(
            AdminOp::DescribeConfigs,
            AdminArgs::ConfigResources(configs.to_vec()),
            options,
            reply,
            &configs::DESCRIBE_CONFIGS_CODEC,
        );
    }

    fn admin_submit(
        &self,
        kind: AdminOp,
        args: AdminArgs,
        options: AdminOptions,
        reply: &EventQueue,
        codec: &'static AdminCodec,
    ) {
        let inner = self.inner();
        let mut rko = AdminRequest::new(
            kind,
            args,
            options,
            inner.default_request_timeout,
            reply.sender(),
            inner.ops_sender(),
            codec,
        );

        // A BROKER config resource redirects the whole request to that
        // broker; the conflict rules are checked before enqueueing.
        let broker_route = match &rko.args {
            AdminArgs::ConfigResources(configs) => single_broker_id(configs),
            _ => Ok(rko.broker_id),
        };
        match broker_route {
            Ok(broker_id) => rko.broker_id = broker_id,
            Err((code, errstr)) => {
                result_fail(&mut rko, code, errstr);
                destroy(inner, rko);
                return;
            }
        }

        if inner.ops_sender().send(Op::Admin(rko)).is_err() {
            trace!("{} submission dropped: client is terminating", kind);
        }
    }
}

//
// ********** ADMIN CLIENT (futures facade) **********
//

/// A future-returning client for the admin APIs.
///
/// Wraps a [`Client`] and a private reply queue served by a background
/// polling thread that routes each completed result to the oneshot
/// channel created at submission.
pub struct AdminClient {
    client: Client,
    queue: EventQueue,
    should_stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AdminClient {
    /// Creates a new admin client from a configuration and a transport.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<AdminClient> {
        let client = Client::new(config, transport)?;
        let queue = EventQueue::new();
        let should_stop = Arc::new(AtomicBool::new(false));
        let handle = start_poll_thread(queue.clone(), Arc::clone(&should_stop));
        Ok(AdminClient {
            client,
            queue,
            should_stop,
            handle: Some(handle),
        })
    }

    /// Returns the client underlying this admin client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Creates new topics according to the provided `NewTopic`
    /// specifications; see [`Client::create_topics`].
    pub fn create_topics(
        &self,
        topics: &[NewTopic],
        opts: &AdminOptions,
    ) -> impl Future<Output = ClientResult<Vec<TopicResult>>> {
        let (tx, rx) = oneshot::channel();
        let options = opts.clone_plain().opaque(Box::new(tx));
        self.client.create_topics(topics, options, &self.queue);
        TopicResultsFuture {
            rx,
            api: "create topics",
        }
    }

    /// Deletes the named topics.
    pub fn delete_topics(
        &self,
        topic_names: &[&str],
        opts: &AdminOptions,
    ) -> impl Future<Output = ClientResult<Vec<TopicResult>>> {
        let topics: Vec<DeleteTopic> = topic_names.iter().map(|t| DeleteTopic::new(t)).collect();
        let (tx, rx) = oneshot::channel();
        let options = opts.clone_plain().opaque(Box::new(tx));
        self.client.delete_topics(&topics, options, &self.queue);
        TopicResultsFuture {
            rx,
            api: "delete topics",
        }
    }

    /// Adds partitions to existing topics.
    pub fn create_partitions(
        &self,
        partitions: &[NewPartitions],
        opts: &AdminOptions,
    ) -> impl Future<Output = ClientResult<Vec<TopicResult>>> {
        let (tx, rx) = oneshot::channel();
        let options = opts.clone_plain().opaque(Box::new(tx));
        self.client
            .create_partitions(partitions, options, &self.queue);
        TopicResultsFuture {
            rx,
            api: "create partitions",
        }
    }

    /// Sets configuration parameters for the specified resources.
    pub fn alter_configs(
        &self,
        configs: &[ConfigResource],
        opts: &AdminOptions,
    ) -> impl Future<Output = ClientResult<Vec<ConfigResource>>> {
        let (tx, rx) = oneshot::channel();
        let options = opts.clone_plain().opaque(Box::new(tx));
        self.client.alter_configs(configs, options, &self.queue);
        ConfigResultsFuture {
            rx,
            api: "alter configs",
        }
    }

    /// Retrieves configuration parameters for the specified resources.
    pub fn describe_configs(
        &self,
        configs: &[ConfigResource],
        opts: &AdminOptions,
    ) -> impl Future<Output = ClientResult<Vec<ConfigResource>>> {
        let (tx, rx) = oneshot::channel();
        let options = opts.clone_plain().opaque(Box::new(tx));
        self.client.describe_configs(configs, options, &self.queue);
        ConfigResultsFuture {
            rx,
            api: "describe configs",
        }
    }
}

impl Drop for AdminClient {
    fn drop(&mut self) {
        trace!("Stopping polling");
        self.should_stop.store(true, Ordering::Relaxed);
        trace!("Waiting for polling thread termination");
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(()) => trace!("Polling stopped"),
                Err(e) => warn!("Failure while terminating thread: {:?}", e),
            }
        }
    }
}

fn start_poll_thread(queue: EventQueue, should_stop: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("admin client polling thread".into())
        .spawn(move || {
            trace!("Admin polling thread loop started");
            loop {
                match queue.poll(Duration::from_millis(100)) {
                    None => {
                        if should_stop.load(Ordering::Relaxed) {
                            // We received nothing and the thread should
                            // stop, so break the loop.
                            break;
                        }
                    }
                    Some(Event::AdminResult(mut result)) => {
                        let tx = result
                            .take_opaque()
                            .and_then(|o| o.downcast::<oneshot::Sender<AdminResult>>().ok());
                        match tx {
                            Some(tx) => {
                                let _ = tx.send(result);
                            }
                            None => warn!("Admin result without a reply slot dropped"),
                        }
                    }
                    Some(other) => trace!("Ignoring unexpected event {:?}", other),
                }
            }
            trace!("Admin polling thread loop terminated");
        })
        .expect("Failed to start polling thread")
}

/// Resolves a topic-shaped admin result (CreateTopics, DeleteTopics,
/// CreatePartitions).
struct TopicResultsFuture {
    rx: oneshot::Receiver<AdminResult>,
    api: &'static str,
}

impl Future for TopicResultsFuture {
    type Output = ClientResult<Vec<TopicResult>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(self.rx.poll_unpin(cx)).map_err(|_| ClientError::Canceled)?;
        if result.error().is_error() {
            return Poll::Ready(Err(ClientError::AdminOp(result.error())));
        }
        match result.into_topics() {
            Some(topics) => Poll::Ready(Ok(topics)),
            None => Poll::Ready(Err(ClientError::AdminOpCreation(format!(
                "{} request received response of incorrect type",
                self.api
            )))),
        }
    }
}

/// Resolves a config-shaped admin result (AlterConfigs, DescribeConfigs).
struct ConfigResultsFuture {
    rx: oneshot::Receiver<AdminResult>,
    api: &'static str,
}

impl Future for ConfigResultsFuture {
    type Output = ClientResult<Vec<ConfigResource>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(self.rx.poll_unpin(cx)).map_err(|_| ClientError::Canceled)?;
        if result.error().is_error() {
            return Poll::Ready(Err(ClientError::AdminOp(result.error())));
        }
        match result.into_resources() {
            Some(resources) => Poll::Ready(Ok(resources)),
            None => Poll::Ready(Err(ClientError::AdminOpCreation(format!(
                "{} request received response of incorrect type",
                self.api
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_applicability() {
        // An unscoped bag accepts everything.
        assert!(AdminOptions::new().operation_timeout(100).is_ok());
        assert!(AdminOptions::new().incremental(true).is_ok());

        // Scoped bags reject what their API does not recognize.
        assert!(AdminOptions::for_api(AdminOp::DescribeConfigs)
            .operation_timeout(100)
            .is_err());
        assert!(AdminOptions::for_api(AdminOp::DeleteTopics)
            .validate_only(true)
            .is_err());
        assert!(AdminOptions::for_api(AdminOp::CreateTopics)
            .incremental(true)
            .is_err());
        assert!(AdminOptions::for_api(AdminOp::AlterConfigs)
            .incremental(true)
            .is_ok());
        assert!(AdminOptions::for_api(AdminOp::CreateTopics)
            .validate_only(true)
            .is_ok());
    }

    #[test]
    fn test_options_ranges() {
        assert!(AdminOptions::new()
            .request_timeout(Duration::from_millis(TIMEOUT_MAX_MS))
            .is_ok());
        assert!(AdminOptions::new()
            .request_timeout(Duration::from_millis(TIMEOUT_MAX_MS + 1))
            .is_err());
        assert!(AdminOptions::new().operation_timeout(-1).is_ok());
        assert!(AdminOptions::new().operation_timeout(-2).is_err());
        assert!(AdminOptions::new().broker(-1).is_err());
        assert!(AdminOptions::new().broker(0).is_ok());
    }

    #[test]
    fn test_failed_setter_does_not_mutate() {
        let opts = AdminOptions::for_api(AdminOp::DescribeConfigs);
        let err = opts.operation_timeout(100).unwrap_err();
        assert_eq!(
            err,
            ClientError::UnsupportedOption {
                option: "operation_timeout",
                api: AdminOp::DescribeConfigs,
            }
        );
        // A fresh bag still reports the default.
        assert_eq!(
            AdminOptions::for_api(AdminOp::DescribeConfigs).operation_timeout_ms(),
            0
        );
    }

    #[test]
    fn test_clone_plain_leaves_opaque_behind() {
        let opts = AdminOptions::new().opaque(Box::new(7_u32));
        let mut copy = opts.clone_plain();
        assert!(copy.take_opaque().is_none());
    }
}
