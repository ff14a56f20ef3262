//! Topic-shaped admin APIs: CreateTopics, DeleteTopics, CreatePartitions.
//!
//! Input value types own their data; submission deep-copies them so the
//! caller may drop the originals immediately.

use crate::admin::configs::{AlterOperation, ConfigEntry};
use crate::admin::request::{
    parse_fail, read_throttle, AdminArgs, AdminCodec, AdminRequest, DecodeCtx, DecodeFail,
    EncodeFail,
};
use crate::admin::result::ResultItems;
use crate::broker::{BrokerHandle, BrokerId};
use crate::error::{ClientError, ClientResult, ErrorCode};
use crate::protocol::{ApiKey, ReplyBuf, RequestBuf};

/// The highest partition count a topic may be created with.
pub const PARTITIONS_MAX: i32 = 100_000;

/// The highest broker count accepted in a replica assignment.
pub const BROKERS_MAX: usize = 10_000;

/// Configuration for a CreateTopics operation.
#[derive(Clone, Debug)]
pub struct NewTopic {
    topic: String,
    num_partitions: i32,
    replication_factor: i32,
    /// Replica assignments; entry `i` lists the brokers hosting partition
    /// `i`'s replicas.
    replicas: Vec<Vec<BrokerId>>,
    config: Vec<ConfigEntry>,
}

impl NewTopic {
    /// Creates a new topic specification.
    ///
    /// `replication_factor` may be -1 when an explicit replica assignment
    /// is installed with [`NewTopic::set_replica_assignment`].
    pub fn new(topic: &str, num_partitions: i32, replication_factor: i32) -> ClientResult<NewTopic> {
        if topic.is_empty() {
            return Err(ClientError::AdminOpCreation("Invalid topic name".into()));
        }
        if !(1..=PARTITIONS_MAX).contains(&num_partitions) {
            return Err(ClientError::AdminOpCreation(format!(
                "num_partitions out of expected range 1..{}",
                PARTITIONS_MAX
            )));
        }
        if !(-1..=BROKERS_MAX as i32).contains(&replication_factor) {
            return Err(ClientError::AdminOpCreation(format!(
                "replication_factor out of expected range -1..{}",
                BROKERS_MAX
            )));
        }
        Ok(NewTopic {
            topic: topic.to_owned(),
            num_partitions,
            replication_factor,
            replicas: Vec::new(),
            config: Vec::new(),
        })
    }

    /// The topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Installs the replica assignment for the next partition.
    ///
    /// Assignments must be added with consecutive partition ids starting
    /// at 0, and are mutually exclusive with a non-negative replication
    /// factor.
    pub fn set_replica_assignment(
        mut self,
        partition: i32,
        broker_ids: &[BrokerId],
    ) -> ClientResult<NewTopic> {
        if self.replication_factor != -1 {
            return Err(ClientError::AdminOpCreation(
                "Specifying a replication factor and a replica assignment \
                 are mutually exclusive"
                    .into(),
            ));
        }
        if partition != self.replicas.len() as i32 {
            return Err(ClientError::AdminOpCreation(format!(
                "Partitions must be added in order, starting at 0: \
                 expecting partition {}, not {}",
                self.replicas.len(),
                partition
            )));
        }
        if broker_ids.len() > BROKERS_MAX {
            return Err(ClientError::AdminOpCreation(format!(
                "Too many brokers specified (max {})",
                BROKERS_MAX
            )));
        }
        self.replicas.push(broker_ids.to_vec());
        Ok(self)
    }

    /// Sets a parameter in the initial topic configuration.
    pub fn set_config(mut self, name: &str, value: &str) -> ClientResult<NewTopic> {
        if name.is_empty() {
            return Err(ClientError::AdminOpCreation(
                "Invalid config name".into(),
            ));
        }
        self.config
            .push(ConfigEntry::new(name, Some(value), AlterOperation::Add));
        Ok(self)
    }
}

/// Names a topic for a DeleteTopics operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteTopic {
    topic: String,
}

impl DeleteTopic {
    /// Creates a new deletion specification.
    pub fn new(topic: &str) -> DeleteTopic {
        DeleteTopic {
            topic: topic.to_owned(),
        }
    }

    /// The topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Configuration for a CreatePartitions operation.
#[derive(Clone, Debug)]
pub struct NewPartitions {
    topic: String,
    /// The desired total partition count after the operation.
    total_count: i32,
    /// Assignments for the partitions being added, in partition order.
    replicas: Vec<Vec<BrokerId>>,
}

impl NewPartitions {
    /// Creates a new partition-count specification for `topic`.
    pub fn new(topic: &str, total_count: i32) -> ClientResult<NewPartitions> {
        if topic.is_empty() {
            return Err(ClientError::AdminOpCreation("Invalid topic name".into()));
        }
        if !(1..=PARTITIONS_MAX).contains(&total_count) {
            return Err(ClientError::AdminOpCreation(format!(
                "total_count out of expected range 1..{}",
                PARTITIONS_MAX
            )));
        }
        Ok(NewPartitions {
            topic: topic.to_owned(),
            total_count,
            replicas: Vec::new(),
        })
    }

    /// The topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Installs the replica assignment for the next new partition, with
    /// the same ordering rule as [`NewTopic::set_replica_assignment`].
    pub fn set_replica_assignment(
        mut self,
        new_partition_idx: i32,
        broker_ids: &[BrokerId],
    ) -> ClientResult<NewPartitions> {
        if new_partition_idx != self.replicas.len() as i32 {
            return Err(ClientError::AdminOpCreation(format!(
                "Partitions must be added in order, starting at 0: \
                 expecting partition index {}, not {}",
                self.replicas.len(),
                new_partition_idx
            )));
        }
        if broker_ids.len() > BROKERS_MAX {
            return Err(ClientError::AdminOpCreation(format!(
                "Too many brokers specified (max {})",
                BROKERS_MAX
            )));
        }
        self.replicas.push(broker_ids.to_vec());
        Ok(self)
    }
}

/// The outcome of an individual CreateTopics, DeleteTopics, or
/// CreatePartitions element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicResult {
    topic: String,
    err: ErrorCode,
    errstr: Option<String>,
}

impl TopicResult {
    pub(crate) fn new(topic: String, err: ErrorCode, errstr: Option<String>) -> TopicResult {
        TopicResult { topic, err, errstr }
    }

    /// The topic this element refers to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The element-level error code, [`ErrorCode::NoError`] on success.
    pub fn error(&self) -> ErrorCode {
        self.err
    }

    /// A human readable description of the element-level error, if any.
    pub fn error_string(&self) -> Option<&str> {
        self.errstr.as_deref()
    }
}

//
// Request encoders
//

fn write_assignments(buf: &mut RequestBuf, replicas: &[Vec<BrokerId>]) {
    buf.write_array_len(replicas.len());
    for (partition, brokers) in replicas.iter().enumerate() {
        buf.write_i32(partition as i32);
        buf.write_array_len(brokers.len());
        for broker in brokers {
            buf.write_i32(*broker);
        }
    }
}

fn encode_create_topics(
    broker: &BrokerHandle,
    args: &AdminArgs,
    req: &AdminRequest,
) -> Result<RequestBuf, EncodeFail> {
    let AdminArgs::NewTopics(topics) = args else {
        return Err((ErrorCode::Fail, "argument type mismatch".into()));
    };
    let version = broker.api_version(ApiKey::CreateTopics);
    let mut buf = RequestBuf::new(ApiKey::CreateTopics, version);
    buf.write_array_len(topics.len());
    for topic in topics {
        if !topic.replicas.is_empty() && topic.replicas.len() as i32 != topic.num_partitions {
            return Err((
                ErrorCode::InvalidArgument,
                format!(
                    "replica assignment for topic '{}' assigns {} partition(s), \
                     which does not match the specified number of partitions ({})",
                    topic.topic,
                    topic.replicas.len(),
                    topic.num_partitions
                ),
            ));
        }
        buf.write_str(Some(&topic.topic));
        buf.write_i32(topic.num_partitions);
        buf.write_i16(topic.replication_factor as i16);
        write_assignments(&mut buf, &topic.replicas);
        buf.write_array_len(topic.config.len());
        for entry in &topic.config {
            buf.write_str(Some(entry.name()));
            buf.write_str(entry.value());
        }
    }
    buf.write_i32(req.options.operation_timeout_ms());
    if version >= 1 {
        buf.write_bool(req.options.is_validate_only());
    }
    Ok(buf)
}

fn encode_delete_topics(
    broker: &BrokerHandle,
    args: &AdminArgs,
    req: &AdminRequest,
) -> Result<RequestBuf, EncodeFail> {
    let AdminArgs::DeleteTopics(topics) = args else {
        return Err((ErrorCode::Fail, "argument type mismatch".into()));
    };
    let version = broker.api_version(ApiKey::DeleteTopics);
    let mut buf = RequestBuf::new(ApiKey::DeleteTopics, version);
    buf.write_array_len(topics.len());
    for topic in topics {
        buf.write_str(Some(&topic.topic));
    }
    buf.write_i32(req.options.operation_timeout_ms());
    Ok(buf)
}

fn encode_create_partitions(
    broker: &BrokerHandle,
    args: &AdminArgs,
    req: &AdminRequest,
) -> Result<RequestBuf, EncodeFail> {
    let AdminArgs::NewPartitions(partitions) = args else {
        return Err((ErrorCode::Fail, "argument type mismatch".into()));
    };
    let version = broker.api_version(ApiKey::CreatePartitions);
    let mut buf = RequestBuf::new(ApiKey::CreatePartitions, version);
    buf.write_array_len(partitions.len());
    for spec in partitions {
        buf.write_str(Some(&spec.topic));
        buf.write_i32(spec.total_count);
        if spec.replicas.is_empty() {
            // Null assignment array: broker picks the placement.
            buf.write_i32(-1);
        } else {
            buf.write_array_len(spec.replicas.len());
            for brokers in &spec.replicas {
                buf.write_array_len(brokers.len());
                for broker_id in brokers {
                    buf.write_i32(*broker_id);
                }
            }
        }
    }
    buf.write_i32(req.options.operation_timeout_ms());
    buf.write_bool(req.options.is_validate_only());
    Ok(buf)
}

//
// Response decoders
//

/// Presence of the per-element error message on the wire.
#[derive(Clone, Copy)]
enum MessageField {
    Missing,
    Always,
    FromVersion(i16),
}

/// Decodes the per-topic tail shared by the three topic-shaped responses,
/// reassembling elements into request order.
fn decode_topic_results(
    api: ApiKey,
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    message: MessageField,
) -> Result<Vec<TopicResult>, DecodeFail> {
    let topic_cnt = reply
        .read_i32()
        .map_err(|e| parse_fail(api, format!("reading topic count: {}", e)))?;

    let requested = req.args.len();
    if topic_cnt as usize > requested {
        return Err(parse_fail(
            api,
            format!(
                "Received {} topics in response when only {} were requested",
                topic_cnt, requested
            ),
        ));
    }

    let mut slots: Vec<Option<TopicResult>> = (0..requested).map(|_| None).collect();
    for _ in 0..topic_cnt {
        let topic = reply
            .read_required_str()
            .map_err(|e| parse_fail(api, format!("reading topic name: {}", e)))?;
        let error_code = reply
            .read_i16()
            .map_err(|e| parse_fail(api, format!("reading error code: {}", e)))?;
        let error_msg = match message {
            MessageField::Missing => None,
            MessageField::Always => reply
                .read_str()
                .map_err(|e| parse_fail(api, format!("reading error message: {}", e)))?,
            MessageField::FromVersion(v) if reply.api_version() >= v => reply
                .read_str()
                .map_err(|e| parse_fail(api, format!("reading error message: {}", e)))?,
            MessageField::FromVersion(_) => None,
        };

        let mut err = ErrorCode::from_wire(error_code);

        // For non-blocking requests the broker reports REQUEST_TIMED_OUT
        // for elements whose operation was merely started; the operation
        // is in progress server-side, so hide the error.
        if err == ErrorCode::RequestTimedOut && req.options.operation_timeout_ms() <= 0 {
            err = ErrorCode::NoError;
        }

        let errstr = if err.is_error() {
            match error_msg {
                Some(ref m) if !m.is_empty() => Some(m.clone()),
                _ => Some(err.description().to_owned()),
            }
        } else {
            None
        };

        // The broker does not maintain request order; insert each element
        // at the position its topic had in the request.
        let orig_pos = match req.args.topic_index(&topic) {
            Some(pos) => pos,
            None => {
                return Err(parse_fail(
                    api,
                    format!(
                        "Broker returned topic {} that was not included in the \
                         original request",
                        topic
                    ),
                ))
            }
        };
        if slots[orig_pos].is_some() {
            return Err(parse_fail(
                api,
                format!("Broker returned topic {} multiple times", topic),
            ));
        }
        slots[orig_pos] = Some(TopicResult::new(topic, err, errstr));
    }

    Ok(slots.into_iter().flatten().collect())
}

fn decode_create_topics(
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<ResultItems, DecodeFail> {
    let api = ApiKey::CreateTopics;
    if reply.api_version() >= 2 {
        read_throttle(api, reply, ctx)?;
    }
    decode_topic_results(api, req, reply, MessageField::FromVersion(1))
        .map(ResultItems::Topics)
}

fn decode_delete_topics(
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<ResultItems, DecodeFail> {
    let api = ApiKey::DeleteTopics;
    if reply.api_version() >= 1 {
        read_throttle(api, reply, ctx)?;
    }
    decode_topic_results(api, req, reply, MessageField::Missing).map(ResultItems::Topics)
}

fn decode_create_partitions(
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<ResultItems, DecodeFail> {
    let api = ApiKey::CreatePartitions;
    read_throttle(api, reply, ctx)?;
    decode_topic_results(api, req, reply, MessageField::Always).map(ResultItems::Topics)
}

pub(crate) static CREATE_TOPICS_CODEC: AdminCodec = AdminCodec {
    encode: encode_create_topics,
    decode: decode_create_topics,
};

pub(crate) static DELETE_TOPICS_CODEC: AdminCodec = AdminCodec {
    encode: encode_delete_topics,
    decode: decode_delete_topics,
};

pub(crate) static CREATE_PARTITIONS_CODEC: AdminCodec = AdminCodec {
    encode: encode_create_partitions,
    decode: decode_create_partitions,
};
