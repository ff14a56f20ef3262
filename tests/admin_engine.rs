//! End-to-end tests for the admin request engine, driven against a
//! scripted in-process transport and a directly-managed cluster
//! directory.

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use loghub::admin::{
    AdminClient, AdminOp, AdminOptions, AdminResult, ConfigResource, ConfigSource, NewPartitions,
    NewTopic, ResourceType,
};
use loghub::broker::{BrokerHandle, ReplyDelivery};
use loghub::protocol::{ApiKey, ReplyBuf, RequestBuf};
use loghub::{BrokerState, Client, ClientConfig, ClientError, ErrorCode, Event, EventQueue, Transport};

static INIT: Once = Once::new();

fn init_test_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

#[derive(Clone, Copy, Debug)]
struct SentRequest {
    broker_id: i32,
    api_key: ApiKey,
    api_version: i16,
}

type Responder =
    dyn Fn(&BrokerHandle, &RequestBuf) -> Option<(ErrorCode, Option<ReplyBuf>)> + Send + Sync;

/// A transport that records every request and answers from a scripted
/// responder, inline. Returning `None` from the responder drops the
/// request without ever responding; in capture mode the reply path is
/// stashed so the test can respond after the fact.
struct MockTransport {
    sent: Mutex<Vec<SentRequest>>,
    captured: Mutex<Vec<ReplyDelivery>>,
    capture: bool,
    responder: Box<Responder>,
}

impl MockTransport {
    fn with_responder<F>(f: F) -> Arc<MockTransport>
    where
        F: Fn(&BrokerHandle, &RequestBuf) -> Option<(ErrorCode, Option<ReplyBuf>)>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(MockTransport {
            sent: Mutex::new(Vec::new()),
            captured: Mutex::new(Vec::new()),
            capture: false,
            responder: Box::new(f),
        })
    }

    fn silent() -> Arc<MockTransport> {
        Self::with_responder(|_, _| None)
    }

    fn capturing() -> Arc<MockTransport> {
        let mut transport = Self::with_responder(|_, _| None);
        Arc::get_mut(&mut transport).unwrap().capture = true;
        transport
    }

    fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn take_captured(&self) -> Vec<ReplyDelivery> {
        std::mem::take(&mut self.captured.lock().unwrap())
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        broker: &BrokerHandle,
        request: RequestBuf,
        reply: ReplyDelivery,
    ) -> Result<(), String> {
        self.sent.lock().unwrap().push(SentRequest {
            broker_id: broker.id(),
            api_key: request.api_key(),
            api_version: request.api_version(),
        });
        if self.capture {
            self.captured.lock().unwrap().push(reply);
            return Ok(());
        }
        if let Some((err, buf)) = (self.responder)(broker, &request) {
            reply.respond(err, buf);
        }
        Ok(())
    }
}

/// Builds a reply body with the same writer the encoders use.
fn reply_buf(
    api: ApiKey,
    version: i16,
    broker_id: i32,
    build: impl FnOnce(&mut RequestBuf),
) -> ReplyBuf {
    let mut w = RequestBuf::new(api, version);
    build(&mut w);
    ReplyBuf::new(api, version, broker_id, w.into_body())
}

/// A client with broker 1 up and elected controller.
fn client_with_controller(transport: Arc<MockTransport>) -> Client {
    init_test_logger();
    let client = Client::new(&ClientConfig::new(), transport).expect("client creation failed");
    client.cluster().add_broker(1, "broker1:9092/1");
    client.cluster().set_broker_state(1, BrokerState::Up);
    client.cluster().set_controller(1);
    client
}

fn expect_result(queue: &EventQueue) -> AdminResult {
    match queue.poll(Duration::from_secs(5)) {
        Some(Event::AdminResult(result)) => result,
        other => panic!("expected an admin result, got {:?}", other),
    }
}

//
// End-to-end scenarios
//

#[test]
fn create_topics_happy_path() {
    let transport = MockTransport::with_responder(|broker, request| {
        assert_eq!(request.api_key(), ApiKey::CreateTopics);
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::CreateTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0); // throttle
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                    w.write_str(None);
                },
            )),
        ))
    });
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let topics = vec![NewTopic::new("A", 3, 1).unwrap()];
    let options = AdminOptions::for_api(AdminOp::CreateTopics)
        .request_timeout(Duration::from_millis(5000))
        .unwrap()
        .operation_timeout(0)
        .unwrap();
    client.create_topics(&topics, options, &queue);
    drop(topics); // inputs are deep-copied at submission

    let result = expect_result(&queue);
    assert_eq!(result.op(), AdminOp::CreateTopics);
    assert_eq!(result.error(), ErrorCode::NoError);
    let topics = result.topics().expect("topic-shaped result");
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].topic(), "A");
    assert_eq!(topics[0].error(), ErrorCode::NoError);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].broker_id, 1);
    assert_eq!(sent[0].api_key, ApiKey::CreateTopics);
    assert_eq!(sent[0].api_version, 2);
}

#[test]
fn delete_topics_reordered_response() {
    // The broker answers out of request order; slots must come back in
    // submission order.
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DeleteTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0); // throttle (v1)
                    w.write_array_len(3);
                    w.write_str(Some("B"));
                    w.write_i16(0);
                    w.write_str(Some("A"));
                    w.write_i16(36); // unknown topic or partition
                    w.write_str(Some("C"));
                    w.write_i16(0);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();

    let topics: Vec<_> = ["A", "B", "C"].iter().map(|t| loghub::admin::DeleteTopic::new(t)).collect();
    client.delete_topics(&topics, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::NoError);
    let slots = result.topics().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0].topic(), "A");
    assert_eq!(slots[0].error(), ErrorCode::UnknownTopicOrPartition);
    assert_eq!(
        slots[0].error_string(),
        Some("Broker: Unknown topic or partition")
    );
    assert_eq!(slots[1].topic(), "B");
    assert_eq!(slots[1].error(), ErrorCode::NoError);
    assert_eq!(slots[2].topic(), "C");
    assert_eq!(slots[2].error(), ErrorCode::NoError);
}

fn create_topics_with_op_timeout(operation_timeout: i32) -> AdminResult {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::CreateTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("X"));
                    w.write_i16(7); // request timed out
                    w.write_str(None);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    let topics = vec![NewTopic::new("X", 1, 1).unwrap()];
    let options = AdminOptions::for_api(AdminOp::CreateTopics)
        .operation_timeout(operation_timeout)
        .unwrap();
    client.create_topics(&topics, options, &queue);
    expect_result(&queue)
}

#[test]
fn hidden_timeout_rewritten_to_success() {
    // With no operation timeout the server-side REQUEST_TIMED_OUT only
    // means "still in progress" and is hidden.
    let result = create_topics_with_op_timeout(0);
    let slots = result.topics().unwrap();
    assert_eq!(slots[0].topic(), "X");
    assert_eq!(slots[0].error(), ErrorCode::NoError);
    assert_eq!(slots[0].error_string(), None);
}

#[test]
fn hidden_timeout_preserved_with_operation_timeout() {
    let result = create_topics_with_op_timeout(100);
    let slots = result.topics().unwrap();
    assert_eq!(slots[0].error(), ErrorCode::RequestTimedOut);
}

#[test]
fn deadline_wins_while_waiting_for_controller() {
    init_test_logger();
    // No broker ever comes up; the deadline timer must complete the
    // request, exactly once.
    let transport = MockTransport::silent();
    let client = Client::new(&ClientConfig::new(), transport).unwrap();
    let queue = EventQueue::new();

    let topics = vec![loghub::admin::DeleteTopic::new("Z")];
    let options = AdminOptions::new()
        .request_timeout(Duration::from_millis(50))
        .unwrap();
    client.delete_topics(&topics, options, &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::TimedOut);
    let errstr = result.error_string().unwrap();
    assert!(
        errstr.contains("waiting for controller") || errstr.contains("waiting for broker"),
        "errstr was: {}",
        errstr
    );
    // Exactly one result event.
    assert!(queue.poll(Duration::from_millis(200)).is_none());
}

#[test]
fn deadline_wins_while_waiting_for_response() {
    // The request is transmitted but no reply ever arrives.
    let transport = MockTransport::silent();
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let topics = vec![loghub::admin::DeleteTopic::new("Z")];
    let options = AdminOptions::new()
        .request_timeout(Duration::from_millis(50))
        .unwrap();
    client.delete_topics(&topics, options, &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::TimedOut);
    assert!(result
        .error_string()
        .unwrap()
        .contains("waiting for response from broker"));
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn late_reply_after_deadline_is_dropped() {
    let transport = MockTransport::capturing();
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let topics = vec![loghub::admin::DeleteTopic::new("Z")];
    let options = AdminOptions::new()
        .request_timeout(Duration::from_millis(50))
        .unwrap();
    client.delete_topics(&topics, options, &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::TimedOut);

    // The reply shows up after the request already timed out; it must be
    // discarded without producing a second event.
    let deliveries = transport.take_captured();
    assert_eq!(deliveries.len(), 1);
    for delivery in deliveries {
        let buf = reply_buf(ApiKey::DeleteTopics, 1, 1, |w| {
            w.write_i32(0);
            w.write_array_len(1);
            w.write_str(Some("Z"));
            w.write_i16(0);
        });
        delivery.respond(ErrorCode::NoError, Some(buf));
    }
    assert!(queue.poll(Duration::from_millis(200)).is_none());
}

#[test]
fn describe_configs_routed_to_named_broker() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DescribeConfigs,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0); // throttle
                    w.write_array_len(1);
                    w.write_i16(0); // error code
                    w.write_str(None); // error message
                    w.write_i8(4); // BROKER
                    w.write_str(Some("7"));
                    w.write_i32(0); // no config entries
                },
            )),
        ))
    });
    let client = client_with_controller(Arc::clone(&transport));
    client.cluster().add_broker(7, "broker7:9092/7");
    client.cluster().set_broker_state(7, BrokerState::Up);
    let queue = EventQueue::new();

    let configs = vec![ConfigResource::new(ResourceType::Broker, "7").unwrap()];
    client.describe_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::NoError);
    let resources = result.resources().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].resource_type(), ResourceType::Broker);

    // Routed to broker 7, not the controller (broker 1).
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].broker_id, 7);
}

#[test]
fn duplicate_resource_in_response_is_parse_failure() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::AlterConfigs,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(2);
                    for _ in 0..2 {
                        w.write_i16(0);
                        w.write_str(None);
                        w.write_i8(2); // TOPIC
                        w.write_str(Some("A"));
                    }
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();

    let configs = vec![
        ConfigResource::new(ResourceType::Topic, "A").unwrap(),
        ConfigResource::new(ResourceType::Topic, "B").unwrap(),
    ];
    client.alter_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::BadMessage);
    assert!(result
        .error_string()
        .unwrap()
        .contains("protocol parse failure"));
    assert_eq!(result.resources().unwrap().len(), 0);
}

#[test]
fn response_arity_exceeding_request_is_parse_failure() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::AlterConfigs,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(2); // request only carried one
                    for name in ["A", "A2"] {
                        w.write_i16(0);
                        w.write_str(None);
                        w.write_i8(2);
                        w.write_str(Some(name));
                    }
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();

    let configs = vec![ConfigResource::new(ResourceType::Topic, "A").unwrap()];
    client.alter_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::BadMessage);
}

#[test]
fn multiple_broker_resources_conflict() {
    let transport = MockTransport::silent();
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let configs = vec![
        ConfigResource::new(ResourceType::Broker, "1").unwrap(),
        ConfigResource::new(ResourceType::Broker, "2").unwrap(),
    ];
    client.alter_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::Conflict);
    assert_eq!(result.resources().unwrap().len(), 0);
    // Failed before anything was transmitted.
    assert!(transport.sent().is_empty());
}

#[test]
fn malformed_broker_resource_name_is_invalid_arg() {
    let transport = MockTransport::silent();
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let configs = vec![ConfigResource::new(ResourceType::Broker, "zero").unwrap()];
    client.describe_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::InvalidArgument);
    assert!(transport.sent().is_empty());
}

//
// Decoder details
//

fn describe_configs_at_version(version_cap: Option<i16>) -> AdminResult {
    let transport = MockTransport::with_responder(|broker, request| {
        let v = request.api_version();
        Some((
            ErrorCode::NoError,
            Some(reply_buf(ApiKey::DescribeConfigs, v, broker.id(), |w| {
                w.write_i32(0); // throttle
                w.write_array_len(1);
                w.write_i16(0);
                w.write_str(None);
                w.write_i8(2); // TOPIC
                w.write_str(Some("A"));
                w.write_i32(1); // one config entry
                w.write_str(Some("retention.ms"));
                w.write_str(Some("86400000"));
                w.write_bool(false); // read_only
                if v == 0 {
                    w.write_bool(true); // is_default
                } else {
                    w.write_i8(5); // DEFAULT_CONFIG source
                }
                w.write_bool(false); // sensitive
                if v >= 1 {
                    w.write_array_len(1); // synonyms
                    w.write_str(Some("log.retention.ms"));
                    w.write_str(None);
                    w.write_i8(4); // STATIC_BROKER_CONFIG
                }
            })),
        ))
    });
    let client = client_with_controller(transport);
    if let Some(v) = version_cap {
        client
            .cluster()
            .set_api_version(1, ApiKey::DescribeConfigs, v);
    }
    let queue = EventQueue::new();
    let configs = vec![ConfigResource::new(ResourceType::Topic, "A").unwrap()];
    client.describe_configs(&configs, AdminOptions::new(), &queue);
    expect_result(&queue)
}

#[test]
fn describe_configs_v0_synthesizes_source() {
    let result = describe_configs_at_version(Some(0));
    let resources = result.resources().unwrap();
    let entry = resources[0].get("retention.ms").unwrap();
    assert!(entry.is_default());
    assert_eq!(entry.source(), ConfigSource::Default);
    assert!(entry.synonyms().is_empty());
}

#[test]
fn describe_configs_v1_synthesizes_is_default() {
    let result = describe_configs_at_version(None);
    let resources = result.resources().unwrap();
    let entry = resources[0].get("retention.ms").unwrap();
    assert_eq!(entry.source(), ConfigSource::Default);
    assert!(entry.is_default());
    let synonyms = entry.synonyms();
    assert_eq!(synonyms.len(), 1);
    assert_eq!(synonyms[0].name(), "log.retention.ms");
    assert!(synonyms[0].is_synonym());
    assert_eq!(synonyms[0].source(), ConfigSource::StaticBroker);
}

#[test]
fn unknown_resource_type_is_skipped() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DescribeConfigs,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_i16(0);
                    w.write_str(None);
                    w.write_i8(9); // not a resource type this client knows
                    w.write_str(Some("A"));
                    w.write_i32(1); // entries must still be consumed
                    w.write_str(Some("x"));
                    w.write_str(None);
                    w.write_bool(false);
                    w.write_i8(1);
                    w.write_bool(false);
                    w.write_array_len(0);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    let configs = vec![ConfigResource::new(ResourceType::Topic, "A").unwrap()];
    client.describe_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    // Not a parse failure; the entry simply occupies no slot.
    assert_eq!(result.error(), ErrorCode::NoError);
    assert_eq!(result.resources().unwrap().len(), 0);
}

#[test]
fn unknown_topic_in_response_is_parse_failure() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DeleteTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("other"));
                    w.write_i16(0);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    client.delete_topics(
        &[loghub::admin::DeleteTopic::new("mine")],
        AdminOptions::new(),
        &queue,
    );

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::BadMessage);
}

#[test]
fn empty_element_error_message_gets_canonical_text() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::AlterConfigs,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_i16(35); // invalid config, no message
                    w.write_str(None);
                    w.write_i8(2);
                    w.write_str(Some("A"));
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    let configs = vec![ConfigResource::new(ResourceType::Topic, "A").unwrap()];
    client.alter_configs(&configs, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::NoError);
    let resources = result.resources().unwrap();
    assert_eq!(resources[0].error(), ErrorCode::InvalidConfig);
    assert_eq!(
        resources[0].error_string(),
        Some("Broker: Configuration is invalid")
    );
}

#[test]
fn throttle_hint_forwarded_to_main_queue() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DeleteTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(150); // throttle hint
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    client.delete_topics(
        &[loghub::admin::DeleteTopic::new("A")],
        AdminOptions::new(),
        &queue,
    );

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::NoError);
    match client.events().poll(Duration::from_secs(1)) {
        Some(Event::Throttle {
            broker_id,
            throttle,
        }) => {
            assert_eq!(broker_id, 1);
            assert_eq!(throttle, Duration::from_millis(150));
        }
        other => panic!("expected a throttle event, got {:?}", other),
    }
}

#[test]
fn opaque_round_trips_through_result() {
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DeleteTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();
    let options = AdminOptions::new().opaque(Box::new("cookie-17".to_string()));
    client.delete_topics(&[loghub::admin::DeleteTopic::new("A")], options, &queue);

    let mut result = expect_result(&queue);
    let opaque = result.take_opaque().expect("opaque must round-trip");
    assert_eq!(*opaque.downcast::<String>().unwrap(), "cookie-17");
}

#[test]
fn broker_becomes_usable_after_submission() {
    // The controller connection comes up only after the request is
    // already parked; the broker state change must wake it.
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::DeleteTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                },
            )),
        ))
    });
    init_test_logger();
    let client = Client::new(&ClientConfig::new(), transport).unwrap();
    let queue = EventQueue::new();
    client.delete_topics(
        &[loghub::admin::DeleteTopic::new("A")],
        AdminOptions::new(),
        &queue,
    );

    // Let the request park, then bring the cluster up.
    std::thread::sleep(Duration::from_millis(50));
    assert!(queue.is_empty());
    client.cluster().add_broker(1, "broker1:9092/1");
    client.cluster().set_broker_state(1, BrokerState::Up);
    client.cluster().set_controller(1);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::NoError);
}

#[test]
fn create_partitions_roundtrip() {
    let transport = MockTransport::with_responder(|broker, request| {
        assert_eq!(request.api_key(), ApiKey::CreatePartitions);
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::CreatePartitions,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                    w.write_str(None);
                },
            )),
        ))
    });
    let client = client_with_controller(transport);
    let queue = EventQueue::new();

    let partitions = vec![NewPartitions::new("A", 6)
        .unwrap()
        .set_replica_assignment(0, &[1, 2])
        .unwrap()];
    client.create_partitions(&partitions, AdminOptions::new(), &queue);

    let result = expect_result(&queue);
    assert_eq!(result.op(), AdminOp::CreatePartitions);
    let slots = result.topics().unwrap();
    assert_eq!(slots[0].topic(), "A");
    assert_eq!(slots[0].error(), ErrorCode::NoError);
}

#[test]
fn incremental_alter_configs_rejected_at_encode() {
    let transport = MockTransport::silent();
    let client = client_with_controller(Arc::clone(&transport));
    let queue = EventQueue::new();

    let configs = vec![ConfigResource::new(ResourceType::Topic, "A").unwrap()];
    let options = AdminOptions::for_api(AdminOp::AlterConfigs)
        .incremental(true)
        .unwrap();
    client.alter_configs(&configs, options, &queue);

    let result = expect_result(&queue);
    assert_eq!(result.error(), ErrorCode::UnsupportedFeature);
    assert!(transport.sent().is_empty());
}

//
// Futures facade
//

#[test]
fn admin_client_create_topics_future() {
    init_test_logger();
    let transport = MockTransport::with_responder(|broker, request| {
        Some((
            ErrorCode::NoError,
            Some(reply_buf(
                ApiKey::CreateTopics,
                request.api_version(),
                broker.id(),
                |w| {
                    w.write_i32(0);
                    w.write_array_len(1);
                    w.write_str(Some("A"));
                    w.write_i16(0);
                    w.write_str(None);
                },
            )),
        ))
    });
    let admin = AdminClient::new(&ClientConfig::new(), transport).unwrap();
    admin.inner().cluster().add_broker(1, "broker1:9092/1");
    admin
        .inner()
        .cluster()
        .set_broker_state(1, BrokerState::Up);
    admin.inner().cluster().set_controller(1);

    let topics = vec![NewTopic::new("A", 3, 1).unwrap()];
    let results = futures::executor::block_on(
        admin.create_topics(&topics, &AdminOptions::new()),
    )
    .expect("create topics failed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].topic(), "A");
}

#[test]
fn admin_client_surfaces_request_level_errors() {
    init_test_logger();
    let transport = MockTransport::silent();
    let admin = AdminClient::new(&ClientConfig::new(), transport).unwrap();

    let configs = vec![
        ConfigResource::new(ResourceType::Broker, "1").unwrap(),
        ConfigResource::new(ResourceType::Broker, "2").unwrap(),
    ];
    let err = futures::executor::block_on(
        admin.alter_configs(&configs, &AdminOptions::new()),
    )
    .unwrap_err();
    assert_eq!(err, ClientError::AdminOp(ErrorCode::Conflict));
}

#[test]
fn admin_client_drop_cancels_pending_futures() {
    init_test_logger();
    let transport = MockTransport::silent();
    let admin = AdminClient::new(&ClientConfig::new(), transport).unwrap();

    let topics = vec![NewTopic::new("A", 1, 1).unwrap()];
    let future = admin.create_topics(&topics, &AdminOptions::new());
    drop(admin);

    let err = futures::executor::block_on(future).unwrap_err();
    assert_eq!(err, ClientError::Canceled);
}
