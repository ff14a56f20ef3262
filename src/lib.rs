//! # loghub
//!
//! A fully asynchronous client library for LogHub, a distributed
//! partitioned-log broker cluster.
//!
//! ## The library
//!
//! This crate implements the administrative side of the client: creating
//! and deleting topics, growing partition counts, and describing or
//! altering configuration resources. Every API is non-blocking; requests
//! are driven to completion by a dedicated driver thread and results are
//! delivered as typed events on an application-owned queue, or through
//! futures when using the [`AdminClient`](admin::AdminClient) facade.
//!
//! The pieces a full deployment plugs in, the socket-level transport and
//! the metadata layer that keeps the broker directory current, are
//! narrow traits on purpose, so the engine can be exercised end to end
//! without a live cluster.
//!
//! ### Features
//!
//! - Batched admin operations with per-element results, reassembled into
//!   submission order regardless of broker response order.
//! - Per-request absolute deadlines raced against broker lookups and
//!   responses, with exactly one result event per submission.
//! - Broker-addressed configuration requests (`ConfigResource` of type
//!   `BROKER`) routed past the controller.
//! - Wire-version aware response decoding, including the v0/v1
//!   DescribeConfigs `is_default`/`source` conversion.
//!
//! ## Debugging
//!
//! The crate logs through the `log` facade (or `tracing` with the
//! `tracing` feature). Use `RUST_LOG="loghub=trace"` together with
//! `env_logger::init()` or equivalent in your application to see the
//! driver's state transitions.

#![warn(missing_docs)]

pub mod admin;
pub mod broker;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod util;

mod enq_once;
mod log;
mod timer;

// Re-exports.
pub use crate::broker::{Broker, BrokerHandle, BrokerId, BrokerState, Cluster, Transport};
pub use crate::client::Client;
pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, ClientResult, ErrorCode};
pub use crate::events::{Event, EventQueue};
pub use crate::util::Timeout;
