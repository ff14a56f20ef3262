//! Client configuration.
//!
//! Parameters are set as strings and validated eagerly: unknown names and
//! out-of-range values are rejected by [`ClientConfig::set`] rather than
//! surfacing later inside the engine. Reads through [`ClientConfig::get`]
//! see the built-in default for any parameter the application did not
//! override.
//!
//! ### Recognized parameters
//!
//! - `client.id`: Client identifier, used in diagnostics. Default:
//!   `loghub`.
//! - `bootstrap.servers`: Initial list of brokers as a CSV list of broker
//!    host or host:port. Default: empty.
//! - `socket.timeout.ms`: Default timeout for requests, including admin
//!    requests that do not carry an explicit request timeout. Range
//!    10..=300000. Default: 60000.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::log::{log_enabled, DEBUG, INFO, WARN};

/// The verbosity of the client's own diagnostics, in syslog order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClientLogLevel {
    /// Failures only.
    Error = 3,
    /// Failures and conditions worth an operator's attention.
    Warning = 4,
    /// Request lifecycle summaries.
    Info = 6,
    /// Every engine step, including worker state transitions.
    Debug = 7,
}

impl ClientLogLevel {
    /// The most verbose level the globally installed logger currently
    /// accepts for this crate's log target.
    fn from_logger() -> ClientLogLevel {
        if log_enabled!(target: "loghub", DEBUG) {
            return ClientLogLevel::Debug;
        }
        if log_enabled!(target: "loghub", INFO) {
            return ClientLogLevel::Info;
        }
        if log_enabled!(target: "loghub", WARN) {
            return ClientLogLevel::Warning;
        }
        ClientLogLevel::Error
    }
}

/// `socket.timeout.ms` bounds, in milliseconds.
const SOCKET_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 10..=300_000;

/// The built-in default for `key`, if the parameter has one.
fn default_for(key: &str) -> Option<&'static str> {
    match key {
        "client.id" => Some("loghub"),
        "socket.timeout.ms" => Some("60000"),
        _ => None,
    }
}

/// Checks `value` against the constraints of the parameter named `key`.
///
/// `Err` carries the reason string for the rejected pair.
fn validate(key: &str, value: &str) -> Result<(), &'static str> {
    match key {
        "client.id" | "bootstrap.servers" => Ok(()),
        "socket.timeout.ms" => match value.parse::<u64>() {
            Ok(ms) if SOCKET_TIMEOUT_RANGE_MS.contains(&ms) => Ok(()),
            _ => Err("Invalid configuration value"),
        },
        _ => Err("Unknown configuration name"),
    }
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    overrides: HashMap<String, String>,
    /// The verbosity of the client's own diagnostics. Initialized from
    /// whatever the globally installed logger accepts; applications may
    /// lower it afterwards.
    pub log_level: ClientLogLevel,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Creates a configuration holding only the built-in defaults.
    pub fn new() -> ClientConfig {
        ClientConfig {
            overrides: HashMap::new(),
            log_level: ClientLogLevel::from_logger(),
        }
    }

    /// Sets a parameter, replacing any earlier value.
    ///
    /// Fails with [`ClientError::ClientConfig`] when the name is not a
    /// recognized parameter or the value is out of range; the
    /// configuration is left untouched in that case.
    pub fn set<K, V>(&mut self, key: K, value: V) -> ClientResult<&mut ClientConfig>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let (key, value) = (key.into(), value.into());
        if let Err(desc) = validate(&key, &value) {
            return Err(ClientError::ClientConfig(desc.into(), key, value));
        }
        self.overrides.insert(key, value);
        Ok(self)
    }

    /// The effective value of a parameter: the value the application set,
    /// or the built-in default. `None` for parameters without a default
    /// that were never set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(key)
            .map(String::as_str)
            .or_else(|| default_for(key))
    }

    /// The effective value of `key`, parsed into `T`.
    pub(crate) fn get_parsed<T: FromStr>(&self, key: &str) -> ClientResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                ClientError::ClientConfig(
                    "Invalid configuration value".into(),
                    key.into(),
                    value.into(),
                )
            }),
        }
    }

    /// The default in-engine deadline for admin requests that do not
    /// carry an explicit request timeout.
    pub(crate) fn admin_request_timeout(&self) -> ClientResult<Duration> {
        let ms = self
            .get_parsed::<u64>("socket.timeout.ms")?
            .unwrap_or(60_000);
        Ok(Duration::from_millis(ms))
    }
}
