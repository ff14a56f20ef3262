//! Error manipulations.

use std::{error, fmt};

use crate::admin::AdminOp;

/// Client result.
pub type ClientResult<T> = Result<T, ClientError>;

/// An error code, as reported by a broker or raised locally by the client.
///
/// Codes at or above zero travel on the wire; negative codes are
/// client-local and never leave the process. The broker-side code space is
/// split into generic request errors (`1..=9`) and topic/config management
/// errors (`30..=39`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ErrorCode {
    /// Operation completed successfully.
    NoError = 0,

    /// Local: reply did not match the request structure.
    BadMessage = -1,
    /// Local: handle is being destroyed, in-flight work is dropped silently.
    Destroy = -2,
    /// Local: generic failure.
    Fail = -3,
    /// Local: broker transport failure.
    Transport = -4,
    /// Local: invalid argument or configuration.
    InvalidArgument = -5,
    /// Local: the request deadline elapsed.
    TimedOut = -6,
    /// Local: conflicting use of an API.
    Conflict = -7,
    /// Local: feature not supported by the target broker.
    UnsupportedFeature = -8,

    /// Broker: unexpected server-side error.
    UnknownServerError = 1,
    /// Broker: message failed its integrity check.
    CorruptMessage = 2,
    /// Broker: leader election in progress.
    LeaderNotAvailable = 5,
    /// Broker: this member no longer leads the partition.
    NotLeaderForPartition = 6,
    /// Broker: the server-side operation timed out.
    RequestTimedOut = 7,
    /// Broker: broker is not available.
    BrokerNotAvailable = 8,

    /// Broker: topic name is malformed or reserved.
    InvalidTopic = 30,
    /// Broker: topic already exists.
    TopicAlreadyExists = 31,
    /// Broker: invalid partition count.
    InvalidPartitions = 32,
    /// Broker: invalid replication factor.
    InvalidReplicationFactor = 33,
    /// Broker: invalid replica assignment.
    InvalidReplicaAssignment = 34,
    /// Broker: invalid configuration value.
    InvalidConfig = 35,
    /// Broker: topic or partition does not exist on this cluster.
    UnknownTopicOrPartition = 36,
    /// Broker: this member is not the cluster controller.
    NotController = 37,
    /// Broker: request rejected by a server-side policy.
    PolicyViolation = 38,
    /// Broker: request was malformed or out of spec.
    InvalidRequest = 39,
}

impl ErrorCode {
    /// Reports whether the code represents an error condition.
    pub fn is_error(self) -> bool {
        self != ErrorCode::NoError
    }

    /// Maps a wire error code to an `ErrorCode`.
    ///
    /// Codes this client does not recognize collapse into
    /// [`ErrorCode::UnknownServerError`].
    pub fn from_wire(code: i16) -> ErrorCode {
        match code {
            0 => ErrorCode::NoError,
            1 => ErrorCode::UnknownServerError,
            2 => ErrorCode::CorruptMessage,
            5 => ErrorCode::LeaderNotAvailable,
            6 => ErrorCode::NotLeaderForPartition,
            7 => ErrorCode::RequestTimedOut,
            8 => ErrorCode::BrokerNotAvailable,
            30 => ErrorCode::InvalidTopic,
            31 => ErrorCode::TopicAlreadyExists,
            32 => ErrorCode::InvalidPartitions,
            33 => ErrorCode::InvalidReplicationFactor,
            34 => ErrorCode::InvalidReplicaAssignment,
            35 => ErrorCode::InvalidConfig,
            36 => ErrorCode::UnknownTopicOrPartition,
            37 => ErrorCode::NotController,
            38 => ErrorCode::PolicyViolation,
            39 => ErrorCode::InvalidRequest,
            _ => ErrorCode::UnknownServerError,
        }
    }

    /// The canonical human-readable description of the code.
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::NoError => "Success",
            ErrorCode::BadMessage => "Local: Bad message format",
            ErrorCode::Destroy => "Local: Handle destroyed",
            ErrorCode::Fail => "Local: Communication failure",
            ErrorCode::Transport => "Local: Broker transport failure",
            ErrorCode::InvalidArgument => "Local: Invalid argument or configuration",
            ErrorCode::TimedOut => "Local: Timed out",
            ErrorCode::Conflict => "Local: Conflicting use",
            ErrorCode::UnsupportedFeature => "Local: Required feature not supported by broker",
            ErrorCode::UnknownServerError => "Broker: Unknown error",
            ErrorCode::CorruptMessage => "Broker: Corrupt message",
            ErrorCode::LeaderNotAvailable => "Broker: Leader not available",
            ErrorCode::NotLeaderForPartition => "Broker: Not leader for partition",
            ErrorCode::RequestTimedOut => "Broker: Request timed out",
            ErrorCode::BrokerNotAvailable => "Broker: Broker not available",
            ErrorCode::InvalidTopic => "Broker: Invalid topic",
            ErrorCode::TopicAlreadyExists => "Broker: Topic already exists",
            ErrorCode::InvalidPartitions => "Broker: Invalid number of partitions",
            ErrorCode::InvalidReplicationFactor => "Broker: Invalid replication factor",
            ErrorCode::InvalidReplicaAssignment => "Broker: Invalid replica assignment",
            ErrorCode::InvalidConfig => "Broker: Configuration is invalid",
            ErrorCode::UnknownTopicOrPartition => "Broker: Unknown topic or partition",
            ErrorCode::NotController => "Broker: Not controller for cluster",
            ErrorCode::PolicyViolation => "Broker: Policy violation",
            ErrorCode::InvalidRequest => "Broker: Invalid request",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl error::Error for ErrorCode {}

/// Represents all possible client errors.
///
/// If applicable, check the underlying [`ErrorCode`] to get details.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Creation of an admin operation failed.
    AdminOpCreation(String),
    /// The admin operation itself failed.
    AdminOp(ErrorCode),
    /// The client was dropped before the operation completed.
    Canceled,
    /// Invalid client configuration.
    ClientConfig(String, String, String),
    /// An admin option was set on an API call that does not support it.
    UnsupportedOption {
        /// The rejected option.
        option: &'static str,
        /// The API the option bag was created for.
        api: AdminOp,
    },
}

impl fmt::Debug for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ClientError::AdminOp(err) => write!(f, "ClientError (Admin operation error: {})", err),
            ClientError::AdminOpCreation(ref err) => {
                write!(f, "ClientError (Admin operation creation error: {})", err)
            }
            ClientError::Canceled => write!(f, "ClientError (Client dropped)"),
            ClientError::ClientConfig(ref desc, ref key, ref value) => write!(
                f,
                "ClientError (Client config error: {} {} {})",
                desc, key, value
            ),
            ClientError::UnsupportedOption { option, api } => {
                write!(
                    f,
                    "ClientError (Admin option \"{}\" not supported by {})",
                    option, api
                )
            }
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ClientError::AdminOp(err) => write!(f, "Admin operation error: {}", err),
            ClientError::AdminOpCreation(ref err) => {
                write!(f, "Admin operation creation error: {}", err)
            }
            ClientError::Canceled => write!(f, "Client dropped"),
            ClientError::ClientConfig(ref desc, ref key, ref value) => {
                write!(f, "Client config error: {} {} {}", desc, key, value)
            }
            ClientError::UnsupportedOption { option, api } => {
                write!(f, "Admin option \"{}\" not supported by {}", option, api)
            }
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ClientError::AdminOp(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire_roundtrip() {
        assert_eq!(ErrorCode::from_wire(0), ErrorCode::NoError);
        assert_eq!(ErrorCode::from_wire(7), ErrorCode::RequestTimedOut);
        assert_eq!(ErrorCode::from_wire(36), ErrorCode::UnknownTopicOrPartition);
        // Unrecognized codes collapse into the generic server error.
        assert_eq!(ErrorCode::from_wire(12345), ErrorCode::UnknownServerError);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(ErrorCode::TimedOut.to_string(), "Local: Timed out");
        assert!(ErrorCode::UnknownTopicOrPartition
            .to_string()
            .starts_with("Broker:"));
        assert!(!ErrorCode::NoError.is_error());
        assert!(ErrorCode::Conflict.is_error());
    }
}
