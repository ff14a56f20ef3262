//! Wire-level building blocks shared by the admin request encoders and
//! response decoders.
//!
//! The frame-level codec (length prefixes, correlation ids, connection
//! handshakes) belongs to the transport; this module only deals with the
//! typed body of a request or reply. All integers are big-endian; strings
//! are i16-length-prefixed with -1 denoting null; arrays are i32-count
//! prefixed; booleans are a single i8.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::broker::BrokerId;

/// Identifies an admin API on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ApiKey {
    /// CreateTopics request/response.
    CreateTopics = 10,
    /// DeleteTopics request/response.
    DeleteTopics = 11,
    /// CreatePartitions request/response.
    CreatePartitions = 12,
    /// AlterConfigs request/response.
    AlterConfigs = 13,
    /// DescribeConfigs request/response.
    DescribeConfigs = 14,
}

impl ApiKey {
    /// The API's name as it appears on the wire specification.
    pub fn name(self) -> &'static str {
        match self {
            ApiKey::CreateTopics => "CreateTopics",
            ApiKey::DeleteTopics => "DeleteTopics",
            ApiKey::CreatePartitions => "CreatePartitions",
            ApiKey::AlterConfigs => "AlterConfigs",
            ApiKey::DescribeConfigs => "DescribeConfigs",
        }
    }

    /// The newest request version this client can produce.
    pub fn max_version(self) -> i16 {
        match self {
            ApiKey::CreateTopics => 2,
            ApiKey::DeleteTopics => 1,
            ApiKey::CreatePartitions => 0,
            ApiKey::AlterConfigs => 0,
            ApiKey::DescribeConfigs => 1,
        }
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A serialized request body, ready to be framed and transmitted by a
/// transport.
#[derive(Debug)]
pub struct RequestBuf {
    api_key: ApiKey,
    api_version: i16,
    body: BytesMut,
}

impl RequestBuf {
    /// Creates an empty request body for the given API and version.
    pub fn new(api_key: ApiKey, api_version: i16) -> RequestBuf {
        RequestBuf {
            api_key,
            api_version,
            body: BytesMut::new(),
        }
    }

    /// The API this request belongs to.
    pub fn api_key(&self) -> ApiKey {
        self.api_key
    }

    /// The request version the body was encoded at.
    pub fn api_version(&self) -> i16 {
        self.api_version
    }

    /// Appends a single byte integer.
    pub fn write_i8(&mut self, v: i8) {
        self.body.put_i8(v);
    }

    /// Appends a two byte integer.
    pub fn write_i16(&mut self, v: i16) {
        self.body.put_i16(v);
    }

    /// Appends a four byte integer.
    pub fn write_i32(&mut self, v: i32) {
        self.body.put_i32(v);
    }

    /// Appends a boolean as a single byte.
    pub fn write_bool(&mut self, v: bool) {
        self.body.put_i8(v as i8);
    }

    /// Appends a nullable, length-prefixed string. Strings longer than the
    /// i16 length prefix allows are truncated.
    pub fn write_str(&mut self, v: Option<&str>) {
        match v {
            None => self.body.put_i16(-1),
            Some(s) => {
                let len = s.len().min(i16::MAX as usize);
                self.body.put_i16(len as i16);
                self.body.put_slice(&s.as_bytes()[..len]);
            }
        }
    }

    /// Appends an array count prefix.
    pub fn write_array_len(&mut self, len: usize) {
        self.body.put_i32(len.min(i32::MAX as usize) as i32);
    }

    /// Consumes the request and returns the raw body.
    pub fn into_body(self) -> Bytes {
        self.body.freeze()
    }
}

/// A reply body handed back by a transport, positioned at the first byte
/// after the response header.
#[derive(Debug)]
pub struct ReplyBuf {
    api_key: ApiKey,
    api_version: i16,
    broker_id: BrokerId,
    body: Bytes,
}

impl ReplyBuf {
    /// Wraps a raw reply body.
    ///
    /// `api_version` is the version the matching request was sent at;
    /// decoders dispatch field layout on it.
    pub fn new(api_key: ApiKey, api_version: i16, broker_id: BrokerId, body: Bytes) -> ReplyBuf {
        ReplyBuf {
            api_key,
            api_version,
            broker_id,
            body,
        }
    }

    /// The API this reply belongs to.
    pub fn api_key(&self) -> ApiKey {
        self.api_key
    }

    /// The version of the reply layout.
    pub fn api_version(&self) -> i16 {
        self.api_version
    }

    /// The id of the broker that produced the reply.
    pub fn broker_id(&self) -> BrokerId {
        self.broker_id
    }

    fn check(&self, wanted: usize) -> Result<(), WireError> {
        if self.body.remaining() < wanted {
            Err(WireError::Underflow {
                wanted,
                left: self.body.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Reads a single byte integer.
    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        self.check(1)?;
        Ok(self.body.get_i8())
    }

    /// Reads a two byte integer.
    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        self.check(2)?;
        Ok(self.body.get_i16())
    }

    /// Reads a four byte integer.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.check(4)?;
        Ok(self.body.get_i32())
    }

    /// Reads a boolean encoded as a single byte.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_i8()? != 0)
    }

    /// Reads a nullable, length-prefixed string.
    pub fn read_str(&mut self) -> Result<Option<String>, WireError> {
        let len = self.read_i16()?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        self.check(len)?;
        let raw = self.body.split_to(len);
        match std::str::from_utf8(&raw) {
            Ok(s) => Ok(Some(s.to_owned())),
            Err(_) => Err(WireError::BadUtf8),
        }
    }

    /// Reads a string that must be present on the wire.
    pub fn read_required_str(&mut self) -> Result<String, WireError> {
        self.read_str()?.ok_or(WireError::NullString)
    }
}

/// A malformed wire buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before the field did.
    Underflow {
        /// Bytes the read wanted.
        wanted: usize,
        /// Bytes left in the buffer.
        left: usize,
    },
    /// A string field was not valid UTF-8.
    BadUtf8,
    /// A null string where the protocol requires a value.
    NullString,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireError::Underflow { wanted, left } => {
                write!(f, "buffer underflow: wanted {} bytes, {} left", wanted, left)
            }
            WireError::BadUtf8 => write!(f, "string field is not valid UTF-8"),
            WireError::NullString => write!(f, "unexpected null string"),
        }
    }
}

impl std::error::Error for WireError {}
