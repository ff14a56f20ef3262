//! Configuration-resource admin APIs: AlterConfigs and DescribeConfigs.

use crate::admin::request::{
    parse_fail, read_throttle, AdminArgs, AdminCodec, AdminRequest, DecodeCtx, DecodeFail,
    EncodeFail,
};
use crate::admin::result::ResultItems;
use crate::broker::{BrokerHandle, BrokerId, CONTROLLER_ID};
use crate::error::{ClientError, ClientResult, ErrorCode};
use crate::log::error;
use crate::protocol::{ApiKey, ReplyBuf, RequestBuf};

/// Entries above this per-config synonym count fail the response parse.
const SYNONYMS_MAX: i32 = 100_000;

/// The type of a configurable resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ResourceType {
    /// Unknown resource type.
    Unknown = 0,
    /// Matches any resource type.
    Any = 1,
    /// A topic.
    Topic = 2,
    /// A consumer group.
    Group = 3,
    /// A broker, named by its decimal broker id.
    Broker = 4,
}

impl ResourceType {
    /// The type's name as used in logs and broker tooling.
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Unknown => "UNKNOWN",
            ResourceType::Any => "ANY",
            ResourceType::Topic => "TOPIC",
            ResourceType::Group => "GROUP",
            ResourceType::Broker => "BROKER",
        }
    }

    pub(crate) fn wire(self) -> i8 {
        self as i8
    }

    pub(crate) fn from_wire(v: i8) -> Option<ResourceType> {
        match v {
            0 => Some(ResourceType::Unknown),
            1 => Some(ResourceType::Any),
            2 => Some(ResourceType::Topic),
            3 => Some(ResourceType::Group),
            4 => Some(ResourceType::Broker),
            _ => None,
        }
    }
}

/// Where a described configuration value comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum ConfigSource {
    /// Source unknown, e.g. an older broker version.
    Unknown = 0,
    /// A dynamic topic configuration.
    DynamicTopic = 1,
    /// A dynamic broker configuration.
    DynamicBroker = 2,
    /// The default dynamic broker configuration.
    DynamicDefaultBroker = 3,
    /// The static broker configuration.
    StaticBroker = 4,
    /// The hardcoded default configuration.
    Default = 5,
}

impl ConfigSource {
    /// The source's name as used in logs and broker tooling.
    pub fn name(self) -> &'static str {
        match self {
            ConfigSource::Unknown => "UNKNOWN_CONFIG",
            ConfigSource::DynamicTopic => "DYNAMIC_TOPIC_CONFIG",
            ConfigSource::DynamicBroker => "DYNAMIC_BROKER_CONFIG",
            ConfigSource::DynamicDefaultBroker => "DYNAMIC_DEFAULT_BROKER_CONFIG",
            ConfigSource::StaticBroker => "STATIC_BROKER_CONFIG",
            ConfigSource::Default => "DEFAULT_CONFIG",
        }
    }

    pub(crate) fn from_wire(v: i8) -> ConfigSource {
        match v {
            1 => ConfigSource::DynamicTopic,
            2 => ConfigSource::DynamicBroker,
            3 => ConfigSource::DynamicDefaultBroker,
            4 => ConfigSource::StaticBroker,
            5 => ConfigSource::Default,
            _ => ConfigSource::Unknown,
        }
    }
}

/// How an AlterConfigs entry manipulates its parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlterOperation {
    /// Add the parameter.
    Add,
    /// Set, overwriting an existing value.
    Set,
    /// Revert the parameter to its default.
    Delete,
}

/// An individual configuration parameter.
#[derive(Clone, Debug)]
pub struct ConfigEntry {
    name: String,
    value: Option<String>,
    operation: AlterOperation,
    source: ConfigSource,
    is_read_only: bool,
    is_default: bool,
    is_sensitive: bool,
    is_synonym: bool,
    synonyms: Vec<ConfigEntry>,
}

impl ConfigEntry {
    pub(crate) fn new(name: &str, value: Option<&str>, operation: AlterOperation) -> ConfigEntry {
        ConfigEntry {
            name: name.to_owned(),
            value: value.map(|v| v.to_owned()),
            operation,
            source: ConfigSource::Unknown,
            is_read_only: false,
            is_default: false,
            is_sensitive: false,
            is_synonym: false,
            synonyms: Vec::new(),
        }
    }

    /// The name of the configuration parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of the configuration parameter, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The source of the configuration parameter.
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Whether the parameter is read only on the broker.
    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    /// Whether the parameter currently has its default value.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Whether the parameter contains sensitive data.
    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive
    }

    /// Whether this entry is a synonym of another entry.
    pub fn is_synonym(&self) -> bool {
        self.is_synonym
    }

    /// The synonyms of this parameter, if the broker reported any.
    pub fn synonyms(&self) -> &[ConfigEntry] {
        &self.synonyms
    }
}

/// A configurable resource: its identity, the entries to apply (requests)
/// or the entries described (results), and the element-level outcome.
#[derive(Clone, Debug)]
pub struct ConfigResource {
    rtype: ResourceType,
    name: String,
    entries: Vec<ConfigEntry>,
    err: ErrorCode,
    errstr: Option<String>,
}

impl ConfigResource {
    /// Creates a new resource identity.
    pub fn new(rtype: ResourceType, name: &str) -> ClientResult<ConfigResource> {
        if name.is_empty() {
            return Err(ClientError::AdminOpCreation(
                "Invalid resource name".into(),
            ));
        }
        Ok(ConfigResource {
            rtype,
            name: name.to_owned(),
            entries: Vec::new(),
            err: ErrorCode::NoError,
            errstr: None,
        })
    }

    fn push_entry(
        mut self,
        name: &str,
        value: Option<&str>,
        operation: AlterOperation,
    ) -> ClientResult<ConfigResource> {
        if name.is_empty() {
            return Err(ClientError::AdminOpCreation(
                "Invalid config name".into(),
            ));
        }
        self.entries.push(ConfigEntry::new(name, value, operation));
        Ok(self)
    }

    /// Adds the configuration parameter `name`.
    pub fn add_config(self, name: &str, value: &str) -> ClientResult<ConfigResource> {
        self.push_entry(name, Some(value), AlterOperation::Add)
    }

    /// Sets the configuration parameter `name`, overwriting any broker-side
    /// value.
    pub fn set_config(self, name: &str, value: &str) -> ClientResult<ConfigResource> {
        self.push_entry(name, Some(value), AlterOperation::Set)
    }

    /// Reverts the configuration parameter `name` to its default.
    pub fn delete_config(self, name: &str) -> ClientResult<ConfigResource> {
        self.push_entry(name, None, AlterOperation::Delete)
    }

    /// The resource type.
    pub fn resource_type(&self) -> ResourceType {
        self.rtype
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resource's configuration entries.
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Searches the configuration entries to find the named parameter.
    pub fn get(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The element-level error code, [`ErrorCode::NoError`] on success.
    pub fn error(&self) -> ErrorCode {
        self.err
    }

    /// A human readable description of the element-level error, if any.
    pub fn error_string(&self) -> Option<&str> {
        if !self.err.is_error() {
            return None;
        }
        match self.errstr.as_deref() {
            Some(s) => Some(s),
            None => Some(self.err.description()),
        }
    }
}

/// Scans request resources for the BROKER-addressed variant.
///
/// No BROKER resource routes to the controller; exactly one routes to that
/// broker; more than one is a conflict.
pub(crate) fn single_broker_id(configs: &[ConfigResource]) -> Result<BrokerId, (ErrorCode, String)> {
    let mut broker_id = CONTROLLER_ID;
    for config in configs {
        if config.rtype != ResourceType::Broker {
            continue;
        }
        if broker_id != CONTROLLER_ID {
            return Err((
                ErrorCode::Conflict,
                "Only one ConfigResource of type BROKER is allowed per call".into(),
            ));
        }
        broker_id = match config.name.parse::<BrokerId>() {
            Ok(id) if id >= 0 => id,
            _ => {
                return Err((
                    ErrorCode::InvalidArgument,
                    format!(
                        "Expected an int32 broker id for \
                         ConfigResource(type=BROKER, name={})",
                        config.name
                    ),
                ))
            }
        };
        // Keep scanning to catch duplicate BROKER resources.
    }
    Ok(broker_id)
}

//
// Request encoders
//

fn encode_alter_configs(
    broker: &BrokerHandle,
    args: &AdminArgs,
    req: &AdminRequest,
) -> Result<RequestBuf, EncodeFail> {
    let AdminArgs::ConfigResources(configs) = args else {
        return Err((ErrorCode::Fail, "argument type mismatch".into()));
    };
    if req.options.is_incremental() {
        return Err((
            ErrorCode::UnsupportedFeature,
            "Incremental AlterConfigs is not yet supported".into(),
        ));
    }
    let version = broker.api_version(ApiKey::AlterConfigs);
    let mut buf = RequestBuf::new(ApiKey::AlterConfigs, version);
    buf.write_array_len(configs.len());
    for config in configs {
        buf.write_i8(config.rtype.wire());
        buf.write_str(Some(&config.name));
        buf.write_array_len(config.entries.len());
        for entry in &config.entries {
            buf.write_str(Some(entry.name()));
            // A deleted parameter travels as a null value.
            match entry.operation {
                AlterOperation::Delete => buf.write_str(None),
                _ => buf.write_str(entry.value()),
            }
        }
    }
    buf.write_bool(req.options.is_validate_only());
    Ok(buf)
}

fn encode_describe_configs(
    broker: &BrokerHandle,
    args: &AdminArgs,
    _req: &AdminRequest,
) -> Result<RequestBuf, EncodeFail> {
    let AdminArgs::ConfigResources(configs) = args else {
        return Err((ErrorCode::Fail, "argument type mismatch".into()));
    };
    let version = broker.api_version(ApiKey::DescribeConfigs);
    let mut buf = RequestBuf::new(ApiKey::DescribeConfigs, version);
    buf.write_array_len(configs.len());
    for config in configs {
        buf.write_i8(config.rtype.wire());
        buf.write_str(Some(&config.name));
        // Null config-name filter: describe every parameter.
        buf.write_i32(-1);
    }
    if version >= 1 {
        buf.write_bool(true); // include_synonyms
    }
    Ok(buf)
}

//
// Response decoders
//

struct ResourceHeader {
    rtype_raw: i8,
    name: String,
    err: ErrorCode,
    errstr: Option<String>,
}

fn read_resource_header(api: ApiKey, reply: &mut ReplyBuf) -> Result<ResourceHeader, DecodeFail> {
    let error_code = reply
        .read_i16()
        .map_err(|e| parse_fail(api, format!("reading resource error code: {}", e)))?;
    let error_msg = reply
        .read_str()
        .map_err(|e| parse_fail(api, format!("reading resource error message: {}", e)))?;
    let rtype_raw = reply
        .read_i8()
        .map_err(|e| parse_fail(api, format!("reading resource type: {}", e)))?;
    let name = reply
        .read_required_str()
        .map_err(|e| parse_fail(api, format!("reading resource name: {}", e)))?;

    let err = ErrorCode::from_wire(error_code);
    let errstr = if err.is_error() {
        match error_msg {
            Some(ref m) if !m.is_empty() => Some(m.clone()),
            _ => Some(err.description().to_owned()),
        }
    } else {
        None
    };
    Ok(ResourceHeader {
        rtype_raw,
        name,
        err,
        errstr,
    })
}

/// Reads and bounds-checks the response's resource count.
fn read_resource_count(
    api: ApiKey,
    req: &AdminRequest,
    reply: &mut ReplyBuf,
) -> Result<usize, DecodeFail> {
    let res_cnt = reply
        .read_i32()
        .map_err(|e| parse_fail(api, format!("reading resource count: {}", e)))?;
    let requested = req.args.len();
    if res_cnt < 0 || res_cnt as usize > requested {
        return Err(parse_fail(
            api,
            format!(
                "Received {} ConfigResources in response when only {} were requested",
                res_cnt, requested
            ),
        ));
    }
    Ok(res_cnt as usize)
}

/// Inserts a decoded resource at the position it had in the request.
fn slot_resource(
    api: ApiKey,
    req: &AdminRequest,
    slots: &mut [Option<ConfigResource>],
    resource: ConfigResource,
) -> Result<(), DecodeFail> {
    let orig_pos = match req.args.resource_index(resource.rtype, &resource.name) {
        Some(pos) => pos,
        None => {
            return Err(parse_fail(
                api,
                format!(
                    "Broker returned ConfigResource {},{} that was not included \
                     in the original request",
                    resource.rtype.name(),
                    resource.name
                ),
            ))
        }
    };
    if slots[orig_pos].is_some() {
        return Err(parse_fail(
            api,
            format!(
                "Broker returned ConfigResource {},{} multiple times",
                resource.rtype.name(),
                resource.name
            ),
        ));
    }
    slots[orig_pos] = Some(resource);
    Ok(())
}

fn decode_alter_configs(
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<ResultItems, DecodeFail> {
    let api = ApiKey::AlterConfigs;
    read_throttle(api, reply, ctx)?;

    let requested = req.args.len();
    let mut slots: Vec<Option<ConfigResource>> = (0..requested).map(|_| None).collect();
    let count = read_resource_count(api, req, reply)?;
    for i in 0..count {
        let header = read_resource_header(api, reply)?;
        let Some(rtype) = ResourceType::from_wire(header.rtype_raw) else {
            error!(
                "AlterConfigs returned unsupported ConfigResource #{} with \
                 type {} and name \"{}\": ignoring",
                i, header.rtype_raw, header.name
            );
            continue;
        };
        let resource = ConfigResource {
            rtype,
            name: header.name,
            entries: Vec::new(),
            err: header.err,
            errstr: header.errstr,
        };
        slot_resource(api, req, &mut slots, resource)?;
    }
    Ok(ResultItems::Resources(slots.into_iter().flatten().collect()))
}

fn read_config_entry(api: ApiKey, reply: &mut ReplyBuf) -> Result<ConfigEntry, DecodeFail> {
    let name = reply
        .read_required_str()
        .map_err(|e| parse_fail(api, format!("reading config name: {}", e)))?;
    let value = reply
        .read_str()
        .map_err(|e| parse_fail(api, format!("reading config value: {}", e)))?;
    let mut entry = ConfigEntry::new(&name, value.as_deref(), AlterOperation::Set);

    entry.is_read_only = reply
        .read_bool()
        .map_err(|e| parse_fail(api, format!("reading read_only flag: {}", e)))?;

    // Version 0 carries an is_default flag where version 1 carries the
    // config source; synthesize the missing field so both look the same
    // to the caller.
    if reply.api_version() == 0 {
        entry.is_default = reply
            .read_bool()
            .map_err(|e| parse_fail(api, format!("reading is_default flag: {}", e)))?;
        if entry.is_default {
            entry.source = ConfigSource::Default;
        }
    } else {
        let source = reply
            .read_i8()
            .map_err(|e| parse_fail(api, format!("reading config source: {}", e)))?;
        entry.source = ConfigSource::from_wire(source);
        if entry.source == ConfigSource::Default {
            entry.is_default = true;
        }
    }

    entry.is_sensitive = reply
        .read_bool()
        .map_err(|e| parse_fail(api, format!("reading is_sensitive flag: {}", e)))?;

    if reply.api_version() >= 1 {
        let syn_cnt = reply
            .read_i32()
            .map_err(|e| parse_fail(api, format!("reading synonym count: {}", e)))?;
        if syn_cnt > SYNONYMS_MAX {
            return Err(parse_fail(
                api,
                format!(
                    "Broker returned {} config synonyms for entry {}: limit is {}",
                    syn_cnt, name, SYNONYMS_MAX
                ),
            ));
        }
        for _ in 0..syn_cnt.max(0) {
            let syn_name = reply
                .read_required_str()
                .map_err(|e| parse_fail(api, format!("reading synonym name: {}", e)))?;
            let syn_value = reply
                .read_str()
                .map_err(|e| parse_fail(api, format!("reading synonym value: {}", e)))?;
            let syn_source = reply
                .read_i8()
                .map_err(|e| parse_fail(api, format!("reading synonym source: {}", e)))?;
            let mut synonym =
                ConfigEntry::new(&syn_name, syn_value.as_deref(), AlterOperation::Set);
            synonym.source = ConfigSource::from_wire(syn_source);
            synonym.is_synonym = true;
            entry.synonyms.push(synonym);
        }
    }

    Ok(entry)
}

fn decode_describe_configs(
    req: &AdminRequest,
    reply: &mut ReplyBuf,
    ctx: &DecodeCtx,
) -> Result<ResultItems, DecodeFail> {
    let api = ApiKey::DescribeConfigs;
    read_throttle(api, reply, ctx)?;

    let requested = req.args.len();
    let mut slots: Vec<Option<ConfigResource>> = (0..requested).map(|_| None).collect();
    let count = read_resource_count(api, req, reply)?;
    for i in 0..count {
        let header = read_resource_header(api, reply)?;

        let entry_cnt = reply
            .read_i32()
            .map_err(|e| parse_fail(api, format!("reading config entry count: {}", e)))?;
        let mut entries = Vec::with_capacity(entry_cnt.max(0) as usize);
        for _ in 0..entry_cnt.max(0) {
            entries.push(read_config_entry(api, reply)?);
        }

        // The entries above must be consumed even when the resource type
        // is unknown, or the rest of the buffer misparses.
        let Some(rtype) = ResourceType::from_wire(header.rtype_raw) else {
            error!(
                "DescribeConfigs returned unsupported ConfigResource #{} with \
                 type {} and name \"{}\": ignoring",
                i, header.rtype_raw, header.name
            );
            continue;
        };
        let resource = ConfigResource {
            rtype,
            name: header.name,
            entries,
            err: header.err,
            errstr: header.errstr,
        };
        slot_resource(api, req, &mut slots, resource)?;
    }
    Ok(ResultItems::Resources(slots.into_iter().flatten().collect()))
}

pub(crate) static ALTER_CONFIGS_CODEC: AdminCodec = AdminCodec {
    encode: encode_alter_configs,
    decode: decode_alter_configs,
};

pub(crate) static DESCRIBE_CONFIGS_CODEC: AdminCodec = AdminCodec {
    encode: encode_describe_configs,
    decode: decode_describe_configs,
};
