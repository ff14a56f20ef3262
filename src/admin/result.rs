//! Typed admin result events.

use std::any::Any;
use std::fmt;

use crate::admin::configs::ConfigResource;
use crate::admin::topics::TopicResult;
use crate::admin::AdminOp;
use crate::error::ErrorCode;

/// A caller-supplied cookie, handed back untouched in the result.
pub type Opaque = Box<dyn Any + Send + 'static>;

/// The ordered per-element outcomes of an admin request.
#[derive(Debug)]
pub(crate) enum ResultItems {
    /// Per-topic outcomes (CreateTopics, DeleteTopics, CreatePartitions).
    Topics(Vec<TopicResult>),
    /// Per-resource outcomes (AlterConfigs, DescribeConfigs).
    Resources(Vec<ConfigResource>),
}

impl ResultItems {
    pub(crate) fn empty_for(op: AdminOp) -> ResultItems {
        match op {
            AdminOp::CreateTopics | AdminOp::DeleteTopics | AdminOp::CreatePartitions => {
                ResultItems::Topics(Vec::new())
            }
            AdminOp::AlterConfigs | AdminOp::DescribeConfigs => {
                ResultItems::Resources(Vec::new())
            }
        }
    }
}

/// The outcome of one admin request.
///
/// Carries the request-level error, if any, and the per-element results in
/// the same order the inputs were submitted. Element results live as long
/// as this event.
pub struct AdminResult {
    op: AdminOp,
    err: ErrorCode,
    errstr: Option<String>,
    opaque: Option<Opaque>,
    items: ResultItems,
}

impl AdminResult {
    pub(crate) fn new(
        op: AdminOp,
        err: ErrorCode,
        errstr: Option<String>,
        opaque: Option<Opaque>,
        items: ResultItems,
    ) -> AdminResult {
        AdminResult {
            op,
            err,
            errstr,
            opaque,
            items,
        }
    }

    /// The admin API this result answers.
    pub fn op(&self) -> AdminOp {
        self.op
    }

    /// The request-level error code; element-level errors do not show up
    /// here.
    pub fn error(&self) -> ErrorCode {
        self.err
    }

    /// A human readable description of the request-level error, if any.
    pub fn error_string(&self) -> Option<&str> {
        self.errstr.as_deref()
    }

    /// The per-topic results, if this is a topic-shaped result
    /// (CreateTopics, DeleteTopics, CreatePartitions).
    pub fn topics(&self) -> Option<&[TopicResult]> {
        match &self.items {
            ResultItems::Topics(t) => Some(t),
            ResultItems::Resources(_) => None,
        }
    }

    /// The per-resource results, if this is a config-shaped result
    /// (AlterConfigs, DescribeConfigs).
    pub fn resources(&self) -> Option<&[ConfigResource]> {
        match &self.items {
            ResultItems::Resources(r) => Some(r),
            ResultItems::Topics(_) => None,
        }
    }

    /// Consumes the result, returning the per-topic results.
    pub fn into_topics(self) -> Option<Vec<TopicResult>> {
        match self.items {
            ResultItems::Topics(t) => Some(t),
            ResultItems::Resources(_) => None,
        }
    }

    /// Consumes the result, returning the per-resource results.
    pub fn into_resources(self) -> Option<Vec<ConfigResource>> {
        match self.items {
            ResultItems::Resources(r) => Some(r),
            ResultItems::Topics(_) => None,
        }
    }

    /// Takes the opaque set in the request's options, if any.
    pub fn take_opaque(&mut self) -> Option<Opaque> {
        self.opaque.take()
    }
}

impl fmt::Debug for AdminResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AdminResult")
            .field("op", &self.op)
            .field("err", &self.err)
            .field("errstr", &self.errstr)
            .field("opaque", &self.opaque.as_ref().map(|_| "..."))
            .field("items", &self.items)
            .finish()
    }
}
