//! Core identifiers and small closed enums shared across the crate.

use std::fmt;

/// Uniquely identifies a trace (the set of spans sharing a causal root).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u64);

impl TraceId {
    /// The reserved "no parent" value. Never issued by [`dd_trace_ids::IdGenerator`].
    pub const NONE: TraceId = TraceId(0);

    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        TraceId(id)
    }

    /// Returns the raw `u64` value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for the reserved zero value, treated as "no parent" for wire
    /// compatibility with the originating tracer's falsy-id check.
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniquely identifies a span within its trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl SpanId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        SpanId(id)
    }

    /// Returns the raw `u64` value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of span kinds the tracer treats specially.
///
/// All four variants are part of the internal application set
/// {`custom`, `template`, `web`, `worker`}, which gates version-tag and
/// language-tag stamping in the start-span algorithm. `Custom` is also the
/// default for spans an application names itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpanType {
    /// Application-defined span with no special treatment otherwise.
    Custom,
    /// Template rendering.
    Template,
    /// Inbound web request handling.
    Web,
    /// Background worker/task execution.
    Worker,
}

impl SpanType {
    /// True for the internal application set {custom, template, web, worker}
    /// used to gate `language`/`version` tag stamping.
    pub fn is_internal_application_span(&self) -> bool {
        true
    }
}

/// Distributed sampling priority, propagated across service boundaries.
///
/// Values beyond `AutoKeep` are reserved for manual user decisions and are
/// represented as the raw `i32` they were set to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SamplingPriority {
    /// The sampler rejected this trace (`0`).
    AutoReject,
    /// The sampler kept this trace (`1`).
    AutoKeep,
    /// A manual decision, any other value.
    Manual(i32),
}

impl SamplingPriority {
    /// Converts to the wire-format integer stamped into `metrics`.
    pub fn as_i32(&self) -> i32 {
        match self {
            SamplingPriority::AutoReject => 0,
            SamplingPriority::AutoKeep => 1,
            SamplingPriority::Manual(v) => *v,
        }
    }

    /// Converts from the wire-format integer.
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => SamplingPriority::AutoReject,
            1 => SamplingPriority::AutoKeep,
            other => SamplingPriority::Manual(other),
        }
    }
}
