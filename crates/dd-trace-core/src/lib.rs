#![warn(missing_docs)]

//! Distributed tracing core: span/trace data model, context propagation,
//! sampling and the tracer orchestrator.

/// Wire-format tag/metric key constants.
pub mod constants;
/// Context propagation: binds the active span to an execution flow.
pub mod context;
/// User-supplied batch filters run before the writer.
pub mod filters;
/// Process-wide tracer singleton.
pub mod global;
/// Start-span observer callbacks.
pub mod hooks;
/// Root-span sampling decisions.
pub mod sampler;
/// A single timed unit of work.
pub mod span;
/// Per-trace open-span index and flush logic.
pub mod trace;
/// The orchestrator: start/finish, fork reconciliation, service precedence.
pub mod tracer;
/// Core identifiers and small closed enums.
pub mod types;
/// The contract the tracer consumes to ship finished span batches.
pub mod writer;

pub use context::{ActiveSpan, Context, ContextProvider, ExplicitContextProvider};
pub use context::{TaskLocalContextProvider, ThreadLocalContextProvider};
pub use filters::{apply_filters, Filter};
pub use global::{global, init, shutdown};
pub use hooks::{HookBus, HookEvent};
pub use sampler::{
    legacy_decide, DatadogSampler, PrioritySampler, RateByServiceSampler, RateSampler,
    RuleBasedSampler, Sampler, SamplingRule,
};
pub use span::Span;
pub use trace::{FlushBatch, Trace, TraceAggregator};
pub use tracer::{SamplerKind, StartSpanOptions, Tracer};
pub use types::{SamplingPriority, SpanId, SpanType, TraceId};
pub use writer::{NullWriter, Writer};
