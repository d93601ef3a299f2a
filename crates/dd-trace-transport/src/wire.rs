//! JSON wire representation of a finished span.
//!
//! The real Datadog agent protocol is msgpack-over-HTTP; this crate
//! approximates it with JSON, which the core's Non-goals explicitly permit
//! (no byte-exact reimplementation of a particular collector format).

use std::collections::HashMap;
use std::sync::Arc;

use dd_trace_core::Span;
use serde::Serialize;

/// Serializable view of a finished [`Span`].
#[derive(Debug, Serialize)]
pub struct WireSpan {
    trace_id: u64,
    span_id: u64,
    parent_id: u64,
    name: String,
    service: Option<String>,
    resource: Option<String>,
    start: u64,
    duration: u64,
    meta: HashMap<String, String>,
    metrics: HashMap<String, f64>,
}

impl From<&Arc<Span>> for WireSpan {
    fn from(span: &Arc<Span>) -> Self {
        Self {
            trace_id: span.trace_id().as_u64(),
            span_id: span.span_id().as_u64(),
            parent_id: span.parent_id().map(|id| id.as_u64()).unwrap_or(0),
            name: span.name().to_string(),
            service: span.service(),
            resource: span.resource(),
            start: span.start_unix_nanos(),
            duration: span.duration().map(|d| d.as_nanos() as u64).unwrap_or(0),
            meta: span.meta_snapshot(),
            metrics: span.metrics_snapshot(),
        }
    }
}

/// Serializes a finished batch as a single JSON array, the unit both
/// [`crate::agent_writer::AgentWriter`] and [`crate::log_writer::LogWriter`]
/// ship.
pub fn batch_to_json(batch: &[Arc<Span>]) -> serde_json::Result<String> {
    let wire: Vec<WireSpan> = batch.iter().map(WireSpan::from).collect();
    serde_json::to_string(&wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_trace_core::{SpanId, SpanType, TraceId};

    #[test]
    fn batch_serializes_to_json_array() {
        let span = Arc::new(Span::new(
            TraceId::new(1),
            SpanId::new(2),
            None,
            None,
            "web.request",
            SpanType::Web,
        ));
        span.set_tag("http.method", "GET");
        span.finish();
        let json = batch_to_json(&[span]).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"web.request\""));
        assert!(json.contains("\"http.method\":\"GET\""));
    }
}
