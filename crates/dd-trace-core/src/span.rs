//! Span: a timed unit of work with identity, tags and metrics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::types::{SpanId, SpanType, TraceId};

/// A single timed unit of work.
///
/// Mutable until [`Span::finish`] is called; after that the aggregator only
/// reads it. Cloning a `Span` is cheap identity-sharing: use
/// [`Span::handle`]/`Arc<Span>` when multiple owners need to observe the
/// same finish.
#[derive(Debug)]
pub struct Span {
    trace_id: TraceId,
    span_id: SpanId,
    parent_id: Option<SpanId>,
    /// Non-owning back-reference used only to decide reactivation on finish.
    /// Never points back at the Trace; parents live in the context provider's
    /// stack discipline and here.
    parent: Option<Arc<Span>>,
    name: String,
    service: parking_lot::Mutex<Option<String>>,
    resource: parking_lot::Mutex<Option<String>>,
    span_type: SpanType,
    start: Instant,
    start_wall: SystemTime,
    duration: parking_lot::Mutex<Option<Duration>>,
    meta: parking_lot::Mutex<HashMap<String, String>>,
    metrics: parking_lot::Mutex<HashMap<String, f64>>,
    finished: AtomicBool,
}

impl Span {
    /// Constructs a new, unfinished span starting now.
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        parent_id: Option<SpanId>,
        parent: Option<Arc<Span>>,
        name: impl Into<String>,
        span_type: SpanType,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_id,
            parent,
            name: name.into(),
            service: parking_lot::Mutex::new(None),
            resource: parking_lot::Mutex::new(None),
            span_type,
            start: Instant::now(),
            start_wall: SystemTime::now(),
            duration: parking_lot::Mutex::new(None),
            meta: parking_lot::Mutex::new(HashMap::new()),
            metrics: parking_lot::Mutex::new(HashMap::new()),
            finished: AtomicBool::new(false),
        }
    }

    /// The trace this span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// This span's own id.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The id of the span that caused this one, if any.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    /// The live parent span, if this span was created with one and it has
    /// not since been dropped.
    pub fn parent(&self) -> Option<&Arc<Span>> {
        self.parent.as_ref()
    }

    /// The operation name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of span this is, gating version-tag stamping.
    pub fn span_type(&self) -> SpanType {
        self.span_type
    }

    /// The service name, if one has been set.
    pub fn service(&self) -> Option<String> {
        self.service.lock().clone()
    }

    /// Sets the service name.
    pub fn set_service(&self, service: impl Into<String>) {
        *self.service.lock() = Some(service.into());
    }

    /// The resource name, if one has been set.
    pub fn resource(&self) -> Option<String> {
        self.resource.lock().clone()
    }

    /// Sets the resource name.
    pub fn set_resource(&self, resource: impl Into<String>) {
        *self.resource.lock() = Some(resource.into());
    }

    /// Sets a string tag. A no-op once the span has finished.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        if self.is_finished() {
            return;
        }
        self.meta.lock().insert(key.into(), value.into());
    }

    /// Sets a numeric metric. A no-op once the span has finished.
    pub fn set_metric(&self, key: impl Into<String>, value: f64) {
        if self.is_finished() {
            return;
        }
        self.metrics.lock().insert(key.into(), value);
    }

    /// Reads a previously set tag.
    pub fn get_tag(&self, key: &str) -> Option<String> {
        self.meta.lock().get(key).cloned()
    }

    /// Sets a string tag unconditionally, bypassing the finished check.
    ///
    /// Reserved for the aggregator's chunk-root stamping: `sampling_priority`
    /// and `origin` are written onto the chunk root after it has already
    /// finished, since the root is only known once the whole flushed set is
    /// in hand. Application code should use [`Span::set_tag`] instead.
    pub(crate) fn stamp_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.lock().insert(key.into(), value.into());
    }

    /// Sets a numeric metric unconditionally, bypassing the finished check.
    /// See [`Span::stamp_tag`].
    pub(crate) fn stamp_metric(&self, key: impl Into<String>, value: f64) {
        self.metrics.lock().insert(key.into(), value);
    }

    /// Whether `finish` has already run. Subsequent `finish` calls are no-ops.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Finishes the span, stamping `duration = now - start`. Idempotent:
    /// calling this more than once has no effect after the first call.
    ///
    /// Returns `true` if this call actually finished the span (i.e. it was
    /// the first call), which the tracer uses to decide whether to run the
    /// finish-span algorithm at all.
    pub fn finish(&self) -> bool {
        if self
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.duration.lock() = Some(self.start.elapsed());
        true
    }

    /// Duration since start, valid once finished.
    pub fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    /// Wall-clock start time, as nanoseconds since the Unix epoch, for
    /// serialization.
    pub fn start_unix_nanos(&self) -> u64 {
        self.start_wall
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    }

    /// Snapshot of all tags, for serialization at flush time.
    pub fn meta_snapshot(&self) -> HashMap<String, String> {
        self.meta.lock().clone()
    }

    /// Snapshot of all metrics, for serialization at flush time.
    pub fn metrics_snapshot(&self) -> HashMap<String, f64> {
        self.metrics.lock().clone()
    }

    /// Debug-formats the span's identity and current tags, mirroring a
    /// `pprint`-style diagnostic dump.
    pub fn pprint(&self) -> String {
        format!(
            "Span(name={:?}, trace_id={}, span_id={}, parent_id={:?}, finished={})",
            self.name,
            self.trace_id,
            self.span_id,
            self.parent_id,
            self.is_finished()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(
            TraceId::new(1),
            SpanId::new(2),
            None,
            None,
            "test.op",
            SpanType::Custom,
        )
    }

    #[test]
    fn finish_is_idempotent() {
        let s = span();
        assert!(s.finish());
        assert!(!s.finish());
        assert!(s.is_finished());
    }

    #[test]
    fn duration_set_only_after_finish() {
        let s = span();
        assert!(s.duration().is_none());
        s.finish();
        assert!(s.duration().is_some());
    }

    #[test]
    fn tags_ignored_after_finish() {
        let s = span();
        s.set_tag("a", "1");
        s.finish();
        s.set_tag("b", "2");
        assert_eq!(s.get_tag("a").as_deref(), Some("1"));
        assert_eq!(s.get_tag("b"), None);
    }

    #[test]
    fn internal_application_span_type_gate() {
        assert!(SpanType::Custom.is_internal_application_span());
        assert!(SpanType::Web.is_internal_application_span());
        assert!(SpanType::Worker.is_internal_application_span());
        assert!(SpanType::Template.is_internal_application_span());
    }
}
