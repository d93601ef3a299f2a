//! Trace aggregator: indexes open spans by trace, detects completion, and
//! supports partial flush for long-running traces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::span::Span;
use crate::types::{SamplingPriority, TraceId};

struct TraceInner {
    spans: Vec<Arc<Span>>,
    num_finished: usize,
    sampled: bool,
    sampling_priority: Option<SamplingPriority>,
    dd_origin: Option<String>,
}

/// The set of spans sharing a `trace_id`, tracked while any of them are open.
///
/// `sampled` and `sampling_priority` are authoritative only once read under
/// the trace's own lock; [`Trace::is_sampled_hint`] offers a relaxed,
/// lock-free fast path for best-effort health checks.
pub struct Trace {
    trace_id: TraceId,
    inner: Mutex<TraceInner>,
    sampled_hint: AtomicBool,
}

/// The batch produced by a [`Trace::finish_span`] call that triggered a flush.
pub struct FlushBatch {
    /// Finished spans to hand to the writer, chunk root first.
    pub spans: Vec<Arc<Span>>,
    /// The trace's sampling decision at the time of this flush.
    pub sampled: bool,
    /// True once no live spans remain in the trace (aggregator should drop it).
    pub trace_done: bool,
}

impl Trace {
    fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            inner: Mutex::new(TraceInner {
                spans: Vec::new(),
                num_finished: 0,
                sampled: false,
                sampling_priority: None,
                dd_origin: None,
            }),
            sampled_hint: AtomicBool::new(false),
        }
    }

    /// The trace id this object is keyed under.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Appends a newly created span, under the trace lock.
    pub fn add_span(&self, span: Arc<Span>) {
        self.inner.lock().spans.push(span);
    }

    /// Authoritative sampling decision, taken under the trace lock.
    pub fn sampled(&self) -> bool {
        self.inner.lock().sampled
    }

    /// Relaxed, lock-free best-effort read of the sampling decision.
    ///
    /// Single-word visibility is sufficient for a health-check style probe;
    /// anything that gates data delivery must go through [`Trace::sampled`]
    /// instead.
    pub fn is_sampled_hint(&self) -> bool {
        self.sampled_hint.load(Ordering::Relaxed)
    }

    /// The distributed sampling priority, if a decision has been made.
    pub fn sampling_priority(&self) -> Option<SamplingPriority> {
        self.inner.lock().sampling_priority
    }

    /// The origin tag, if one was propagated from a distributed parent.
    pub fn dd_origin(&self) -> Option<String> {
        self.inner.lock().dd_origin.clone()
    }

    /// Stamps the root sampling decision. Called once, by the tracer, when
    /// starting the root span of this trace.
    pub fn set_sampling_decision(&self, sampled: bool, priority: Option<SamplingPriority>) {
        let mut inner = self.inner.lock();
        inner.sampled = sampled;
        inner.sampling_priority = priority;
        self.sampled_hint.store(sampled, Ordering::Relaxed);
    }

    /// Overwrites the origin tag, e.g. from an incoming distributed context.
    pub fn set_origin(&self, origin: impl Into<String>) {
        self.inner.lock().dd_origin = Some(origin.into());
    }

    /// The first span added to this trace, the chunk-root candidate for the
    /// next flush.
    pub fn first_span(&self) -> Option<Arc<Span>> {
        self.inner.lock().spans.first().cloned()
    }

    /// Handles a finish for a span this trace no longer has any record of
    /// (its trace entry was already flushed away or cleared by a fork).
    /// Stamps whatever trace-level metadata is present and ships the span
    /// alone, then reports the trace as done so the caller discards it.
    pub fn finish_orphan(&self, span: Arc<Span>) -> FlushBatch {
        let inner = self.inner.lock();
        if inner.sampled {
            if let Some(priority) = inner.sampling_priority {
                span.stamp_metric(
                    crate::constants::SAMPLING_PRIORITY_KEY,
                    priority.as_i32() as f64,
                );
            }
        }
        if let Some(origin) = &inner.dd_origin {
            span.stamp_tag(crate::constants::ORIGIN_KEY, origin.clone());
        }
        FlushBatch {
            spans: vec![span],
            sampled: true,
            trace_done: true,
        }
    }

    /// Records that a span belonging to this trace finished, and flushes a
    /// batch if a flush condition is met.
    ///
    /// A flush triggers when either every registered span is finished, or
    /// partial flush is enabled and at least `partial_flush_min_spans` spans
    /// are finished. The first finished span in the trace's current ordering
    /// becomes the chunk root and is stamped with `sampling_priority`/`origin`.
    pub fn finish_span(
        &self,
        partial_flush_enabled: bool,
        partial_flush_min_spans: usize,
    ) -> Option<FlushBatch> {
        let mut inner = self.inner.lock();
        inner.num_finished += 1;

        let whole_trace_done = inner.num_finished == inner.spans.len();
        let partial_flush_ready =
            partial_flush_enabled && inner.num_finished >= partial_flush_min_spans;

        if !whole_trace_done && !partial_flush_ready {
            return None;
        }

        let mut flushed = Vec::new();
        let mut remaining = Vec::with_capacity(inner.spans.len());
        for span in inner.spans.drain(..) {
            if span.is_finished() {
                flushed.push(span);
            } else {
                remaining.push(span);
            }
        }
        inner.spans = remaining;
        inner.num_finished -= flushed.len();

        if let Some(root) = flushed.first() {
            // The chunk root is always finished by this point (it is drawn
            // from the finished set above), so the ordinary tag/metric
            // setters would silently no-op here; the aggregator stamps it
            // directly instead.
            if inner.sampled {
                if let Some(priority) = inner.sampling_priority {
                    root.stamp_metric(
                        crate::constants::SAMPLING_PRIORITY_KEY,
                        priority.as_i32() as f64,
                    );
                }
            }
            if let Some(origin) = &inner.dd_origin {
                root.stamp_tag(crate::constants::ORIGIN_KEY, origin.clone());
            }
        }

        let sampled = inner.sampled;
        let trace_done = inner.spans.is_empty();
        drop(inner);

        Some(FlushBatch {
            spans: flushed,
            sampled,
            trace_done,
        })
    }
}

/// Concurrent `trace_id -> Trace` index.
///
/// The map itself provides only short critical sections (membership tests,
/// insert/delete); each `Trace`'s own lock guards its fields. Entry-level
/// locking on `DashMap` stands in for the "short critical section" container
/// lock the design calls for, without a single coarse mutex over the whole
/// table.
pub struct TraceAggregator {
    traces: DashMap<u64, Arc<Trace>>,
}

impl TraceAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self {
            traces: DashMap::new(),
        }
    }

    /// Returns the trace for `trace_id`, creating it if this is the first
    /// span seen for it. Concurrent calls for the same id race down to a
    /// single `Trace`.
    pub fn get_or_create(&self, trace_id: TraceId) -> Arc<Trace> {
        self.traces
            .entry(trace_id.as_u64())
            .or_insert_with(|| Arc::new(Trace::new(trace_id)))
            .clone()
    }

    /// Like [`TraceAggregator::get_or_create`], but also reports whether
    /// this call created a fresh (empty) entry. The tracer uses the flag to
    /// detect a late finish on a span whose trace was already flushed away
    /// or cleared by a fork: a legitimately tracked span's trace was always
    /// inserted earlier, at `start_span` time.
    pub fn get_or_create_checked(&self, trace_id: TraceId) -> (Arc<Trace>, bool) {
        match self.traces.entry(trace_id.as_u64()) {
            dashmap::mapref::entry::Entry::Occupied(e) => (e.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                let trace = Arc::new(Trace::new(trace_id));
                v.insert(trace.clone());
                (trace, true)
            }
        }
    }

    /// Removes a trace once it has no live spans left.
    pub fn remove(&self, trace_id: TraceId) {
        self.traces.remove(&trace_id.as_u64());
    }

    /// Clears every tracked trace's open-span list in place, leaving
    /// trace-level sampling metadata intact. Called once per process after a
    /// fork is detected: the parent retains flushing responsibility for
    /// spans that existed before the fork, so the child must not re-flush
    /// them.
    pub fn clear_all_span_lists(&self) {
        for entry in self.traces.iter() {
            let mut inner = entry.value().inner.lock();
            inner.spans.clear();
            inner.num_finished = 0;
        }
    }

    /// Number of traces currently tracked (open spans pending).
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// True if no traces are currently open.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl Default for TraceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpanId, SpanType};

    fn mk_span(aggregator: &TraceAggregator, trace_id: u64, span_id: u64) -> Arc<Span> {
        let trace = aggregator.get_or_create(TraceId::new(trace_id));
        let span = Arc::new(Span::new(
            TraceId::new(trace_id),
            SpanId::new(span_id),
            None,
            None,
            "op",
            SpanType::Custom,
        ));
        trace.add_span(span.clone());
        span
    }

    #[test]
    fn single_span_trace_flushes_whole_trace_on_finish() {
        let agg = TraceAggregator::new();
        let span = mk_span(&agg, 1, 1);
        let trace = agg.get_or_create(TraceId::new(1));
        span.finish();
        let batch = trace.finish_span(true, 500).expect("should flush");
        assert_eq!(batch.spans.len(), 1);
        assert!(batch.trace_done);
    }

    #[test]
    fn out_of_order_finish_waits_for_all_spans() {
        let agg = TraceAggregator::new();
        let parent = mk_span(&agg, 2, 1);
        let child = mk_span(&agg, 2, 2);
        let trace = agg.get_or_create(TraceId::new(2));

        parent.finish();
        let batch = trace.finish_span(true, 500);
        assert!(batch.is_none(), "root alone should not flush yet");

        child.finish();
        let batch = trace.finish_span(true, 500).expect("both finished now");
        assert_eq!(batch.spans.len(), 2);
        assert_eq!(batch.spans[0].span_id(), parent.span_id());
        assert!(batch.trace_done);
    }

    #[test]
    fn partial_flush_ships_finished_subset_and_keeps_trace_open() {
        let agg = TraceAggregator::new();
        let root = mk_span(&agg, 3, 1);
        let c1 = mk_span(&agg, 3, 2);
        let c2 = mk_span(&agg, 3, 3);
        let c3 = mk_span(&agg, 3, 4);
        let trace = agg.get_or_create(TraceId::new(3));

        c1.finish();
        assert!(trace.finish_span(true, 2).is_none());
        c2.finish();
        let batch = trace.finish_span(true, 2).expect("min_spans reached");
        assert_eq!(batch.spans.len(), 2);
        assert!(!batch.trace_done);

        c3.finish();
        assert!(trace.finish_span(true, 2).is_none());
        root.finish();
        let batch = trace.finish_span(true, 2).expect("remaining spans finished");
        assert_eq!(batch.spans.len(), 2);
        assert!(batch.trace_done);
    }

    #[test]
    fn chunk_root_carries_sampling_and_origin() {
        let agg = TraceAggregator::new();
        let span = mk_span(&agg, 4, 1);
        let trace = agg.get_or_create(TraceId::new(4));
        trace.set_sampling_decision(true, Some(SamplingPriority::AutoKeep));
        trace.set_origin("synthetics");

        span.finish();
        let batch = trace.finish_span(true, 500).unwrap();
        let root = &batch.spans[0];
        assert_eq!(
            root.metrics_snapshot().get(crate::constants::SAMPLING_PRIORITY_KEY),
            Some(&1.0)
        );
        assert_eq!(
            root.meta_snapshot().get(crate::constants::ORIGIN_KEY).map(String::as_str),
            Some("synthetics")
        );
    }

    #[test]
    fn sampled_hint_mirrors_authoritative_value() {
        let agg = TraceAggregator::new();
        let trace = agg.get_or_create(TraceId::new(5));
        assert!(!trace.is_sampled_hint());
        trace.set_sampling_decision(true, Some(SamplingPriority::AutoKeep));
        assert!(trace.is_sampled_hint());
        assert_eq!(trace.sampled(), trace.is_sampled_hint());
    }

    #[test]
    fn get_or_create_is_stable_across_calls() {
        let agg = TraceAggregator::new();
        let a = agg.get_or_create(TraceId::new(6));
        let b = agg.get_or_create(TraceId::new(6));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
