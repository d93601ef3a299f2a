//! Literal scenarios exercising the tracer end to end.

use std::sync::Arc;

use dd_trace_core::{
    ActiveSpan, Context, SamplingPriority, Span, SpanId, SpanType, StartSpanOptions, TraceAggregator,
    TraceId,
};
use dd_trace_tests::{test_config, test_tracer, test_tracer_with_config};

#[test]
fn scenario_1_simple_root() {
    let (tracer, spy) = test_tracer();
    let span = tracer.start_span("web.request", StartSpanOptions::default());
    tracer.finish_span(&span);

    let batches = spy.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    let root = &batches[0][0];
    assert!(root.get_tag("env").is_some());
    assert!(root.get_tag("runtime-id").is_some());
}

#[test]
fn scenario_2_parent_child_same_thread() {
    let (tracer, spy) = test_tracer();
    let p = tracer.start_span("a", StartSpanOptions::default());
    let c = tracer.start_span(
        "b",
        StartSpanOptions {
            child_of: Some(ActiveSpan::Span(p.clone())),
            ..Default::default()
        },
    );

    tracer.finish_span(&c);
    assert!(spy.batches().is_empty());
    tracer.finish_span(&p);

    let batches = spy.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].span_id(), p.span_id());
    assert_eq!(c.parent_id(), Some(p.span_id()));
    assert_eq!(c.trace_id(), p.trace_id());
}

#[test]
fn scenario_3_out_of_order_finish() {
    let (tracer, spy) = test_tracer();
    let p = tracer.start_span("a", StartSpanOptions::default());
    let c = tracer.start_span(
        "b",
        StartSpanOptions {
            child_of: Some(ActiveSpan::Span(p.clone())),
            activate: false,
            ..Default::default()
        },
    );

    tracer.finish_span(&p);
    assert!(spy.batches().is_empty(), "no batch until the whole trace is done");

    tracer.finish_span(&c);
    let batches = spy.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0][0].span_id(), p.span_id());
}

#[test]
fn scenario_4_partial_flush() {
    let config = dd_trace_config::TracerConfig {
        partial_flush_min_spans: 2,
        ..test_config()
    };
    let (tracer, spy) = test_tracer_with_config(config);

    let r = tracer.start_span(
        "root",
        StartSpanOptions {
            activate: false,
            ..Default::default()
        },
    );
    let parent = ActiveSpan::Span(r.clone());
    let c1 = tracer.start_span(
        "c1",
        StartSpanOptions {
            child_of: Some(parent.clone()),
            activate: false,
            ..Default::default()
        },
    );
    let c2 = tracer.start_span(
        "c2",
        StartSpanOptions {
            child_of: Some(parent.clone()),
            activate: false,
            ..Default::default()
        },
    );
    let c3 = tracer.start_span(
        "c3",
        StartSpanOptions {
            child_of: Some(parent.clone()),
            activate: false,
            ..Default::default()
        },
    );

    tracer.finish_span(&c1);
    tracer.finish_span(&c2);
    assert_eq!(spy.total_spans(), 2, "partial flush ships exactly the finished subset");
    assert_eq!(spy.batches()[0][0].span_id(), c1.span_id());

    tracer.finish_span(&c3);
    tracer.finish_span(&r);
    assert_eq!(spy.total_spans(), 4);
    let second_batch = &spy.batches()[1];
    assert_eq!(second_batch.len(), 2);
    assert_eq!(second_batch[0].span_id(), c3.span_id());
}

#[test]
fn scenario_5_distributed_continuation() {
    let (tracer, spy) = test_tracer();
    let incoming = ActiveSpan::Context(
        Context::new(TraceId::new(42), SpanId::new(7))
            .with_sampling_priority(SamplingPriority::AutoKeep)
            .with_origin("synthetics"),
    );
    let span = tracer.start_span(
        "downstream",
        StartSpanOptions {
            child_of: Some(incoming),
            ..Default::default()
        },
    );
    assert_eq!(span.trace_id(), TraceId::new(42));
    assert_eq!(span.parent_id(), Some(SpanId::new(7)));

    tracer.finish_span(&span);
    let batches = spy.batches();
    assert_eq!(batches.len(), 1);
    let chunk_root = &batches[0][0];
    assert_eq!(chunk_root.get_tag("_dd.origin").as_deref(), Some("synthetics"));
    assert_eq!(
        chunk_root.metrics_snapshot().get("_sampling_priority_v1"),
        Some(&1.0)
    );
}

// A real `fork(2)` can't be exercised from inside a single test process, so
// this scenario drives the aggregator-level primitive `reconcile_fork_if_needed`
// uses directly: `clear_all_span_lists`. The tracer-level contract ("child
// never delivers the parent's open span") follows from that primitive plus
// the id generator reseed, both already covered by their own unit tests.
#[test]
fn scenario_6_fork_clears_open_span_lists_without_dropping_trace_metadata() {
    let aggregator = TraceAggregator::new();
    let parent_trace = aggregator.get_or_create(TraceId::new(1));
    let open_span = Arc::new(Span::new(
        TraceId::new(1),
        SpanId::new(1),
        None,
        None,
        "a",
        SpanType::Custom,
    ));
    parent_trace.add_span(open_span.clone());
    parent_trace.set_sampling_decision(true, Some(SamplingPriority::AutoKeep));

    aggregator.clear_all_span_lists();

    // The trace entry survives the fork reset with its sampling decision
    // intact, but its span list is empty: the "parent's" open span above
    // will never be flushed by whichever process now holds this aggregator.
    assert!(parent_trace.sampled());
    open_span.finish();
    let flush = parent_trace.finish_span(false, 500);
    assert!(
        flush.is_none() || flush.unwrap().spans.is_empty(),
        "a span finished after its trace's span list was cleared contributes nothing to the next flush"
    );
}
