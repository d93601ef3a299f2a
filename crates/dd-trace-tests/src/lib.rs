#![warn(missing_docs)]

//! Shared fixtures for the end-to-end scenario and property tests in
//! `tests/`. Nothing here is part of the published tracing API; this crate
//! only exists to exercise the others as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use dd_trace_config::{Destination, DogstatsdTarget, TracerConfig};
use dd_trace_core::{SamplerKind, Tracer};
use dd_trace_ids::RandomIdGenerator;

/// Builds a `TracerConfig` by hand, bypassing `from_env`, so tests never
/// race each other over process environment state.
pub fn test_config() -> TracerConfig {
    TracerConfig {
        destination: Destination::Agentless,
        dogstatsd_target: DogstatsdTarget::Udp {
            host: "localhost".to_string(),
            port: 8125,
        },
        trace_enabled: true,
        trace_debug: false,
        startup_logs: false,
        partial_flush_enabled: true,
        partial_flush_min_spans: 3,
        service: Some("scenario-svc".to_string()),
        env: Some("test".to_string()),
        version: Some("1.0.0".to_string()),
        tags: HashMap::new(),
        report_hostname: false,
    }
}

/// Builds a tracer over the thread-local context provider and default
/// Datadog sampler, wired to a spy writer so tests can inspect what would
/// have shipped.
pub fn test_tracer() -> (Tracer, Arc<SpyWriter>) {
    test_tracer_with_config(test_config())
}

/// Like [`test_tracer`], but with a caller-supplied configuration (e.g. a
/// tighter `partial_flush_min_spans` for the partial-flush scenario).
pub fn test_tracer_with_config(config: TracerConfig) -> (Tracer, Arc<SpyWriter>) {
    let tracer = Tracer::new(
        config,
        Arc::new(RandomIdGenerator::default()),
        Arc::new(dd_trace_core::ThreadLocalContextProvider),
        SamplerKind::Datadog(dd_trace_core::DatadogSampler::default()),
    );
    let spy = Arc::new(SpyWriter::default());
    tracer.set_writer(Box::new(SpyWriterHandle(spy.clone())));
    (tracer, spy)
}

/// Records every batch handed to it, in order, for assertion.
#[derive(Default)]
pub struct SpyWriter {
    batches: parking_lot::Mutex<Vec<Vec<Arc<dd_trace_core::Span>>>>,
}

impl SpyWriter {
    /// All batches received so far, oldest first.
    pub fn batches(&self) -> Vec<Vec<Arc<dd_trace_core::Span>>> {
        self.batches.lock().clone()
    }

    /// Total spans received across all batches.
    pub fn total_spans(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }
}

struct SpyWriterHandle(Arc<SpyWriter>);

impl dd_trace_core::Writer for SpyWriterHandle {
    fn write(&self, batch: Vec<Arc<dd_trace_core::Span>>) {
        self.0.batches.lock().push(batch);
    }

    fn stop(&self) {}

    fn join(&self, _timeout: Option<std::time::Duration>) {}

    fn recreate(&self) -> Box<dyn dd_trace_core::Writer> {
        Box::new(SpyWriterHandle(Arc::new(SpyWriter::default())))
    }

    fn is_alive(&self) -> bool {
        true
    }
}
