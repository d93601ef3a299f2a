//! Process-wide tracer singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dd_trace_config::TracerConfig;
use dd_trace_ids::RandomIdGenerator;

use crate::context::ThreadLocalContextProvider;
use crate::sampler::DatadogSampler;
use crate::tracer::{SamplerKind, Tracer};

static GLOBAL_TRACER: OnceLock<Tracer> = OnceLock::new();
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Initializes the process-wide tracer from `TracerConfig::from_env()`.
/// Only the first call has any effect; later calls return the tracer
/// already installed.
///
/// Re-entry after [`shutdown`] is unspecified: the tracer is not reset, and
/// calling [`global`] afterward still returns the same (stopped) instance.
pub fn init() -> Result<&'static Tracer, dd_trace_config::ConfigError> {
    if let Some(tracer) = GLOBAL_TRACER.get() {
        return Ok(tracer);
    }
    let config = TracerConfig::from_env()?;
    let tracer = Tracer::new(
        config,
        Arc::new(RandomIdGenerator::new()),
        Arc::new(ThreadLocalContextProvider),
        SamplerKind::Datadog(DatadogSampler::default()),
    );
    Ok(GLOBAL_TRACER.get_or_init(|| tracer))
}

/// Returns the global tracer, initializing it with default environment
/// configuration on first access. Panics only if `TracerConfig::from_env()`
/// fails on that first call; callers that want to handle a misconfigured
/// environment should call [`init`] explicitly instead.
pub fn global() -> &'static Tracer {
    match GLOBAL_TRACER.get() {
        Some(tracer) => tracer,
        None => init().expect("default tracer configuration from environment"),
    }
}

/// Flushes and stops the global tracer's writer. Idempotent.
pub fn shutdown(timeout: Option<Duration>) {
    if SHUTDOWN.swap(true, Ordering::AcqRel) {
        return;
    }
    if let Some(tracer) = GLOBAL_TRACER.get() {
        tracer.shutdown(timeout);
    }
}
