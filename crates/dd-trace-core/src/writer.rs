//! The contract the tracer consumes to ship finished span batches.
//!
//! Concrete implementations (an HTTP/UDS agent writer, a log-line writer for
//! agentless mode) live in `dd-trace-transport`, which depends on this
//! crate rather than the other way around.

use std::sync::Arc;
use std::time::Duration;

use crate::span::Span;

/// Accepts finished span batches and ships them somewhere, without ever
/// blocking the caller beyond a bounded, non-blocking enqueue.
pub trait Writer: Send + Sync {
    /// Enqueues a batch for transmission. Must not block; implementations
    /// back this with a bounded channel and drop the batch (bumping a health
    /// metric) rather than waiting when it is full.
    fn write(&self, batch: Vec<Arc<Span>>);

    /// Begins shutdown: stop accepting new batches.
    fn stop(&self);

    /// Blocks up to `timeout` (or indefinitely if `None`) for in-flight
    /// batches to flush.
    fn join(&self, timeout: Option<Duration>);

    /// Produces a fresh writer bound to the same endpoint. Used after a
    /// fork, since the parent's background task does not exist in the child.
    fn recreate(&self) -> Box<dyn Writer>;

    /// Whether the writer's background task is still running.
    fn is_alive(&self) -> bool;
}

/// A writer that discards every batch. Used as the tracer's initial state
/// before a real writer is installed, and in tests that don't care about
/// transmission.
#[derive(Default)]
pub struct NullWriter;

impl Writer for NullWriter {
    fn write(&self, _batch: Vec<Arc<Span>>) {}

    fn stop(&self) {}

    fn join(&self, _timeout: Option<Duration>) {}

    fn recreate(&self) -> Box<dyn Writer> {
        Box::new(NullWriter)
    }

    fn is_alive(&self) -> bool {
        true
    }
}
