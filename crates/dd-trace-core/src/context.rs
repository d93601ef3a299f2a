//! Context propagation: binds an "active span" to the current execution
//! flow so child spans automatically parent to the enclosing one.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use crate::span::Span;
use crate::types::{SamplingPriority, SpanId, TraceId};

/// A lightweight stand-in for a live [`Span`], usable when the parent lives
/// in another execution context or arrived from a remote caller.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    /// Trace this context belongs to.
    pub trace_id: TraceId,
    /// The span this context represents.
    pub span_id: SpanId,
    /// Distributed sampling hint carried with this context, if any.
    pub sampling_priority: Option<i32>,
    /// Provenance marker carried with this context, if any.
    pub dd_origin: Option<String>,
}

impl Context {
    /// Builds a context from raw distributed-trace-propagation fields.
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            sampling_priority: None,
            dd_origin: None,
        }
    }

    /// Attaches a sampling priority, builder-style.
    pub fn with_sampling_priority(mut self, priority: SamplingPriority) -> Self {
        self.sampling_priority = Some(priority.as_i32());
        self
    }

    /// Attaches an origin tag, builder-style.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.dd_origin = Some(origin.into());
        self
    }
}

/// Whatever is currently active in an execution flow: either a live span the
/// process itself created, or a context describing one it did not.
#[derive(Clone)]
pub enum ActiveSpan {
    /// A span this process owns and can finish.
    Span(Arc<Span>),
    /// A reference to a span elsewhere (another flow, or a remote caller).
    Context(Context),
}

impl ActiveSpan {
    /// The trace id, regardless of variant.
    pub fn trace_id(&self) -> TraceId {
        match self {
            ActiveSpan::Span(s) => s.trace_id(),
            ActiveSpan::Context(c) => c.trace_id,
        }
    }

    /// The span id, regardless of variant.
    pub fn span_id(&self) -> SpanId {
        match self {
            ActiveSpan::Span(s) => s.span_id(),
            ActiveSpan::Context(c) => c.span_id,
        }
    }

    /// The live span, if this binding owns one.
    pub fn as_span(&self) -> Option<&Arc<Span>> {
        match self {
            ActiveSpan::Span(s) => Some(s),
            ActiveSpan::Context(_) => None,
        }
    }
}

/// Capability binding "the current execution flow" to an [`ActiveSpan`].
///
/// Implementations must be lock-free on the fast path: `active()` runs on
/// every span start. The thread-local and task-local variants satisfy this
/// by construction since no shared mutable state crosses flows.
pub trait ContextProvider: Send + Sync {
    /// Sets the active binding for this flow and returns it unchanged.
    fn activate(&self, active: ActiveSpan) -> ActiveSpan;

    /// Returns the current binding for this flow, if any.
    fn active(&self) -> Option<ActiveSpan>;

    /// Clears the active binding for this flow.
    fn clear(&self);
}

thread_local! {
    static THREAD_ACTIVE: RefCell<Option<ActiveSpan>> = const { RefCell::new(None) };
}

/// Binds the active span per OS thread. No propagation across spawned
/// threads: a thread created from inside a traced flow starts with no
/// binding.
#[derive(Default)]
pub struct ThreadLocalContextProvider;

impl ContextProvider for ThreadLocalContextProvider {
    fn activate(&self, active: ActiveSpan) -> ActiveSpan {
        THREAD_ACTIVE.with(|cell| *cell.borrow_mut() = Some(active.clone()));
        active
    }

    fn active(&self) -> Option<ActiveSpan> {
        THREAD_ACTIVE.with(|cell| cell.borrow().clone())
    }

    fn clear(&self) {
        THREAD_ACTIVE.with(|cell| *cell.borrow_mut() = None);
    }
}

tokio::task_local! {
    static TASK_ACTIVE: RefCell<Option<ActiveSpan>>;
}

/// Binds the active span per Tokio task.
///
/// A task spawned from inside another must have its creator snapshot-copy
/// the parent binding into the child task's local storage at spawn time —
/// use [`TaskLocalContextProvider::spawn_traced`] rather than `tokio::spawn`
/// directly, or the child task starts with no active span.
#[derive(Default)]
pub struct TaskLocalContextProvider;

impl TaskLocalContextProvider {
    /// Spawns `future` as a new task, snapshot-copying the calling task's
    /// active binding into the new task's slot before it starts running.
    pub fn spawn_traced<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let snapshot = self.active();
        tokio::spawn(TASK_ACTIVE.scope(RefCell::new(snapshot), future))
    }
}

impl ContextProvider for TaskLocalContextProvider {
    fn activate(&self, active: ActiveSpan) -> ActiveSpan {
        let _ = TASK_ACTIVE.try_with(|cell| *cell.borrow_mut() = Some(active.clone()));
        active
    }

    fn active(&self) -> Option<ActiveSpan> {
        TASK_ACTIVE
            .try_with(|cell| cell.borrow().clone())
            .unwrap_or(None)
    }

    fn clear(&self) {
        let _ = TASK_ACTIVE.try_with(|cell| *cell.borrow_mut() = None);
    }
}

/// No ambient binding: the caller threads the active span through its own
/// call graph explicitly, storing it in a value it owns.
#[derive(Default)]
pub struct ExplicitContextProvider {
    slot: parking_lot::Mutex<Option<ActiveSpan>>,
}

impl ContextProvider for ExplicitContextProvider {
    fn activate(&self, active: ActiveSpan) -> ActiveSpan {
        *self.slot.lock() = Some(active.clone());
        active
    }

    fn active(&self) -> Option<ActiveSpan> {
        self.slot.lock().clone()
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpanType;

    fn dummy_span(trace: u64, span: u64) -> Arc<Span> {
        Arc::new(Span::new(
            TraceId::new(trace),
            SpanId::new(span),
            None,
            None,
            "op",
            SpanType::Custom,
        ))
    }

    #[test]
    fn thread_local_roundtrips_within_a_thread() {
        let provider = ThreadLocalContextProvider;
        assert!(provider.active().is_none());
        provider.activate(ActiveSpan::Span(dummy_span(1, 1)));
        assert_eq!(provider.active().unwrap().span_id(), SpanId::new(1));
        provider.clear();
        assert!(provider.active().is_none());
    }

    #[test]
    fn thread_local_does_not_cross_threads() {
        let provider = Arc::new(ThreadLocalContextProvider);
        provider.activate(ActiveSpan::Span(dummy_span(1, 1)));
        let provider2 = provider.clone();
        let handle = std::thread::spawn(move || provider2.active().is_none());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn explicit_provider_holds_what_you_give_it() {
        let provider = ExplicitContextProvider::default();
        assert!(provider.active().is_none());
        provider.activate(ActiveSpan::Context(Context::new(TraceId::new(9), SpanId::new(9))));
        assert_eq!(provider.active().unwrap().trace_id(), TraceId::new(9));
    }

    #[tokio::test]
    async fn task_local_spawn_traced_snapshots_parent_binding() {
        let provider = Arc::new(TaskLocalContextProvider);
        let outer = async {
            provider.activate(ActiveSpan::Span(dummy_span(5, 1)));
            let p2 = provider.clone();
            let handle = provider.spawn_traced(async move { p2.active().map(|a| a.span_id()) });
            handle.await.unwrap()
        };
        let child_span_id = TASK_ACTIVE
            .scope(RefCell::new(None), outer)
            .await;
        assert_eq!(child_span_id, Some(SpanId::new(1)));
    }
}
