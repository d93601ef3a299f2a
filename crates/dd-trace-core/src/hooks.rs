//! Observer callbacks fired on tracer lifecycle events.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::span::Span;

/// Events an embedding application can observe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Fired after a span is constructed and registered with the aggregator.
    StartSpan,
}

type Callback = Arc<dyn Fn(&Span) + Send + Sync>;

/// Registry of observer callbacks, keyed by event.
///
/// Reads (emit) happen on every span start; writes (register/deregister) are
/// rare, so a reader-preferring `RwLock` is the right trade-off.
#[derive(Default)]
pub struct HookBus {
    start_span: RwLock<Vec<Callback>>,
}

impl HookBus {
    /// Creates an empty hook bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for `event`.
    pub fn register(&self, event: HookEvent, callback: impl Fn(&Span) + Send + Sync + 'static) {
        match event {
            HookEvent::StartSpan => self.start_span.write().push(Arc::new(callback)),
        }
    }

    /// Removes every registered callback for `event`.
    pub fn clear(&self, event: HookEvent) {
        match event {
            HookEvent::StartSpan => self.start_span.write().clear(),
        }
    }

    /// Fires every callback registered for `event` with `span`.
    ///
    /// A panicking callback is caught and logged; it never aborts span
    /// creation or prevents other callbacks from running.
    pub fn emit(&self, event: HookEvent, span: &Span) {
        let callbacks = match event {
            HookEvent::StartSpan => self.start_span.read().clone(),
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(span))).is_err() {
                tracing::warn!(event = ?event, "start-span hook panicked, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpanId, SpanType, TraceId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn span() -> Span {
        Span::new(
            TraceId::new(1),
            SpanId::new(1),
            None,
            None,
            "op",
            SpanType::Custom,
        )
    }

    #[test]
    fn registered_callback_fires_on_emit() {
        let bus = HookBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.register(HookEvent::StartSpan, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(HookEvent::StartSpan, &span());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_hook_does_not_stop_other_hooks() {
        let bus = HookBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.register(HookEvent::StartSpan, |_| panic!("boom"));
        let count2 = count.clone();
        bus.register(HookEvent::StartSpan, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(HookEvent::StartSpan, &span());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_all_callbacks() {
        let bus = HookBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.register(HookEvent::StartSpan, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.clear(HookEvent::StartSpan);
        bus.emit(HookEvent::StartSpan, &span());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
