//! User-supplied filters run on a finished batch before it reaches the
//! writer. Each filter may trim or empty the batch; a panic drops only that
//! filter's contribution.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::span::Span;

/// A batch-transforming filter. Returning an empty `Vec` drops the batch.
pub type Filter = Arc<dyn Fn(Vec<Arc<Span>>) -> Vec<Arc<Span>> + Send + Sync>;

/// Runs `batch` through every filter in order, stopping early if a filter
/// empties it. A filter that panics is treated as a no-op for that filter:
/// the pipeline continues with the batch as it stood before that filter ran.
pub fn apply_filters(filters: &[Filter], mut batch: Vec<Arc<Span>>) -> Vec<Arc<Span>> {
    for filter in filters {
        if batch.is_empty() {
            break;
        }
        let before = batch.clone();
        match catch_unwind(AssertUnwindSafe(|| filter(batch))) {
            Ok(result) => batch = result,
            Err(_) => {
                tracing::error!("span filter panicked, keeping pre-filter batch");
                batch = before;
            }
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SpanId, SpanType, TraceId};

    fn span(id: u64) -> Arc<Span> {
        Arc::new(Span::new(
            TraceId::new(1),
            SpanId::new(id),
            None,
            None,
            "op",
            SpanType::Custom,
        ))
    }

    #[test]
    fn filters_run_in_order() {
        let drop_even: Filter = Arc::new(|batch: Vec<Arc<Span>>| {
            batch
                .into_iter()
                .filter(|s| s.span_id().as_u64() % 2 != 0)
                .collect()
        });
        let batch = vec![span(1), span(2), span(3), span(4)];
        let result = apply_filters(&[drop_even], batch);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn empty_return_drops_batch() {
        let drop_all: Filter = Arc::new(|_| Vec::new());
        let batch = vec![span(1)];
        let result = apply_filters(&[drop_all], batch);
        assert!(result.is_empty());
    }

    #[test]
    fn panicking_filter_preserves_pre_filter_batch() {
        let boom: Filter = Arc::new(|_: Vec<Arc<Span>>| panic!("boom"));
        let passthrough: Filter = Arc::new(|batch| batch);
        let batch = vec![span(1), span(2)];
        let result = apply_filters(&[boom, passthrough], batch);
        assert_eq!(result.len(), 2);
    }
}
