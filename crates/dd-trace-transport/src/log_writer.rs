//! Agentless fallback writer: serializes each batch as a JSON line to stdout
//! instead of contacting an agent. Used under `Destination::Agentless`
//! (for example, AWS Lambda with the Datadog log forwarder).

use std::io::Write as _;
use std::sync::Arc;

use dd_trace_core::{Span, Writer};

use crate::wire::batch_to_json;

/// Writes each finished batch as one JSON line to stdout.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Constructs a new log writer. Stateless: every call is independent.
    pub fn new() -> Self {
        Self
    }
}

impl Writer for LogWriter {
    fn write(&self, batch: Vec<Arc<Span>>) {
        if batch.is_empty() {
            return;
        }
        match batch_to_json(&batch) {
            Ok(line) => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                if let Err(e) = writeln!(handle, "{line}") {
                    tracing::warn!(error = %e, "failed to write span batch to stdout");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode span batch"),
        }
    }

    fn stop(&self) {}

    fn join(&self, _timeout: Option<std::time::Duration>) {}

    fn recreate(&self) -> Box<dyn Writer> {
        Box::new(LogWriter::new())
    }

    fn is_alive(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_trace_core::{SpanId, SpanType, TraceId};

    #[test]
    fn empty_batch_is_a_no_op() {
        let w = LogWriter::new();
        w.write(Vec::new());
    }

    #[test]
    fn writes_a_batch_without_panicking() {
        let w = LogWriter::new();
        let span = Arc::new(Span::new(
            TraceId::new(1),
            SpanId::new(1),
            None,
            None,
            "op",
            SpanType::Custom,
        ));
        span.finish();
        w.write(vec![span]);
    }

    #[test]
    fn recreate_yields_an_equally_stateless_writer() {
        let w = LogWriter::new();
        let w2 = w.recreate();
        assert!(w2.is_alive());
    }
}
