//! Ships finished span batches to a Datadog agent over HTTP(S) or a Unix
//! domain socket from a background Tokio task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use dd_trace_config::{AgentEndpoint, AgentUrlScheme};
use dd_trace_core::{Span, Writer};
use tokio::sync::{mpsc, Notify};

use crate::statsd::StatsdClient;
use crate::wire::batch_to_json;

const CHANNEL_CAPACITY: usize = 1024;
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const TRACES_PATH: &str = "/v0.4/traces";

/// Writer backed by a bounded channel drained by a background task that
/// batches on a fixed interval and POSTs JSON-encoded batches to the agent.
pub struct AgentWriter {
    sender: mpsc::Sender<Vec<Arc<Span>>>,
    shutdown: Arc<Notify>,
    alive: Arc<AtomicBool>,
    done: Mutex<Option<std_mpsc::Receiver<()>>>,
    endpoint: AgentEndpoint,
    statsd: Arc<StatsdClient>,
}

impl AgentWriter {
    /// Spawns the background flush task on the calling Tokio runtime.
    pub fn new(endpoint: AgentEndpoint, statsd: Arc<StatsdClient>) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let shutdown = Arc::new(Notify::new());
        let alive = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = std_mpsc::channel();

        let task_endpoint = endpoint.clone();
        let task_alive = alive.clone();
        let task_shutdown = shutdown.clone();
        let task_statsd = statsd.clone();
        tokio::spawn(async move {
            run_flush_loop(task_endpoint, receiver, task_shutdown, task_statsd).await;
            task_alive.store(false, Ordering::Release);
            let _ = done_tx.send(());
        });

        Self {
            sender,
            shutdown,
            alive,
            done: Mutex::new(Some(done_rx)),
            endpoint,
            statsd,
        }
    }
}

impl Writer for AgentWriter {
    fn write(&self, batch: Vec<Arc<Span>>) {
        if batch.is_empty() {
            return;
        }
        match self.sender.try_send(batch) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.statsd
                    .increment("datadog.tracer.queue.dropped", 1, &[]);
                tracing::warn!("agent writer queue full, dropping batch");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("agent writer stopped, dropping batch");
            }
        }
    }

    fn stop(&self) {
        self.shutdown.notify_one();
    }

    fn join(&self, timeout: Option<Duration>) {
        let receiver = self.done.lock().expect("lock poisoned").take();
        if let Some(receiver) = receiver {
            match timeout {
                Some(timeout) => {
                    let _ = receiver.recv_timeout(timeout);
                }
                None => {
                    let _ = receiver.recv();
                }
            }
        }
    }

    fn recreate(&self) -> Box<dyn Writer> {
        Box::new(AgentWriter::new(self.endpoint.clone(), self.statsd.clone()))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

async fn run_flush_loop(
    endpoint: AgentEndpoint,
    mut receiver: mpsc::Receiver<Vec<Arc<Span>>>,
    shutdown: Arc<Notify>,
    statsd: Arc<StatsdClient>,
) {
    let client = reqwest::Client::new();
    let mut buffer: Vec<Arc<Span>> = Vec::new();
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            maybe_batch = receiver.recv() => {
                match maybe_batch {
                    Some(batch) => buffer.extend(batch),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(&client, &endpoint, &statsd, std::mem::take(&mut buffer)).await;
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    receiver.close();
    while let Ok(batch) = receiver.try_recv() {
        buffer.extend(batch);
    }
    if !buffer.is_empty() {
        flush(&client, &endpoint, &statsd, buffer).await;
    }
}

async fn flush(
    client: &reqwest::Client,
    endpoint: &AgentEndpoint,
    statsd: &StatsdClient,
    batch: Vec<Arc<Span>>,
) {
    let body = match batch_to_json(&batch) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode span batch");
            return;
        }
    };

    match endpoint.scheme {
        AgentUrlScheme::Http | AgentUrlScheme::Https => {
            let scheme = if endpoint.scheme == AgentUrlScheme::Https {
                "https"
            } else {
                "http"
            };
            let url = format!("{scheme}://{}:{}{TRACES_PATH}", endpoint.host, endpoint.port);
            match client
                .post(url)
                .header("Content-Type", "application/json")
                .body(body)
                .send()
                .await
            {
                Ok(resp) if !resp.status().is_success() => {
                    statsd.increment("datadog.tracer.api.errors", 1, &[]);
                    tracing::warn!(status = %resp.status(), "agent rejected trace batch");
                }
                Err(e) => {
                    statsd.increment("datadog.tracer.api.errors", 1, &[]);
                    tracing::warn!(error = %e, "failed to reach trace agent");
                }
                Ok(_) => {}
            }
        }
        AgentUrlScheme::Unix => {
            if let Some(path) = &endpoint.uds_path {
                send_over_uds(path, &body).await;
            }
        }
    }
}

#[cfg(unix)]
async fn send_over_uds(path: &str, body: &str) {
    use tokio::io::AsyncWriteExt;
    match tokio::net::UnixStream::connect(path).await {
        Ok(mut stream) => {
            let request = format!(
                "POST {TRACES_PATH} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            if let Err(e) = stream.write_all(request.as_bytes()).await {
                tracing::warn!(error = %e, "failed to write trace batch to agent socket");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, path, "failed to connect to agent unix socket");
        }
    }
}

#[cfg(not(unix))]
async fn send_over_uds(_path: &str, _body: &str) {
    tracing::warn!("unix domain socket agent transport is unavailable on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_trace_config::DogstatsdTarget;
    use dd_trace_core::{SpanId, SpanType, TraceId};

    fn writer() -> AgentWriter {
        let statsd = Arc::new(StatsdClient::new(DogstatsdTarget::Udp {
            host: "127.0.0.1".to_string(),
            port: 8125,
        }));
        let endpoint = AgentEndpoint {
            scheme: AgentUrlScheme::Http,
            host: "127.0.0.1".to_string(),
            port: 18126,
            uds_path: None,
        };
        AgentWriter::new(endpoint, statsd)
    }

    #[tokio::test]
    async fn writer_starts_alive_and_accepts_batches() {
        let w = writer();
        assert!(w.is_alive());
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

    #[tokio::test]
    async fn stop_then_join_returns() {
        let w = writer();
        w.stop();
        w.join(Some(Duration::from_secs(5)));
        assert!(!w.is_alive());
    }

    #[tokio::test]
    async fn recreate_produces_a_fresh_writer() {
        let w = writer();
        let w2 = w.recreate();
        assert!(w2.is_alive());
    }

    /// `write` must never block: on a current-thread runtime the background
    /// task cannot run until this test yields, so pushing past
    /// `CHANNEL_CAPACITY` without awaiting anything forces the full-queue
    /// drop path deterministically rather than racing the flush task.
    #[tokio::test]
    async fn write_drops_rather_than_blocks_when_queue_is_full() {
        let w = writer();
        for _ in 0..(CHANNEL_CAPACITY + 10) {
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
    }
}
