//! DogStatsD-style health metrics: fire-and-forget UDP, never on the hot path.

use std::net::UdpSocket;
use std::sync::Mutex;

use dd_trace_config::DogstatsdTarget;

/// Sends StatsD counters to the configured DogStatsD target.
///
/// Every send is best-effort: a socket error is logged at `debug` and
/// swallowed, since a broken metrics pipe must never affect span delivery.
pub struct StatsdClient {
    target: DogstatsdTarget,
    socket: Option<UdpSocket>,
    #[cfg(unix)]
    unix_socket: Mutex<Option<std::os::unix::net::UnixDatagram>>,
}

impl StatsdClient {
    /// Binds a client for the given target. Binding failure degrades to a
    /// permanently-inert client rather than propagating an error: metrics are
    /// always optional.
    pub fn new(target: DogstatsdTarget) -> Self {
        let socket = match &target {
            DogstatsdTarget::Udp { .. } => UdpSocket::bind("0.0.0.0:0")
                .inspect_err(|e| tracing::debug!(error = %e, "dogstatsd udp bind failed"))
                .ok(),
            DogstatsdTarget::Unix { .. } => None,
        };
        #[cfg(unix)]
        let unix_socket = match &target {
            DogstatsdTarget::Unix { .. } => std::os::unix::net::UnixDatagram::unbound()
                .inspect_err(|e| tracing::debug!(error = %e, "dogstatsd unix bind failed"))
                .ok(),
            DogstatsdTarget::Udp { .. } => None,
        };
        Self {
            target,
            socket,
            #[cfg(unix)]
            unix_socket: Mutex::new(unix_socket),
        }
    }

    /// Increments a counter by `value`, tagged StatsD-style.
    pub fn increment(&self, metric: &str, value: i64, tags: &[&str]) {
        let line = self.format_line(metric, value, tags);
        self.send(&line);
    }

    fn format_line(&self, metric: &str, value: i64, tags: &[&str]) -> String {
        if tags.is_empty() {
            format!("{metric}:{value}|c")
        } else {
            format!("{metric}:{value}|c|#{}", tags.join(","))
        }
    }

    fn send(&self, line: &str) {
        match &self.target {
            DogstatsdTarget::Udp { host, port } => {
                if let Some(socket) = &self.socket {
                    if let Err(e) = socket.send_to(line.as_bytes(), (host.as_str(), *port)) {
                        tracing::debug!(error = %e, "dogstatsd send failed");
                    }
                }
            }
            DogstatsdTarget::Unix { path } => {
                #[cfg(unix)]
                {
                    let guard = self.unix_socket.lock().expect("lock poisoned");
                    if let Some(socket) = guard.as_ref() {
                        if let Err(e) = socket.send_to(line.as_bytes(), path) {
                            tracing::debug!(error = %e, "dogstatsd send failed");
                        }
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = path;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn formats_line_with_tags() {
        let client = StatsdClient::new(DogstatsdTarget::Udp {
            host: "127.0.0.1".to_string(),
            port: 8125,
        });
        let line = client.format_line("writer.dropped_batches", 1, &["writer:agent"]);
        assert_eq!(line, "writer.dropped_batches:1|c|#writer:agent");
    }

    #[test]
    fn formats_line_without_tags() {
        let client = StatsdClient::new(DogstatsdTarget::Udp {
            host: "127.0.0.1".to_string(),
            port: 8125,
        });
        assert_eq!(client.format_line("x", 3, &[]), "x:3|c");
    }

    #[test]
    fn unix_target_never_panics_on_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dsd.socket");
        let client = StatsdClient::new(DogstatsdTarget::Unix {
            path: path.to_string_lossy().to_string(),
        });
        client.increment("x", 1, &[]);
    }
}
