//! Minimal URL parsing for the two schemes the tracer needs to understand:
//! the Datadog-style agent URL and the DogStatsD target URL. A full `url`
//! crate dependency would be overkill for the handful of forms these values
//! take, so parsing is done by hand, mirroring the source's use of
//! `urlparse` for exactly the fields it reads (scheme, host, port, path).

use crate::error::ConfigError;

/// Transport scheme for the trace agent endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentUrlScheme {
    /// Plain HTTP over TCP.
    Http,
    /// HTTPS (TLS) over TCP.
    Https,
    /// Unix domain socket.
    Unix,
}

/// A fully resolved agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoint {
    /// Transport scheme.
    pub scheme: AgentUrlScheme,
    /// Hostname (only meaningful for `Http`/`Https`).
    pub host: String,
    /// Port (only meaningful for `Http`/`Https`).
    pub port: u16,
    /// Socket path (only meaningful for `Unix`).
    pub uds_path: Option<String>,
}

impl AgentEndpoint {
    /// Parses an agent URL of the form `http://host:port`, `https://host:port`,
    /// or `unix:///path/to/socket`.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let (scheme_str, rest) = url
            .split_once("://")
            .ok_or_else(|| ConfigError::UnknownAgentScheme(url.to_string()))?;

        match scheme_str {
            "http" | "https" => {
                let scheme = if scheme_str == "https" {
                    AgentUrlScheme::Https
                } else {
                    AgentUrlScheme::Http
                };
                let authority = rest.split('/').next().unwrap_or(rest);
                let (host, port) = match authority.rsplit_once(':') {
                    Some((h, p)) => {
                        let port = p.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                            var: "DD_TRACE_AGENT_URL",
                            value: p.to_string(),
                        })?;
                        (h.to_string(), port)
                    }
                    None => {
                        let default_port = if scheme == AgentUrlScheme::Https { 443 } else { 80 };
                        (authority.to_string(), default_port)
                    }
                };
                Ok(Self {
                    scheme,
                    host,
                    port,
                    uds_path: None,
                })
            }
            "unix" => Ok(Self {
                scheme: AgentUrlScheme::Unix,
                host: String::new(),
                port: 0,
                uds_path: Some(format!("/{}", rest.trim_start_matches('/'))),
            }),
            other => Err(ConfigError::UnknownAgentScheme(other.to_string())),
        }
    }
}

/// Where DogStatsD metrics should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DogstatsdTarget {
    /// Send over UDP to this host:port.
    Udp {
        /// Destination host.
        host: String,
        /// Destination port.
        port: u16,
    },
    /// Send over a Unix domain socket at this path.
    Unix {
        /// Socket path.
        path: String,
    },
}

impl DogstatsdTarget {
    /// Parses a DogStatsD URL per the source's `_parse_dogstatsd_url`:
    /// a bare absolute path implies `unix://`, a scheme-less `host:port`
    /// implies `udp://`, and `udp://`/`unix://` are accepted verbatim.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let normalized = if raw.starts_with('/') {
            format!("unix://{raw}")
        } else if !raw.contains("://") {
            format!("udp://{raw}")
        } else {
            raw.to_string()
        };

        let (scheme, rest) = normalized
            .split_once("://")
            .ok_or_else(|| ConfigError::InvalidDogstatsdUrl(raw.to_string()))?;

        match scheme {
            "unix" => Ok(DogstatsdTarget::Unix {
                path: format!("/{}", rest.trim_start_matches('/')),
            }),
            "udp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| ConfigError::InvalidDogstatsdUrl(raw.to_string()))?;
                let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                    var: "DD_DOGSTATSD_URL",
                    value: port.to_string(),
                })?;
                Ok(DogstatsdTarget::Udp {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Err(ConfigError::InvalidDogstatsdUrl(raw.to_string())),
        }
    }
}
