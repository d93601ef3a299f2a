use std::collections::HashMap;
use std::env;

use crate::error::ConfigError;
use crate::url::{AgentEndpoint, AgentUrlScheme, DogstatsdTarget};

const DEFAULT_AGENT_PORT: u16 = 8126;
const DEFAULT_DOGSTATSD_PORT: u16 = 8125;
const DEFAULT_PARTIAL_FLUSH_MIN_SPANS: usize = 500;

/// Where finished trace batches should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A local or remote trace agent, reachable via the given endpoint.
    Agent(AgentEndpoint),
    /// No agent is reachable (e.g. AWS Lambda without a sidecar); batches are
    /// written to the process log stream instead.
    Agentless,
}

/// Fully resolved tracer configuration, built from environment variables.
///
/// See §6 of the specification for the full list of recognized variables.
/// Nothing in here is re-read after the tracer starts; a process that wants
/// to pick up new environment values must rebuild its `Tracer`.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerConfig {
    /// Where to ship finished trace batches.
    pub destination: Destination,
    /// Where to send DogStatsD health metrics.
    pub dogstatsd_target: DogstatsdTarget,
    /// Master switch; when false, spans are created but never written.
    pub trace_enabled: bool,
    /// Raises tracer-internal logging to debug level.
    pub trace_debug: bool,
    /// Emit a one-shot startup diagnostics record.
    pub startup_logs: bool,
    /// Whether long traces may be shipped in chunks before the root finishes.
    pub partial_flush_enabled: bool,
    /// Finished-span threshold that triggers a partial flush.
    pub partial_flush_min_spans: usize,
    /// Default service name applied when a span specifies none and has no
    /// parent to inherit from.
    pub service: Option<String>,
    /// Global `env` tag applied to every span.
    pub env: Option<String>,
    /// Global `version` tag applied to internal application spans.
    pub version: Option<String>,
    /// Global tags applied to every span created by this tracer.
    pub tags: HashMap<String, String>,
    /// Whether to stamp `_dd.hostname` onto root spans.
    pub report_hostname: bool,
}

impl TracerConfig {
    /// Builds a configuration by reading the process environment, per §6.
    pub fn from_env() -> Result<Self, ConfigError> {
        let agent_host = env::var("DD_AGENT_HOST")
            .or_else(|_| env::var("DATADOG_TRACE_AGENT_HOSTNAME"))
            .ok();
        let explicit_agent_url = env::var("DD_TRACE_AGENT_URL").ok();
        let has_agent_signal = agent_host.is_some() || explicit_agent_url.is_some();

        let destination = if !has_agent_signal && env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
            Destination::Agentless
        } else if let Some(url) = explicit_agent_url {
            Destination::Agent(AgentEndpoint::parse(&url)?)
        } else {
            let host = agent_host.unwrap_or_else(|| "localhost".to_string());
            let port = parse_port_env("DD_TRACE_AGENT_PORT", DEFAULT_AGENT_PORT)?;
            Destination::Agent(AgentEndpoint {
                scheme: AgentUrlScheme::Http,
                host,
                port,
                uds_path: None,
            })
        };

        let dogstatsd_target = match env::var("DD_DOGSTATSD_URL") {
            Ok(url) => DogstatsdTarget::parse(&url)?,
            Err(_) => {
                let port = parse_port_env("DD_DOGSTATSD_PORT", DEFAULT_DOGSTATSD_PORT)?;
                DogstatsdTarget::Udp {
                    host: "localhost".to_string(),
                    port,
                }
            }
        };

        Ok(Self {
            destination,
            dogstatsd_target,
            trace_enabled: parse_bool_env("DD_TRACE_ENABLED", true)?,
            trace_debug: parse_bool_env("DD_TRACE_DEBUG", false)?,
            startup_logs: parse_bool_env("DD_TRACE_STARTUP_LOGS", false)?,
            partial_flush_enabled: parse_bool_env("DD_TRACER_PARTIAL_FLUSH_ENABLED", true)?,
            partial_flush_min_spans: parse_usize_env(
                "DD_TRACER_PARTIAL_FLUSH_MIN_SPANS",
                DEFAULT_PARTIAL_FLUSH_MIN_SPANS,
            )?,
            service: env::var("DD_SERVICE").ok(),
            env: env::var("DD_ENV").ok(),
            version: env::var("DD_VERSION").ok(),
            tags: parse_tags_env(),
            report_hostname: false,
        })
    }
}

fn parse_bool_env(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
    }
}

fn parse_port_env(var: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { var, value }),
    }
}

fn parse_usize_env(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => value
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidPort { var, value }),
    }
}

/// Parses `DD_TAGS` in `key:value,key:value` form, skipping malformed pairs
/// rather than failing configuration over a cosmetic typo.
fn parse_tags_env() -> HashMap<String, String> {
    let Ok(raw) = env::var("DD_TAGS") else {
        return HashMap::new();
    };
    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't observe each other's mutations.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "DD_AGENT_HOST",
            "DATADOG_TRACE_AGENT_HOSTNAME",
            "DD_TRACE_AGENT_URL",
            "DD_TRACE_AGENT_PORT",
            "DD_DOGSTATSD_URL",
            "DD_DOGSTATSD_PORT",
            "DD_TRACE_ENABLED",
            "DD_TRACE_DEBUG",
            "DD_TRACE_STARTUP_LOGS",
            "DD_TRACER_PARTIAL_FLUSH_ENABLED",
            "DD_TRACER_PARTIAL_FLUSH_MIN_SPANS",
            "DD_SERVICE",
            "DD_ENV",
            "DD_VERSION",
            "DD_TAGS",
            "AWS_LAMBDA_FUNCTION_NAME",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn defaults_point_at_localhost_agent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let config = TracerConfig::from_env().unwrap();
        assert_eq!(
            config.destination,
            Destination::Agent(AgentEndpoint {
                scheme: AgentUrlScheme::Http,
                host: "localhost".to_string(),
                port: DEFAULT_AGENT_PORT,
                uds_path: None,
            })
        );
        assert!(config.trace_enabled);
        assert!(config.partial_flush_enabled);
        assert_eq!(config.partial_flush_min_spans, DEFAULT_PARTIAL_FLUSH_MIN_SPANS);
    }

    #[test]
    fn lambda_without_agent_host_is_agentless() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("AWS_LAMBDA_FUNCTION_NAME", "my-function");
        let config = TracerConfig::from_env().unwrap();
        assert_eq!(config.destination, Destination::Agentless);
        clear_env();
    }

    #[test]
    fn lambda_with_agent_host_still_uses_agent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("AWS_LAMBDA_FUNCTION_NAME", "my-function");
        env::set_var("DD_AGENT_HOST", "sidecar");
        let config = TracerConfig::from_env().unwrap();
        assert!(matches!(config.destination, Destination::Agent(_)));
        clear_env();
    }

    #[test]
    fn explicit_agent_url_overrides_host_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DD_TRACE_AGENT_URL", "unix:///var/run/dd.sock");
        let config = TracerConfig::from_env().unwrap();
        assert_eq!(
            config.destination,
            Destination::Agent(AgentEndpoint {
                scheme: AgentUrlScheme::Unix,
                host: String::new(),
                port: 0,
                uds_path: Some("/var/run/dd.sock".to_string()),
            })
        );
        clear_env();
    }

    #[test]
    fn rejects_unknown_agent_scheme() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DD_TRACE_AGENT_URL", "ftp://nope");
        let err = TracerConfig::from_env().unwrap_err();
        assert_eq!(err, ConfigError::UnknownAgentScheme("ftp".to_string()));
        clear_env();
    }

    #[test]
    fn parses_tags() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DD_TAGS", "team:infra,tier:1");
        let config = TracerConfig::from_env().unwrap();
        assert_eq!(config.tags.get("team").map(String::as_str), Some("infra"));
        assert_eq!(config.tags.get("tier").map(String::as_str), Some("1"));
        clear_env();
    }

    #[test]
    fn rejects_malformed_bool() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DD_TRACE_ENABLED", "maybe");
        let err = TracerConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { .. }));
        clear_env();
    }
}
