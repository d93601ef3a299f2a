//! Environment-driven configuration for the tracing core.
//!
//! This crate owns everything the tracer needs to know before the first span
//! is created: where to ship finished traces, where to send health metrics,
//! and the global tags stamped onto every span. It has no dependency on
//! `dd-trace-core` so the core can depend on it without a cycle.

mod config;
mod error;
mod runtime;
mod url;

pub use config::{Destination, TracerConfig};
pub use error::ConfigError;
pub use runtime::{hostname, regenerate_runtime_id, runtime_id};
pub use url::{AgentEndpoint, AgentUrlScheme, DogstatsdTarget};
