#![warn(missing_docs)]

//! Concrete [`dd_trace_core::Writer`] implementations and a DogStatsD metrics
//! sink, built on the configuration types from `dd-trace-config`.

/// HTTP(S)/Unix-domain-socket writer that talks to a real Datadog agent.
pub mod agent_writer;
/// Agentless JSON-lines-to-stdout writer.
pub mod log_writer;
/// DogStatsD UDP/Unix health-metrics sink.
pub mod statsd;
/// JSON wire representation shared by both writers.
pub mod wire;

pub use agent_writer::AgentWriter;
pub use log_writer::LogWriter;
pub use statsd::StatsdClient;
pub use wire::{batch_to_json, WireSpan};
