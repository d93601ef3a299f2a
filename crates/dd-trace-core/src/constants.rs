//! Wire-format tag/metric keys. These strings are read by the collector and
//! must not be changed without a corresponding collector-side change.

/// Metric key carrying the distributed sampling priority on the chunk root.
pub const SAMPLING_PRIORITY_KEY: &str = "_sampling_priority_v1";

/// Metric key carrying the sample rate applied by [`crate::sampler::RateSampler`].
pub const SAMPLE_RATE_METRIC_KEY: &str = "_sample_rate";

/// Meta key carrying trace provenance (e.g. `"synthetics"`).
pub const ORIGIN_KEY: &str = "_dd.origin";

/// Meta key for the global environment tag.
pub const ENV_KEY: &str = "env";

/// Meta key for the application version tag (internal application spans only).
pub const VERSION_KEY: &str = "version";

/// Meta key for the per-process runtime identifier.
pub const RUNTIME_ID_KEY: &str = "runtime-id";

/// Meta key stamped on internal application root spans.
pub const LANGUAGE_KEY: &str = "language";

/// Meta key for the local hostname, when hostname reporting is enabled.
pub const HOSTNAME_KEY: &str = "_dd.hostname";

/// System metric key for the process id.
pub const PID_METRIC_KEY: &str = "system.pid";

/// The value stamped into [`LANGUAGE_KEY`].
pub const LANGUAGE_VALUE: &str = "rust";

/// Default partial-flush threshold, per `DD_TRACER_PARTIAL_FLUSH_MIN_SPANS`.
pub const DEFAULT_PARTIAL_FLUSH_MIN_SPANS: usize = 500;
