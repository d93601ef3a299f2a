use thiserror::Error;

/// Errors raised while turning environment variables into a [`crate::TracerConfig`].
///
/// These are the only errors the tracing core ever surfaces to a caller:
/// everything past configure-time (start/finish/activate) is infallible from
/// the application's point of view.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `DD_TRACE_AGENT_URL` used a scheme other than `http`, `https`, or `unix`.
    #[error("unknown scheme `{0}` for agent URL")]
    UnknownAgentScheme(String),

    /// `DD_DOGSTATSD_URL` could not be parsed as `udp://host:port`, `unix://path`,
    /// a bare `host:port`, or a bare absolute path.
    #[error("invalid DogStatsD URL `{0}`")]
    InvalidDogstatsdUrl(String),

    /// A `*_PORT` environment variable did not parse as a `u16`.
    #[error("invalid port value `{value}` for {var}")]
    InvalidPort {
        /// The environment variable that held the bad value.
        var: &'static str,
        /// The raw string value that failed to parse.
        value: String,
    },

    /// A boolean-valued environment variable held something other than a
    /// recognized truthy/falsy token.
    #[error("invalid boolean value `{value}` for {var}")]
    InvalidBool {
        /// The environment variable that held the bad value.
        var: &'static str,
        /// The raw string value that failed to parse.
        value: String,
    },
}
