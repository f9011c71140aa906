//! Static startup configuration: one TOML document, validated once at
//! construction. No hot-reload, no layering; fail-closed validation at
//! build time and nothing more.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("server.worker_lanes must be at least 1")]
    WorkerLanesZero,
    #[error("limits.max_concurrent must be at least 1")]
    MaxConcurrentZero,
    #[error("server.bind_addr must not be empty")]
    BindAddrEmpty,
    #[error("observability.sampling_ratio must be within [0.0, 1.0]")]
    SamplingRatioOutOfRange,
    #[error("http_client.retry_policy.max_attempts must be at least 1")]
    RetryAttemptsZero,
    #[error("config document could not be parsed as TOML")]
    Malformed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub worker_lanes: usize,
    /// Inbound request body cap, in bytes; a body that grows past this while
    /// streaming gets a 413 instead of being buffered to completion.
    pub request_body_limit: usize,
    /// A connection with no new stream accepted within this window is closed.
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8443".to_string(),
            worker_lanes: 8,
            request_body_limit: 10 * 1024 * 1024,
            idle_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    /// Where spans/metrics/logs ultimately ship to; this core only validates
    /// and stores the value; the exporter itself is an external collaborator.
    pub exporter_endpoint: Option<String>,
    /// Fraction of root spans marked sampled, in `[0.0, 1.0]`.
    pub sampling_ratio: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "triage-core".to_string(),
            service_version: "0.0.0".to_string(),
            environment: "development".to_string(),
            exporter_endpoint: None,
            sampling_ratio: 1.0,
        }
    }
}

/// Load-shedding limits; see [`crate::limits`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_concurrent: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self { max_concurrent: 512 }
    }
}

/// Retry policy for a downstream HTTP client. Validated here; not exercised
/// by this core, which issues no outbound HTTP calls of its own (the
/// downstream collaborators in [`crate::message::Payload::DownstreamQuery`]
/// are answered by whatever owns the query, not by an HTTP client this crate
/// drives itself).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_ms: 100 }
    }
}

/// Timeouts and retry policy for the `h2` adapter's downstream client use, if
/// any handler wires one up (see [`crate::shortener`] for the in-process
/// default, which ignores this entirely).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { connect_timeout_ms: 2_000, request_timeout_ms: 10_000, retry_policy: RetryPolicy::default() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub observability: ObservabilityConfig,
    pub resilience: ResilienceConfig,
    pub http_client: HttpClientConfig,
}

impl Config {
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(document).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::Malformed)?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.worker_lanes == 0 {
            return Err(ConfigError::WorkerLanesZero);
        }
        if self.server.bind_addr.is_empty() {
            return Err(ConfigError::BindAddrEmpty);
        }
        if self.resilience.max_concurrent == 0 {
            return Err(ConfigError::MaxConcurrentZero);
        }
        if !(0.0..=1.0).contains(&self.observability.sampling_ratio) {
            return Err(ConfigError::SamplingRatioOutOfRange);
        }
        if self.http_client.retry_policy.max_attempts == 0 {
            return Err(ConfigError::RetryAttemptsZero);
        }
        Ok(())
    }
}
