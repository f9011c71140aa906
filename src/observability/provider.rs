//! Process-wide observability provider with explicit `init`/`shutdown`.
//!
//! A single process-wide handle: `init` is idempotent, `shutdown` without a
//! prior `init` is a no-op, and the default implementation is a no-op sink
//! so tests that never call `init` still work.

use std::sync::{Arc, OnceLock};

use crate::config::ObservabilityConfig;
use crate::observability::logging::{Logger, NoopLogger, StderrLogger};
use crate::observability::metrics::{MetricsProvider, MetricsRegistry};
use crate::observability::tracer::{DefaultTracer, Tracer};

/// Bundles the three observability capabilities behind one process-wide
/// handle. Tracer instances are looked up by name; today every name resolves
/// to the same underlying tracer since the core has no per-component
/// sampling policy, but the lookup-by-name shape leaves room for one later.
pub struct ObservabilityProvider {
    logger: Arc<dyn Logger>,
    metrics: Arc<dyn MetricsProvider>,
    tracer: Arc<dyn Tracer>,
}

impl ObservabilityProvider {
    fn noop() -> Self {
        Self {
            logger: Arc::new(NoopLogger),
            metrics: Arc::new(MetricsRegistry::new()),
            tracer: Arc::new(DefaultTracer::new("noop", 1.0)),
        }
    }

    fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            logger: Arc::new(StderrLogger::new(
                config.service_name.clone(),
                config.service_version.clone(),
                config.environment.clone(),
            )),
            metrics: Arc::new(MetricsRegistry::new()),
            tracer: Arc::new(DefaultTracer::new(config.service_name.clone(), config.sampling_ratio)),
        }
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    pub fn metrics(&self) -> Arc<dyn MetricsProvider> {
        Arc::clone(&self.metrics)
    }

    /// Tracer instances are looked up by name; see struct docs.
    pub fn tracer(&self, _name: &str) -> Arc<dyn Tracer> {
        Arc::clone(&self.tracer)
    }
}

static PROVIDER: OnceLock<ObservabilityProvider> = OnceLock::new();

/// Process-wide entry point. `init` is idempotent; a second call is ignored
/// and the first-installed provider wins. `shutdown` is presently a no-op
/// observation point (the core owns no exporter threads to flush); it exists
/// so callers have one lifecycle to drive regardless of which sink is wired
/// in underneath.
pub struct Provider;

impl Provider {
    pub fn init(config: &ObservabilityConfig) {
        let _ = PROVIDER.set(ObservabilityProvider::from_config(config));
    }

    pub fn current() -> &'static ObservabilityProvider {
        PROVIDER.get_or_init(ObservabilityProvider::noop)
    }

    pub fn shutdown() {
        // No exporter threads are owned by this provider today; flushing an
        // external collaborator (e.g. an OTLP exporter) happens outside the
        // core. Kept as an explicit call site so callers don't need to know
        // that.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_without_init_is_noop() {
        // Each test process gets its own OnceLock state only within this
        // binary; we only assert it doesn't panic and returns usable handles.
        let provider = Provider::current();
        provider.logger().info("probe");
        provider.metrics().counter("probe").inc();
    }
}
