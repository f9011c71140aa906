//! Observability fabric: spans, counters/histograms, structured logs with
//! automatic trace correlation, and a process-wide provider with explicit
//! `init`/`shutdown`.
//!
//! The [`crate::trace::TraceContext`] carrier itself lives in the top-level
//! `trace` module since every other component depends on it, not just
//! observability.

pub mod logging;
pub mod metrics;
pub mod provider;
pub mod tracer;

pub use logging::{LogField, LogRecord, LogSeverity, Logger, NoopLogger, StderrLogger};
pub use metrics::{Counter, Histogram, MetricsProvider, MetricsRegistry};
pub use provider::{ObservabilityProvider, Provider};
pub use tracer::{current_span_ids, with_active_span, Span, SpanKind, SpanStatus, Tracer};
