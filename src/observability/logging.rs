//! Structured log sink with automatic trace correlation.
//!
//! `Logger` exposes `debug`/`info`/`warn`/`error`/`fatal` convenience methods
//! built atop a single required `log`. The active span (see
//! [`crate::observability::tracer`]) is consulted automatically so callers
//! never have to thread a trace context through every log call by hand.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warn => "warn",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        }
    }
}

pub type LogField = (&'static str, String);

/// A single structured log record: `timestamp`, `level`, `message`,
/// `trace_id`, `span_id`, and free-form `attributes`.
#[derive(Debug)]
pub struct LogRecord {
    pub message: String,
    pub severity: LogSeverity,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub attributes: Vec<LogField>,
}

/// Log sink contract. `log` is the only required method; severity-specific
/// helpers build a [`LogRecord`] and attach the thread's active span (if any)
/// before delegating.
pub trait Logger: Send + Sync + 'static {
    fn log(&self, record: LogRecord);

    fn log_at(&self, severity: LogSeverity, message: &str, attributes: Vec<LogField>) {
        let (trace_id, span_id) = crate::observability::tracer::current_span_ids();
        self.log(LogRecord { message: message.to_string(), severity, trace_id, span_id, attributes });
    }

    fn debug(&self, message: &str) {
        self.log_at(LogSeverity::Debug, message, Vec::new());
    }

    fn info(&self, message: &str) {
        self.log_at(LogSeverity::Info, message, Vec::new());
    }

    fn warn(&self, message: &str) {
        self.log_at(LogSeverity::Warn, message, Vec::new());
    }

    fn error(&self, message: &str) {
        self.log_at(LogSeverity::Error, message, Vec::new());
    }

    fn fatal(&self, message: &str) {
        self.log_at(LogSeverity::Fatal, message, Vec::new());
    }
}

/// Writes ISO-8601-with-microseconds, key=value lines to stderr. The default
/// non-noop logger; production deployments swap this for a real sink
/// (an external collaborator, like the OTLP exporter).
pub struct StderrLogger {
    service_name: String,
    service_version: String,
    environment: String,
}

impl StderrLogger {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>, environment: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), service_version: service_version.into(), environment: environment.into() }
    }
}

impl Logger for StderrLogger {
    fn log(&self, record: LogRecord) {
        let timestamp = unix_micros_timestamp();
        let mut line = format!(
            "{timestamp} {:<5} service={} version={} env={} msg=\"{}\"",
            record.severity.as_str(),
            self.service_name,
            self.service_version,
            self.environment,
            record.message
        );
        if let Some(trace_id) = &record.trace_id {
            use fmt::Write;
            let _ = write!(line, " trace_id={trace_id}");
        }
        if let Some(span_id) = &record.span_id {
            use fmt::Write;
            let _ = write!(line, " span_id={span_id}");
        }
        for (key, value) in &record.attributes {
            use fmt::Write;
            let _ = write!(line, " {key}={value}");
        }
        eprintln!("{line}");
    }
}

/// Discards everything. The default when no provider has been initialized.
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: LogRecord) {}
}

fn unix_micros_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() as i64;
    let micros = now.subsec_micros();
    let days = secs.div_euclid(86_400);
    let secs_of_day = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3_600;
    let minute = (secs_of_day % 3_600) / 60;
    let second = secs_of_day % 60;
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micros:06}Z")
}

/// Civil calendar date from a day count relative to the Unix epoch
/// (1970-01-01), via Howard Hinnant's `civil_from_days` algorithm: proleptic
/// Gregorian, correct for any `i64` day count without a date library.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}
