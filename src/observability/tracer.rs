//! Span lifecycle and a thread-local "current span" used to auto-correlate
//! log records.
//!
//! `TraceContext` stays propagation-only; this module layers a separate
//! recording concept on top. `Span` wraps a [`TraceContext`] plus the mutable
//! bits (attributes, status, end time) that only the recording side needs.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::trace::TraceContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanKind {
    Server,
    Client,
    Internal,
    Producer,
    Consumer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanStatus {
    Unset,
    Ok,
    Error(String),
}

#[derive(Clone, Debug)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Double(u64), // bit pattern of an f64, kept Eq/Hash-friendly
    Bool(bool),
}

struct SpanState {
    context: TraceContext,
    name: String,
    kind: SpanKind,
    status: SpanStatus,
    attributes: BTreeMap<String, AttributeValue>,
    events: Vec<(String, Vec<(String, AttributeValue)>)>,
    ended: AtomicBool,
}

/// A recording unit of work. `end()` is idempotent; `is_recording()` reports
/// whether it has *not* yet ended.
#[derive(Clone)]
pub struct Span {
    state: Arc<parking_lot::Mutex<SpanState>>,
    context: TraceContext,
}

impl Span {
    fn new(context: TraceContext, name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            context: context.clone(),
            state: Arc::new(parking_lot::Mutex::new(SpanState {
                context,
                name: name.into(),
                kind,
                status: SpanStatus::Unset,
                attributes: BTreeMap::new(),
                events: Vec::new(),
                ended: AtomicBool::new(false),
            })),
        }
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: AttributeValue) {
        let mut state = self.state.lock();
        state.attributes.insert(key.into(), value);
    }

    pub fn set_kind(&self, kind: SpanKind) {
        self.state.lock().kind = kind;
    }

    pub fn add_event(&self, name: impl Into<String>, attributes: Vec<(String, AttributeValue)>) {
        self.state.lock().events.push((name.into(), attributes));
    }

    pub fn set_status(&self, status: SpanStatus) {
        self.state.lock().status = status;
    }

    pub fn is_recording(&self) -> bool {
        !self.state.lock().ended.load(Ordering::Acquire)
    }

    /// Idempotent: the second and later calls are no-ops.
    pub fn end(&self) {
        let state = self.state.lock();
        state.ended.store(true, Ordering::Release);
    }
}

static SPAN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static TRACE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn fresh_span_id() -> [u8; TraceContext::SPAN_ID_LEN] {
    SPAN_ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_be_bytes()
}

fn fresh_trace_id() -> [u8; TraceContext::TRACE_ID_LEN] {
    let hi = TRACE_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut id = [0u8; 16];
    id[..8].copy_from_slice(&hi.to_be_bytes());
    id[8..].copy_from_slice(&std::process::id().to_be_bytes());
    id
}

thread_local! {
    static CURRENT_SPAN: RefCell<Option<Span>> = const { RefCell::new(None) };
}

/// Returns the active thread's span trace/span id, if any; used by
/// [`crate::observability::logging::Logger::log_at`] to auto-attach
/// correlation fields.
pub fn current_span_ids() -> (Option<String>, Option<String>) {
    CURRENT_SPAN.with(|slot| {
        slot.borrow().as_ref().map(|span| (Some(span.context().trace_id_hex()), Some(span.context().span_id_hex())))
    }).unwrap_or((None, None))
}

/// Makes `span` the thread's active span for the duration of `f`, restoring
/// the previous active span (if any) afterwards.
pub fn with_active_span<R>(span: &Span, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_SPAN.with(|slot| slot.borrow_mut().replace(span.clone()));
    let result = f();
    CURRENT_SPAN.with(|slot| *slot.borrow_mut() = previous);
    result
}

/// Tracer contract: `start_span` creates a root span (no parent) or a child
/// sharing the parent's trace-id with a fresh span-id.
pub trait Tracer: Send + Sync + 'static {
    fn start_span(&self, name: &str, parent: Option<&TraceContext>, kind: SpanKind) -> Span;
}

pub struct DefaultTracer {
    name: String,
    sampling_ratio: f64,
}

impl DefaultTracer {
    /// `sampling_ratio` governs only root spans (no parent): children always
    /// inherit their parent's sampled flag via [`TraceContext::child_context`].
    pub fn new(name: impl Into<String>, sampling_ratio: f64) -> Self {
        Self { name: name.into(), sampling_ratio }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Tracer for DefaultTracer {
    fn start_span(&self, name: &str, parent: Option<&TraceContext>, kind: SpanKind) -> Span {
        let context = match parent {
            Some(parent) => parent.child_context(fresh_span_id()),
            None => {
                let root = TraceContext::root(fresh_trace_id(), fresh_span_id());
                if sample_decision(self.sampling_ratio) { root.mark_sampled() } else { root }
            }
        };
        Span::new(context, name, kind)
    }
}

/// Deterministic sampling decision against `ratio` (clamped to `[0.0, 1.0]`
/// by [`crate::config::Config`] at construction). Uses the same monotonic
/// counter as [`fresh_span_id`] rather than pulling in a `rand` dependency
/// this core otherwise has no use for.
fn sample_decision(ratio: f64) -> bool {
    if ratio >= 1.0 {
        return true;
    }
    if ratio <= 0.0 {
        return false;
    }
    let threshold = (ratio * 1000.0) as u64;
    SPAN_ID_COUNTER.load(Ordering::Relaxed) % 1000 < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_span_shares_trace_id_not_span_id() {
        let tracer = DefaultTracer::new("test", 1.0);
        let parent = tracer.start_span("parent", None, SpanKind::Server);
        let child = tracer.start_span("child", Some(parent.context()), SpanKind::Internal);
        assert_eq!(child.context().trace_id(), parent.context().trace_id());
        assert_ne!(child.context().span_id(), parent.context().span_id());
    }

    #[test]
    fn end_is_idempotent() {
        let tracer = DefaultTracer::new("test", 1.0);
        let span = tracer.start_span("s", None, SpanKind::Internal);
        assert!(span.is_recording());
        span.end();
        span.end();
        assert!(!span.is_recording());
    }

    #[test]
    fn active_span_ids_are_visible_to_logging() {
        let tracer = DefaultTracer::new("test", 1.0);
        let span = tracer.start_span("s", None, SpanKind::Server);
        let expected = span.context().trace_id_hex();
        with_active_span(&span, || {
            let (trace_id, _) = current_span_ids();
            assert_eq!(trace_id, Some(expected.clone()));
        });
        assert_eq!(current_span_ids(), (None, None));
    }
}
