//! W3C trace-context propagation.
//!
//! Every request gets a [`TraceContext`] on arrival (fresh, or parsed from an
//! inbound `traceparent` header). It rides along on the [`crate::message::Message`]
//! that crosses into the worker pool and is attached to every span and log record
//! derived from that request.

use std::collections::BTreeMap;
use std::fmt;

/// Immutable carrier of trace-id / span-id / sampling flags / baggage.
///
/// `trace_id` and `span_id` are fixed-width byte arrays rather than strings:
/// comparisons and propagation are then just array equality, and the W3C hex
/// encoding is pushed to the edges (`parse_traceparent` / `to_traceparent`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceContext {
    trace_id: [u8; Self::TRACE_ID_LEN],
    span_id: [u8; Self::SPAN_ID_LEN],
    flags: TraceFlags,
    baggage: BTreeMap<String, String>,
}

impl TraceContext {
    pub const TRACE_ID_LEN: usize = 16;
    pub const SPAN_ID_LEN: usize = 8;

    pub fn new(trace_id: [u8; Self::TRACE_ID_LEN], span_id: [u8; Self::SPAN_ID_LEN], flags: TraceFlags) -> Self {
        Self { trace_id, span_id, flags, baggage: BTreeMap::new() }
    }

    /// A context is only meaningful once sampled/unsampled and addressed; a
    /// context with both fields present and non-zero is ready for propagation.
    pub fn root(trace_id: [u8; Self::TRACE_ID_LEN], span_id: [u8; Self::SPAN_ID_LEN]) -> Self {
        Self::new(trace_id, span_id, TraceFlags::new(0))
    }

    pub fn trace_id(&self) -> [u8; Self::TRACE_ID_LEN] {
        self.trace_id
    }

    pub fn span_id(&self) -> [u8; Self::SPAN_ID_LEN] {
        self.span_id
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn trace_id_hex(&self) -> String {
        encode_hex(&self.trace_id)
    }

    pub fn span_id_hex(&self) -> String {
        encode_hex(&self.span_id)
    }

    pub fn baggage(&self) -> &BTreeMap<String, String> {
        &self.baggage
    }

    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }

    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    pub fn mark_sampled(mut self) -> Self {
        self.flags.set_sampled(true);
        self
    }

    /// Derive a child context: same trace-id and baggage, fresh span-id.
    pub fn child_context(&self, child_span_id: [u8; Self::SPAN_ID_LEN]) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: child_span_id,
            flags: self.flags,
            baggage: self.baggage.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), TraceContextError> {
        if self.trace_id == [0u8; Self::TRACE_ID_LEN] {
            return Err(TraceContextError::InvalidTraceId);
        }
        if self.span_id == [0u8; Self::SPAN_ID_LEN] {
            return Err(TraceContextError::InvalidSpanId);
        }
        Ok(())
    }

    /// Parse a `traceparent` header value: `00-<32 hex>-<16 hex>-<2 hex>`.
    pub fn parse_traceparent(value: &str) -> Result<Self, TraceContextError> {
        let mut parts = value.split('-');
        let version = parts.next().ok_or(TraceContextError::Malformed)?;
        let trace_id_hex = parts.next().ok_or(TraceContextError::Malformed)?;
        let span_id_hex = parts.next().ok_or(TraceContextError::Malformed)?;
        let flags_hex = parts.next().ok_or(TraceContextError::Malformed)?;
        if parts.next().is_some() {
            return Err(TraceContextError::Malformed);
        }
        if version != "00" {
            return Err(TraceContextError::UnsupportedVersion);
        }
        let trace_id = decode_hex_array::<{ Self::TRACE_ID_LEN }>(trace_id_hex)
            .ok_or(TraceContextError::Malformed)?;
        let span_id = decode_hex_array::<{ Self::SPAN_ID_LEN }>(span_id_hex)
            .ok_or(TraceContextError::Malformed)?;
        let flags_bytes = decode_hex_array::<1>(flags_hex).ok_or(TraceContextError::Malformed)?;
        let context = Self::new(trace_id, span_id, TraceFlags::new(flags_bytes[0]));
        context.validate()?;
        Ok(context)
    }

    /// Serialize back to the `00-<trace-id>-<span-id>-<flags>` wire form.
    /// A parsed-then-reserialized value is byte-identical to the input.
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{}-{}-{:02x}",
            encode_hex(&self.trace_id),
            encode_hex(&self.span_id),
            self.flags.bits()
        )
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

/// The `trace-flags` byte. Bit 0 is `sampled`; the rest are reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TraceFlags {
    bits: u8,
}

impl TraceFlags {
    pub const SAMPLED: u8 = 0x01;

    pub const fn new(bits: u8) -> Self {
        Self { bits }
    }

    pub fn is_sampled(&self) -> bool {
        self.bits & Self::SAMPLED != 0
    }

    pub fn set_sampled(&mut self, sampled: bool) {
        if sampled {
            self.bits |= Self::SAMPLED;
        } else {
            self.bits &= !Self::SAMPLED;
        }
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TraceContextError {
    #[error("traceparent value is malformed")]
    Malformed,
    #[error("traceparent version is not supported")]
    UnsupportedVersion,
    #[error("trace_id is all-zero")]
    InvalidTraceId,
    #[error("span_id is all-zero")]
    InvalidSpanId,
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn decode_hex_array<const N: usize>(input: &str) -> Option<[u8; N]> {
    if input.len() != N * 2 || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = [0u8; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = u8::from_str_radix(&input[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_round_trip_is_byte_identical() {
        let raw = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let ctx = TraceContext::parse_traceparent(raw).unwrap();
        assert_eq!(ctx.to_traceparent(), raw);
        assert!(ctx.is_sampled());
    }

    #[test]
    fn rejects_all_zero_trace_id() {
        let raw = "00-00000000000000000000000000000000-b7ad6b7169203331-01";
        assert_eq!(TraceContext::parse_traceparent(raw), Err(TraceContextError::InvalidTraceId));
    }

    #[test]
    fn child_context_shares_trace_id_fresh_span() {
        let parent = TraceContext::root([1; 16], [2; 8]);
        let child = parent.child_context([9; 8]);
        assert_eq!(child.trace_id(), parent.trace_id());
        assert_ne!(child.span_id(), parent.span_id());
    }

    #[test]
    fn baggage_propagates_to_children_unchanged() {
        let parent = TraceContext::root([1; 16], [2; 8]).with_baggage("tenant", "acme");
        let child = parent.child_context([9; 8]);
        assert_eq!(child.baggage().get("tenant"), Some(&"acme".to_string()));
    }
}
