//! The unit of work handed from the reactor to the worker pool.
//!
//! A small, `Send`-able envelope: an `affinity_key` the pool hashes on, a
//! [`crate::trace::TraceContext`] that rides along for correlated logs, and
//! a payload that is either a terminal HTTP request or a query/response pair
//! exchanged with a downstream collaborator.

use crate::request::Request;
use crate::response::Response;
use crate::trace::TraceContext;

/// What a [`Message`] asks the worker pool to do.
pub enum Payload {
    /// A request arrived over HTTP/2 and is ready for routing + handling.
    HttpRequest { request: Request, response: Response },
    /// A downstream collaborator query issued by a handler, to be answered
    /// out of band (e.g. the URI-shortener's repository lookups when it is
    /// wired to an out-of-process store instead of the in-memory one).
    DownstreamQuery { target: String, body: Vec<u8> },
    /// The answer to a previously issued `DownstreamQuery`, identified by
    /// `correlation_id` so the awaiting handler can match it up.
    DownstreamResponse { correlation_id: u64, body: Vec<u8> },
}

/// Dispatched to worker `affinity_key % worker_count` so related work (same
/// connection, same downstream exchange) lands on one worker and never needs
/// cross-worker locking to stay ordered relative to itself.
pub struct Message {
    pub affinity_key: u64,
    pub trace_context: TraceContext,
    pub payload: Payload,
}

impl Message {
    pub fn http_request(affinity_key: u64, trace_context: TraceContext, request: Request, response: Response) -> Self {
        Self { affinity_key, trace_context, payload: Payload::HttpRequest { request, response } }
    }

    pub fn downstream_query(affinity_key: u64, trace_context: TraceContext, target: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            affinity_key,
            trace_context,
            payload: Payload::DownstreamQuery { target: target.into(), body },
        }
    }

    pub fn downstream_response(affinity_key: u64, trace_context: TraceContext, correlation_id: u64, body: Vec<u8>) -> Self {
        Self {
            affinity_key,
            trace_context,
            payload: Payload::DownstreamResponse { correlation_id, body },
        }
    }
}

/// Default affinity-key derivation for an inbound HTTP request: a hash of
/// `"{method}:{path}"`. Two requests for the same route always land on the
/// same worker; this is a throughput/locality default, not a correctness
/// requirement, so callers may derive their own key (e.g. per-connection)
/// instead.
pub fn default_affinity_key(method: &str, path: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    method.hash(&mut hasher);
    b':'.hash(&mut hasher);
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affinity_key_is_deterministic_for_equal_inputs() {
        assert_eq!(default_affinity_key("GET", "/links/abc"), default_affinity_key("GET", "/links/abc"));
    }

    #[test]
    fn affinity_key_differs_across_paths() {
        assert_ne!(default_affinity_key("GET", "/links/abc"), default_affinity_key("GET", "/links/xyz"));
    }
}
