//! Middleware chain composition: ordered list, explicit `next` continuation.
//!
//! Built once at registration and reused across requests. The terminal
//! handler (or next middleware) is called through an explicit continuation;
//! calling that continuation twice is a usage error the chain catches and
//! logs rather than acting on twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observability::provider::Provider;
use crate::request::Request;
use crate::response::Response;

pub type HandlerFn = dyn Fn(Request, Response) + Send + Sync;
pub type Handler = Arc<HandlerFn>;

pub type MiddlewareFn = dyn Fn(Request, Response, Next) + Send + Sync;
pub type Middleware = Arc<MiddlewareFn>;

/// The rest of the chain, handed to a middleware so it can decide whether
/// and when to continue. Fresh per dispatch; the `called` guard belongs to
/// this one invocation, not to the middleware itself.
#[derive(Clone)]
pub struct Next {
    tail: Handler,
    called: Arc<AtomicBool>,
}

impl Next {
    fn new(tail: Handler) -> Self {
        Self { tail, called: Arc::new(AtomicBool::new(false)) }
    }

    /// Invokes the rest of the chain. A second call on the same `Next` is a
    /// no-op, logged at warn level instead of re-entering the tail.
    pub fn call(&self, request: Request, response: Response) {
        if self.called.swap(true, Ordering::AcqRel) {
            Provider::current().logger().warn("middleware next() called more than once; ignoring");
            return;
        }
        (self.tail)(request, response);
    }
}

/// Folds `middlewares` (in registration order) around `terminal` into one
/// `Handler`. Built once when a route is registered; each dispatch through
/// the resulting handler builds only a fresh [`Next`] per middleware layer,
/// not a fresh chain.
pub fn compose(middlewares: &[Middleware], terminal: Handler) -> Handler {
    middlewares.iter().rev().fold(terminal, |tail, mw| {
        let mw = Arc::clone(mw);
        Arc::new(move |request: Request, response: Response| {
            mw(request, response, Next::new(Arc::clone(&tail)));
        }) as Handler
    })
}
