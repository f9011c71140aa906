//! Trie-based HTTP path router with an ordered middleware chain.

mod middleware;
mod trie;

pub use middleware::{compose, Handler, HandlerFn, Middleware, MiddlewareFn, Next};
pub use trie::MatchError;

use std::sync::Arc;

use crate::error::codes;
use crate::observability::logging::LogSeverity;
use crate::observability::provider::Provider;
use crate::request::Request;
use crate::response::Response;
use trie::Trie;

/// Owns the route trie and the global middleware chain applied ahead of
/// every registered handler, in registration order.
#[derive(Default)]
pub struct Router {
    trie: Trie,
    middleware: Vec<Middleware>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware layer. Order matters: the first layer registered
    /// runs first on every request.
    pub fn use_middleware(&mut self, middleware: impl Fn(Request, Response, Next) + Send + Sync + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers a handler for `method` at `pattern`. `pattern` segments are
    /// literals, `:name` parameters, or a single trailing `*name` catch-all.
    /// The handler runs behind every middleware layer registered so far.
    pub fn route(&mut self, method: &str, pattern: &str, handler: impl Fn(Request, Response) + Send + Sync + 'static) -> &mut Self {
        let terminal: Handler = Arc::new(handler);
        let chain = compose(&self.middleware, terminal);
        self.trie.insert(method, pattern, chain);
        self
    }

    /// Matches `request`'s method and path against the trie and runs the
    /// resolved handler (or the 404/405 default) against `response`. Always
    /// leaves `response` either already closed by the handler or ready for
    /// the caller to close; this never closes `response` itself on a
    /// successful match, only on the default not-found/method-not-matched
    /// paths.
    pub fn dispatch(&self, request: Request, mut response: Response) {
        let path = request.path();
        let method = request.method();
        match self.trie.find(&method, &path) {
            Ok(matched) => {
                request.set_path_params(matched.path_params);
                (matched.handler)(request, response);
            }
            Err(MatchError::NotFound) => {
                Provider::current().logger().log_at(
                    LogSeverity::Debug,
                    &format!("no route for {method} {path}"),
                    vec![("code", codes::ROUTER_NOT_FOUND.to_string())],
                );
                response.set_status(404);
                response.write(b"not found");
                response.close();
            }
            Err(MatchError::MethodNotMatched) => {
                Provider::current().logger().log_at(
                    LogSeverity::Debug,
                    &format!("{method} not allowed on {path}"),
                    vec![("code", codes::ROUTER_METHOD_NOT_MATCHED.to_string())],
                );
                response.set_status(405);
                response.write(b"method not allowed");
                response.close();
            }
        }
    }
}
