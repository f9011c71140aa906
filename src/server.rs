//! Process lifecycle: config in, observability initialized, router and
//! worker pool wired together, TCP/HTTP2 listener driven until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::codes;
use crate::http2;
use crate::limits::{LoadShedder, LoadShedderPolicy};
use crate::message::{Message, Payload};
use crate::observability::logging::LogSeverity;

use crate::observability::provider::Provider;
use crate::observability::tracer::{with_active_span, SpanKind};
use crate::router::Router;
use crate::workerpool::WorkerPool;

pub struct Server {
    config: Config,
    router: Arc<Router>,
    shedder: Arc<LoadShedder>,
}

impl Server {
    pub fn new(config: Config, router: Router) -> Self {
        let shedder = Arc::new(LoadShedder::new(
            LoadShedderPolicy::new("server", config.resilience.max_concurrent)
                .expect("Config::validate already rejects max_concurrent == 0"),
        ));
        Self { config, router: Arc::new(router), shedder }
    }

    /// Initializes the observability provider, starts the worker pool, and
    /// accepts connections on `config.server.bind_addr` until the process is
    /// killed. Each accepted connection is driven as its own `h2` server on
    /// the current tokio runtime; each request becomes one [`Message`]
    /// dispatched to the worker pool, which runs `self.router` against it
    /// through [`dispatch_message`].
    pub async fn run(self) -> std::io::Result<()> {
        Provider::init(&self.config.observability);
        let logger = Provider::current().logger();
        logger.info(&format!("starting on {}", self.config.server.bind_addr));

        let router = Arc::clone(&self.router);
        let shedder = Arc::clone(&self.shedder);
        let pool = Arc::new(WorkerPool::start(self.config.server.worker_lanes, move |message: Message| {
            dispatch_message(&router, &shedder, message);
        }));

        let max_body_bytes = self.config.server.request_body_limit;
        let idle_timeout = Duration::from_millis(self.config.server.idle_timeout_ms);
        let listener = TcpListener::bind(&self.config.server.bind_addr).await?;
        loop {
            let (stream, peer) = listener.accept().await?;
            Provider::current().logger().debug(&format!("accepted connection from {peer}"));
            let pool = Arc::clone(&pool);
            let submit: Arc<dyn Fn(Message) + Send + Sync> = Arc::new(move |message: Message| pool.submit(message));
            tokio::spawn(http2::serve_connection(stream, submit, max_body_bytes, idle_timeout));
        }
    }
}

/// Runs an `HttpRequest` message through `router`, guarded by `shedder` and
/// wrapped in a `Server`-kind span parented to the message's trace context.
///
/// The span matters independently of the shed check: every log emitted from
/// inside `router.dispatch` (and any handler it calls) picks up the worker's
/// own trace/span ids through [`with_active_span`], rather than carrying no
/// correlation at all. A permit denial short-circuits before the router ever
/// sees the request, counted and logged under [`codes::OVERLOAD_SHED`].
pub fn dispatch_message(router: &Router, shedder: &LoadShedder, message: Message) {
    let trace_context = message.trace_context.clone();
    if let Payload::HttpRequest { request, response } = message.payload {
        match shedder.acquire() {
            Ok(guard) => {
                response.attach_scoped(guard);
                let span = Provider::current().tracer("router").start_span(
                    "router.dispatch",
                    Some(&trace_context),
                    SpanKind::Server,
                );
                with_active_span(&span, || router.dispatch(request, response));
                span.end();
            }
            Err(_reason) => {
                Provider::current().logger().log_at(
                    LogSeverity::Warn,
                    "request shed: worker pool at capacity",
                    vec![("code", codes::OVERLOAD_SHED.to_string())],
                );
                Provider::current().metrics().counter("requests.shed").inc();
                let mut response = response;
                response.set_status(503);
                response.write(b"overloaded");
                response.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    #[test]
    fn server_construction_does_not_panic() {
        let config = Config::from_toml_str("").unwrap();
        let router = Router::new();
        let _server = Server::new(config, router);
    }
}
