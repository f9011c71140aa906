//! Session-affine HTTP/2 request-serving core.
//!
//! An I/O reactor ([`http2`]) accepts connections and turns each request
//! into a [`message::Message`], dispatched by affinity key to a fixed
//! [`workerpool::WorkerPool`]. Workers run requests through a trie-based
//! [`router::Router`] with ordered middleware and deliver results back
//! across the thread boundary through [`response::ResponseHandle`]. A
//! process-wide [`observability::Provider`] supplies structured logging,
//! metrics, and W3C-trace-context-correlated spans throughout.
//!
//! [`shortener`] is a small demo collaborator exercising the whole stack
//! end to end; it is not part of the core's public contract.

pub mod config;
pub mod error;
pub mod http2;
pub mod limits;
pub mod message;
pub mod observability;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod shortener;
pub mod trace;
pub mod workerpool;

pub use config::Config;
pub use error::CoreError;
pub use message::Message;
pub use request::Request;
pub use response::{Response, ResponseHandle};
pub use router::Router;
pub use server::Server;
pub use trace::TraceContext;
pub use workerpool::WorkerPool;
