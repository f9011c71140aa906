//! Runnable demo binary: loads config (or falls back to defaults), wires the
//! URI-shortener demo collaborator into the router, and serves.

use std::sync::Arc;

use triage_core::config::Config;
use triage_core::router::Router;
use triage_core::server::Server;
use triage_core::shortener::{handlers, InMemoryLinkRepository};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).unwrap_or_else(|err| {
            eprintln!("failed to load config from {path}: {err}, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };

    let mut router = Router::new();
    handlers::register(&mut router, Arc::new(InMemoryLinkRepository::new()));

    Server::new(config, router).run().await
}
