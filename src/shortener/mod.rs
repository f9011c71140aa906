//! URI-shortener demo collaborator: a small Domain-Driven-Design style
//! application built on top of the core to exercise the router, worker
//! pool, and response-delivery machinery end to end.

pub mod domain;
pub mod handlers;
pub mod usecases;

pub use domain::{OriginalUrl, ShortCode, ShortLink};
pub use usecases::{DeleteLink, InMemoryLinkRepository, LinkRepository, ResolveLink, ShortenUrl};
