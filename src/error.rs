//! Unified error taxonomy.
//!
//! `CoreError` is the framework-level error domain (transport, routing,
//! configuration, runtime); stable `code` plus human `message` plus an
//! optional boxed cause, mirroring how the rest of the crate threads errors
//! across thread and module boundaries. `DomainError` is the narrower
//! taxonomy the [`crate::shortener`] demo collaborator uses; it is kept
//! separate because the core never needs to know about short codes or URLs.

use std::error::Error as StdError;
use std::fmt;

pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// Framework-level error: transport, routing, configuration, runtime.
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: String,
    cause: Option<ErrorCause>,
}

impl CoreError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), cause: None }
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

/// Stable error codes, used as machine-readable identifiers in logs and metrics.
pub mod codes {
    pub const ROUTER_NOT_FOUND: &str = "router.not_found";
    pub const ROUTER_METHOD_NOT_MATCHED: &str = "router.method_not_matched";
    pub const CONFIG_INVALID: &str = "config.invalid";
    pub const OVERLOAD_SHED: &str = "overload.shed";
    pub const WORKER_PANIC: &str = "worker.panic";
    pub const TRANSPORT_IO: &str = "transport.io";
}

/// Errors surfaced by the URI-shortener demo collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DomainErrorKind {
    #[error("invalid short code format")]
    InvalidShortCode,
    #[error("invalid url format")]
    InvalidUrl,
    #[error("link not found")]
    LinkNotFound,
    #[error("link has expired")]
    LinkExpired,
    #[error("link already exists")]
    LinkAlreadyExists,
    #[error("code generation failed")]
    CodeGenerationFailed,
}

impl DomainErrorKind {
    /// Fixed HTTP status mapping for the shortener's error responses.
    pub const fn http_status(self) -> u16 {
        match self {
            DomainErrorKind::InvalidShortCode | DomainErrorKind::InvalidUrl => 400,
            DomainErrorKind::LinkNotFound | DomainErrorKind::LinkExpired => 404,
            DomainErrorKind::LinkAlreadyExists => 409,
            DomainErrorKind::CodeGenerationFailed => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_status_mapping_is_fixed() {
        assert_eq!(DomainErrorKind::InvalidUrl.http_status(), 400);
        assert_eq!(DomainErrorKind::LinkNotFound.http_status(), 404);
        assert_eq!(DomainErrorKind::LinkAlreadyExists.http_status(), 409);
        assert_eq!(DomainErrorKind::CodeGenerationFailed.http_status(), 500);
    }
}
