//! Use cases over a link repository: shorten, resolve, delete.
//!
//! `ResolveLink::execute` validates the code, looks it up, rejects an
//! expired link, and returns the original URL. `ShortenUrl` generates a
//! candidate code and retries on collision rather than relying on a
//! database sequence.

use std::collections::HashMap;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::error::DomainErrorKind;
use crate::shortener::domain::{OriginalUrl, ShortCode, ShortLink};

pub trait LinkRepository: Send + Sync {
    /// `Err(LinkAlreadyExists)` if the link's code is already taken.
    fn insert(&self, link: ShortLink) -> Result<(), DomainErrorKind>;
    fn find_by_code(&self, code: &ShortCode) -> Result<ShortLink, DomainErrorKind>;
    /// `Err(LinkNotFound)` if no link with that code exists.
    fn delete(&self, code: &ShortCode) -> Result<(), DomainErrorKind>;
}

#[derive(Default)]
pub struct InMemoryLinkRepository {
    links: RwLock<HashMap<String, ShortLink>>,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkRepository for InMemoryLinkRepository {
    fn insert(&self, link: ShortLink) -> Result<(), DomainErrorKind> {
        let mut links = self.links.write().unwrap();
        if links.contains_key(link.code().as_str()) {
            return Err(DomainErrorKind::LinkAlreadyExists);
        }
        links.insert(link.code().as_str().to_string(), link);
        Ok(())
    }

    fn find_by_code(&self, code: &ShortCode) -> Result<ShortLink, DomainErrorKind> {
        self.links.read().unwrap().get(code.as_str()).cloned().ok_or(DomainErrorKind::LinkNotFound)
    }

    fn delete(&self, code: &ShortCode) -> Result<(), DomainErrorKind> {
        let mut links = self.links.write().unwrap();
        if links.remove(code.as_str()).is_none() {
            return Err(DomainErrorKind::LinkNotFound);
        }
        Ok(())
    }
}

const MAX_GENERATION_ATTEMPTS: u32 = 8;

/// Deterministic-looking but collision-avoiding: `sha256(url || attempt)`
/// truncated to 8 hex characters, which is already alphanumeric and within
/// [`super::domain::ShortCode`]'s length bounds.
fn generate_code(url: &str, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(attempt.to_be_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}

pub struct ShortenUrl {
    repository: std::sync::Arc<dyn LinkRepository>,
}

impl ShortenUrl {
    pub fn new(repository: std::sync::Arc<dyn LinkRepository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self, raw_url: &str, ttl_seconds: Option<u64>, now_unix: u64) -> Result<ShortLink, DomainErrorKind> {
        let original = OriginalUrl::create(raw_url)?;
        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            let code = ShortCode::from_trusted(generate_code(original.as_str(), attempt));
            let link = ShortLink::new(code, original.clone(), now_unix, ttl_seconds);
            match self.repository.insert(link.clone()) {
                Ok(()) => return Ok(link),
                Err(DomainErrorKind::LinkAlreadyExists) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(DomainErrorKind::CodeGenerationFailed)
    }
}

pub struct ResolveLink {
    repository: std::sync::Arc<dyn LinkRepository>,
}

impl ResolveLink {
    pub fn new(repository: std::sync::Arc<dyn LinkRepository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self, short_code: &str, now_unix: u64) -> Result<String, DomainErrorKind> {
        let code = ShortCode::create(short_code)?;
        let link = self.repository.find_by_code(&code)?;
        if link.is_expired(now_unix) {
            return Err(DomainErrorKind::LinkExpired);
        }
        Ok(link.original().as_str().to_string())
    }
}

pub struct DeleteLink {
    repository: std::sync::Arc<dyn LinkRepository>,
}

impl DeleteLink {
    pub fn new(repository: std::sync::Arc<dyn LinkRepository>) -> Self {
        Self { repository }
    }

    pub fn execute(&self, short_code: &str) -> Result<(), DomainErrorKind> {
        let code = ShortCode::create(short_code)?;
        self.repository.delete(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn repo() -> Arc<dyn LinkRepository> {
        Arc::new(InMemoryLinkRepository::new())
    }

    #[test]
    fn shorten_then_resolve_round_trips() {
        let repository = repo();
        let shorten = ShortenUrl::new(Arc::clone(&repository));
        let resolve = ResolveLink::new(Arc::clone(&repository));
        let link = shorten.execute("https://example.com/article", None, 1_000).unwrap();
        let resolved = resolve.execute(link.code().as_str(), 1_001).unwrap();
        assert_eq!(resolved, "https://example.com/article");
    }

    #[test]
    fn resolve_unknown_code_is_not_found() {
        let repository = repo();
        let resolve = ResolveLink::new(repository);
        assert_eq!(resolve.execute("abcd1234", 0), Err(DomainErrorKind::LinkNotFound));
    }

    #[test]
    fn resolve_expired_link_is_expired_error() {
        let repository = repo();
        let shorten = ShortenUrl::new(Arc::clone(&repository));
        let resolve = ResolveLink::new(Arc::clone(&repository));
        let link = shorten.execute("https://example.com", Some(10), 1_000).unwrap();
        assert_eq!(resolve.execute(link.code().as_str(), 2_000), Err(DomainErrorKind::LinkExpired));
    }

    #[test]
    fn delete_then_resolve_is_not_found() {
        let repository = repo();
        let shorten = ShortenUrl::new(Arc::clone(&repository));
        let delete = DeleteLink::new(Arc::clone(&repository));
        let resolve = ResolveLink::new(Arc::clone(&repository));
        let link = shorten.execute("https://example.com", None, 0).unwrap();
        delete.execute(link.code().as_str()).unwrap();
        assert_eq!(resolve.execute(link.code().as_str(), 0), Err(DomainErrorKind::LinkNotFound));
    }

    #[test]
    fn shorten_rejects_invalid_url() {
        let repository = repo();
        let shorten = ShortenUrl::new(repository);
        assert_eq!(shorten.execute("not-a-url", None, 0), Err(DomainErrorKind::InvalidUrl));
    }
}
