//! URI-shortener value objects: validated short codes, original URLs, and
//! the link they form together.
//!
//! `ShortCode::create` validates length and alphanumeric-only content;
//! `from_trusted` skips validation for codes the core itself generated.

use crate::error::DomainErrorKind;

const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Validates `raw`: length within `[4, 12]`, alphanumeric-only.
    pub fn create(raw: &str) -> Result<Self, DomainErrorKind> {
        if raw.len() < MIN_CODE_LENGTH || raw.len() > MAX_CODE_LENGTH {
            return Err(DomainErrorKind::InvalidShortCode);
        }
        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainErrorKind::InvalidShortCode);
        }
        Ok(Self(raw.to_string()))
    }

    /// For codes this core generated itself; skips validation.
    pub fn from_trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginalUrl(String);

impl OriginalUrl {
    /// Accepts only `http://` and `https://` URLs with a non-empty
    /// remainder after the scheme.
    pub fn create(raw: &str) -> Result<Self, DomainErrorKind> {
        let rest = raw.strip_prefix("https://").or_else(|| raw.strip_prefix("http://"));
        match rest {
            Some(remainder) if !remainder.is_empty() => Ok(Self(raw.to_string())),
            _ => Err(DomainErrorKind::InvalidUrl),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortLink {
    code: ShortCode,
    original: OriginalUrl,
    created_at_unix: u64,
    ttl_seconds: Option<u64>,
}

impl ShortLink {
    pub fn new(code: ShortCode, original: OriginalUrl, created_at_unix: u64, ttl_seconds: Option<u64>) -> Self {
        Self { code, original, created_at_unix, ttl_seconds }
    }

    pub fn code(&self) -> &ShortCode {
        &self.code
    }

    pub fn original(&self) -> &OriginalUrl {
        &self.original
    }

    pub fn is_expired(&self, now_unix: u64) -> bool {
        match self.ttl_seconds {
            Some(ttl) => now_unix >= self.created_at_unix.saturating_add(ttl),
            None => false,
        }
    }
}
