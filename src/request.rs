//! `RequestData` (reactor-owned) and the copyable `Request` view workers
//! actually hold.
//!
//! `Request` observes shared data through a non-owning weak reference, so a
//! handler that outlives its connection degrades gracefully instead of
//! panicking: every accessor on an expired view returns an empty value
//! rather than failing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

/// Case-insensitive header map. Small enough at typical header counts that a
/// linear scan beats the overhead of normalizing keys into a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Owned exclusively by the stream context in the reactor. Mutated only
/// during assembly and by the router's `set_path_params` after a match.
#[derive(Debug, Default)]
pub struct RequestData {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

impl RequestData {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into(), ..Default::default() }
    }

    pub fn shared(self) -> Arc<RwLock<RequestData>> {
        Arc::new(RwLock::new(self))
    }
}

/// A copyable handle over shared `RequestData`. Holds a weak reference so a
/// worker that outlives its stream degrades to empty reads instead of
/// panicking or resurrecting dead state.
#[derive(Clone)]
pub struct Request {
    data: Weak<RwLock<RequestData>>,
}

impl Request {
    pub fn new(data: &Arc<RwLock<RequestData>>) -> Self {
        Self { data: Arc::downgrade(data) }
    }

    pub fn method(&self) -> String {
        self.with_data(|d| d.method.clone()).unwrap_or_default()
    }

    pub fn path(&self) -> String {
        self.with_data(|d| d.path.clone()).unwrap_or_default()
    }

    pub fn body(&self) -> Vec<u8> {
        self.with_data(|d| d.body.clone()).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.with_data(|d| d.headers.get(name).map(str::to_string)).flatten()
    }

    pub fn path_param(&self, name: &str) -> Option<String> {
        self.with_data(|d| d.path_params.get(name).cloned()).flatten()
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.with_data(|d| d.query_params.get(name).cloned()).flatten()
    }

    /// Populated by the router after a successful match. Silent no-op if the
    /// underlying `RequestData` has already expired.
    pub fn set_path_params(&self, params: HashMap<String, String>) {
        if let Some(strong) = self.data.upgrade() {
            strong.write().unwrap().path_params = params;
        }
    }

    /// `true` if the originating `RequestData` is still alive. Advisory
    /// only; the same race inherent to [`crate::response::ResponseHandle::is_alive`]
    /// applies here.
    pub fn is_live(&self) -> bool {
        self.data.strong_count() > 0
    }

    fn with_data<T>(&self, f: impl FnOnce(&RequestData) -> T) -> Option<T> {
        self.data.upgrade().map(|strong| f(&strong.read().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_are_empty_after_expiry() {
        let view = {
            let shared = RequestData::new("GET", "/x").shared();
            Request::new(&shared)
        };
        assert_eq!(view.method(), "");
        assert_eq!(view.path(), "");
        assert!(view.body().is_empty());
        assert!(!view.is_live());
    }

    #[test]
    fn set_path_params_is_silent_after_expiry() {
        let view = {
            let shared = RequestData::new("GET", "/x").shared();
            Request::new(&shared)
        };
        view.set_path_params(HashMap::from([("id".into(), "7".into())]));
        assert_eq!(view.path_param("id"), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut data = RequestData::new("GET", "/x");
        data.headers.insert("Content-Type", "application/json");
        let shared = data.shared();
        let view = Request::new(&shared);
        assert_eq!(view.header("content-type").as_deref(), Some("application/json"));
    }
}
