//! Concrete path trie: static segments always shadow a param or wildcard at
//! the same level, and a path match with no handler for the request method
//! is `MethodNotMatched`, not `NotFound`.

use std::collections::HashMap;

use super::middleware::Handler;

#[derive(Debug, PartialEq, Eq)]
pub enum MatchError {
    NotFound,
    MethodNotMatched,
}

pub struct Matched<'a> {
    pub handler: &'a Handler,
    pub path_params: HashMap<String, String>,
}

impl std::fmt::Debug for Matched<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matched").field("path_params", &self.path_params).finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Segment {
    literal: HashMap<String, Segment>,
    /// `(param name, subtree)`. At most one live per node: the last
    /// registered param name at a given level wins.
    param: Option<(String, Box<Segment>)>,
    /// Catch-all remainder-of-path match; only valid as the final segment
    /// of a pattern.
    wildcard: Option<(String, Box<Segment>)>,
    handlers: HashMap<String, Handler>,
}

/// Root of the trie for one [`super::Router`].
#[derive(Default)]
pub struct Trie {
    root: Segment,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pattern` segments: a literal, `:name` for a parameter, or `*name`
    /// (only as the last segment) for a catch-all. Registering the same
    /// `(method, pattern)` twice replaces the earlier handler.
    pub fn insert(&mut self, method: &str, pattern: &str, handler: Handler) {
        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut node = &mut self.root;
        for segment in segments {
            if let Some(name) = segment.strip_prefix(':') {
                let is_new = node.param.is_none();
                if is_new || node.param.as_ref().map(|(n, _)| n.as_str()) != Some(name) {
                    node.param = Some((name.to_string(), Box::new(Segment::default())));
                }
                node = node.param.as_mut().map(|(_, subtree)| subtree.as_mut()).unwrap();
            } else if let Some(name) = segment.strip_prefix('*') {
                node.wildcard = Some((name.to_string(), Box::new(Segment::default())));
                node = node.wildcard.as_mut().map(|(_, subtree)| subtree.as_mut()).unwrap();
                break; // wildcard always terminates the pattern
            } else {
                node = node.literal.entry(segment.to_string()).or_default();
            }
        }
        node.handlers.insert(method.to_ascii_uppercase(), handler);
    }

    pub fn find<'a>(&'a self, method: &str, path: &str) -> Result<Matched<'a>, MatchError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        match find_rec(&self.root, &segments, 0, &mut params) {
            Some(node) => match node.handlers.get(method) {
                Some(handler) => Ok(Matched { handler, path_params: params }),
                None => Err(MatchError::MethodNotMatched),
            },
            None => Err(MatchError::NotFound),
        }
    }
}

/// Static segments always win over a param or wildcard sibling: the literal
/// branch is tried first and only abandoned (backtracked out of) if it
/// leads to a dead end further down the path.
fn find_rec<'a>(
    node: &'a Segment,
    segments: &[&str],
    idx: usize,
    params: &mut HashMap<String, String>,
) -> Option<&'a Segment> {
    if idx == segments.len() {
        // A node with no handlers at this exact depth is a pass-through
        // (it exists only because a longer pattern runs through it) and is
        // not a match for this path; fall back to sibling branches.
        return if node.handlers.is_empty() { None } else { Some(node) };
    }
    let current = segments[idx];

    if let Some(child) = node.literal.get(current) {
        if let Some(found) = find_rec(child, segments, idx + 1, params) {
            return Some(found);
        }
    }

    if let Some((name, child)) = &node.param {
        let mut attempt = params.clone();
        attempt.insert(name.clone(), current.to_string());
        let mut candidate = attempt;
        if let Some(found) = find_rec(child, segments, idx + 1, &mut candidate) {
            *params = candidate;
            return Some(found);
        }
    }

    if let Some((name, child)) = &node.wildcard {
        params.insert(name.clone(), segments[idx..].join("/"));
        return Some(child.as_ref());
    }

    None
}
