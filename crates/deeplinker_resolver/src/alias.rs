//! Short-path alias rewriting (`/d/<slug>` -> `/l/<slug>`).
//!
//! The rewrite happens inside request dispatch, before routing. The client
//! never sees a redirect for it.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAliasRewriter {
    short_prefix: String,
    canonical_prefix: String,
}

impl RouteAliasRewriter {
    /// Prefixes are single path segments without slashes (`"d"`, `"l"`).
    pub fn new(short_prefix: impl Into<String>, canonical_prefix: impl Into<String>) -> Self {
        Self {
            short_prefix: format!("/{}/", short_prefix.into()),
            canonical_prefix: format!("/{}/", canonical_prefix.into()),
        }
    }

    /// Rewrite a path (no query). Paths outside the short prefix are borrowed
    /// back untouched.
    pub fn rewrite_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        match path.strip_prefix(self.short_prefix.as_str()) {
            Some(rest) => Cow::Owned(format!("{}{}", self.canonical_prefix, rest)),
            None => Cow::Borrowed(path),
        }
    }

    /// Rewrite a request target of the form `path[?query]`, keeping the query
    /// string byte for byte.
    pub fn rewrite_path_and_query<'a>(&self, path_and_query: &'a str) -> Cow<'a, str> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        match (self.rewrite_path(path), query) {
            (Cow::Borrowed(_), _) => Cow::Borrowed(path_and_query),
            (Cow::Owned(rewritten), Some(query)) => Cow::Owned(format!("{}?{}", rewritten, query)),
            (Cow::Owned(rewritten), None) => Cow::Owned(rewritten),
        }
    }
}
