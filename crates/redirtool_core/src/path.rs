use std::collections::HashMap;

use crate::model::RedirectRule;

pub const DEFAULT_DOCS_ROOT: &str = "/docs";

/// A link split into the part used for lookup and the suffixes carried over
/// to the rewritten link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPath<'a> {
    pub base: &'a str,
    pub anchor: &'a str,
    pub query: &'a str,
}

impl<'a> NormalizedPath<'a> {
    /// The query is only kept when the link has no anchor. `/x?q=1#sec`
    /// normalizes to base `/x`, anchor `#sec` and an empty query.
    pub fn parse(link: &'a str) -> Self {
        let (before_anchor, anchor) = match link.find('#') {
            Some(index) => (&link[..index], &link[index..]),
            None => (link, ""),
        };
        let (base, query) = match before_anchor.find('?') {
            Some(index) => (&before_anchor[..index], &before_anchor[index..]),
            None => (before_anchor, ""),
        };
        let query = if anchor.is_empty() { query } else { "" };
        Self {
            base,
            anchor,
            query,
        }
    }

    pub fn with_base(&self, new_base: &str) -> String {
        format!("{new_base}{}{}", self.anchor, self.query)
    }
}

/// Canonical base path to replacement base path, as used by the link rewriter.
#[derive(Debug, Clone, Default)]
pub struct PathMapping {
    docs_root: String,
    entries: HashMap<String, String>,
}

impl PathMapping {
    pub fn new(docs_root: &str) -> Self {
        Self {
            docs_root: normalize_docs_root(docs_root),
            entries: HashMap::new(),
        }
    }

    /// Every source under the documentation root is also registered without
    /// the root so links that omit it still resolve. Later rules overwrite
    /// earlier ones.
    pub fn from_rules(rules: &[RedirectRule], docs_root: &str) -> Self {
        let mut mapping = Self::new(docs_root);
        for rule in rules {
            mapping.insert(&rule.source, &rule.destination);
        }
        mapping
    }

    pub fn insert(&mut self, source: &str, destination: &str) {
        self.entries
            .insert(source.to_string(), destination.to_string());
        if let Some(stripped_source) = self.strip_docs_root(source) {
            let stripped_destination = self
                .strip_docs_root(destination)
                .unwrap_or_else(|| destination.to_string());
            self.entries.insert(stripped_source, stripped_destination);
        }
    }

    pub fn docs_root(&self) -> &str {
        &self.docs_root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, base: &str) -> Option<&str> {
        self.entries.get(base).map(String::as_str)
    }

    /// Direct hit first, then the same base under the documentation root.
    pub fn lookup(&self, base: &str) -> Option<&str> {
        if base.is_empty() {
            return None;
        }
        if let Some(found) = self.get(base) {
            return Some(found);
        }
        self.get(&format!("{}{base}", self.docs_root))
    }

    /// Rewrite a whole link, keeping its anchor and (anchor-less) query.
    /// Returns `None` when the mapping has no entry for it.
    pub fn resolve(&self, link: &str) -> Option<String> {
        let normalized = NormalizedPath::parse(link);
        self.lookup(normalized.base)
            .map(|new_base| normalized.with_base(new_base))
    }

    fn strip_docs_root(&self, path: &str) -> Option<String> {
        if self.docs_root.is_empty() {
            return None;
        }
        let rest = path.strip_prefix(&self.docs_root)?;
        rest.starts_with('/').then(|| rest.to_string())
    }
}

/// `docs`, `/docs/` and `/docs` all become `/docs`.
pub fn normalize_docs_root(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
