use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::path::PathMapping;

pub const ALLOWED_STATUS_CODES: [u16; 4] = [301, 302, 307, 308];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectKind {
    Permanent,
    Temporary,
}

impl RedirectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Temporary => "temporary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "permanent" => Some(Self::Permanent),
            "temporary" => Some(Self::Temporary),
            _ => None,
        }
    }

    pub fn expected_status_codes(self) -> [u16; 2] {
        match self {
            Self::Permanent => [301, 308],
            Self::Temporary => [302, 307],
        }
    }

    pub fn accepts_status(self, status_code: u16) -> bool {
        self.expected_status_codes().contains(&status_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub source: String,
    pub destination: String,
    #[serde(rename = "type")]
    pub kind: RedirectKind,
    pub status_code: u16,
}

impl RedirectRule {
    pub fn is_permanent(&self) -> bool {
        self.kind == RedirectKind::Permanent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectMap {
    pub version: String,
    pub redirects: Vec<RedirectRule>,
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("redirect map not found: {path}")]
    NotFound { path: String },
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("redirect map has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Read a redirect map document without interpreting it. Malformed JSON is
/// reported here, before any validation runs.
pub fn read_document(path: &Path) -> Result<Value, MapLoadError> {
    let display = path.to_string_lossy().replace('\\', "/");
    if !path.exists() {
        return Err(MapLoadError::NotFound { path: display });
    }
    let content = fs::read_to_string(path).map_err(|source| MapLoadError::Read {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| MapLoadError::InvalidJson {
        path: display,
        source,
    })
}

impl RedirectMap {
    pub fn from_value(value: &Value) -> Result<Self, MapLoadError> {
        Self::deserialize(value).map_err(MapLoadError::Shape)
    }

    pub fn load(path: &Path) -> Result<Self, MapLoadError> {
        Self::from_value(&read_document(path)?)
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }

    pub fn path_mapping(&self, docs_root: &str) -> PathMapping {
        PathMapping::from_rules(&self.redirects, docs_root)
    }
}

/// Directed `source -> destination` graph. Each source has at most one
/// outgoing edge; a repeated source keeps the destination of its last rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectGraph {
    sources: Vec<String>,
    edges: HashMap<String, String>,
}

impl RedirectGraph {
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::default();
        for (source, destination) in edges {
            graph.insert(source, destination);
        }
        graph
    }

    pub fn insert(&mut self, source: &str, destination: &str) {
        let previous = self
            .edges
            .insert(source.to_string(), destination.to_string());
        if previous.is_none() {
            self.sources.push(source.to_string());
        }
    }

    /// Sources in the order they first appeared.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }

    pub fn next(&self, node: &str) -> Option<&str> {
        self.edges.get(node).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
