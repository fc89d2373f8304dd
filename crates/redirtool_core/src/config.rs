use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::path::{DEFAULT_DOCS_ROOT, normalize_docs_root};

pub const DEFAULT_SITE_URL: &str = "https://www.example.com";
pub const DEFAULT_API_PATH_PREFIX: &str = "/v3/";
pub const DEFAULT_API_HOST_MARKER: &str = "-api.";
pub const DEFAULT_CONTENT_DIR: &str = ".";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub rewrite: RewriteSection,
    #[serde(default)]
    pub export: ExportSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteSection {
    pub base_url: Option<String>,
    pub docs_root: Option<String>,
    pub api_path_prefix: Option<String>,
    pub api_host_marker: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RewriteSection {
    #[serde(default)]
    pub content_dirs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExportSection {
    pub output_dir: Option<String>,
}

impl ToolConfig {
    /// Site URL set explicitly: env REDIRTOOL_SITE_URL > config > None.
    pub fn configured_site_url(&self) -> Option<String> {
        if let Some(value) = non_empty_env("REDIRTOOL_SITE_URL") {
            return Some(value.trim_end_matches('/').to_string());
        }
        self.site
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.trim_end_matches('/').to_string())
    }

    pub fn site_url(&self) -> String {
        self.configured_site_url()
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
    }

    /// Host of the site URL (configured or default), used to recognize links
    /// to this site in fully-qualified form.
    pub fn site_host(&self) -> Option<String> {
        derive_host(&self.site_url()).map(ToString::to_string)
    }

    /// Resolve documentation root: env REDIRTOOL_DOCS_ROOT > config > DEFAULT_DOCS_ROOT.
    pub fn docs_root(&self) -> String {
        let raw = non_empty_env("REDIRTOOL_DOCS_ROOT")
            .or_else(|| self.site.docs_root.clone())
            .unwrap_or_else(|| DEFAULT_DOCS_ROOT.to_string());
        normalize_docs_root(&raw)
    }

    pub fn api_path_prefix(&self) -> &str {
        self.site
            .api_path_prefix
            .as_deref()
            .unwrap_or(DEFAULT_API_PATH_PREFIX)
    }

    pub fn api_host_marker(&self) -> &str {
        self.site
            .api_host_marker
            .as_deref()
            .unwrap_or(DEFAULT_API_HOST_MARKER)
    }

    pub fn content_dirs(&self) -> Vec<String> {
        if self.rewrite.content_dirs.is_empty() {
            vec![DEFAULT_CONTENT_DIR.to_string()]
        } else {
            self.rewrite.content_dirs.clone()
        }
    }

    pub fn export_output_dir(&self) -> &str {
        self.export.output_dir.as_deref().unwrap_or(".")
    }
}

/// Load and parse a ToolConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ToolConfig> {
    if !config_path.exists() {
        return Ok(ToolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// `https://www.example.com/docs` -> `www.example.com`.
pub fn derive_host(url: &str) -> Option<&str> {
    let (_, rest) = url.trim().split_once("://")?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if host.is_empty() { None } else { Some(host) }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
