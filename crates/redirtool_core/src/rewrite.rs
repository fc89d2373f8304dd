use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::{Captures, Regex};
use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ToolConfig;
use crate::path::{NormalizedPath, PathMapping};

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "mdx"];
const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Markdown,
    Yaml,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if MARKDOWN_EXTENSIONS.contains(&extension) {
            Some(Self::Markdown)
        } else if YAML_EXTENSIONS.contains(&extension) {
            Some(Self::Yaml)
        } else {
            None
        }
    }
}

/// Site-specific rules for recognizing documentation links in YAML files.
#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub api_path_prefix: String,
    pub api_host_marker: String,
    pub site_host: Option<String>,
}

impl RewriteSettings {
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            api_path_prefix: config.api_path_prefix().to_string(),
            api_host_marker: config.api_host_marker().to_string(),
            site_host: config.site_host(),
        }
    }
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    pub dry_run: bool,
    pub include_diff: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub modified: bool,
    pub replacements: usize,
    pub diff: Option<String>,
}

impl FileOutcome {
    fn unchanged() -> Self {
        Self {
            modified: false,
            replacements: 0,
            diff: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub relative_path: String,
    pub replacements: usize,
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub relative_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteReport {
    pub dry_run: bool,
    pub files_processed: usize,
    pub total_replacements: usize,
    pub modified: Vec<FileChange>,
    pub failures: Vec<FileFailure>,
}

/// Rewrites internal links in markdown and YAML content against a path
/// mapping. Each pass returns the new content and how many links it changed.
#[derive(Debug)]
pub struct LinkRewriter {
    mapping: PathMapping,
    settings: RewriteSettings,
    markdown_link: Regex,
    href_attribute: Regex,
    yaml_url_field: Regex,
    yaml_markdown_link: Regex,
}

impl LinkRewriter {
    pub fn new(mapping: PathMapping, settings: RewriteSettings) -> Result<Self> {
        Ok(Self {
            mapping,
            settings,
            markdown_link: Regex::new(r"\[([^\]]+)\]\((/[^)]+)\)")
                .context("failed to compile markdown link pattern")?,
            href_attribute: Regex::new(r#"href=(?:"(/[^"']+)"|'(/[^"']+)')"#)
                .context("failed to compile href pattern")?,
            yaml_url_field: Regex::new(r#"(url:\s*)(?:"([^\s"']+)"|'([^\s"']+)'|([^\s"']+))"#)
                .context("failed to compile yaml url pattern")?,
            yaml_markdown_link: Regex::new(r"\[([^\]]+)\]\((https://[^)]+|/[^)]+)\)")
                .context("failed to compile yaml markdown link pattern")?,
        })
    }

    pub fn rewrite(&self, kind: DocumentKind, content: &str) -> (String, usize) {
        match kind {
            DocumentKind::Markdown => self.rewrite_markdown(content),
            DocumentKind::Yaml => self.rewrite_yaml(content),
        }
    }

    pub fn rewrite_markdown(&self, content: &str) -> (String, usize) {
        let (content, inline) = self.rewrite_markdown_links(content);
        let (content, attributes) = self.rewrite_href_attributes(&content);
        (content, inline + attributes)
    }

    pub fn rewrite_yaml(&self, content: &str) -> (String, usize) {
        let (content, fields) = self.rewrite_yaml_url_fields(content);
        let (content, links) = self.rewrite_yaml_markdown_links(&content);
        (content, fields + links)
    }

    /// `[text](/path)`
    pub fn rewrite_markdown_links(&self, content: &str) -> (String, usize) {
        substitute(&self.markdown_link, content, |captures| {
            let text = captures.get(1)?.as_str();
            let target = captures.get(2)?.as_str();
            let rewritten = self.mapping.resolve(target)?;
            Some(format!("[{text}]({rewritten})"))
        })
    }

    /// `href="/path"` and `href='/path'`
    pub fn rewrite_href_attributes(&self, content: &str) -> (String, usize) {
        substitute(&self.href_attribute, content, |captures| {
            let (quote, target) = match (captures.get(1), captures.get(2)) {
                (Some(target), _) => ('"', target.as_str()),
                (None, Some(target)) => ('\'', target.as_str()),
                (None, None) => return None,
            };
            let rewritten = self.mapping.resolve(target)?;
            Some(format!("href={quote}{rewritten}{quote}"))
        })
    }

    /// `url: ...` values, quoted or bare. API server hosts are never touched.
    pub fn rewrite_yaml_url_fields(&self, content: &str) -> (String, usize) {
        substitute(&self.yaml_url_field, content, |captures| {
            let prefix = captures.get(1)?.as_str();
            let (quote, value) = if let Some(value) = captures.get(2) {
                ("\"", value.as_str())
            } else if let Some(value) = captures.get(3) {
                ("'", value.as_str())
            } else {
                ("", captures.get(4)?.as_str())
            };
            if self.is_api_host(value) {
                return None;
            }
            let rewritten = self.rewrite_docs_reference(value)?;
            Some(format!("{prefix}{quote}{rewritten}{quote}"))
        })
    }

    /// Markdown links embedded in YAML text fields, absolute or site-relative.
    pub fn rewrite_yaml_markdown_links(&self, content: &str) -> (String, usize) {
        substitute(&self.yaml_markdown_link, content, |captures| {
            let text = captures.get(1)?.as_str();
            let target = captures.get(2)?.as_str();
            let rewritten = self.rewrite_docs_reference(target)?;
            Some(format!("[{text}]({rewritten})"))
        })
    }

    /// Rewrites a documentation reference found in YAML. A fully-qualified URL
    /// must point at the site host and keep its scheme, host and documentation
    /// root; a bare path stays bare.
    fn rewrite_docs_reference(&self, value: &str) -> Option<String> {
        let docs_root = self.mapping.docs_root();
        let docs_segment = format!("{docs_root}/");
        if !value.contains(&docs_segment) && !value.starts_with(&self.settings.api_path_prefix) {
            return None;
        }

        let (origin, path) = if let Some((scheme, rest)) = value.split_once("://") {
            let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
            let (host, tail) = rest.split_at(host_end);
            if !self.is_site_host(host) {
                return None;
            }
            let path = tail.strip_prefix(docs_root)?;
            if !path.starts_with('/') {
                return None;
            }
            (Some(format!("{scheme}://{host}")), path.to_string())
        } else if value.starts_with('/') {
            (None, value.to_string())
        } else {
            return None;
        };

        let normalized = NormalizedPath::parse(&path);
        let base = normalized.base.trim_end_matches('/');
        let new_base = self.mapping.lookup(base)?;
        let rewritten = normalized.with_base(new_base);
        Some(match origin {
            Some(origin) => format!("{origin}{docs_root}{rewritten}"),
            None => rewritten,
        })
    }

    /// Only the host of a fully-qualified URL is matched against the API marker.
    fn is_api_host(&self, value: &str) -> bool {
        let marker = self.settings.api_host_marker.as_str();
        if marker.is_empty() {
            return false;
        }
        value
            .split_once("://")
            .and_then(|(_, rest)| rest.split(['/', '?', '#']).next())
            .is_some_and(|host| host.contains(marker))
    }

    fn is_site_host(&self, host: &str) -> bool {
        let Some(site_host) = self.settings.site_host.as_deref() else {
            return false;
        };
        host == site_host || host.ends_with(&format!(".{site_host}"))
    }

    /// Rewrites one file in place. Unsupported extensions and unchanged
    /// content are reported as not modified and never written.
    pub fn process_file(&self, path: &Path, options: &RewriteOptions) -> Result<FileOutcome> {
        rewrite_file_with(path, options, |kind, content| self.rewrite(kind, content))
    }

    /// Rewrites every documentation file under `content_dirs`. A failure on one
    /// file is logged and recorded; the remaining files are still processed.
    pub fn rewrite_tree(
        &self,
        project_root: &Path,
        content_dirs: &[PathBuf],
        options: &RewriteOptions,
    ) -> Result<RewriteReport> {
        info!(
            mappings = self.mapping.len(),
            dry_run = options.dry_run,
            "rewriting internal links"
        );
        rewrite_tree_with(project_root, content_dirs, options, |path| {
            self.process_file(path, options)
        })
    }
}

/// Verbatim replacement of one link by another across documentation files,
/// for links that change outside the redirect map (a moved pricing page, a
/// renamed external host).
#[derive(Debug, Clone)]
pub struct LinkReplacement {
    old: String,
    new: String,
}

impl LinkReplacement {
    pub fn new(old: &str, new: &str) -> Result<Self> {
        if old.is_empty() {
            bail!("link to replace must not be empty");
        }
        Ok(Self {
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    pub fn apply(&self, content: &str) -> (String, usize) {
        let occurrences = content.matches(self.old.as_str()).count();
        if occurrences == 0 {
            return (content.to_string(), 0);
        }
        (content.replace(self.old.as_str(), &self.new), occurrences)
    }

    pub fn process_file(&self, path: &Path, options: &RewriteOptions) -> Result<FileOutcome> {
        rewrite_file_with(path, options, |_, content| self.apply(content))
    }

    pub fn replace_tree(
        &self,
        project_root: &Path,
        content_dirs: &[PathBuf],
        options: &RewriteOptions,
    ) -> Result<RewriteReport> {
        info!(
            old = %self.old,
            new = %self.new,
            dry_run = options.dry_run,
            "replacing link"
        );
        rewrite_tree_with(project_root, content_dirs, options, |path| {
            self.process_file(path, options)
        })
    }
}

fn rewrite_file_with<F>(path: &Path, options: &RewriteOptions, transform: F) -> Result<FileOutcome>
where
    F: FnOnce(DocumentKind, &str) -> (String, usize),
{
    let Some(kind) = DocumentKind::from_path(path) else {
        return Ok(FileOutcome::unchanged());
    };
    let original =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (rewritten, replacements) = transform(kind, &original);
    if rewritten == original {
        return Ok(FileOutcome::unchanged());
    }
    if kind == DocumentKind::Yaml {
        ensure_yaml_still_parses(&original, &rewritten)
            .with_context(|| format!("refusing to rewrite {}", path.display()))?;
    }

    let diff = options.include_diff.then(|| {
        let label = normalize_path(path);
        TextDiff::from_lines(&original, &rewritten)
            .unified_diff()
            .context_radius(2)
            .header(&label, &label)
            .to_string()
    });

    if !options.dry_run {
        fs::write(path, &rewritten)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    debug!(
        path = %normalize_path(path),
        replacements,
        dry_run = options.dry_run,
        "rewrote links"
    );
    Ok(FileOutcome {
        modified: true,
        replacements,
        diff,
    })
}

fn rewrite_tree_with<F>(
    project_root: &Path,
    content_dirs: &[PathBuf],
    options: &RewriteOptions,
    process: F,
) -> Result<RewriteReport>
where
    F: Fn(&Path) -> Result<FileOutcome>,
{
    let files = find_documentation_files(content_dirs)?;
    debug!(files = files.len(), "documentation files found");

    let mut report = RewriteReport {
        dry_run: options.dry_run,
        files_processed: files.len(),
        total_replacements: 0,
        modified: Vec::new(),
        failures: Vec::new(),
    };
    for file in &files {
        let relative_path = relative_display(project_root, file);
        match process(file) {
            Ok(outcome) if outcome.modified => {
                report.total_replacements += outcome.replacements;
                report.modified.push(FileChange {
                    relative_path,
                    replacements: outcome.replacements,
                    diff: outcome.diff,
                });
            }
            Ok(_) => {}
            Err(error) => {
                warn!(path = %relative_path, "skipping file: {error:#}");
                report.failures.push(FileFailure {
                    relative_path,
                    message: format!("{error:#}"),
                });
            }
        }
    }
    Ok(report)
}

/// Replaces every match for which `replace` returns a value and counts them.
/// Matches where it returns `None` are copied through unchanged.
fn substitute<F>(pattern: &Regex, content: &str, mut replace: F) -> (String, usize)
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut output = String::with_capacity(content.len());
    let mut last_end = 0usize;
    let mut replacements = 0usize;
    for captures in pattern.captures_iter(content) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let Some(replacement) = replace(&captures) else {
            continue;
        };
        output.push_str(&content[last_end..whole.start()]);
        output.push_str(&replacement);
        last_end = whole.end();
        replacements += 1;
    }
    output.push_str(&content[last_end..]);
    (output, replacements)
}

fn ensure_yaml_still_parses(original: &str, rewritten: &str) -> Result<()> {
    if serde_yaml::from_str::<serde_yaml::Value>(original).is_err() {
        return Ok(());
    }
    if let Err(error) = serde_yaml::from_str::<serde_yaml::Value>(rewritten) {
        bail!("rewritten YAML no longer parses: {error}");
    }
    Ok(())
}

/// Markdown and YAML files under the given directories, sorted. Hidden
/// directories, `node_modules` and `backup-*` paths are skipped.
pub fn find_documentation_files(content_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dir in content_dirs {
        if !dir.exists() {
            debug!(dir = %normalize_path(dir), "content directory missing; skipped");
            continue;
        }
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry))
        {
            let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if DocumentKind::from_path(entry.path()).is_none() {
                continue;
            }
            if relative_display(dir, entry.path()).contains("backup-") {
                continue;
            }
            files.push(entry.into_path());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "node_modules"
}

fn relative_display(root: &Path, path: &Path) -> String {
    normalize_path(path.strip_prefix(root).unwrap_or(path))
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
