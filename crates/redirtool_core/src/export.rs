use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::model::RedirectRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Mintlify,
    Cloudflare,
    Nginx,
    Apache,
    Vercel,
    Netlify,
}

impl ExportFormat {
    pub const ALL: [Self; 6] = [
        Self::Mintlify,
        Self::Cloudflare,
        Self::Nginx,
        Self::Apache,
        Self::Vercel,
        Self::Netlify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mintlify => "mintlify",
            Self::Cloudflare => "cloudflare",
            Self::Nginx => "nginx",
            Self::Apache => "apache",
            Self::Vercel => "vercel",
            Self::Netlify => "netlify",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Mintlify => "mintlify-redirects.json",
            Self::Cloudflare => "cloudflare-rules.txt",
            Self::Nginx => "nginx-redirects.conf",
            Self::Apache => "apache-redirects.htaccess",
            Self::Vercel => "vercel-redirects.json",
            Self::Netlify => "_redirects",
        }
    }

    pub fn usage_hint(self) -> &'static str {
        match self {
            Self::Mintlify => "Add this file to your Mintlify project root",
            Self::Cloudflare => "Apply these rules in your Cloudflare dashboard",
            Self::Nginx => "Include this file in your nginx configuration",
            Self::Apache => "Place this file as .htaccess in your document root",
            Self::Vercel => "Merge this with your existing vercel.json",
            Self::Netlify => "Place this file in your publish directory",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown format '{value}' (available: {}, all)",
                    Self::ALL.map(Self::as_str).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSelection {
    One(ExportFormat),
    All,
}

impl ExportSelection {
    pub fn formats(self) -> Vec<ExportFormat> {
        match self {
            Self::One(format) => vec![format],
            Self::All => ExportFormat::ALL.to_vec(),
        }
    }
}

impl FromStr for ExportSelection {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::One)
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Origin prepended to paths by formats that need absolute URLs.
    pub site_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedFile {
    pub format: ExportFormat,
    pub path: String,
    pub rules: usize,
}

pub fn render(
    format: ExportFormat,
    rules: &[RedirectRule],
    options: &ExportOptions,
) -> Result<String> {
    match format {
        ExportFormat::Mintlify => render_mintlify(rules),
        ExportFormat::Cloudflare => Ok(render_cloudflare(rules, &options.site_url)),
        ExportFormat::Nginx => Ok(render_nginx(rules)),
        ExportFormat::Apache => Ok(render_apache(rules)),
        ExportFormat::Vercel => render_vercel(rules),
        ExportFormat::Netlify => Ok(render_netlify(rules)),
    }
}

#[derive(Serialize)]
struct RedirectList<T> {
    redirects: Vec<T>,
}

#[derive(Serialize)]
struct SourceDestination<'a> {
    source: &'a str,
    destination: &'a str,
}

#[derive(Serialize)]
struct PermanentFlagged<'a> {
    source: &'a str,
    destination: &'a str,
    permanent: bool,
}

pub fn render_mintlify(rules: &[RedirectRule]) -> Result<String> {
    let output = RedirectList {
        redirects: rules
            .iter()
            .map(|rule| SourceDestination {
                source: &rule.source,
                destination: &rule.destination,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&output).context("failed to serialize mintlify redirects")
}

pub fn render_vercel(rules: &[RedirectRule]) -> Result<String> {
    let output = RedirectList {
        redirects: rules
            .iter()
            .map(|rule| PermanentFlagged {
                source: &rule.source,
                destination: &rule.destination,
                permanent: rule.is_permanent(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&output).context("failed to serialize vercel redirects")
}

pub fn render_cloudflare(rules: &[RedirectRule], site_url: &str) -> String {
    let site_url = site_url.trim_end_matches('/');
    let mut lines = vec![
        "# Cloudflare Page Rules Configuration".to_string(),
        "# Copy these rules to your Cloudflare dashboard".to_string(),
        "# Go to: Websites > [Your Site] > Rules > Page Rules".to_string(),
        String::new(),
    ];
    for (index, rule) in rules.iter().enumerate() {
        lines.push(format!("# Rule {}", index + 1));
        lines.push(format!("URL Match: {site_url}{}", rule.source));
        lines.push("Setting: Forwarding URL".to_string());
        lines.push(format!("Status Code: {}", rule.status_code));
        lines.push(format!("Destination: {site_url}{}", rule.destination));
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn render_nginx(rules: &[RedirectRule]) -> String {
    let mut lines = vec![
        "# Nginx Redirect Configuration".to_string(),
        "# Add this to your nginx.conf or site configuration".to_string(),
        String::new(),
        "server {".to_string(),
        "    # ... your existing configuration ...".to_string(),
        String::new(),
    ];
    for rule in rules {
        lines.push(format!("    location = {} {{", rule.source));
        lines.push(format!("        return {} {};", rule.status_code, rule.destination));
        lines.push("    }".to_string());
        lines.push(String::new());
    }
    lines.push("}".to_string());
    lines.join("\n")
}

pub fn apache_flag(status_code: u16) -> &'static str {
    match status_code {
        301 => "R=301,L",
        302 => "R=302,L",
        307 => "R=307,L",
        308 => "R=308,L",
        _ => "R,L",
    }
}

pub fn render_apache(rules: &[RedirectRule]) -> String {
    let mut lines = vec![
        "# Apache Redirect Configuration".to_string(),
        "# Add this to your .htaccess file".to_string(),
        String::new(),
        "RewriteEngine On".to_string(),
        String::new(),
    ];
    for rule in rules {
        let pattern = rule.source.replace('.', r"\.");
        lines.push(format!(
            "RewriteRule ^{}$ {} [{}]",
            pattern.trim_start_matches('/'),
            rule.destination,
            apache_flag(rule.status_code)
        ));
    }
    lines.join("\n")
}

pub fn render_netlify(rules: &[RedirectRule]) -> String {
    let mut lines = vec![
        "# Netlify Redirects Configuration".to_string(),
        "# Place this file as _redirects in your publish directory".to_string(),
        String::new(),
    ];
    for rule in rules {
        lines.push(format!("{}  {}  {}", rule.source, rule.destination, rule.status_code));
    }
    lines.join("\n")
}

pub fn write_export(
    format: ExportFormat,
    rules: &[RedirectRule],
    options: &ExportOptions,
    output_dir: &Path,
) -> Result<ExportedFile> {
    let rendered = render(format, rules, options)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path: PathBuf = output_dir.join(format.default_file_name());
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    let shown = path.to_string_lossy().replace('\\', "/");
    info!(
        format = format.as_str(),
        path = %shown,
        rules = rules.len(),
        "exported redirects"
    );
    Ok(ExportedFile {
        format,
        path: shown,
        rules: rules.len(),
    })
}

pub fn export(
    selection: ExportSelection,
    rules: &[RedirectRule],
    options: &ExportOptions,
    output_dir: &Path,
) -> Result<Vec<ExportedFile>> {
    if rules.is_empty() {
        bail!("no redirects found in redirect map");
    }
    selection
        .formats()
        .into_iter()
        .map(|format| write_export(format, rules, options, output_dir))
        .collect()
}
