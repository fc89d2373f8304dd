use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use redirtool_core::config::{ToolConfig, load_config};
use redirtool_core::export::{ExportFormat, ExportOptions, ExportSelection, export};
use redirtool_core::model::read_document;
use redirtool_core::rewrite::{
    LinkReplacement, LinkRewriter, RewriteOptions, RewriteReport, RewriteSettings,
};
use redirtool_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, normalize_for_display, resolve_paths,
};
use redirtool_core::validate::{
    ValidateOptions, ValidationReport, load_validated_map, validate_document,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(
    name = "redirtool",
    version,
    about = "Validate a documentation redirect map, rewrite internal links, and export server redirect rules"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Check a redirect map for schema errors, duplicates, self-redirects, cycles and long chains")]
    Validate(ValidateArgs),
    #[command(about = "Rewrite internal links in markdown and YAML files to match a redirect map")]
    Rewrite(RewriteArgs),
    #[command(about = "Export a redirect map as platform-specific redirect rules")]
    Export(ExportArgs),
    #[command(about = "Replace one link verbatim in every markdown and YAML file")]
    ReplaceLink(ReplaceLinkArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[arg(value_name = "MAP")]
    map: PathBuf,
    #[arg(long, value_name = "PATH", help = "Also validate against a JSON Schema file")]
    schema: Option<PathBuf>,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct RewriteArgs {
    #[arg(value_name = "MAP")]
    map: PathBuf,
    #[arg(long, help = "Report changes without writing files")]
    dry_run: bool,
    #[arg(long, help = "Print a unified diff for every modified file")]
    diff: bool,
    #[arg(
        long = "dir",
        value_name = "DIR",
        help = "Content directory to scan (repeatable; defaults to [rewrite].content_dirs)"
    )]
    dirs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct ReplaceLinkArgs {
    #[arg(value_name = "OLD")]
    old: String,
    #[arg(value_name = "NEW")]
    new: String,
    #[arg(long, help = "Report occurrences without writing files")]
    dry_run: bool,
    #[arg(long, help = "Print a unified diff for every modified file")]
    diff: bool,
    #[arg(
        long = "dir",
        value_name = "DIR",
        help = "Content directory to scan (repeatable; defaults to [rewrite].content_dirs)"
    )]
    dirs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(value_name = "MAP")]
    map: PathBuf,
    #[arg(
        long,
        default_value = "all",
        value_name = "FORMAT",
        help = "mintlify, cloudflare, nginx, apache, vercel, netlify or all"
    )]
    format: String,
    #[arg(long, value_name = "DIR", help = "Directory for exported files")]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Validate(args)) => run_validate(&runtime, args),
        Some(Commands::Rewrite(args)) => run_rewrite(&runtime, args),
        Some(Commands::Export(args)) => run_export(&runtime, args),
        Some(Commands::ReplaceLink(args)) => run_replace_link(&runtime, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("REDIRTOOL_LOG_JSON")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run_validate(runtime: &RuntimeOptions, args: ValidateArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let map_path = paths.input_path(&args.map);
    let document = read_document(&map_path)?;
    let options = ValidateOptions {
        schema_path: args.schema.as_deref().map(|path| paths.input_path(path)),
    };
    let report = validate_document(&document, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("redirect map validation");
        println!("map: {}", normalize_for_display(&map_path));
        if let Some(schema) = &options.schema_path {
            println!("schema: {}", normalize_for_display(schema));
        }
        print_validation_report(&report);
    }
    print_diagnostics(runtime, &paths);

    if !report.valid {
        bail!("validation failed with {} error(s)", report.errors.len());
    }
    Ok(())
}

fn print_validation_report(report: &ValidationReport) {
    println!("rules: {}", report.rule_count);
    println!("errors.count: {}", report.errors.len());
    for error in &report.errors {
        println!("  - [{}] {}", error.check.as_str(), error.message);
    }
    println!("warnings.count: {}", report.warnings.len());
    for warning in &report.warnings {
        println!("  - [{}] {}", warning.check.as_str(), warning.message);
    }
    println!("valid: {}", format_flag(report.valid));
}

fn run_rewrite(runtime: &RuntimeOptions, args: RewriteArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let map_path = paths.input_path(&args.map);
    let (map, _) = load_validated_map(&map_path)?;

    let mapping = map.path_mapping(&config.docs_root());
    let rule_count = map.len();
    let mapping_count = mapping.len();
    let rewriter = LinkRewriter::new(mapping, RewriteSettings::from_config(&config))?;

    let content_dirs = resolve_content_dirs(&paths, &config, &args.dirs);

    let report = rewriter.rewrite_tree(
        &paths.project_root,
        &content_dirs,
        &RewriteOptions {
            dry_run: args.dry_run,
            include_diff: args.diff,
        },
    )?;

    println!("internal link rewrite");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("map: {}", normalize_for_display(&map_path));
    println!("rules: {rule_count}");
    println!("mappings: {mapping_count}");
    for dir in &content_dirs {
        println!("content_dir: {}", normalize_for_display(dir));
    }
    print_rewrite_report(&report);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_replace_link(runtime: &RuntimeOptions, args: ReplaceLinkArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let replacement = LinkReplacement::new(&args.old, &args.new)?;
    let content_dirs = resolve_content_dirs(&paths, &config, &args.dirs);

    let report = replacement.replace_tree(
        &paths.project_root,
        &content_dirs,
        &RewriteOptions {
            dry_run: args.dry_run,
            include_diff: args.diff,
        },
    )?;

    println!("link replacement");
    println!("project_root: {}", normalize_for_display(&paths.project_root));
    println!("old: {}", args.old);
    println!("new: {}", args.new);
    for dir in &content_dirs {
        println!("content_dir: {}", normalize_for_display(dir));
    }
    print_rewrite_report(&report);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn resolve_content_dirs(
    paths: &ResolvedPaths,
    config: &ToolConfig,
    dirs: &[PathBuf],
) -> Vec<PathBuf> {
    if dirs.is_empty() {
        config
            .content_dirs()
            .iter()
            .map(|dir| paths.project_path(Path::new(dir)))
            .collect()
    } else {
        dirs.iter().map(|dir| paths.input_path(dir)).collect()
    }
}

fn print_rewrite_report(report: &RewriteReport) {
    println!("dry_run: {}", format_flag(report.dry_run));
    println!("files.processed: {}", report.files_processed);
    println!("files.modified: {}", report.modified.len());
    println!("links.updated: {}", report.total_replacements);
    for change in &report.modified {
        println!("  - {} ({} link(s))", change.relative_path, change.replacements);
        if let Some(diff) = &change.diff {
            print!("{diff}");
        }
    }
    if !report.failures.is_empty() {
        println!("failures.count: {}", report.failures.len());
        for failure in &report.failures {
            println!("  - {}: {}", failure.relative_path, failure.message);
        }
    }
    if report.dry_run {
        println!("note: dry run, no files were written");
    }
}

fn run_export(runtime: &RuntimeOptions, args: ExportArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let selection: ExportSelection = args.format.parse()?;
    let map_path = paths.input_path(&args.map);
    let (map, _) = load_validated_map(&map_path)?;

    let output_dir = match &args.output_dir {
        Some(dir) => paths.input_path(dir),
        None => paths.project_path(Path::new(config.export_output_dir())),
    };
    if config.configured_site_url().is_none()
        && selection.formats().contains(&ExportFormat::Cloudflare)
    {
        tracing::warn!(
            site_url = %config.site_url(),
            "no [site].base_url configured; cloudflare rules use the placeholder site URL"
        );
    }
    let written = export(
        selection,
        &map.redirects,
        &ExportOptions {
            site_url: config.site_url(),
        },
        &output_dir,
    )?;

    println!("redirect rules export");
    println!("map: {}", normalize_for_display(&map_path));
    println!("rules: {}", map.len());
    println!("output_dir: {}", normalize_for_display(&output_dir));
    for file in &written {
        println!("exported.{}: {}", file.format, file.path);
        println!("  {}", file.format.usage_hint());
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn load_runtime_config(paths: &ResolvedPaths) -> Result<ToolConfig> {
    load_config(&paths.config_path)
        .with_context(|| format!("failed to load config {}", paths.config_path.display()))
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
