//! Agentlog CLI - parse Claude Code transcripts into session records

use agentlog::config::expand_path;
use agentlog::{ClaudeCodeParser, CoreError, ParserConfig, SessionParser};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "agentlog")]
#[command(version)]
#[command(about = "Agentlog - structured session records from agent transcripts", long_about = None)]
struct Args {
    /// Transcript files, or directories scanned recursively for *.jsonl
    #[arg(required_unless_present = "init_schema")]
    paths: Vec<PathBuf>,

    /// Path to the schema document
    #[arg(long, env = "AGENTLOG_SCHEMA")]
    schema: Option<PathBuf>,

    /// Write a default schema document to this path and exit
    #[arg(long, value_name = "PATH")]
    init_schema: Option<PathBuf>,

    /// Use this .claude directory for sidecars instead of searching ancestors
    #[arg(long)]
    claude_root: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Per-file parse deadline in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Expand the command-line paths into a sorted, deduplicated transcript list.
fn collect_transcripts(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        let path = expand_path(path);
        if path.is_dir() {
            let pattern = format!(
                "{}/**/*.jsonl",
                glob::Pattern::escape(&path.display().to_string())
            );
            match glob::glob(&pattern) {
                Ok(found) => files.extend(found.filter_map(Result::ok)),
                Err(e) => tracing::warn!("Bad scan pattern for {}: {}", path.display(), e),
            }
        } else if path.exists() {
            files.push(path);
        } else {
            let missing = CoreError::NotFound("transcript", path.display().to_string());
            tracing::warn!("{}", missing);
        }
    }
    files.sort();
    files.dedup();
    files
}

/// Parse one file on the blocking pool, bounded by `deadline`.
async fn parse_with_deadline(
    parser: Arc<ClaudeCodeParser>,
    path: &Path,
    deadline: Duration,
) -> agentlog::Result<Option<agentlog::AgentSession>> {
    let owned = path.to_path_buf();
    let task = tokio::task::spawn_blocking(move || parser.parse_file(&owned));
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(CoreError::Parser(format!("parse task failed: {}", e))),
        Err(_) => Err(CoreError::Timeout(
            deadline.as_secs(),
            path.display().to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("agentlog={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Handle --init-schema
    if let Some(path) = &args.init_schema {
        let schema_path = expand_path(path);
        if schema_path.exists() {
            tracing::warn!("Schema already exists: {}", schema_path.display());
            return Ok(());
        }
        ParserConfig::create_default(&schema_path)?;
        tracing::info!("Created default schema at: {}", schema_path.display());
        return Ok(());
    }

    if let Some(path) = &args.schema {
        ParserConfig::install(ParserConfig::from_file(path)?)?;
    }

    let mut parser = ClaudeCodeParser::new();
    if let Some(root) = &args.claude_root {
        parser = parser.with_claude_root(expand_path(root));
    }
    let parser = Arc::new(parser);
    let deadline = Duration::from_secs(args.timeout_secs);

    let files = collect_transcripts(&args.paths);
    tracing::info!("Parsing {} transcript(s)", files.len());

    let mut parsed = 0usize;
    for file in &files {
        match parse_with_deadline(parser.clone(), file, deadline).await {
            Ok(Some(session)) => {
                let json = if args.pretty {
                    serde_json::to_string_pretty(&session)?
                } else {
                    serde_json::to_string(&session)?
                };
                println!("{}", json);
                parsed += 1;
                tracing::debug!(
                    "{}: {} logs, {} artifacts",
                    session.id,
                    session.logs.len(),
                    session.artifacts.len()
                );
            }
            Ok(None) => tracing::info!("No session in {}", file.display()),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    tracing::info!("Parsed {} of {} transcript(s)", parsed, files.len());
    Ok(())
}
