//! Heuristic classification rule tables
//!
//! Each classifier is an ordered list of `(predicate, result)` rules evaluated
//! top to bottom; the first matching rule wins.

use super::extract::is_manifest;
use super::types::{FileAction, FileType, LogEntry, SessionStatus, Speaker};
use crate::parser::common::basename;
use chrono::Duration;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// One classification rule
pub struct Rule<I: ?Sized, T> {
    pub name: &'static str,
    pub test: fn(&I) -> bool,
    pub result: T,
}

/// Evaluate `rules` in order and return the first match's result.
pub fn first_match<I: ?Sized, T: Copy>(rules: &[Rule<I, T>], input: &I, fallback: T) -> T {
    match rules.iter().find(|r| (r.test)(input)) {
        Some(rule) => {
            tracing::trace!("rule {} matched", rule.name);
            rule.result
        }
        None => fallback,
    }
}

// ─── File type ───────────────────────────────────────────────────────────────

fn extension(path: &str) -> String {
    basename(path)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn ext_in(path: &str, set: &[&str]) -> bool {
    let ext = extension(path);
    !ext.is_empty() && set.contains(&ext.as_str())
}

fn is_test_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    let name = basename(&lower);
    lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.contains("__tests__")
        || lower.starts_with("tests/")
        || name.starts_with("test_")
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
}

pub const FILE_TYPE_RULES: &[Rule<str, FileType>] = &[
    Rule {
        name: "manifest",
        test: is_manifest,
        result: FileType::Manifest,
    },
    Rule {
        name: "test",
        test: is_test_path,
        result: FileType::Test,
    },
    Rule {
        name: "document",
        test: |p| ext_in(p, &["md", "mdx", "rst", "txt", "adoc"]),
        result: FileType::Document,
    },
    Rule {
        name: "config",
        test: |p| {
            basename(p).starts_with(".env")
                || ext_in(p, &["json", "yaml", "yml", "toml", "ini", "cfg", "conf", "lock"])
        },
        result: FileType::Config,
    },
    Rule {
        name: "source",
        test: |p| {
            ext_in(
                p,
                &[
                    "rs", "py", "ts", "tsx", "js", "jsx", "mjs", "cjs", "go", "java", "kt", "rb",
                    "php", "c", "h", "cc", "cpp", "hpp", "cs", "swift", "scala", "sh", "bash",
                    "zsh", "sql", "html", "css", "scss", "vue", "svelte", "lua", "ex", "exs",
                ],
            )
        },
        result: FileType::Source,
    },
    Rule {
        name: "asset",
        test: |p| {
            ext_in(
                p,
                &[
                    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "pdf", "woff", "woff2",
                    "ttf", "mp4", "mp3",
                ],
            )
        },
        result: FileType::Asset,
    },
];

pub fn classify_file(path: &str) -> FileType {
    first_match(FILE_TYPE_RULES, path, FileType::Other)
}

// ─── Tool → file action ──────────────────────────────────────────────────────

pub fn file_action_for_tool(tool: &str) -> Option<FileAction> {
    match tool {
        "Read" => Some(FileAction::Read),
        "Write" => Some(FileAction::Create),
        "Edit" | "MultiEdit" | "NotebookEdit" => Some(FileAction::Update),
        _ => None,
    }
}

/// Tools whose failure retracts the file updates they produced
pub fn is_mutating_tool(tool: &str) -> bool {
    matches!(tool, "Write" | "Edit" | "MultiEdit" | "NotebookEdit" | "Bash")
}

// ─── Bash command category ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BashCategory {
    GitCommit,
    GitPush,
    Git,
    Test,
    Build,
    Install,
    Search,
    FileOps,
    Other,
}

static GIT_COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgit\s+(?:-C\s+\S+\s+)?commit\b").unwrap());
static GIT_PUSH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgit\s+(?:-C\s+\S+\s+)?push\b").unwrap());
static GIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[\s;&|(])git\s").unwrap());
static TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:cargo\s+(?:nextest|test)|pytest|(?:npm|pnpm)\s+(?:run\s+)?test|yarn\s+test|go\s+test|jest|vitest|mocha|rspec|phpunit)\b")
        .unwrap()
});
static BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:cargo\s+(?:build|check|clippy)|(?:npm|pnpm)\s+run\s+build|yarn\s+build|make|tsc|go\s+build|mvn|gradle)\b")
        .unwrap()
});
static INSTALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:npm\s+(?:install|i|ci)|yarn\s+add|pnpm\s+(?:add|install)|pip3?\s+install|cargo\s+(?:add|install)|brew\s+install|apt(?:-get)?\s+install|uv\s+(?:add|pip))\b")
        .unwrap()
});
static SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:grep|rg|find|ls|fd|ag|tree)\b").unwrap());
static FILE_OPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:rm|mv|cp|mkdir|touch|chmod|ln)\b").unwrap());

pub const BASH_CATEGORY_RULES: &[Rule<str, BashCategory>] = &[
    Rule {
        name: "git-commit",
        test: |c| GIT_COMMIT_RE.is_match(c),
        result: BashCategory::GitCommit,
    },
    Rule {
        name: "git-push",
        test: |c| GIT_PUSH_RE.is_match(c),
        result: BashCategory::GitPush,
    },
    Rule {
        name: "git",
        test: |c| GIT_RE.is_match(c),
        result: BashCategory::Git,
    },
    Rule {
        name: "test",
        test: |c| TEST_RE.is_match(c),
        result: BashCategory::Test,
    },
    Rule {
        name: "build",
        test: |c| BUILD_RE.is_match(c),
        result: BashCategory::Build,
    },
    Rule {
        name: "install",
        test: |c| INSTALL_RE.is_match(c),
        result: BashCategory::Install,
    },
    Rule {
        name: "search",
        test: |c| SEARCH_RE.is_match(c),
        result: BashCategory::Search,
    },
    Rule {
        name: "file-ops",
        test: |c| FILE_OPS_RE.is_match(c),
        result: BashCategory::FileOps,
    },
];

pub fn classify_bash_command(command: &str) -> BashCategory {
    first_match(BASH_CATEGORY_RULES, command, BashCategory::Other)
}

// ─── Bash result ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BashOutcome {
    Interrupted,
    Error,
    NothingToCommit,
    Success,
}

pub struct BashResultInput<'a> {
    pub output: &'a str,
    pub is_error: bool,
    pub interrupted: bool,
}

fn bash_outcome_rules<'a>() -> [Rule<BashResultInput<'a>, BashOutcome>; 3] {
    [
        Rule {
            name: "interrupted",
            test: |r| r.interrupted,
            result: BashOutcome::Interrupted,
        },
        Rule {
            name: "error",
            test: |r| r.is_error,
            result: BashOutcome::Error,
        },
        Rule {
            name: "nothing-to-commit",
            test: |r| r.output.contains("nothing to commit"),
            result: BashOutcome::NothingToCommit,
        },
    ]
}

static EXIT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)exit code:?\s*(\d+)").unwrap());

pub fn classify_bash_result(output: &str, is_error: bool, interrupted: bool) -> BashOutcome {
    let input = BashResultInput {
        output,
        is_error,
        interrupted,
    };
    first_match(&bash_outcome_rules(), &input, BashOutcome::Success)
}

pub fn exit_code(output: &str) -> Option<i64> {
    EXIT_CODE_RE
        .captures(output)
        .and_then(|c| c[1].parse().ok())
}

// ─── Session status ──────────────────────────────────────────────────────────

pub struct StatusInput<'a> {
    pub last_entry: Option<&'a LogEntry>,
    /// Time since the transcript was last modified
    pub age: Option<Duration>,
    pub active_window: Duration,
    pub terminal_subtypes: &'a [String],
}

fn ended_with_terminal_system_entry(input: &StatusInput<'_>) -> bool {
    let Some(entry) = input.last_entry else {
        return false;
    };
    if entry.speaker != Speaker::System {
        return false;
    }
    let has_duration = entry.metadata.contains_key("durationMs");
    let terminal_subtype = entry
        .metadata
        .get("subtype")
        .and_then(|v| v.as_str())
        .map(|s| input.terminal_subtypes.iter().any(|t| t == s))
        .unwrap_or(false);
    has_duration || terminal_subtype
}

fn recently_modified(input: &StatusInput<'_>) -> bool {
    input
        .age
        .map(|age| age <= input.active_window)
        .unwrap_or(false)
}

fn status_rules<'a>() -> [Rule<StatusInput<'a>, SessionStatus>; 3] {
    [
        Rule {
            name: "empty",
            test: |i| i.last_entry.is_none(),
            result: SessionStatus::Completed,
        },
        Rule {
            name: "terminal-system-entry",
            test: ended_with_terminal_system_entry,
            result: SessionStatus::Completed,
        },
        Rule {
            name: "recently-modified",
            test: recently_modified,
            result: SessionStatus::Active,
        },
    ]
}

pub fn classify_status(input: &StatusInput<'_>) -> SessionStatus {
    first_match(&status_rules(), input, SessionStatus::Completed)
}
