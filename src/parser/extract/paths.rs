//! File path extraction from free text

use crate::parser::common::basename;
use regex::Regex;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\s'"`()\[\],;|&]+"#).unwrap());

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.].*\.([A-Za-z0-9]{1,10})$").unwrap());

/// Basenames that identify a package or build manifest
pub const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "go.mod",
    "Gemfile",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "composer.json",
    "Dockerfile",
    "docker-compose.yml",
    "Makefile",
    "tsconfig.json",
];

/// Directory fragments under which extension-less names still count as files
const DOC_ROOT_MARKERS: &[&str] = &["docs/", ".claude/", "plans/", "specs/", "project_plans/"];

pub fn is_manifest(path: &str) -> bool {
    MANIFEST_FILES.contains(&basename(path))
}

/// Template or glob tokens such as `*.rs`, `${DIR}/x`, `<path>` or `{name}.md`
pub fn is_placeholder(token: &str) -> bool {
    token.contains('*')
        || token.contains("${")
        || token.contains('<')
        || token.contains('>')
        || token.contains('{')
        || token.contains('}')
}

/// Minimal validation for paths handed to the file tracker.
pub fn is_file_like(path: &str) -> bool {
    let name = basename(path);
    !path.is_empty()
        && !path.contains('\n')
        && !path.contains("://")
        && !path.ends_with('/')
        && !is_placeholder(path)
        && !name.is_empty()
        && name != "."
        && name != ".."
}

/// Clean a free-text token: unwrap `--flag=value`, drop a leading `@`
/// mention marker and trailing sentence punctuation.
fn clean_token(token: &str) -> &str {
    let token = match token.split_once('=') {
        Some((flag, value)) if flag.starts_with('-') => value,
        _ => token,
    };
    token
        .trim_start_matches('@')
        .trim_end_matches(['.', ',', ':', '!', '?'])
}

fn looks_like_path(candidate: &str) -> bool {
    if !candidate.contains('/') || candidate.contains("://") || is_placeholder(candidate) {
        return false;
    }
    if !is_file_like(candidate) {
        return false;
    }
    let name = basename(candidate);
    if MANIFEST_FILES.contains(&name) {
        return true;
    }
    if EXTENSION_RE.is_match(name) {
        return true;
    }
    DOC_ROOT_MARKERS.iter().any(|m| candidate.contains(m))
}

/// Scan text for slash-delimited tokens that look like file paths.
///
/// Results are deduplicated and keep their first-seen order.
pub fn extract_paths(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in TOKEN_RE.find_iter(text) {
        let candidate = clean_token(m.as_str());
        if looks_like_path(candidate) && !out.iter().any(|p| p == candidate) {
            out.push(candidate.to_string());
        }
    }
    out
}
