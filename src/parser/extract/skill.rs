//! Skill payload detection
//!
//! When a skill is loaded, its body is injected into the transcript as a user
//! message marked with `<skill-format>true</skill-format>` or a
//! `Base directory for this skill:` line.

use crate::parser::common::{basename, truncate_str};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const SKILL_FORMAT_MARKER: &str = "<skill-format>true</skill-format>";

static BASE_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Base directory for this skill:\s*(\S.*?)\s*$").unwrap());
static FRONTMATTER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^name:\s*(.+?)\s*$").unwrap());
static FRONTMATTER_DESC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^description:\s*(.+?)\s*$").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPayload {
    pub name: Option<String>,
    pub base_dir: Option<String>,
    pub summary: Option<String>,
}

fn summary_line(text: &str) -> Option<String> {
    let mut in_frontmatter = false;
    for line in text.lines() {
        let line = line.trim();
        if line == "---" {
            in_frontmatter = !in_frontmatter;
            continue;
        }
        if in_frontmatter
            || line.is_empty()
            || line.starts_with("Base directory for this skill:")
            || line.contains(SKILL_FORMAT_MARKER)
        {
            continue;
        }
        let cleaned = TAG_RE.replace_all(line, "");
        let cleaned = cleaned.trim_start_matches('#').trim();
        if !cleaned.is_empty() {
            return Some(truncate_str(cleaned, 160));
        }
    }
    None
}

/// Detect and parse an injected skill body.
pub fn parse_skill_payload(text: &str) -> Option<SkillPayload> {
    let base_dir = BASE_DIR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if base_dir.is_none() && !text.contains(SKILL_FORMAT_MARKER) {
        return None;
    }

    let name = FRONTMATTER_NAME_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches('"').to_string())
        .or_else(|| base_dir.as_deref().map(|d| basename(d).to_string()))
        .filter(|n| !n.is_empty());

    let summary = FRONTMATTER_DESC_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| truncate_str(m.as_str().trim_matches('"'), 160))
        .or_else(|| summary_line(text));

    Some(SkillPayload {
        name,
        base_dir,
        summary,
    })
}
