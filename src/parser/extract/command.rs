//! Slash-command tag parsing
//!
//! User messages that invoke a slash command carry `<command-name>`,
//! `<command-message>` and `<command-args>` tags. The arguments are further
//! scanned for a request id, embedded paths and, for phase-driven commands,
//! a phase selection such as `3`, `2-4`, `1 & 3` or `all`.

use super::paths::extract_paths;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<command-name>\s*(.*?)\s*</command-name>").unwrap());
static ARGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<command-args>\s*(.*?)\s*</command-args>").unwrap());
static MESSAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<command-message>\s*(.*?)\s*</command-message>").unwrap());
static REQUEST_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bREQ-[A-Za-z0-9][A-Za-z0-9_-]*").unwrap());

static PHASE_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)(?:\s|$)").unwrap());
static PHASE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\s*&\s*\d+)+)(?:\s|$)").unwrap());
static PHASE_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\s|$)").unwrap());

/// Which phases a phase-driven command targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum PhaseSelection {
    All,
    Single { phase: u32 },
    Range { start: u32, end: u32 },
    List { phases: Vec<u32> },
}

impl PhaseSelection {
    /// Concrete phase numbers, or `None` for `all`.
    pub fn phases(&self) -> Option<Vec<u32>> {
        match self {
            PhaseSelection::All => None,
            PhaseSelection::Single { phase } => Some(vec![*phase]),
            PhaseSelection::Range { start, end } => Some((*start..=*end).collect()),
            PhaseSelection::List { phases } => Some(phases.clone()),
        }
    }
}

/// A parsed slash-command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInvocation {
    /// Command name without the leading slash
    pub name: String,
    pub message: Option<String>,
    pub args: String,
    pub request_id: Option<String>,
    pub paths: Vec<String>,
    pub phases: Option<PhaseSelection>,
}

impl CommandInvocation {
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{} {}", self.name, self.args)
        }
    }
}

/// Parse `<command-name>`/`<command-args>` tags from message text.
pub fn parse_command_tags(text: &str, phase_commands: &[String]) -> Option<CommandInvocation> {
    let name = NAME_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_start_matches('/').to_string())
        .filter(|n| !n.is_empty())?;

    let args = ARGS_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let message = MESSAGE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|m| !m.is_empty());

    let takes_phases = phase_commands.iter().any(|p| name.contains(p.as_str()));

    Some(CommandInvocation {
        request_id: REQUEST_ID_RE.find(&args).map(|m| m.as_str().to_string()),
        paths: extract_paths(&args),
        phases: if takes_phases {
            parse_phase_tokens(&args)
        } else {
            None
        },
        name,
        message,
        args,
    })
}

/// Parse the leading phase selection of a command's arguments.
pub fn parse_phase_tokens(args: &str) -> Option<PhaseSelection> {
    let args = args.trim();
    let head = args.split_whitespace().next()?;
    if head.eq_ignore_ascii_case("all") {
        return Some(PhaseSelection::All);
    }

    if let Some(caps) = PHASE_RANGE_RE.captures(args) {
        let start: u32 = caps[1].parse().ok()?;
        let end: u32 = caps[2].parse().ok()?;
        if start > end {
            return None;
        }
        return Some(PhaseSelection::Range { start, end });
    }

    if let Some(caps) = PHASE_LIST_RE.captures(args) {
        let mut phases: Vec<u32> = caps[1]
            .split('&')
            .filter_map(|p| p.trim().parse().ok())
            .collect();
        phases.dedup();
        return Some(PhaseSelection::List { phases });
    }

    PHASE_SINGLE_RE
        .captures(args)
        .and_then(|caps| caps[1].parse().ok())
        .map(|phase| PhaseSelection::Single { phase })
}
