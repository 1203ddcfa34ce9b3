//! Plan-status script detection for Bash commands
//!
//! Recognizes invocations of a plan status-management script, e.g.
//! `python scripts/update-status.py --file plans/p1.md --status done`,
//! and classifies what the call does.

use crate::parser::common::basename;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanOperation {
    Update,
    Read,
    Query,
    Run,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatusCommand {
    pub script: String,
    pub operation: PlanOperation,
    pub file: Option<String>,
    pub status: Option<String>,
    pub field: Option<String>,
    pub value: Option<String>,
    pub read: bool,
    pub query: Option<String>,
}

/// Split a shell command into words, honoring quotes and backslash escapes.
///
/// Unquoted `;`, `|` and `&` runs are emitted as their own tokens so callers
/// can separate chained commands.
pub fn shell_split(command: &str) -> Vec<String> {
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut quote = Quote::None;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => {
                    if let Some(&next) = chars.peek() {
                        if matches!(next, '"' | '\\' | '$' | '`') {
                            chars.next();
                        }
                        current.push(if matches!(next, '"' | '\\' | '$' | '`') {
                            next
                        } else {
                            '\\'
                        });
                    }
                }
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    has_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    has_token = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        has_token = true;
                    }
                }
                ';' | '|' | '&' => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                    let mut op = c.to_string();
                    while let Some(&next) = chars.peek() {
                        if matches!(next, ';' | '|' | '&') {
                            op.push(next);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    tokens.push(op);
                }
                c if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    has_token = true;
                }
            },
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

fn is_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, ';' | '|' | '&'))
}

fn matches_script(token: &str, scripts: &[String]) -> bool {
    let name = basename(token);
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    scripts.iter().any(|s| s == name || s == stem)
}

/// Detect a status-management script call and extract its flags.
pub fn parse_plan_status_command(command: &str, scripts: &[String]) -> Option<PlanStatusCommand> {
    let tokens = shell_split(command);

    for segment in tokens.split(|t| is_operator(t)) {
        let Some(pos) = segment.iter().position(|t| matches_script(t, scripts)) else {
            continue;
        };

        let mut parsed = PlanStatusCommand {
            script: basename(&segment[pos]).to_string(),
            operation: PlanOperation::Run,
            file: None,
            status: None,
            field: None,
            value: None,
            read: false,
            query: None,
        };

        let args = &segment[pos + 1..];
        let mut i = 0;
        while i < args.len() {
            let (flag, inline) = match args[i].split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f, Some(v.to_string())),
                _ => (args[i].as_str(), None),
            };
            let takes_next = inline.is_none()
                && args
                    .get(i + 1)
                    .map(|n| !n.starts_with("--"))
                    .unwrap_or(false);
            let mut value = || -> Option<String> {
                if inline.is_some() {
                    inline.clone()
                } else if takes_next {
                    i += 1;
                    Some(args[i].clone())
                } else {
                    None
                }
            };

            match flag {
                "--file" | "-f" => parsed.file = value(),
                "--status" | "-s" => parsed.status = value(),
                "--field" => parsed.field = value(),
                "--value" => parsed.value = value(),
                "--query" | "-q" => parsed.query = value(),
                "--read" | "-r" => {
                    parsed.read = true;
                    if let Some(target) = value() {
                        parsed.file.get_or_insert(target);
                    }
                }
                _ => {}
            }
            i += 1;
        }

        parsed.operation = if parsed.status.is_some()
            || (parsed.field.is_some() && parsed.value.is_some())
        {
            PlanOperation::Update
        } else if parsed.read {
            PlanOperation::Read
        } else if parsed.query.is_some() {
            PlanOperation::Query
        } else {
            PlanOperation::Run
        };

        return Some(parsed);
    }

    None
}
