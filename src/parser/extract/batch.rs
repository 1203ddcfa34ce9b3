//! Batch announcement parsing
//!
//! Orchestrating agents announce parallel work as a `Batch <id>` header
//! followed by `- **<task-id>**: <description> (<agent>)` bullets.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?\**Batch[ \t]+([A-Za-z0-9][A-Za-z0-9._-]*)").unwrap()
});

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[-*][ \t]+\*\*([^*\n]+?)\*\*[ \t]*:[ \t]*(.+?)(?:[ \t]*\(([^()\n]+)\))?[ \t]*$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub task_id: String,
    pub description: String,
    pub agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnnouncement {
    pub batch_id: String,
    pub tasks: Vec<BatchTask>,
}

/// Parse every batch announced in a message. Headers without bullets are skipped.
pub fn parse_batch_announcements(text: &str) -> Vec<BatchAnnouncement> {
    let headers: Vec<(usize, usize, String)> = HEADER_RE
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let id = c.get(1)?.as_str().trim_end_matches(['.', ':']).to_string();
            Some((whole.start(), whole.end(), id))
        })
        .collect();

    let mut out = Vec::new();
    for (i, (_, body_start, batch_id)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        let body = &text[*body_start..body_end];

        let tasks: Vec<BatchTask> = BULLET_RE
            .captures_iter(body)
            .map(|c| BatchTask {
                task_id: c[1].trim().to_string(),
                description: c[2].trim().to_string(),
                agent: c.get(3).map(|m| m.as_str().trim().to_string()),
            })
            .collect();

        if !tasks.is_empty() {
            out.push(BatchAnnouncement {
                batch_id: batch_id.clone(),
                tasks,
            });
        }
    }
    out
}
