//! Background task notification parsing
//!
//! Notifications arrive either as a JSON object or as XML-like tags inside a
//! `<task-notification>` block; both normalize to [`TaskNotification`].

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<task-notification>\s*(.*?)\s*</task-notification>").unwrap()
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<([a-z][a-z_-]*)>\s*(.*?)\s*</([a-z][a-z_-]*)>").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNotification {
    pub task_id: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub tool_use_id: Option<String>,
    pub output_file: Option<String>,
    pub shell_id: Option<String>,
}

impl TaskNotification {
    pub fn is_empty(&self) -> bool {
        self.task_id.is_none()
            && self.status.is_none()
            && self.summary.is_none()
            && self.tool_use_id.is_none()
            && self.output_file.is_none()
            && self.shell_id.is_none()
    }

    /// Assign a field by any of its snake, camel or kebab spellings.
    fn set(&mut self, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        let slot = match key.replace(['-', '_'], "").to_ascii_lowercase().as_str() {
            "taskid" => &mut self.task_id,
            "status" => &mut self.status,
            "summary" => &mut self.summary,
            "tooluseid" => &mut self.tool_use_id,
            "outputfile" => &mut self.output_file,
            "shellid" => &mut self.shell_id,
            _ => return,
        };
        slot.get_or_insert(value);
    }
}

fn from_json(text: &str) -> Option<TaskNotification> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
        return None;
    };
    let mut out = TaskNotification::default();
    for (key, value) in map {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        out.set(&key, value);
    }
    Some(out)
}

fn from_tags(text: &str) -> TaskNotification {
    let mut out = TaskNotification::default();
    for caps in TAG_RE.captures_iter(text) {
        if caps[1] == caps[3] {
            out.set(&caps[1], caps[2].to_string());
        }
    }
    out
}

/// Parse a task notification from message text, if one is present.
pub fn parse_task_notification(text: &str) -> Option<TaskNotification> {
    let body = BLOCK_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    let parsed = if body.starts_with('{') {
        from_json(body).unwrap_or_else(|| from_tags(body))
    } else {
        from_tags(body)
    };

    (!parsed.is_empty()).then_some(parsed)
}
