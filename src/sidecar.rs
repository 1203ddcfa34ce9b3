//! Per-session sidecar files under the `.claude` root
//!
//! Todos, the task queue, team inboxes and the session environment live
//! beside the transcript rather than in it. Every loader here is best
//! effort: a missing or malformed file yields an empty result.

use crate::config::SidecarConfig;
use crate::error::Result;
use crate::parser::types::{
    InboxMessage, SidecarSnapshot, TaskQueueSnapshot, TaskRecord, TeamInbox, TodoItem, TodoList,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

const SESSION_PLACEHOLDER: &str = "{session_id}";

/// Nearest ancestor directory literally named `.claude`.
pub fn find_claude_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(".claude") && p.is_dir())
        .map(Path::to_path_buf)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Expand a glob template under `root`, escaping the literal parts.
fn glob_template(root: &Path, template: &str, session_id: &str) -> Result<Vec<PathBuf>> {
    let rendered = template.replace(SESSION_PLACEHOLDER, &glob::Pattern::escape(session_id));
    let pattern = format!("{}/{}", glob::Pattern::escape(&root.display().to_string()), rendered);
    Ok(glob::glob(&pattern)?.filter_map(|p| p.ok()).collect())
}

fn dir_template(root: &Path, template: &str, session_id: &str) -> PathBuf {
    root.join(template.replace(SESSION_PLACEHOLDER, session_id))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// `todos/<session>-agent-<agent>.json`, one list per agent.
pub fn load_todos(root: &Path, session_id: &str, cfg: &SidecarConfig) -> Vec<TodoList> {
    let paths = match glob_template(root, &cfg.todos, session_id) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::debug!("Todo lookup failed: {}", e);
            return Vec::new();
        }
    };

    paths
        .into_iter()
        .filter_map(|path| match read_json::<Vec<TodoItem>>(&path) {
            Ok(items) => {
                let stem = file_stem(&path);
                let agent_id = stem
                    .rsplit_once("-agent-")
                    .map(|(_, agent)| agent.to_string())
                    .unwrap_or(stem);
                Some(TodoList { agent_id, items })
            }
            Err(e) => {
                tracing::debug!("Skipping todo file {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

fn task_sort_key(task: &TaskRecord) -> (u64, String) {
    (task.id.parse().unwrap_or(u64::MAX), task.id.clone())
}

/// `tasks/<session>/*.json` plus the `.highwatermark` and `.lock` markers.
/// `None` when the session has no task directory.
pub fn load_tasks(root: &Path, session_id: &str, cfg: &SidecarConfig) -> Option<TaskQueueSnapshot> {
    let dir = dir_template(root, &cfg.tasks, session_id);
    if !dir.is_dir() {
        return None;
    }

    let mut tasks: Vec<TaskRecord> = glob_template(&dir, "*.json", "")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|path| match read_json::<TaskRecord>(&path) {
            Ok(mut task) => {
                if task.id.is_empty() {
                    task.id = file_stem(&path);
                }
                Some(task)
            }
            Err(e) => {
                tracing::debug!("Skipping task file {}: {}", path.display(), e);
                None
            }
        })
        .collect();
    tasks.sort_by_key(task_sort_key);

    let high_watermark = std::fs::read_to_string(dir.join(".highwatermark"))
        .ok()
        .and_then(|s| s.trim().parse().ok());

    Some(TaskQueueSnapshot {
        tasks,
        high_watermark,
        locked: dir.join(".lock").exists(),
    })
}

/// Message bodies that are themselves JSON objects are decoded into `payload`.
fn decode_payload(text: &str) -> Option<Value> {
    let text = text.trim();
    if !text.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// `teams/<session>/inboxes/<agent>.json`
pub fn load_team_inboxes(root: &Path, session_id: &str, cfg: &SidecarConfig) -> Vec<TeamInbox> {
    let paths = match glob_template(root, &cfg.team_inboxes, session_id) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::debug!("Inbox lookup failed: {}", e);
            return Vec::new();
        }
    };

    paths
        .into_iter()
        .filter_map(|path| match read_json::<Vec<InboxMessage>>(&path) {
            Ok(mut messages) => {
                for message in &mut messages {
                    message.payload = decode_payload(&message.text);
                }
                Some(TeamInbox {
                    agent: file_stem(&path),
                    messages,
                })
            }
            Err(e) => {
                tracing::debug!("Skipping inbox {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

/// Sorted file names under `session-env/<session>`.
pub fn load_session_env(root: &Path, session_id: &str, cfg: &SidecarConfig) -> Vec<String> {
    let dir = dir_template(root, &cfg.session_env, session_id);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

/// Load every sidecar for a session. Without a root, everything is empty.
pub fn load_sidecars(root: Option<&Path>, session_id: &str, cfg: &SidecarConfig) -> SidecarSnapshot {
    let Some(root) = root else {
        return SidecarSnapshot::default();
    };
    if session_id.is_empty() {
        return SidecarSnapshot::default();
    }

    SidecarSnapshot {
        todos: load_todos(root, session_id, cfg),
        tasks: load_tasks(root, session_id, cfg),
        team_inboxes: load_team_inboxes(root, session_id, cfg),
        session_env: load_session_env(root, session_id, cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn claude_root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".claude");
        fs::create_dir_all(&root).unwrap();
        (dir, root)
    }

    #[test]
    fn test_find_claude_root() {
        let (_dir, root) = claude_root();
        let transcript = root.join("projects/-repo/sess-1.jsonl");
        write(&transcript, "");
        assert_eq!(find_claude_root(&transcript), Some(root));

        let other = tempfile::tempdir().unwrap();
        assert_eq!(find_claude_root(&other.path().join("x.jsonl")), None);
    }

    #[test]
    fn test_load_todos() {
        let (_dir, root) = claude_root();
        write(
            &root.join("todos/sess-1-agent-sess-1.json"),
            r#"[{"content": "Write tests", "status": "in_progress", "activeForm": "Writing tests"}]"#,
        );
        write(&root.join("todos/sess-1-agent-b2.json"), "not json");
        write(&root.join("todos/other-agent-x.json"), "[]");

        let todos = load_todos(&root, "sess-1", &SidecarConfig::default());
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].agent_id, "sess-1");
        assert_eq!(todos[0].items[0].status, "in_progress");
        assert_eq!(todos[0].items[0].active_form.as_deref(), Some("Writing tests"));
    }

    #[test]
    fn test_load_tasks() {
        let (_dir, root) = claude_root();
        let cfg = SidecarConfig::default();
        assert!(load_tasks(&root, "sess-1", &cfg).is_none());

        let dir = root.join("tasks/sess-1");
        write(
            &dir.join("10.json"),
            r#"{"id": "10", "subject": "Ship", "status": "pending", "blockedBy": ["2"]}"#,
        );
        write(
            &dir.join("2.json"),
            r#"{"id": 2, "subject": "Build", "description": "compile", "status": "completed"}"#,
        );
        write(&dir.join(".highwatermark"), "10\n");
        write(&dir.join(".lock"), "");

        let snapshot = load_tasks(&root, "sess-1", &cfg).unwrap();
        let ids: Vec<_> = snapshot.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "10"]);
        assert_eq!(snapshot.tasks[1].blocked_by.len(), 1);
        assert_eq!(snapshot.high_watermark, Some(10));
        assert!(snapshot.locked);
    }

    #[test]
    fn test_load_team_inboxes() {
        let (_dir, root) = claude_root();
        write(
            &root.join("teams/sess-1/inboxes/reviewer.json"),
            r#"[
                {"from": "lead", "timestamp": "2026-01-01T00:00:00Z", "read": false, "text": "please review"},
                {"from": "lead", "read": true, "text": "{\"type\": \"shutdown_request\", \"reason\": \"done\"}"}
            ]"#,
        );
        let inboxes = load_team_inboxes(&root, "sess-1", &SidecarConfig::default());
        assert_eq!(inboxes.len(), 1);
        assert_eq!(inboxes[0].agent, "reviewer");
        assert!(inboxes[0].messages[0].payload.is_none());
        assert_eq!(
            inboxes[0].messages[1].payload.as_ref().unwrap()["type"],
            "shutdown_request"
        );
    }

    #[test]
    fn test_load_sidecars_missing_everything() {
        let (_dir, root) = claude_root();
        write(&root.join("session-env/sess-1/b.sh"), "");
        write(&root.join("session-env/sess-1/a.sh"), "");

        let snapshot = load_sidecars(Some(&root), "sess-1", &SidecarConfig::default());
        assert!(snapshot.todos.is_empty());
        assert!(snapshot.tasks.is_none());
        assert!(snapshot.team_inboxes.is_empty());
        assert_eq!(snapshot.session_env, vec!["a.sh", "b.sh"]);

        assert_eq!(
            load_sidecars(None, "sess-1", &SidecarConfig::default()),
            SidecarSnapshot::default()
        );
    }
}
