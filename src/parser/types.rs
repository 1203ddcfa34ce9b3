//! Parser output types: the `AgentSession` aggregate and its parts

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Free-form per-entry metadata
pub type Metadata = Map<String, Value>;

/// Who produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
    System,
}

/// What kind of transcript unit a log entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Message,
    Tool,
    Thought,
    System,
    Command,
    SubagentStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    #[default]
    Success,
    Error,
}

/// A tool invocation embedded in a tool log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Serialized tool input
    pub args: String,
    /// Result text, filled when the matching result arrives
    pub output: String,
    pub status: ToolStatus,
    pub is_error: bool,
}

/// One persisted transcript unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Position in the single-pass append order
    pub id: usize,
    pub timestamp: String,
    pub speaker: Speaker,
    pub kind: LogKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Read,
    Update,
    Create,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Manifest,
    Test,
    Document,
    Config,
    Source,
    Asset,
    Other,
}

/// A file touched during the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub path: String,
    pub action: FileAction,
    pub file_type: FileType,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub source_log_id: usize,
    pub source_tool_name: String,
    pub thread_session_id: String,
    pub root_session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Command,
    Skill,
    Task,
    Commit,
    Manifest,
    Agent,
    PrLink,
    Summary,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Command => "command",
            ArtifactKind::Skill => "skill",
            ArtifactKind::Task => "task",
            ArtifactKind::Commit => "commit",
            ArtifactKind::Manifest => "manifest",
            ArtifactKind::Agent => "agent",
            ArtifactKind::PrLink => "pr-link",
            ArtifactKind::Summary => "summary",
        }
    }
}

/// A named, deduplicated piece of evidence surfaced from the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Hash of (session id, kind, title, source log id)
    pub id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub description: String,
    /// Which signal surfaced it (tool_use, command, progress, ...)
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source_log_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tool_name: Option<String>,
}

/// Per-tool aggregate over the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsage {
    pub name: String,
    pub count: usize,
    pub success_count: usize,
    pub success_rate: f64,
    pub total_duration_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Session,
    Subagent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// A change of platform version observed mid-session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlatformTransition {
    pub timestamp: String,
    pub from_version: String,
    pub to_version: String,
    /// Id of the synthesized system log entry describing the change
    pub log_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    SessionStart,
    SubagentStart,
    Commit,
    VersionChange,
    Summary,
    PrLink,
    SessionEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub timestamp: String,
    pub kind: TimelineKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<usize>,
}

/// Where a thinking level came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingSource {
    Explicit,
    Tokens,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ThinkingSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_thinking_tokens: Option<u64>,
    /// Number of thinking content blocks seen
    pub thinking_blocks: usize,
}

/// Entry-level counters collected alongside the main pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatistics {
    pub total_lines: usize,
    pub parsed_entries: usize,
    pub malformed_lines: usize,
    pub entry_types: BTreeMap<String, usize>,
    pub message_roles: BTreeMap<String, usize>,
    pub stop_reasons: BTreeMap<String, usize>,
    pub content_block_types: BTreeMap<String, usize>,
    pub progress_types: BTreeMap<String, usize>,
    pub sidechain_entries: usize,
    pub meta_entries: usize,
    pub snapshot_entries: usize,
    pub snapshot_updates: usize,
    pub tool_result_errors: usize,
    pub orphan_tool_results: usize,
    /// Tool calls that never received a result
    pub unresolved_tool_calls: usize,
    pub api_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub active_form: Option<String>,
}

/// One `todos/<session>-agent-<agent>.json` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub agent_id: String,
    pub items: Vec<TodoItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default, deserialize_with = "crate::parser::common::de_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active_form: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub blocked_by: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueueSnapshot {
    pub tasks: Vec<TaskRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_watermark: Option<i64>,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxMessage {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub text: String,
    /// Body decoded as JSON when it holds an object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInbox {
    pub agent: String,
    pub messages: Vec<InboxMessage>,
}

/// Per-session state stored outside the transcript
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSnapshot {
    pub todos: Vec<TodoList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TaskQueueSnapshot>,
    pub team_inboxes: Vec<TeamInbox>,
    pub session_env: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForensics {
    pub thinking: ThinkingInfo,
    pub statistics: EntryStatistics,
    pub sidecars: SidecarSnapshot,
}

/// Root aggregate produced by one parse call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    pub id: String,
    pub raw_session_id: String,
    pub session_type: SessionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    pub root_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub platform_type: String,
    /// First platform version reported by the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    pub platform_versions: Vec<String>,
    pub platform_transitions: Vec<SessionPlatformTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub duration_seconds: i64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    pub git_commit_hashes: Vec<String>,
    pub logs: Vec<LogEntry>,
    pub tool_summary: Vec<ToolUsage>,
    pub updated_files: Vec<FileUpdate>,
    pub artifacts: Vec<Artifact>,
    pub timeline: Vec<TimelineEvent>,
    pub forensics: SessionForensics,
    pub source_file: String,
}
