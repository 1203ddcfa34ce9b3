//! Claude Code session parser
//!
//! Parses JSONL transcripts from Claude Code into an [`AgentSession`]. The
//! transcript is consumed once, in order; tool results, progress events and
//! subagent launches are merged back into earlier log entries through the
//! correlation tables.

use super::assemble::{assemble, PassOutput};
use super::common::{content_to_string, first_line, str_field, truncate_str};
use super::context::{record_statistics, SessionContext};
use super::correlation::CorrelationTables;
use super::extract::{
    extract_commit_hashes, parse_batch_announcements, parse_command_tags,
    parse_plan_status_command, parse_skill_payload, parse_task_notification, shell_split,
    PlanOperation, TaskNotification,
};
use super::raw::{
    decode_transcript, ContentBlock, CustomTitleEntry, DecodedTranscript, MessageEntry,
    PrLinkEntry, ProgressData, ProgressEntry, QueueOperationEntry, RawContent, RawEntry,
    SummaryEntry, SystemEntry,
};
use super::rules::{
    classify_bash_command, classify_bash_result, exit_code, file_action_for_tool,
    is_mutating_tool, BashCategory,
};
use super::tracker::{FileTouch, NewArtifact, Tracker};
use super::types::*;
use super::SessionParser;
use crate::config::ParserConfig;
use crate::sidecar;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const PLATFORM_TYPE: &str = "Claude Code";

/// Async launch marker in a Task tool result, e.g. `agentId: a1b2c3`
static AGENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"agentId:\s*([A-Za-z0-9][A-Za-z0-9_-]*)").unwrap());

/// Session id for a subagent thread.
pub fn subagent_session_id(agent_id: &str) -> String {
    format!("S-agent-{}", agent_id)
}

/// Identity encoded in a transcript's file name and location
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub id: String,
    pub raw_session_id: String,
    pub session_type: SessionType,
    pub parent_session_id: Option<String>,
    pub root_session_id: String,
    pub agent_id: Option<String>,
}

impl SessionIdentity {
    /// `<raw>.jsonl` is a top-level session; `<parent>/subagents/agent-<id>.jsonl`
    /// is a subagent thread of `<parent>`.
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        if let Some(agent_id) = stem.strip_prefix("agent-").filter(|a| !a.is_empty()) {
            let parent_session_id = path
                .parent()
                .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some("subagents"))
                .and_then(Path::parent)
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(|raw| format!("S-{}", raw));
            let id = subagent_session_id(agent_id);
            return SessionIdentity {
                root_session_id: parent_session_id.clone().unwrap_or_else(|| id.clone()),
                id,
                raw_session_id: stem.clone(),
                session_type: SessionType::Subagent,
                parent_session_id,
                agent_id: Some(agent_id.to_string()),
            };
        }

        let id = format!("S-{}", stem);
        SessionIdentity {
            root_session_id: id.clone(),
            id,
            raw_session_id: stem,
            session_type: SessionType::Session,
            parent_session_id: None,
            agent_id: None,
        }
    }
}

/// Parser for Claude Code session files
pub struct ClaudeCodeParser {
    config: ParserConfig,
    claude_root: Option<PathBuf>,
}

impl Default for ClaudeCodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeCodeParser {
    /// Parser using the process-wide schema document.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::global().clone())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        ClaudeCodeParser {
            config,
            claude_root: None,
        }
    }

    /// Use a fixed `.claude` root for sidecars instead of searching ancestors.
    pub fn with_claude_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.claude_root = Some(root.into());
        self
    }

    /// Parse transcript text as if read from `path` at time `now`.
    ///
    /// `modified` is the file's modification time, used for status inference.
    /// Returns `None` when no line decodes.
    pub fn parse_contents(
        &self,
        path: &Path,
        text: &str,
        modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<AgentSession> {
        let decoded = decode_transcript(text);
        if decoded.is_empty() {
            tracing::debug!("No decodable entries in {}", path.display());
            return None;
        }

        let identity = SessionIdentity::from_path(path);
        let mut builder = LogBuilder::new(&self.config, &identity);
        builder.run(&decoded);

        let sidecar_key = builder
            .ctx
            .session_id
            .clone()
            .unwrap_or_else(|| identity.raw_session_id.clone());
        let root = self
            .claude_root
            .clone()
            .or_else(|| sidecar::find_claude_root(path));
        let sidecars = sidecar::load_sidecars(root.as_deref(), &sidecar_key, &self.config.sidecars);

        let (artifacts, files) = builder.tracker.into_parts();
        Some(assemble(
            PassOutput {
                identity,
                ctx: builder.ctx,
                logs: builder.logs,
                artifacts,
                files,
                sidecars,
                source_file: path.display().to_string(),
            },
            &self.config,
            modified,
            now,
        ))
    }
}

impl SessionParser for ClaudeCodeParser {
    fn parse_file(&self, path: &Path) -> Option<AgentSession> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Cannot read {}: {}", path.display(), e);
                return None;
            }
        };
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        self.parse_contents(path, &text, modified, Utc::now())
    }

    fn name(&self) -> &'static str {
        "claude_code"
    }
}

// ─── Log builder ─────────────────────────────────────────────────────────────

/// Mutable state of one parse pass
struct LogBuilder<'a> {
    config: &'a ParserConfig,
    agent_name: Option<String>,
    logs: Vec<LogEntry>,
    ctx: SessionContext,
    tables: CorrelationTables,
    tracker: Tracker,
}

fn millis_between(start: &str, end: &str) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(start).ok()?;
    let end = DateTime::parse_from_rfc3339(end).ok()?;
    Some((end - start).num_milliseconds().max(0))
}

fn is_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| matches!(c, ';' | '|' | '&'))
}

/// Targets of `rm` invocations in a shell command.
fn removed_paths(command: &str) -> Vec<String> {
    let tokens = shell_split(command);
    let mut out = Vec::new();
    for segment in tokens.split(|t| is_operator(t)) {
        let mut words = segment.iter().skip_while(|w| w.as_str() == "sudo");
        if words.next().map(String::as_str) != Some("rm") {
            continue;
        }
        out.extend(words.filter(|w| !w.starts_with('-')).cloned());
    }
    out
}

fn strip_tag<'t>(text: &'t str, tag: &str) -> &'t str {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    text.trim()
        .trim_start_matches(open.as_str())
        .trim_end_matches(close.as_str())
        .trim()
}

impl<'a> LogBuilder<'a> {
    fn new(config: &'a ParserConfig, identity: &SessionIdentity) -> Self {
        LogBuilder {
            config,
            agent_name: identity.agent_id.clone(),
            logs: Vec::new(),
            ctx: SessionContext::new(),
            tables: CorrelationTables::new(),
            tracker: Tracker::new(&identity.id, &identity.root_session_id),
        }
    }

    fn run(&mut self, decoded: &DecodedTranscript) {
        self.ctx.stats.total_lines = decoded.total_lines;
        self.ctx.stats.malformed_lines = decoded.malformed_lines;

        for line in &decoded.lines {
            record_statistics(&mut self.ctx.stats, &line.value);

            if let Some(envelope) = line.entry.envelope() {
                if let Some(change) = self.ctx.observe_envelope(envelope) {
                    let content = format!(
                        "Platform version changed from {} to {}",
                        change.from_version, change.to_version
                    );
                    let id = self.system(&change.timestamp, &content, "version-change");
                    self.meta(
                        id,
                        "versionChange",
                        json!({"from": change.from_version, "to": change.to_version}),
                    );
                    self.ctx.record_transition(change, id);
                }
            }

            match &line.entry {
                RawEntry::User(m) => self.handle_user(m),
                RawEntry::Assistant(m) => self.handle_assistant(m),
                RawEntry::Progress(p) => self.handle_progress(p),
                RawEntry::Summary(s) => self.handle_summary(s),
                RawEntry::CustomTitle(c) => self.handle_custom_title(c),
                RawEntry::PrLink(p) => self.handle_pr_link(p),
                RawEntry::QueueOperation(q) => self.handle_queue_operation(q),
                RawEntry::FileHistorySnapshot(s) => self.ctx.observe_snapshot(&s.snapshot),
                RawEntry::System(s) => self.handle_system(s),
                RawEntry::Unknown => {}
            }
        }

        self.ctx.stats.unresolved_tool_calls = self.tables.pending_count();
        if self.ctx.stats.unresolved_tool_calls > 0 {
            tracing::debug!(
                "{} tool call(s) without a result",
                self.ctx.stats.unresolved_tool_calls
            );
        }
    }

    // ── Log primitives ──

    fn append(&mut self, timestamp: &str, speaker: Speaker, kind: LogKind, content: String) -> usize {
        let id = self.logs.len();
        let agent_name = match speaker {
            Speaker::Agent => self.agent_name.clone(),
            _ => None,
        };
        self.logs.push(LogEntry {
            id,
            timestamp: timestamp.to_string(),
            speaker,
            kind,
            content,
            agent_name,
            linked_session_id: None,
            related_tool_call_id: None,
            metadata: Metadata::new(),
            tool_call: None,
        });
        id
    }

    fn meta(&mut self, id: usize, key: &str, value: Value) {
        self.logs[id].metadata.insert(key.to_string(), value);
    }

    /// Append a synthesized system entry labelled with `entry_type`.
    fn system(&mut self, timestamp: &str, content: &str, entry_type: &str) -> usize {
        let content = truncate_str(content.trim(), self.config.limits.content_chars);
        let id = self.append(timestamp, Speaker::System, LogKind::System, content);
        self.meta(id, "entryType", json!(entry_type));
        id
    }

    fn artifact(
        &mut self,
        kind: ArtifactKind,
        title: &str,
        description: &str,
        source: &str,
        source_log_id: usize,
        source_tool_name: Option<&str>,
        url: Option<&str>,
    ) {
        if title.trim().is_empty() {
            return;
        }
        self.tracker.add_artifact(NewArtifact {
            kind,
            title,
            description,
            source,
            source_log_id,
            source_tool_name,
            url,
        });
    }

    fn track_file(&mut self, path: &str, action: FileAction, timestamp: &str, log_id: usize, tool: &str) {
        let agent_name = self.agent_name.clone();
        self.tracker.track_file(FileTouch {
            path,
            action,
            timestamp,
            agent_name: agent_name.as_deref(),
            source_log_id: log_id,
            source_tool_name: tool,
        });
    }

    // ── User entries ──

    fn handle_user(&mut self, entry: &MessageEntry) {
        let ts = entry.envelope.timestamp();
        let is_meta = entry.envelope.is_meta();
        match entry.content() {
            Some(RawContent::Text(text)) => self.handle_user_text(ts, text, is_meta),
            Some(RawContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => self.handle_user_text(ts, text, is_meta),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => self.handle_tool_result(
                            ts,
                            tool_use_id.as_deref(),
                            content,
                            is_error.unwrap_or(false),
                            entry.tool_use_result.as_ref(),
                        ),
                        ContentBlock::Thinking { .. }
                        | ContentBlock::ToolUse { .. }
                        | ContentBlock::Other => {}
                    }
                }
            }
            None => {}
        }
    }

    fn handle_user_text(&mut self, ts: &str, text: &str, is_meta: bool) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        if trimmed.starts_with("<local-command-stdout>") {
            let body = strip_tag(trimmed, "local-command-stdout");
            self.system(ts, body, "local-command-stdout");
            return;
        }

        if trimmed.contains("<task-notification>") {
            if let Some(notification) = parse_task_notification(trimmed) {
                self.handle_notification(ts, &notification, "user");
                return;
            }
        }

        if let Some(command) = parse_command_tags(trimmed, &self.config.commands.phase_commands) {
            let id = self.append(ts, Speaker::User, LogKind::Command, command.display());
            self.meta(id, "command", serde_json::to_value(&command).unwrap_or_default());
            for path in &command.paths {
                self.track_file(path, FileAction::Read, ts, id, "command");
            }
            let description = command
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| command.args.clone());
            self.artifact(
                ArtifactKind::Command,
                &format!("/{}", command.name),
                &description,
                "command",
                id,
                None,
                None,
            );
            return;
        }

        if let Some(skill) = parse_skill_payload(trimmed) {
            let name = skill.name.clone().unwrap_or_else(|| "skill".to_string());
            let id = self.system(ts, &format!("Skill loaded: {}", name), "skill-payload");
            self.meta(id, "skill", serde_json::to_value(&skill).unwrap_or_default());
            self.artifact(
                ArtifactKind::Skill,
                &name,
                skill.summary.as_deref().unwrap_or(""),
                "skill-payload",
                id,
                None,
                None,
            );
            return;
        }

        let speaker = if is_meta { Speaker::System } else { Speaker::User };
        let content = truncate_str(trimmed, self.config.limits.message_chars);
        let id = self.append(ts, speaker, LogKind::Message, content);
        if is_meta {
            self.meta(id, "isMeta", json!(true));
        }
    }

    fn handle_notification(&mut self, ts: &str, notification: &TaskNotification, source: &str) {
        let content = notification.summary.clone().unwrap_or_else(|| {
            format!(
                "Task {} {}",
                notification.task_id.as_deref().unwrap_or("?"),
                notification.status.as_deref().unwrap_or("updated")
            )
        });
        let id = self.system(ts, &content, "task-notification");
        self.meta(
            id,
            "notification",
            serde_json::to_value(notification).unwrap_or_default(),
        );
        if let Some(tool_id) = &notification.tool_use_id {
            self.logs[id].related_tool_call_id = Some(tool_id.clone());
        }
        if let Some(task_id) = notification.task_id.as_deref() {
            let description = notification
                .summary
                .as_deref()
                .or(notification.status.as_deref())
                .unwrap_or("");
            self.artifact(ArtifactKind::Task, task_id, description, source, id, None, None);
        }
    }

    // ── Assistant entries ──

    fn handle_assistant(&mut self, entry: &MessageEntry) {
        let ts = entry.envelope.timestamp();
        let Some(message) = &entry.message else {
            return;
        };

        self.ctx.observe_model(message.model.as_deref());
        if matches!(message.role.as_deref(), None | Some("assistant")) {
            if let Some(usage) = &message.usage {
                self.ctx.observe_usage(usage);
            }
        }
        let api_error = entry.is_api_error_message.unwrap_or(false);

        match &message.content {
            Some(RawContent::Text(text)) => self.handle_agent_text(ts, text, api_error),
            Some(RawContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => self.handle_agent_text(ts, text, api_error),
                        ContentBlock::Thinking { thinking } => {
                            self.ctx.thinking_blocks += 1;
                            if !thinking.trim().is_empty() {
                                let content =
                                    truncate_str(thinking.trim(), self.config.limits.message_chars);
                                self.append(ts, Speaker::Agent, LogKind::Thought, content);
                            }
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            self.handle_tool_use(ts, id.as_deref(), name, input)
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => self.handle_tool_result(
                            ts,
                            tool_use_id.as_deref(),
                            content,
                            is_error.unwrap_or(false),
                            None,
                        ),
                        ContentBlock::Other => {}
                    }
                }
            }
            None => {}
        }
    }

    fn handle_agent_text(&mut self, ts: &str, text: &str, api_error: bool) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let content = truncate_str(trimmed, self.config.limits.message_chars);
        let id = self.append(ts, Speaker::Agent, LogKind::Message, content);
        if api_error {
            self.meta(id, "apiError", json!(true));
        }

        let batches = parse_batch_announcements(trimmed);
        if batches.is_empty() {
            return;
        }
        self.meta(id, "batches", serde_json::to_value(&batches).unwrap_or_default());
        for batch in &batches {
            for task in &batch.tasks {
                self.artifact(
                    ArtifactKind::Task,
                    &task.task_id,
                    &task.description,
                    "batch",
                    id,
                    task.agent.as_deref(),
                    None,
                );
            }
        }
    }

    // ── Tool calls ──

    fn handle_tool_use(&mut self, ts: &str, tool_id: Option<&str>, name: &str, input: &Value) {
        let name = if name.is_empty() { "unknown" } else { name };
        let args = truncate_str(
            &serde_json::to_string(input).unwrap_or_default(),
            self.config.limits.tool_args_chars,
        );
        let id = self.append(ts, Speaker::Agent, LogKind::Tool, format!("Called {}", name));
        self.logs[id].tool_call = Some(ToolCall {
            id: tool_id.map(str::to_string),
            name: name.to_string(),
            args,
            output: String::new(),
            status: ToolStatus::Success,
            is_error: false,
        });
        if let Some(tool_id) = tool_id {
            self.tables.record_tool(tool_id, id, ts, name, input);
        }

        if let Some(action) = file_action_for_tool(name) {
            let path = str_field(input, "file_path")
                .or_else(|| str_field(input, "notebook_path"))
                .or_else(|| str_field(input, "path"));
            if let Some(path) = path {
                self.track_file(path, action, ts, id, name);
            }
        }

        match name {
            "Bash" => self.post_bash_use(ts, id, input),
            "Skill" => {
                let skill = str_field(input, "skill")
                    .or_else(|| str_field(input, "command"))
                    .or_else(|| str_field(input, "name"))
                    .unwrap_or("");
                if !skill.is_empty() {
                    self.meta(id, "skill", json!(skill));
                }
                let description = str_field(input, "args").unwrap_or("Skill invocation");
                self.artifact(ArtifactKind::Skill, skill, description, "tool_use", id, Some(name), None);
            }
            "Task" | "Agent" => {
                let subagent_type = str_field(input, "subagent_type").unwrap_or("general-purpose");
                self.meta(id, "subagentType", json!(subagent_type));
                let description = str_field(input, "description").unwrap_or("Subagent task");
                self.artifact(
                    ArtifactKind::Agent,
                    subagent_type,
                    description,
                    "tool_use",
                    id,
                    Some(name),
                    None,
                );
            }
            _ => {}
        }
    }

    fn post_bash_use(&mut self, ts: &str, id: usize, input: &Value) {
        let Some(command) = str_field(input, "command") else {
            return;
        };
        let category = classify_bash_command(command);
        self.meta(id, "bashCategory", json!(category));
        if let Some(description) = str_field(input, "description") {
            self.meta(id, "description", json!(description));
        }

        if let Some(plan) = parse_plan_status_command(command, &self.config.plan_status.scripts) {
            if let Some(file) = plan.file.clone() {
                let action = match plan.operation {
                    PlanOperation::Update => FileAction::Update,
                    _ => FileAction::Read,
                };
                self.track_file(&file, action, ts, id, "Bash");
            }
            self.meta(id, "planStatus", serde_json::to_value(&plan).unwrap_or_default());
        }

        for path in removed_paths(command) {
            self.track_file(&path, FileAction::Delete, ts, id, "Bash");
        }
    }

    fn handle_tool_result(
        &mut self,
        ts: &str,
        tool_id: Option<&str>,
        content: &Value,
        is_error: bool,
        tool_use_result: Option<&Value>,
    ) {
        let output = content_to_string(content);
        let pending = tool_id.and_then(|tid| self.tables.resolve(tid).cloned());

        let Some(pending) = pending else {
            self.ctx.stats.orphan_tool_results += 1;
            let text = if output.trim().is_empty() {
                "Tool result without a matching call".to_string()
            } else {
                output.clone()
            };
            let id = self.system(ts, &text, "orphan-tool-result");
            self.logs[id].related_tool_call_id = tool_id.map(str::to_string);
            self.meta(id, "orphan", json!(true));
            self.meta(id, "isError", json!(is_error));
            return;
        };

        let log_id = pending.log_index;
        let limit = self.config.limits.tool_output_chars;
        if let Some(call) = self.logs[log_id].tool_call.as_mut() {
            call.output = truncate_str(&output, limit);
            call.is_error = is_error;
            call.status = if is_error {
                ToolStatus::Error
            } else {
                ToolStatus::Success
            };
        }
        if let Some(ms) = millis_between(&pending.started_at, ts) {
            self.meta(log_id, "toolDurationMs", json!(ms));
        }

        if is_error && is_mutating_tool(&pending.name) {
            let removed = self.tracker.retract_files_for_log(log_id);
            if removed > 0 {
                tracing::debug!("Retracted {} file updates from failed {}", removed, pending.name);
            }
        }

        match pending.name.as_str() {
            "Bash" => self.post_bash_result(log_id, &pending.input, &output, is_error, tool_use_result),
            "Task" | "Agent" => {
                let agent_id = tool_use_result
                    .and_then(|r| str_field(r, "agentId"))
                    .map(str::to_string)
                    .or_else(|| AGENT_ID_RE.captures(&output).map(|c| c[1].to_string()));
                if let (Some(agent_id), Some(parent)) = (agent_id, tool_id) {
                    self.link_subagent(ts, parent, &agent_id, "tool_result");
                }
            }
            _ => {}
        }
    }

    fn post_bash_result(
        &mut self,
        log_id: usize,
        input: &Value,
        output: &str,
        is_error: bool,
        tool_use_result: Option<&Value>,
    ) {
        let interrupted = tool_use_result
            .and_then(|r| r.get("interrupted"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let outcome = classify_bash_result(output, is_error, interrupted);
        self.meta(log_id, "bashResult", json!(outcome));
        if let Some(code) = exit_code(output) {
            self.meta(log_id, "exitCode", json!(code));
        }

        let command = str_field(input, "command").unwrap_or("");
        let mut hashes = extract_commit_hashes(command);
        for hash in extract_commit_hashes(output) {
            if !hashes.contains(&hash) {
                hashes.push(hash);
            }
        }
        if hashes.is_empty() {
            return;
        }
        self.ctx.observe_commit_hashes(&hashes);
        self.meta(log_id, "commitHashes", json!(hashes));

        if is_error || classify_bash_command(command) != BashCategory::GitCommit {
            return;
        }
        for hash in &hashes {
            let description = output
                .lines()
                .find(|l| l.contains(hash.as_str()))
                .map(str::trim)
                .unwrap_or("git commit")
                .to_string();
            self.artifact(
                ArtifactKind::Commit,
                hash,
                &description,
                "tool_result",
                log_id,
                Some("Bash"),
                None,
            );
        }
    }

    /// Record that the tool call `parent_tool_id` spawned subagent `agent_id`.
    fn link_subagent(&mut self, ts: &str, parent_tool_id: &str, agent_id: &str, source: &str) {
        let linked = subagent_session_id(agent_id);
        let first_report = self.tables.link_subagent(parent_tool_id, &linked);
        self.attach_linked_session(parent_tool_id);
        if !first_report {
            return;
        }

        let subagent_type = self
            .tables
            .tool(parent_tool_id)
            .and_then(|p| str_field(&p.input, "subagent_type"))
            .map(str::to_string);
        let content = match &subagent_type {
            Some(t) => format!("Subagent {} started ({})", agent_id, t),
            None => format!("Subagent {} started", agent_id),
        };
        let id = self.append(ts, Speaker::System, LogKind::SubagentStart, content);
        self.logs[id].linked_session_id = Some(linked);
        self.logs[id].related_tool_call_id = Some(parent_tool_id.to_string());
        self.meta(id, "agentId", json!(agent_id));
        self.meta(id, "linkSource", json!(source));
        if let Some(t) = subagent_type {
            self.meta(id, "subagentType", json!(t));
        }
    }

    /// Copy the subagent session linked to a tool call onto its log entry.
    fn attach_linked_session(&mut self, parent_tool_id: &str) {
        let Some(pending) = self.tables.tool(parent_tool_id) else {
            return;
        };
        let linked = self.tables.linked_session(parent_tool_id).map(str::to_string);
        self.logs[pending.log_index].linked_session_id = linked;
    }

    // ── Progress entries ──

    fn handle_progress(&mut self, entry: &ProgressEntry) {
        let ts = entry.envelope.timestamp();
        match entry.progress_data() {
            ProgressData::AgentProgress { agent_id } => {
                let parent = entry.parent_tool_use_id.as_deref();
                if let (Some(parent), Some(agent_id)) = (parent, agent_id.as_deref()) {
                    self.link_subagent(ts, parent, agent_id, "agent_progress");
                }
            }
            ProgressData::BashProgress {
                output,
                full_output,
                elapsed_time_seconds,
                total_lines,
            } => {
                let tool_id = entry
                    .parent_tool_use_id
                    .as_deref()
                    .or(entry.tool_use_id.as_deref());
                let Some(pending) = tool_id.and_then(|t| self.tables.tool(t)).cloned() else {
                    tracing::debug!("bash_progress without a known tool call");
                    return;
                };
                let log = &mut self.logs[pending.log_index];
                let merges = log
                    .metadata
                    .get("bashProgress")
                    .and_then(|p| p.get("merges"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let latest = full_output.or(output).unwrap_or_default();
                log.metadata.insert(
                    "bashProgress".to_string(),
                    json!({
                        "output": truncate_str(&latest, self.config.limits.tool_output_chars),
                        "elapsedTimeSeconds": elapsed_time_seconds,
                        "totalLines": total_lines,
                        "merges": merges + 1,
                    }),
                );
            }
            ProgressData::HookProgress {
                hook_event,
                hook_name,
                command,
            } => {
                let label = hook_name.as_deref().or(command.as_deref()).unwrap_or("hook");
                let content = match hook_event.as_deref() {
                    Some(event) => format!("Hook {}: {}", event, label),
                    None => format!("Hook: {}", label),
                };
                let id = self.system(ts, &content, "hook");
                self.meta(
                    id,
                    "hook",
                    json!({"event": hook_event, "name": hook_name, "command": command}),
                );
                self.logs[id].related_tool_call_id = entry.parent_tool_use_id.clone();
            }
            ProgressData::Other => {}
        }
    }

    // ── Other entry types ──

    fn handle_summary(&mut self, entry: &SummaryEntry) {
        let Some(summary) = entry.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        self.ctx.observe_summary(summary);
        let id = self.system(entry.envelope.timestamp(), summary, "summary");
        if let Some(leaf) = &entry.leaf_uuid {
            self.meta(id, "leafUuid", json!(leaf));
        }
        let title = truncate_str(first_line(summary), 120);
        self.artifact(ArtifactKind::Summary, &title, summary, "summary", id, None, None);
    }

    fn handle_custom_title(&mut self, entry: &CustomTitleEntry) {
        let Some(title) = entry.custom_title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        self.ctx.set_custom_title(title);
        let id = self.system(
            entry.envelope.timestamp(),
            &format!("Session renamed to \"{}\"", title),
            "custom-title",
        );
        self.meta(id, "customTitle", json!(title));
    }

    fn handle_pr_link(&mut self, entry: &PrLinkEntry) {
        let Some(url) = entry.pr_url.as_deref().filter(|u| !u.is_empty()) else {
            return;
        };
        let number = entry.pr_number.as_ref().map(|n| match n {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let title = match (&entry.pr_repository, &number) {
            (Some(repo), Some(n)) => format!("{}#{}", repo, n),
            (None, Some(n)) => format!("PR #{}", n),
            _ => url.to_string(),
        };
        let id = self.system(
            entry.envelope.timestamp(),
            &format!("Pull request {}: {}", title, url),
            "pr-link",
        );
        self.meta(
            id,
            "prLink",
            json!({"url": url, "number": number, "repository": entry.pr_repository}),
        );
        self.artifact(ArtifactKind::PrLink, &title, url, "pr-link", id, None, Some(url));
    }

    fn handle_queue_operation(&mut self, entry: &QueueOperationEntry) {
        let ts = entry.envelope.timestamp();
        let operation = entry.operation.as_deref().unwrap_or("unknown");
        let content = entry.content.as_deref().unwrap_or("").trim();

        if let Some(notification) = parse_task_notification(content).filter(|_| !content.is_empty()) {
            if content.contains("<task-notification>") || content.starts_with('{') {
                self.handle_notification(ts, &notification, "queue-operation");
                return;
            }
        }

        let text = if content.is_empty() {
            format!("Queue {}", operation)
        } else {
            format!("Queue {}: {}", operation, content)
        };
        let id = self.system(ts, &text, "queue-operation");
        self.meta(id, "operation", json!(operation));
    }

    fn handle_system(&mut self, entry: &SystemEntry) {
        let subtype = entry.subtype.as_deref().unwrap_or("system");
        let content = entry
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(subtype)
            .to_string();
        let id = self.system(entry.envelope.timestamp(), &content, "system");
        self.meta(id, "subtype", json!(subtype));
        if let Some(level) = &entry.level {
            self.meta(id, "level", json!(level));
        }
        if let Some(ms) = entry.duration_ms {
            self.meta(id, "durationMs", json!(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn parser() -> ClaudeCodeParser {
        ClaudeCodeParser::with_config(ParserConfig::default())
    }

    fn jsonl(lines: &[Value]) -> String {
        lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn parse(lines: &[Value]) -> AgentSession {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sess-1.jsonl");
        let now = Utc::now();
        parser()
            .parse_contents(&path, &jsonl(lines), Some(now - Duration::hours(1)), now)
            .unwrap()
    }

    fn assistant(ts: &str, content: Value) -> Value {
        json!({
            "type": "assistant", "sessionId": "sess-1", "timestamp": ts, "version": "2.0.1",
            "message": {"role": "assistant", "model": "claude-sonnet-4-5", "content": content,
                "usage": {"input_tokens": 100, "output_tokens": 50}}
        })
    }

    fn user(ts: &str, content: Value) -> Value {
        json!({"type": "user", "sessionId": "sess-1", "timestamp": ts, "version": "2.0.1",
            "message": {"role": "user", "content": content}})
    }

    fn task_use() -> Value {
        assistant(
            "2026-01-01T00:00:00Z",
            json!([{"type": "tool_use", "id": "t9", "name": "Task",
                "input": {"subagent_type": "Explore", "description": "Map the repo"}}]),
        )
    }

    fn agent_progress() -> Value {
        json!({"type": "progress", "timestamp": "2026-01-01T00:00:02Z",
            "parentToolUseID": "t9", "data": {"type": "agent_progress", "agentId": "a1"}})
    }

    fn count_kind(session: &AgentSession, kind: LogKind) -> usize {
        session.logs.iter().filter(|l| l.kind == kind).count()
    }

    #[test]
    fn test_git_commit_round_trip() {
        let session = parse(&[
            assistant(
                "2026-01-01T00:00:00Z",
                json!([{"type": "tool_use", "id": "t1", "name": "Bash",
                    "input": {"command": "git commit -m 'x'"}}]),
            ),
            user(
                "2026-01-01T00:00:03Z",
                json!([{"type": "tool_result", "tool_use_id": "t1", "content": "[main abc1234] x"}]),
            ),
        ]);

        let tools: Vec<_> = session.logs.iter().filter(|l| l.kind == LogKind::Tool).collect();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].content, "Called Bash");
        let call = tools[0].tool_call.as_ref().unwrap();
        assert_eq!(call.output, "[main abc1234] x");
        assert_eq!(call.status, ToolStatus::Success);
        assert_eq!(tools[0].metadata["toolDurationMs"], json!(3000));

        assert_eq!(session.git_commit_hashes, vec!["abc1234"]);
        assert_eq!(session.git_commit_hash.as_deref(), Some("abc1234"));
        assert!(!session.logs.iter().any(|l| l.metadata.contains_key("orphan")));
        assert!(session
            .artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::Commit && a.title == "abc1234"));
    }

    #[test]
    fn test_subagent_link_from_progress() {
        let session = parse(&[task_use(), agent_progress()]);

        let starts: Vec<_> = session
            .logs
            .iter()
            .filter(|l| l.kind == LogKind::SubagentStart)
            .collect();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].linked_session_id.as_deref(), Some("S-agent-a1"));
        assert_eq!(starts[0].related_tool_call_id.as_deref(), Some("t9"));

        let task = session.logs.iter().find(|l| l.kind == LogKind::Tool).unwrap();
        assert_eq!(task.linked_session_id.as_deref(), Some("S-agent-a1"));
        // Linking does not resolve the Task call itself
        assert_eq!(task.tool_call.as_ref().unwrap().output, "");
        assert_eq!(session.forensics.statistics.unresolved_tool_calls, 1);
        assert!(session
            .artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::Agent && a.title == "Explore"));
    }

    #[test]
    fn test_replayed_progress_links_once() {
        let session = parse(&[
            task_use(),
            agent_progress(),
            agent_progress(),
            user(
                "2026-01-01T00:01:00Z",
                json!([{"type": "tool_result", "tool_use_id": "t9",
                    "content": "Async agent launched successfully.\nagentId: a1 (use this to resume)"}]),
            ),
        ]);
        assert_eq!(count_kind(&session, LogKind::SubagentStart), 1);
    }

    #[test]
    fn test_subagent_link_from_result_payload() {
        let mut result = user(
            "2026-01-01T00:01:00Z",
            json!([{"type": "tool_result", "tool_use_id": "t9", "content": "done"}]),
        );
        result["toolUseResult"] = json!({"agentId": "b7", "status": "completed"});
        let session = parse(&[task_use(), result]);

        let start = session
            .logs
            .iter()
            .find(|l| l.kind == LogKind::SubagentStart)
            .unwrap();
        assert_eq!(start.linked_session_id.as_deref(), Some("S-agent-b7"));
        assert_eq!(start.metadata["linkSource"], json!("tool_result"));
    }

    #[test]
    fn test_orphan_tool_result() {
        let session = parse(&[user(
            "2026-01-01T00:00:00Z",
            json!([{"type": "tool_result", "tool_use_id": "ghost", "content": "stray output"}]),
        )]);
        assert_eq!(session.logs.len(), 1);
        let orphan = &session.logs[0];
        assert_eq!(orphan.speaker, Speaker::System);
        assert_eq!(orphan.related_tool_call_id.as_deref(), Some("ghost"));
        assert_eq!(orphan.metadata["orphan"], json!(true));
        assert_eq!(session.forensics.statistics.orphan_tool_results, 1);
    }

    #[test]
    fn test_log_ids_are_contiguous() {
        let session = parse(&[
            user("2026-01-01T00:00:00Z", json!("Please fix the login bug")),
            assistant(
                "2026-01-01T00:00:01Z",
                json!([
                    {"type": "thinking", "thinking": "Look at auth first"},
                    {"type": "text", "text": "Reading the handler."},
                    {"type": "tool_use", "id": "r1", "name": "Read", "input": {"file_path": "/repo/src/auth.rs"}}
                ]),
            ),
            json!({"type": "summary", "summary": "Fix login bug", "leafUuid": "u1"}),
            json!({"type": "mystery-entry", "payload": 1}),
            user(
                "2026-01-01T00:00:02Z",
                json!([{"type": "tool_result", "tool_use_id": "zz", "content": "?"}]),
            ),
        ]);
        for (i, log) in session.logs.iter().enumerate() {
            assert_eq!(log.id, i);
        }
        assert_eq!(count_kind(&session, LogKind::Thought), 1);
        assert_eq!(session.title.as_deref(), Some("Fix login bug"));
        assert_eq!(session.updated_files.len(), 1);
        assert_eq!(session.updated_files[0].action, FileAction::Read);
    }

    #[test]
    fn test_duplicate_hashes_collapse() {
        let session = parse(&[
            assistant(
                "2026-01-01T00:00:00Z",
                json!([{"type": "tool_use", "id": "t1", "name": "Bash",
                    "input": {"command": "git show abc1234f --stat"}}]),
            ),
            user(
                "2026-01-01T00:00:01Z",
                json!([{"type": "tool_result", "tool_use_id": "t1",
                    "content": "commit abc1234f\nAuthor: dev"}]),
            ),
        ]);
        assert_eq!(session.git_commit_hashes, vec!["abc1234f"]);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        let now = Utc::now();
        assert!(parser().parse_contents(&path, "", None, now).is_none());
        assert!(parser()
            .parse_contents(&path, "not json\n[1,2]\n{broken", None, now)
            .is_none());
    }

    #[test]
    fn test_failed_write_retracts_file_updates() {
        let session = parse(&[
            assistant(
                "2026-01-01T00:00:00Z",
                json!([
                    {"type": "tool_use", "id": "w1", "name": "Write",
                        "input": {"file_path": "/repo/package.json", "content": "{}"}},
                    {"type": "tool_use", "id": "e1", "name": "Edit",
                        "input": {"file_path": "/repo/src/app.ts", "old_string": "a", "new_string": "b"}}
                ]),
            ),
            user(
                "2026-01-01T00:00:01Z",
                json!([
                    {"type": "tool_result", "tool_use_id": "w1", "content": "permission denied", "is_error": true},
                    {"type": "tool_result", "tool_use_id": "e1", "content": "ok"}
                ]),
            ),
        ]);
        assert_eq!(session.updated_files.len(), 1);
        assert_eq!(session.updated_files[0].path, "/repo/src/app.ts");
        assert_eq!(session.updated_files[0].action, FileAction::Update);

        let write = session
            .logs
            .iter()
            .find(|l| l.content == "Called Write")
            .unwrap();
        assert_eq!(write.tool_call.as_ref().unwrap().status, ToolStatus::Error);
        // The manifest artifact from the failed write stays registered
        assert!(session
            .artifacts
            .iter()
            .any(|a| a.kind == ArtifactKind::Manifest && a.title == "package.json"));
    }

    #[test]
    fn test_bash_progress_does_not_resolve() {
        let progress = |elapsed: f64, out: &str| {
            json!({"type": "progress", "timestamp": "2026-01-01T00:00:05Z", "parentToolUseID": "b1",
                "data": {"type": "bash_progress", "output": out, "elapsedTimeSeconds": elapsed}})
        };
        let session = parse(&[
            assistant(
                "2026-01-01T00:00:00Z",
                json!([{"type": "tool_use", "id": "b1", "name": "Bash", "input": {"command": "npm test"}}]),
            ),
            progress(2.0, "running 1/10"),
            progress(4.0, "running 7/10"),
        ]);
        let bash = session.logs.iter().find(|l| l.kind == LogKind::Tool).unwrap();
        assert_eq!(bash.tool_call.as_ref().unwrap().output, "");
        assert_eq!(bash.metadata["bashCategory"], json!("test"));
        let progress = &bash.metadata["bashProgress"];
        assert_eq!(progress["output"], json!("running 7/10"));
        assert_eq!(progress["merges"], json!(2));
    }

    #[test]
    fn test_version_transition_entry() {
        let mut later = user("2026-01-01T00:00:05Z", json!("next"));
        later["version"] = json!("2.0.5");
        let session = parse(&[user("2026-01-01T00:00:00Z", json!("first")), later]);

        assert_eq!(session.platform_versions, vec!["2.0.1", "2.0.5"]);
        assert_eq!(session.platform_version.as_deref(), Some("2.0.1"));
        assert_eq!(session.platform_transitions.len(), 1);
        let transition = &session.platform_transitions[0];
        let entry = &session.logs[transition.log_id];
        assert_eq!(entry.speaker, Speaker::System);
        assert!(entry.content.contains("2.0.1"));
        assert!(entry.content.contains("2.0.5"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let lines = [
            task_use(),
            agent_progress(),
            json!({"type": "pr-link", "prUrl": "https://github.com/o/r/pull/7", "prNumber": 7, "prRepository": "o/r"}),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sess-1.jsonl");
        let now = Utc::now();
        let modified = Some(now - Duration::hours(2));
        let first = parser().parse_contents(&path, &jsonl(&lines), modified, now);
        let second = parser().parse_contents(&path, &jsonl(&lines), modified, now);
        assert_eq!(first, second);
        let session = first.unwrap();
        let pr = session
            .artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::PrLink)
            .unwrap();
        assert_eq!(pr.title, "o/r#7");
        assert_eq!(pr.url.as_deref(), Some("https://github.com/o/r/pull/7"));
    }

    #[test]
    fn test_user_text_variants() {
        let session = parse(&[
            user(
                "2026-01-01T00:00:00Z",
                json!("<command-message>plan</command-message>\n<command-name>/execute-phase</command-name>\n<command-args>2-3 docs/plan.md</command-args>"),
            ),
            user("2026-01-01T00:00:01Z", json!("<local-command-stdout>Compacted</local-command-stdout>")),
            user(
                "2026-01-01T00:00:02Z",
                json!("<task-notification>\n<task-id>bg1</task-id>\n<status>completed</status>\n<summary>Build finished</summary>\n</task-notification>"),
            ),
        ]);
        assert_eq!(session.logs[0].kind, LogKind::Command);
        assert_eq!(session.logs[0].content, "/execute-phase 2-3 docs/plan.md");
        assert_eq!(session.logs[1].speaker, Speaker::System);
        assert_eq!(session.logs[1].content, "Compacted");
        assert_eq!(session.logs[2].content, "Build finished");

        let kinds: Vec<_> = session.artifacts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&ArtifactKind::Command));
        assert!(kinds.contains(&ArtifactKind::Task));
        assert!(session.updated_files.iter().any(|f| f.path == "docs/plan.md"));
    }

    #[test]
    fn test_identity_from_path() {
        let top = SessionIdentity::from_path(Path::new("/p/abc-123.jsonl"));
        assert_eq!(top.id, "S-abc-123");
        assert_eq!(top.session_type, SessionType::Session);
        assert_eq!(top.root_session_id, "S-abc-123");

        let sub = SessionIdentity::from_path(Path::new("/p/abc-123/subagents/agent-a1.jsonl"));
        assert_eq!(sub.id, "S-agent-a1");
        assert_eq!(sub.session_type, SessionType::Subagent);
        assert_eq!(sub.agent_id.as_deref(), Some("a1"));
        assert_eq!(sub.parent_session_id.as_deref(), Some("S-abc-123"));
        assert_eq!(sub.root_session_id, "S-abc-123");
    }

    #[test]
    fn test_parse_file_status_from_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.jsonl");
        std::fs::write(&path, jsonl(&[user("2026-01-01T00:00:00Z", json!("still going"))])).unwrap();

        let fresh = parser().parse_file(&path).unwrap();
        assert_eq!(fresh.status, SessionStatus::Active);

        let hour_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(hour_ago)).unwrap();
        let stale = parser().parse_file(&path).unwrap();
        assert_eq!(stale.status, SessionStatus::Completed);

        assert!(parser().parse_file(&dir.path().join("missing.jsonl")).is_none());
    }

    #[test]
    fn test_terminal_system_entry_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.jsonl");
        let now = Utc::now();
        let text = jsonl(&[
            user("2026-01-01T00:00:00Z", json!("hi")),
            json!({"type": "system", "subtype": "turn_duration", "durationMs": 5400,
                "timestamp": "2026-01-01T00:00:06Z"}),
        ]);
        let session = parser().parse_contents(&path, &text, Some(now), now).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.duration_seconds, 6);
    }

    #[test]
    fn test_sidecars_joined_by_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".claude");
        let transcript = root.join("projects/-repo/sess-1.jsonl");
        std::fs::create_dir_all(transcript.parent().unwrap()).unwrap();
        std::fs::create_dir_all(root.join("todos")).unwrap();
        std::fs::write(
            root.join("todos/sess-1-agent-sess-1.json"),
            r#"[{"content": "Ship it", "status": "pending", "activeForm": "Shipping"}]"#,
        )
        .unwrap();
        std::fs::write(&transcript, jsonl(&[user("2026-01-01T00:00:00Z", json!("go"))])).unwrap();

        let session = parser().parse_file(&transcript).unwrap();
        assert_eq!(session.id, "S-sess-1");
        assert_eq!(session.forensics.sidecars.todos.len(), 1);
        assert_eq!(session.forensics.sidecars.todos[0].items[0].content, "Ship it");
        assert!(session.forensics.sidecars.tasks.is_none());
    }

    #[test]
    fn test_session_metrics() {
        let mut first = assistant("2026-01-01T00:00:00Z", json!("Working on it."));
        first["message"]["usage"]["cache_read_input_tokens"] = json!(1000);
        first["thinkingMetadata"] = json!({"level": "high", "disabled": false, "maxThinkingTokens": 31999});
        let session = parse(&[
            user("2026-01-01T00:00:00Z", json!("hello")),
            first,
            assistant("2026-01-01T00:00:10Z", json!([{"type": "text", "text": "Done."}])),
        ]);
        assert_eq!(session.tokens_in, 200);
        assert_eq!(session.tokens_out, 100);
        assert_eq!(session.cache_read_tokens, 1000);
        assert_eq!(session.model.as_deref(), Some("claude-sonnet-4-5"));
        assert!((session.total_cost - (200.0 * 3.0 + 100.0 * 15.0) / 1_000_000.0).abs() < 1e-12);
        assert_eq!(session.forensics.thinking.level.as_deref(), Some("high"));
        assert_eq!(session.platform_type, "Claude Code");
        assert_eq!(session.duration_seconds, 10);
    }

    #[test]
    fn test_removed_paths() {
        assert_eq!(
            removed_paths("rm -f build/out.js && sudo rm tmp/a.log; echo rm x"),
            vec!["build/out.js", "tmp/a.log"]
        );
    }

    #[test]
    fn test_odd_block_keeps_tool_call() {
        let session = parse(&[
            assistant(
                "2026-01-01T00:00:00Z",
                json!([
                    {"type": "text", "text": null},
                    {"type": "tool_use", "id": "t1", "name": "Bash", "input": {"command": "ls"}}
                ]),
            ),
            user(
                "2026-01-01T00:00:01Z",
                json!([{"type": "tool_result", "tool_use_id": "t1", "content": "ok"}]),
            ),
        ]);
        assert_eq!(count_kind(&session, LogKind::Tool), 1);
        let bash = session.logs.iter().find(|l| l.kind == LogKind::Tool).unwrap();
        assert_eq!(bash.tool_call.as_ref().unwrap().output, "ok");
        assert!(!session.logs.iter().any(|l| l.metadata.contains_key("orphan")));
        assert_eq!(session.forensics.statistics.unresolved_tool_calls, 0);
    }

    #[test]
    fn test_tool_path_with_equals_sign() {
        let session = parse(&[assistant(
            "2026-01-01T00:00:00Z",
            json!([{"type": "tool_use", "id": "e1", "name": "Edit",
                "input": {"file_path": "/repo/data/year=2024/load.py", "old_string": "a", "new_string": "b"}}]),
        )]);
        assert_eq!(session.updated_files.len(), 1);
        assert_eq!(session.updated_files[0].path, "/repo/data/year=2024/load.py");
    }

    #[test]
    fn test_queue_operations() {
        let session = parse(&[
            json!({"type": "queue-operation", "operation": "enqueue", "timestamp": "2026-01-01T00:00:00Z",
                "sessionId": "sess-1", "content": "run the linter"}),
            json!({"type": "queue-operation", "operation": "enqueue", "timestamp": "2026-01-01T00:00:01Z",
                "content": "{\"taskId\": \"q1\", \"status\": \"completed\", \"summary\": \"Lint done\"}"}),
        ]);
        assert_eq!(session.logs.len(), 2);
        assert_eq!(session.logs[0].content, "Queue enqueue: run the linter");
        assert_eq!(session.logs[0].metadata["entryType"], json!("queue-operation"));
        assert_eq!(session.logs[0].metadata["operation"], json!("enqueue"));

        assert_eq!(session.logs[1].content, "Lint done");
        assert_eq!(session.logs[1].metadata["entryType"], json!("task-notification"));
        let task = session
            .artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::Task)
            .unwrap();
        assert_eq!(task.title, "q1");
        assert_eq!(task.source, "queue-operation");
    }

    #[test]
    fn test_custom_title_sets_title() {
        let session = parse(&[
            json!({"type": "summary", "summary": "Fix login bug"}),
            json!({"type": "custom-title", "customTitle": "Auth rework", "timestamp": "2026-01-01T00:00:00Z"}),
        ]);
        assert_eq!(session.title.as_deref(), Some("Auth rework"));
        let renamed = session
            .logs
            .iter()
            .find(|l| l.metadata.get("entryType") == Some(&json!("custom-title")))
            .unwrap();
        assert_eq!(renamed.speaker, Speaker::System);
        assert!(renamed.content.contains("Auth rework"));
    }

    #[test]
    fn test_hook_progress_system_entry() {
        let session = parse(&[json!({
            "type": "progress", "timestamp": "2026-01-01T00:00:00Z", "parentToolUseID": "b1",
            "data": {"type": "hook_progress", "hookEvent": "PreToolUse", "hookName": "lint-guard"}
        })]);
        assert_eq!(session.logs.len(), 1);
        let hook = &session.logs[0];
        assert_eq!(hook.speaker, Speaker::System);
        assert_eq!(hook.content, "Hook PreToolUse: lint-guard");
        assert_eq!(hook.related_tool_call_id.as_deref(), Some("b1"));
        assert_eq!(hook.metadata["hook"]["name"], json!("lint-guard"));
    }

    #[test]
    fn test_plan_status_tracks_file() {
        let session = parse(&[assistant(
            "2026-01-01T00:00:00Z",
            json!([{"type": "tool_use", "id": "p1", "name": "Bash",
                "input": {"command": "python3 scripts/update-status.py --file plans/p1.md --status done"}}]),
        )]);
        let bash = session.logs.iter().find(|l| l.kind == LogKind::Tool).unwrap();
        assert_eq!(bash.metadata["planStatus"]["operation"], json!("update"));
        assert_eq!(bash.metadata["planStatus"]["file"], json!("plans/p1.md"));
        assert_eq!(session.updated_files.len(), 1);
        assert_eq!(session.updated_files[0].path, "plans/p1.md");
        assert_eq!(session.updated_files[0].action, FileAction::Update);
    }

    #[test]
    fn test_failed_rm_retracts_delete() {
        let rm = |id: &str, target: &str| {
            json!({"type": "tool_use", "id": id, "name": "Bash", "input": {"command": format!("rm -f {}", target)}})
        };
        let session = parse(&[
            assistant("2026-01-01T00:00:00Z", json!([rm("r1", "build/out.js"), rm("r2", "tmp/a.log")])),
            user(
                "2026-01-01T00:00:01Z",
                json!([
                    {"type": "tool_result", "tool_use_id": "r1", "content": "rm: build/out.js: Permission denied", "is_error": true},
                    {"type": "tool_result", "tool_use_id": "r2", "content": ""}
                ]),
            ),
        ]);
        assert_eq!(session.updated_files.len(), 1);
        assert_eq!(session.updated_files[0].path, "tmp/a.log");
        assert_eq!(session.updated_files[0].action, FileAction::Delete);
    }

    #[test]
    fn test_skill_payloads() {
        let mut injected = user(
            "2026-01-01T00:00:00Z",
            json!("<skill-format>true</skill-format>\n---\nname: release-notes\ndescription: Draft release notes\n---\nBody"),
        );
        injected["isMeta"] = json!(true);
        let session = parse(&[
            injected,
            user(
                "2026-01-01T00:00:01Z",
                json!("Base directory for this skill: /home/u/.claude/skills/pdf-tools\n\n# PDF Tools"),
            ),
        ]);
        assert_eq!(session.logs.len(), 2);
        assert!(session.logs.iter().all(|l| l.speaker == Speaker::System));
        let skills: Vec<_> = session
            .artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Skill)
            .map(|a| (a.title.as_str(), a.description.as_str()))
            .collect();
        assert_eq!(
            skills,
            vec![("release-notes", "Draft release notes"), ("pdf-tools", "PDF Tools")]
        );
    }

    #[test]
    fn test_batch_announcement_tasks() {
        let session = parse(&[assistant(
            "2026-01-01T00:00:00Z",
            json!("Launching work.\n\n## Batch 2 (parallel)\n- **T2-001**: Add login endpoint (backend-architect)\n- **T2-002**: Write UI form"),
        )]);
        let message = &session.logs[0];
        assert_eq!(message.speaker, Speaker::Agent);
        assert_eq!(message.metadata["batches"][0]["batchId"], json!("2"));

        let tasks: Vec<_> = session
            .artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Task)
            .collect();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "T2-001");
        assert_eq!(tasks[0].source_tool_name.as_deref(), Some("backend-architect"));
        assert_eq!(tasks[1].description, "Write UI form");
    }
}
