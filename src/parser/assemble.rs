//! Final `AgentSession` composition

use super::claude_code::{SessionIdentity, PLATFORM_TYPE};
use super::context::SessionContext;
use super::derive::{estimate_cost, infer_status, infer_thinking};
use super::types::*;
use crate::config::ParserConfig;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything the single pass produced
pub struct PassOutput {
    pub identity: SessionIdentity,
    pub ctx: SessionContext,
    pub logs: Vec<LogEntry>,
    pub artifacts: Vec<Artifact>,
    pub files: Vec<FileUpdate>,
    pub sidecars: SidecarSnapshot,
    pub source_file: String,
}

/// Per-tool counts, success rate and summed duration, sorted by tool name.
pub fn summarize_tools(logs: &[LogEntry]) -> Vec<ToolUsage> {
    let mut by_name: BTreeMap<&str, (usize, usize, i64)> = BTreeMap::new();
    for log in logs {
        let Some(call) = &log.tool_call else {
            continue;
        };
        let slot = by_name.entry(call.name.as_str()).or_insert((0, 0, 0));
        slot.0 += 1;
        if call.status == ToolStatus::Success {
            slot.1 += 1;
        }
        slot.2 += log
            .metadata
            .get("toolDurationMs")
            .and_then(Value::as_i64)
            .unwrap_or(0);
    }

    by_name
        .into_iter()
        .map(|(name, (count, success_count, total_duration_ms))| ToolUsage {
            name: name.to_string(),
            count,
            success_count,
            success_rate: if count == 0 {
                0.0
            } else {
                success_count as f64 / count as f64
            },
            total_duration_ms,
        })
        .collect()
}

fn entry_type(log: &LogEntry) -> Option<&str> {
    log.metadata.get("entryType").and_then(Value::as_str)
}

/// Notable moments in log order, bracketed by session start and end.
pub fn build_timeline(logs: &[LogEntry], ctx: &SessionContext) -> Vec<TimelineEvent> {
    let mut events = Vec::new();

    if let Some(ts) = &ctx.first_timestamp {
        events.push(TimelineEvent {
            timestamp: ts.clone(),
            kind: TimelineKind::SessionStart,
            label: "Session started".to_string(),
            log_id: logs.first().map(|l| l.id),
        });
    }

    for log in logs {
        let event = |kind: TimelineKind, label: String| TimelineEvent {
            timestamp: log.timestamp.clone(),
            kind,
            label,
            log_id: Some(log.id),
        };

        if log.kind == LogKind::SubagentStart {
            events.push(event(TimelineKind::SubagentStart, log.content.clone()));
            continue;
        }
        match entry_type(log) {
            Some("version-change") => events.push(event(TimelineKind::VersionChange, log.content.clone())),
            Some("summary") => events.push(event(TimelineKind::Summary, log.content.clone())),
            Some("pr-link") => events.push(event(TimelineKind::PrLink, log.content.clone())),
            _ => {}
        }

        let is_commit = log.metadata.get("bashCategory").and_then(Value::as_str) == Some("git-commit")
            && log.tool_call.as_ref().map(|c| !c.is_error).unwrap_or(false);
        if is_commit {
            if let Some(hashes) = log.metadata.get("commitHashes").and_then(Value::as_array) {
                let hashes: Vec<&str> = hashes.iter().filter_map(Value::as_str).collect();
                if !hashes.is_empty() {
                    events.push(event(TimelineKind::Commit, format!("Commit {}", hashes.join(", "))));
                }
            }
        }
    }

    if let Some(ts) = &ctx.last_timestamp {
        events.push(TimelineEvent {
            timestamp: ts.clone(),
            kind: TimelineKind::SessionEnd,
            label: "Last activity".to_string(),
            log_id: logs.last().map(|l| l.id),
        });
    }

    events
}

pub fn assemble(
    pass: PassOutput,
    config: &ParserConfig,
    modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AgentSession {
    let PassOutput {
        identity,
        ctx,
        logs,
        artifacts,
        mut files,
        sidecars,
        source_file,
    } = pass;

    // A subagent file outside a `subagents/` directory learns its parent
    // from the transcript's own session id.
    let mut parent_session_id = identity.parent_session_id.clone();
    let mut root_session_id = identity.root_session_id.clone();
    if identity.session_type == SessionType::Subagent && parent_session_id.is_none() {
        if let Some(sid) = ctx.session_id.as_deref().or(ctx.parent_session_id.as_deref()) {
            let parent = format!("S-{}", sid);
            root_session_id = parent.clone();
            parent_session_id = Some(parent);
            for file in &mut files {
                file.root_session_id = root_session_id.clone();
            }
        }
    }

    let status = infer_status(logs.last(), modified, now, &config.status);
    let thinking = infer_thinking(
        ctx.thinking_metadata.as_ref(),
        ctx.thinking_blocks,
        &config.thinking,
    );
    let total_cost = estimate_cost(ctx.model.as_deref(), ctx.tokens_in, ctx.tokens_out, &config.pricing);
    let tool_summary = summarize_tools(&logs);
    let timeline = build_timeline(&logs, &ctx);

    AgentSession {
        id: identity.id,
        raw_session_id: identity.raw_session_id,
        session_type: identity.session_type,
        parent_session_id,
        root_session_id,
        agent_id: identity.agent_id.or_else(|| ctx.agent_id.clone()),
        task_id: ctx.task_id.clone(),
        title: ctx.title(),
        status,
        model: ctx.model.clone(),
        platform_type: PLATFORM_TYPE.to_string(),
        platform_version: ctx.platform_version.clone(),
        platform_versions: ctx.platform_versions.clone(),
        platform_transitions: ctx.platform_transitions.clone(),
        project_path: ctx.project_path.clone(),
        started_at: ctx.first_timestamp.clone(),
        ended_at: ctx.last_timestamp.clone(),
        duration_seconds: ctx.duration_seconds(),
        tokens_in: ctx.tokens_in,
        tokens_out: ctx.tokens_out,
        cache_read_tokens: ctx.cache_read_tokens,
        cache_creation_tokens: ctx.cache_creation_tokens,
        total_cost,
        git_branch: ctx.git_branch.clone(),
        git_author: ctx.git_author.clone(),
        git_commit_hash: ctx.git_commit_hash(),
        git_commit_hashes: ctx.git_commit_hashes(),
        logs,
        tool_summary,
        updated_files: files,
        artifacts,
        timeline,
        forensics: SessionForensics {
            thinking,
            statistics: ctx.stats,
            sidecars,
        },
        source_file,
    }
}
