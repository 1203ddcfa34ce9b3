//! Pass-wide session state
//!
//! [`SessionContext`] accumulates identity, token totals, git fields and
//! version history as entries are consumed in order. Entry-level counters
//! are collected separately from the raw JSON so unknown type names survive.

use super::common::{str_field, truncate_str};
use super::raw::{Envelope, ThinkingMetadata, Usage};
use super::types::{EntryStatistics, SessionPlatformTransition};
use serde_json::Value;
use std::collections::BTreeSet;

/// A version change observed on an entry, awaiting its system log entry
#[derive(Debug, Clone, PartialEq)]
pub struct VersionChange {
    pub timestamp: String,
    pub from_version: String,
    pub to_version: String,
}

fn set_once(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            *slot = Some(v.to_string());
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionContext {
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,

    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub model: Option<String>,

    /// First version reported by the transcript
    pub platform_version: Option<String>,
    current_version: Option<String>,
    pub platform_versions: Vec<String>,
    pub platform_transitions: Vec<SessionPlatformTransition>,

    pub git_branch: Option<String>,
    pub git_author: Option<String>,
    /// Commit reported explicitly by the transcript, as opposed to mined from text
    pub git_commit_explicit: Option<String>,
    pub commit_hashes: Vec<String>,
    seen_hashes: BTreeSet<String>,

    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
    pub parent_session_id: Option<String>,
    pub project_path: Option<String>,

    pub thinking_metadata: Option<ThinkingMetadata>,
    pub thinking_blocks: usize,

    pub custom_title: Option<String>,
    pub first_summary: Option<String>,

    pub stats: EntryStatistics,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the shared envelope fields of one entry into the context.
    ///
    /// Returns a [`VersionChange`] when the entry reports a platform version
    /// different from the current one.
    pub fn observe_envelope(&mut self, envelope: &Envelope) -> Option<VersionChange> {
        let ts = envelope.timestamp();
        if !ts.is_empty() {
            if self.first_timestamp.is_none() {
                self.first_timestamp = Some(ts.to_string());
            }
            self.last_timestamp = Some(ts.to_string());
        }

        set_once(&mut self.session_id, envelope.session_id.as_deref());
        set_once(&mut self.task_id, envelope.task_id.as_deref());
        set_once(&mut self.agent_id, envelope.agent_id.as_deref());
        set_once(&mut self.parent_session_id, envelope.parent_session_id.as_deref());
        set_once(&mut self.project_path, envelope.cwd.as_deref());
        set_once(&mut self.git_branch, envelope.git_branch.as_deref());
        set_once(&mut self.git_author, envelope.git_author.as_deref());
        if let Some(commit) = envelope.git_commit.as_deref() {
            self.observe_explicit_commit(commit);
        }

        if let Some(meta) = &envelope.thinking_metadata {
            self.thinking_metadata = Some(meta.clone());
        }

        envelope
            .version
            .as_deref()
            .and_then(|v| self.observe_version(v, ts))
    }

    fn observe_version(&mut self, version: &str, timestamp: &str) -> Option<VersionChange> {
        let version = version.trim();
        if version.is_empty() {
            return None;
        }
        if !self.platform_versions.iter().any(|v| v == version) {
            self.platform_versions.push(version.to_string());
        }
        set_once(&mut self.platform_version, Some(version));
        match self.current_version.replace(version.to_string()) {
            Some(previous) if previous != version => Some(VersionChange {
                timestamp: timestamp.to_string(),
                from_version: previous,
                to_version: version.to_string(),
            }),
            _ => None,
        }
    }

    /// Attach the id of the system entry describing a version change.
    pub fn record_transition(&mut self, change: VersionChange, log_id: usize) {
        self.platform_transitions.push(SessionPlatformTransition {
            timestamp: change.timestamp,
            from_version: change.from_version,
            to_version: change.to_version,
            log_id,
        });
    }

    pub fn observe_usage(&mut self, usage: &Usage) {
        self.tokens_in += usage.input_tokens.unwrap_or(0);
        self.tokens_out += usage.output_tokens.unwrap_or(0);
        self.cache_read_tokens += usage.cache_read_input_tokens.unwrap_or(0);
        self.cache_creation_tokens += usage.cache_creation_input_tokens.unwrap_or(0);
    }

    pub fn observe_model(&mut self, model: Option<&str>) {
        // Synthetic placeholder models are not real identities
        let model = model.filter(|m| *m != "<synthetic>");
        set_once(&mut self.model, model);
    }

    /// Record hashes mined from text. Returns the ones not seen before.
    pub fn observe_commit_hashes(&mut self, hashes: &[String]) -> Vec<String> {
        let mut fresh = Vec::new();
        for hash in hashes {
            if self.seen_hashes.insert(hash.clone()) {
                self.commit_hashes.push(hash.clone());
                fresh.push(hash.clone());
            }
        }
        fresh
    }

    pub fn observe_explicit_commit(&mut self, commit: &str) {
        let commit = commit.trim();
        if commit.is_empty() {
            return;
        }
        set_once(&mut self.git_commit_explicit, Some(commit));
        self.observe_commit_hashes(&[commit.to_string()]);
    }

    /// Pick up git fields carried inside a `file-history-snapshot` payload.
    pub fn observe_snapshot(&mut self, snapshot: &Value) {
        set_once(&mut self.git_branch, str_field(snapshot, "gitBranch"));
        set_once(&mut self.git_author, str_field(snapshot, "gitAuthor"));
        if let Some(commit) = str_field(snapshot, "gitCommit") {
            self.observe_explicit_commit(commit);
        }
    }

    pub fn set_custom_title(&mut self, title: &str) {
        let title = title.trim();
        if !title.is_empty() {
            self.custom_title = Some(title.to_string());
        }
    }

    pub fn observe_summary(&mut self, summary: &str) {
        set_once(&mut self.first_summary, Some(summary));
    }

    pub fn title(&self) -> Option<String> {
        self.custom_title.clone().or_else(|| self.first_summary.clone())
    }

    /// Sorted, deduplicated union of every commit hash seen.
    pub fn git_commit_hashes(&self) -> Vec<String> {
        self.seen_hashes.iter().cloned().collect()
    }

    /// Explicit commit if reported, else the first hash observed.
    pub fn git_commit_hash(&self) -> Option<String> {
        self.git_commit_explicit
            .clone()
            .or_else(|| self.commit_hashes.first().cloned())
    }

    /// Whole seconds between the first and last timestamps, floored at zero.
    pub fn duration_seconds(&self) -> i64 {
        let parse = |ts: &Option<String>| {
            ts.as_deref()
                .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        };
        match (parse(&self.first_timestamp), parse(&self.last_timestamp)) {
            (Some(first), Some(last)) => (last - first).num_seconds().max(0),
            _ => 0,
        }
    }
}

fn bump(map: &mut std::collections::BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

/// Update entry-level counters from one decoded line.
pub fn record_statistics(stats: &mut EntryStatistics, value: &Value) {
    stats.parsed_entries += 1;

    let entry_type = str_field(value, "type").unwrap_or("unknown");
    bump(&mut stats.entry_types, entry_type);

    if value.get("isSidechain").and_then(Value::as_bool).unwrap_or(false) {
        stats.sidechain_entries += 1;
    }
    if value.get("isMeta").and_then(Value::as_bool).unwrap_or(false) {
        stats.meta_entries += 1;
    }

    match entry_type {
        "file-history-snapshot" => {
            stats.snapshot_entries += 1;
            if value
                .get("isSnapshotUpdate")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                stats.snapshot_updates += 1;
            }
        }
        "progress" => {
            let kind = value
                .get("data")
                .and_then(|d| str_field(d, "type"))
                .unwrap_or("unknown");
            bump(&mut stats.progress_types, kind);
        }
        _ => {}
    }

    let Some(message) = value.get("message") else {
        return;
    };
    if let Some(role) = str_field(message, "role") {
        bump(&mut stats.message_roles, role);
    }
    if let Some(reason) = str_field(message, "stop_reason") {
        bump(&mut stats.stop_reasons, reason);
    }

    let content = message.get("content");
    if let Some(blocks) = content.and_then(Value::as_array) {
        for block in blocks {
            let kind = str_field(block, "type").unwrap_or("unknown");
            bump(&mut stats.content_block_types, kind);
            if kind == "tool_result"
                && block.get("is_error").and_then(Value::as_bool).unwrap_or(false)
            {
                stats.tool_result_errors += 1;
            }
        }
    } else if content.map(Value::is_string).unwrap_or(false) {
        bump(&mut stats.content_block_types, "string");
    }

    if value
        .get("isApiErrorMessage")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        let text = content
            .map(super::common::content_to_string)
            .unwrap_or_default();
        stats.api_errors.push(truncate_str(text.trim(), 500));
    }
}
