//! Correlation tables for asynchronous transcript events
//!
//! A `tool_use` block is recorded here when it is logged, so a later
//! `tool_result` or progress event can be merged back into the originating
//! log entry. Task tool calls additionally map to the subagent session they
//! spawned.

use std::collections::{HashMap, HashSet};

/// A logged tool call waiting for (or having received) its result
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTool {
    /// Index of the tool entry in the log list
    pub log_index: usize,
    pub started_at: String,
    pub name: String,
    /// Input as logged, kept for post-result processing
    pub input: serde_json::Value,
    pub resolved: bool,
}

#[derive(Debug, Default)]
pub struct CorrelationTables {
    tools: HashMap<String, PendingTool>,
    subagents: HashMap<String, String>,
    /// (parent tool id, subagent session) pairs already reported
    reported: HashSet<(String, String)>,
}

impl CorrelationTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool(
        &mut self,
        tool_id: &str,
        log_index: usize,
        started_at: &str,
        name: &str,
        input: &serde_json::Value,
    ) {
        self.tools.insert(
            tool_id.to_string(),
            PendingTool {
                log_index,
                started_at: started_at.to_string(),
                name: name.to_string(),
                input: input.clone(),
                resolved: false,
            },
        );
    }

    pub fn tool(&self, tool_id: &str) -> Option<&PendingTool> {
        self.tools.get(tool_id)
    }

    /// Mark a tool call as resolved and return its record.
    ///
    /// A second result for the same id still finds the record; the caller
    /// decides whether to overwrite.
    pub fn resolve(&mut self, tool_id: &str) -> Option<&PendingTool> {
        let pending = self.tools.get_mut(tool_id)?;
        pending.resolved = true;
        Some(pending)
    }

    pub fn pending_count(&self) -> usize {
        self.tools.values().filter(|t| !t.resolved).count()
    }

    /// Associate a parent tool call with the subagent session it spawned.
    ///
    /// Returns true the first time this pair is reported, so replayed
    /// progress events announce a subagent only once.
    pub fn link_subagent(&mut self, parent_tool_id: &str, session_id: &str) -> bool {
        self.subagents
            .insert(parent_tool_id.to_string(), session_id.to_string());
        self.reported
            .insert((parent_tool_id.to_string(), session_id.to_string()))
    }

    pub fn linked_session(&self, parent_tool_id: &str) -> Option<&str> {
        self.subagents.get(parent_tool_id).map(String::as_str)
    }
}
