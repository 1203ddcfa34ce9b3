//! Agentlog - structured session records from AI coding agent transcripts
//!
//! This crate turns Claude Code JSONL transcripts into typed session records:
//! - Single-pass decoding with tool call and subagent correlation
//! - Evidence extraction (files, commits, commands, skills, tasks)
//! - Derived fields (cost, status, thinking level, version history)
//! - Sidecar joins (todos, task queue, team inboxes, session env)
//!
//! # Usage
//!
//! As a library:
//! ```ignore
//! use agentlog::parser::{ClaudeCodeParser, SessionParser};
//!
//! let parser = ClaudeCodeParser::new();
//! if let Some(session) = parser.parse_file(path) {
//!     println!("{} logs, ${:.2}", session.logs.len(), session.total_cost);
//! }
//! ```
//!
//! As a CLI:
//! ```text
//! agentlog ~/.claude/projects --pretty
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod sidecar;

// Re-export main types for convenience
pub use config::ParserConfig;
pub use error::{CoreError, Result};
pub use parser::{get_parser, AgentSession, ClaudeCodeParser, SessionParser};
