//! JSONL transcript parsers
//!
//! The Claude Code parser decodes a transcript in one pass and assembles an
//! [`AgentSession`]. Supporting modules hold the pure pieces: text
//! extractors, rule tables, correlation tables and derived-field math.

pub mod assemble;
pub mod claude_code;
pub mod common;
pub mod context;
pub mod correlation;
pub mod derive;
pub mod extract;
pub mod raw;
pub mod rules;
pub mod tracker;
pub mod types;

pub use claude_code::{ClaudeCodeParser, SessionIdentity};
pub use types::*;

use std::path::Path;

/// Parser trait for session file formats
pub trait SessionParser: Send + Sync {
    /// Parse a transcript file. `None` means the file holds no session.
    fn parse_file(&self, path: &Path) -> Option<AgentSession>;

    /// Get the parser name
    fn name(&self) -> &'static str;
}

/// Get a parser for the specified AI tool
pub fn get_parser(tool: &str) -> Option<Box<dyn SessionParser + Send + Sync>> {
    match tool {
        "claude_code" | "claude-code" => Some(Box::new(ClaudeCodeParser::new())),
        _ => None,
    }
}
