//! Schema document for the transcript parser
//!
//! Loads thresholds, sidecar path templates, pricing and truncation limits
//! from a TOML file (default `~/.agentlog/schema.toml`). The document is
//! loaded once per process and cached; see [`ParserConfig::global`].

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable naming an alternate schema document
pub const SCHEMA_ENV: &str = "AGENTLOG_SCHEMA";

static GLOBAL: OnceLock<ParserConfig> = OnceLock::new();

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Thinking-level inference cutoffs
    #[serde(default)]
    pub thinking: ThinkingConfig,

    /// Sidecar path templates, relative to the `.claude` root
    #[serde(default)]
    pub sidecars: SidecarConfig,

    /// Per-model-family token pricing
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Field-level truncation limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Session status inference
    #[serde(default)]
    pub status: StatusConfig,

    /// Plan-status script detection
    #[serde(default)]
    pub plan_status: PlanStatusConfig,

    /// Slash-command argument grammar
    #[serde(default)]
    pub commands: CommandConfig,
}

/// Token cutoffs used to bucket `maxThinkingTokens` into a level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Minimum thinking tokens that count as `low`
    #[serde(default = "default_low_tokens")]
    pub low_tokens: u64,

    /// Minimum thinking tokens that count as `medium`
    #[serde(default = "default_medium_tokens")]
    pub medium_tokens: u64,

    /// Minimum thinking tokens that count as `high`
    #[serde(default = "default_high_tokens")]
    pub high_tokens: u64,

    /// Level reported when thinking is explicitly disabled
    #[serde(default = "default_disabled_level")]
    pub disabled_level: String,
}

fn default_low_tokens() -> u64 {
    1
}

fn default_medium_tokens() -> u64 {
    10_000
}

fn default_high_tokens() -> u64 {
    31_999
}

fn default_disabled_level() -> String {
    "off".to_string()
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        ThinkingConfig {
            low_tokens: default_low_tokens(),
            medium_tokens: default_medium_tokens(),
            high_tokens: default_high_tokens(),
            disabled_level: default_disabled_level(),
        }
    }
}

/// Sidecar path templates. `{session_id}` is replaced by the raw session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    #[serde(default = "default_todos")]
    pub todos: String,

    #[serde(default = "default_tasks")]
    pub tasks: String,

    #[serde(default = "default_team_inboxes")]
    pub team_inboxes: String,

    #[serde(default = "default_session_env")]
    pub session_env: String,
}

fn default_todos() -> String {
    "todos/{session_id}-agent-*.json".to_string()
}

fn default_tasks() -> String {
    "tasks/{session_id}".to_string()
}

fn default_team_inboxes() -> String {
    "teams/{session_id}/inboxes/*.json".to_string()
}

fn default_session_env() -> String {
    "session-env/{session_id}".to_string()
}

impl Default for SidecarConfig {
    fn default() -> Self {
        SidecarConfig {
            todos: default_todos(),
            tasks: default_tasks(),
            team_inboxes: default_team_inboxes(),
            session_env: default_session_env(),
        }
    }
}

/// Token rates in USD per million tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    /// Substring matched against the model name (first match wins)
    pub pattern: String,
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Rate used when no pattern matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for DefaultRate {
    fn default() -> Self {
        DefaultRate {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Ordered rate table. More specific fragments must come first.
    #[serde(default = "default_models")]
    pub models: Vec<ModelRate>,

    #[serde(default)]
    pub default: DefaultRate,
}

fn rate(pattern: &str, input: f64, output: f64) -> ModelRate {
    ModelRate {
        pattern: pattern.to_string(),
        input_per_million: input,
        output_per_million: output,
    }
}

fn default_models() -> Vec<ModelRate> {
    vec![
        rate("opus-4-5", 5.0, 25.0),
        rate("opus", 15.0, 75.0),
        rate("sonnet", 3.0, 15.0),
        rate("haiku-4-5", 1.0, 5.0),
        rate("haiku", 0.8, 4.0),
    ]
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            models: default_models(),
            default: DefaultRate::default(),
        }
    }
}

/// Field-level truncation limits, in characters. A cut value gains a
/// `...` suffix beyond the limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_message_chars")]
    pub message_chars: usize,

    #[serde(default = "default_content_chars")]
    pub content_chars: usize,

    #[serde(default = "default_tool_args_chars")]
    pub tool_args_chars: usize,

    #[serde(default = "default_tool_output_chars")]
    pub tool_output_chars: usize,
}

fn default_message_chars() -> usize {
    20_000
}

fn default_content_chars() -> usize {
    10_000
}

fn default_tool_args_chars() -> usize {
    4_000
}

fn default_tool_output_chars() -> usize {
    8_000
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            message_chars: default_message_chars(),
            content_chars: default_content_chars(),
            tool_args_chars: default_tool_args_chars(),
            tool_output_chars: default_tool_output_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// A transcript modified within this window counts as active
    #[serde(default = "default_active_window")]
    pub active_window_minutes: i64,

    /// System subtypes that mark the end of a turn
    #[serde(default = "default_terminal_subtypes")]
    pub terminal_subtypes: Vec<String>,
}

fn default_active_window() -> i64 {
    10
}

fn default_terminal_subtypes() -> Vec<String> {
    ["turn_duration", "stop_hook_summary", "session_end", "result"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            active_window_minutes: default_active_window(),
            terminal_subtypes: default_terminal_subtypes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStatusConfig {
    /// Script basenames (with or without extension) that manage plan status
    #[serde(default = "default_plan_scripts")]
    pub scripts: Vec<String>,
}

fn default_plan_scripts() -> Vec<String> {
    ["update-status", "update_status", "manage-plan-status", "plan-status"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PlanStatusConfig {
    fn default() -> Self {
        PlanStatusConfig {
            scripts: default_plan_scripts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Command-name fragments whose arguments start with a phase selection
    #[serde(default = "default_phase_commands")]
    pub phase_commands: Vec<String>,
}

fn default_phase_commands() -> Vec<String> {
    vec!["execute-phase".to_string()]
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            phase_commands: default_phase_commands(),
        }
    }
}

impl ParserConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(CoreError::Config(format!(
                "Schema document not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: ParserConfig = toml::from_str(&content)?;

        Ok(config)
    }

    /// Load configuration from file or use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path.as_ref()) {
            Ok(config) => config,
            Err(CoreError::Config(_)) => ParserConfig::default(),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable schema {}: {}",
                    path.as_ref().display(),
                    e
                );
                ParserConfig::default()
            }
        }
    }

    /// Get the default schema document path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|p| p.join(".agentlog").join("schema.toml"))
            .unwrap_or_else(|| PathBuf::from(".agentlog/schema.toml"))
    }

    /// Process-wide schema, loaded on first use from `$AGENTLOG_SCHEMA` or the default path
    pub fn global() -> &'static ParserConfig {
        GLOBAL.get_or_init(|| {
            let path = std::env::var_os(SCHEMA_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(Self::default_path);
            Self::load_or_default(path)
        })
    }

    /// Install the process-wide schema. Fails if it was already loaded.
    pub fn install(config: ParserConfig) -> Result<()> {
        GLOBAL
            .set(config)
            .map_err(|_| CoreError::Config("schema already loaded".to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("Failed to serialize schema: {}", e)))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Create a default schema document at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Agentlog transcript schema

[thinking]
# maxThinkingTokens at or above each cutoff selects that level
low_tokens = 1
medium_tokens = 10000
high_tokens = 31999
# Level reported when thinking is disabled
disabled_level = "off"

[sidecars]
# Relative to the discovered .claude root; {session_id} is the raw session id
todos = "todos/{session_id}-agent-*.json"
tasks = "tasks/{session_id}"
team_inboxes = "teams/{session_id}/inboxes/*.json"
session_env = "session-env/{session_id}"

# USD per million tokens. First matching fragment wins.
[[pricing.models]]
pattern = "opus-4-5"
input_per_million = 5.0
output_per_million = 25.0

[[pricing.models]]
pattern = "opus"
input_per_million = 15.0
output_per_million = 75.0

[[pricing.models]]
pattern = "sonnet"
input_per_million = 3.0
output_per_million = 15.0

[[pricing.models]]
pattern = "haiku-4-5"
input_per_million = 1.0
output_per_million = 5.0

[[pricing.models]]
pattern = "haiku"
input_per_million = 0.8
output_per_million = 4.0

[pricing.default]
input_per_million = 3.0
output_per_million = 15.0

[limits]
message_chars = 20000
content_chars = 10000
tool_args_chars = 4000
tool_output_chars = 8000

[status]
active_window_minutes = 10
terminal_subtypes = ["turn_duration", "stop_hook_summary", "session_end", "result"]

[plan_status]
scripts = ["update-status", "update_status", "manage-plan-status", "plan-status"]

[commands]
phase_commands = ["execute-phase"]
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
