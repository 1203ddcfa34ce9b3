//! Raw JSONL entry decoding
//!
//! Each transcript line is parsed independently. Lines that are not JSON
//! objects are dropped; entries of an unrecognized `type` decode to
//! [`RawEntry::Unknown`] so newer transcript dialects stay readable.
//!
//! Field decoding is lenient: a field of the wrong JSON type reads as absent
//! and a content block that does not fit its variant reads as
//! [`ContentBlock::Other`], so one odd value never hides the rest of a line.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Optional field that reads as `None` when its JSON type is unexpected.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Text field that reads as empty unless it holds a string.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

/// Fields shared by every entry kind
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cwd: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_branch: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub git_commit: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub parent_session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_meta: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub thinking_metadata: Option<ThinkingMetadata>,
}

impl Envelope {
    pub fn timestamp(&self) -> &str {
        self.timestamp.as_deref().unwrap_or("")
    }

    pub fn is_meta(&self) -> bool {
        self.is_meta.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub disabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_thinking_tokens: Option<u64>,
}

/// One decoded transcript line
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RawEntry {
    User(MessageEntry),
    Assistant(MessageEntry),
    Progress(ProgressEntry),
    Summary(SummaryEntry),
    CustomTitle(CustomTitleEntry),
    PrLink(PrLinkEntry),
    QueueOperation(QueueOperationEntry),
    FileHistorySnapshot(SnapshotEntry),
    System(SystemEntry),
    #[serde(other)]
    Unknown,
}

impl RawEntry {
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            RawEntry::User(e) | RawEntry::Assistant(e) => Some(&e.envelope),
            RawEntry::Progress(e) => Some(&e.envelope),
            RawEntry::Summary(e) => Some(&e.envelope),
            RawEntry::CustomTitle(e) => Some(&e.envelope),
            RawEntry::PrLink(e) => Some(&e.envelope),
            RawEntry::QueueOperation(e) => Some(&e.envelope),
            RawEntry::FileHistorySnapshot(e) => Some(&e.envelope),
            RawEntry::System(e) => Some(&e.envelope),
            RawEntry::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<RawMessage>,
    /// Structured tool result metadata attached to user entries
    #[serde(default)]
    pub tool_use_result: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_api_error_message: Option<bool>,
}

impl MessageEntry {
    pub fn content(&self) -> Option<&RawContent> {
        self.message.as_ref().and_then(|m| m.content.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<RawContent>,
    #[serde(default, deserialize_with = "lenient")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "lenient")]
    pub input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub output_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub cache_creation_input_tokens: Option<u64>,
}

/// Message content is either a plain string or a list of typed blocks
#[derive(Debug, Clone)]
pub enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl<'de> Deserialize<'de> for RawContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(RawContent::Text(s)),
            // Blocks decode one at a time; a misfit block becomes `Other`
            Value::Array(items) => Ok(RawContent::Blocks(
                items
                    .into_iter()
                    .map(|item| ContentBlock::deserialize(item).unwrap_or(ContentBlock::Other))
                    .collect(),
            )),
            other => Err(serde::de::Error::custom(format!(
                "unsupported message content: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default, deserialize_with = "lenient_text")]
        text: String,
    },
    Thinking {
        #[serde(default, deserialize_with = "lenient_text")]
        thinking: String,
    },
    ToolUse {
        #[serde(default, deserialize_with = "lenient")]
        id: Option<String>,
        #[serde(default, deserialize_with = "lenient_text")]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default, deserialize_with = "lenient")]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: Value,
        #[serde(default, deserialize_with = "lenient")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub data: Value,
    #[serde(
        default,
        rename = "parentToolUseID",
        alias = "parentToolUseId",
        deserialize_with = "lenient"
    )]
    pub parent_tool_use_id: Option<String>,
    #[serde(
        default,
        rename = "toolUseID",
        alias = "toolUseId",
        deserialize_with = "lenient"
    )]
    pub tool_use_id: Option<String>,
}

impl ProgressEntry {
    pub fn progress_data(&self) -> ProgressData {
        ProgressData::deserialize(&self.data).unwrap_or(ProgressData::Other)
    }
}

/// Payload of a `progress` entry, keyed by `data.type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressData {
    AgentProgress {
        #[serde(default, rename = "agentId", deserialize_with = "lenient")]
        agent_id: Option<String>,
    },
    BashProgress {
        #[serde(default, deserialize_with = "lenient")]
        output: Option<String>,
        #[serde(default, rename = "fullOutput", deserialize_with = "lenient")]
        full_output: Option<String>,
        #[serde(default, rename = "elapsedTimeSeconds", deserialize_with = "lenient")]
        elapsed_time_seconds: Option<f64>,
        #[serde(default, rename = "totalLines", deserialize_with = "lenient")]
        total_lines: Option<u64>,
    },
    HookProgress {
        #[serde(default, rename = "hookEvent", deserialize_with = "lenient")]
        hook_event: Option<String>,
        #[serde(default, rename = "hookName", deserialize_with = "lenient")]
        hook_name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        command: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub leaf_uuid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTitleEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub custom_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrLinkEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub pr_number: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub pr_repository: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOperationEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub operation: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub snapshot: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default, deserialize_with = "lenient")]
    pub subtype: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub duration_ms: Option<f64>,
}

/// A successfully parsed line: the raw JSON plus its typed decoding
#[derive(Debug, Clone)]
pub struct DecodedLine {
    pub value: Value,
    pub entry: RawEntry,
}

/// Output of [`decode_transcript`]
#[derive(Debug, Clone, Default)]
pub struct DecodedTranscript {
    pub lines: Vec<DecodedLine>,
    /// Non-empty lines seen
    pub total_lines: usize,
    /// Non-empty lines that were not JSON objects
    pub malformed_lines: usize,
}

impl DecodedTranscript {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split a transcript into lines and decode each one independently.
pub fn decode_transcript(text: &str) -> DecodedTranscript {
    let mut decoded = DecodedTranscript::default();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        decoded.total_lines += 1;

        let value: Value = match serde_json::from_str(line) {
            Ok(v @ Value::Object(_)) => v,
            Ok(_) | Err(_) => {
                decoded.malformed_lines += 1;
                tracing::debug!("Skipping malformed transcript line {}", index + 1);
                continue;
            }
        };

        let entry = match RawEntry::deserialize(&value) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Line {} has an unexpected shape: {}", index + 1, e);
                RawEntry::Unknown
            }
        };

        decoded.lines.push(DecodedLine {
            value,
            entry,
        });
    }

    decoded
}
