//! Fields computed after the main pass
//!
//! Cost, thinking level and session status are pure functions of the
//! accumulated state, the schema document and (for status) the clock.

use super::raw::ThinkingMetadata;
use super::rules::{classify_status, StatusInput};
use super::types::{LogEntry, SessionStatus, ThinkingInfo, ThinkingSource};
use crate::config::{PricingConfig, StatusConfig, ThinkingConfig};
use chrono::{DateTime, Duration, Utc};

/// Estimated USD cost of a session's input and output tokens.
pub fn estimate_cost(model: Option<&str>, tokens_in: u64, tokens_out: u64, pricing: &PricingConfig) -> f64 {
    let model = model.unwrap_or("").to_ascii_lowercase();
    let (rate_in, rate_out) = pricing
        .models
        .iter()
        .find(|m| !m.pattern.is_empty() && model.contains(&m.pattern.to_ascii_lowercase()))
        .map(|m| (m.input_per_million, m.output_per_million))
        .unwrap_or((
            pricing.default.input_per_million,
            pricing.default.output_per_million,
        ));

    (tokens_in as f64 / 1_000_000.0) * rate_in + (tokens_out as f64 / 1_000_000.0) * rate_out
}

fn bucket(tokens: u64, cfg: &ThinkingConfig) -> Option<&'static str> {
    if tokens >= cfg.high_tokens {
        Some("high")
    } else if tokens >= cfg.medium_tokens {
        Some("medium")
    } else if tokens >= cfg.low_tokens {
        Some("low")
    } else {
        None
    }
}

/// Resolve a thinking level: explicit level, then token bucket, then the
/// disabled flag.
pub fn infer_thinking(meta: Option<&ThinkingMetadata>, thinking_blocks: usize, cfg: &ThinkingConfig) -> ThinkingInfo {
    let mut info = ThinkingInfo {
        thinking_blocks,
        max_thinking_tokens: meta.and_then(|m| m.max_thinking_tokens),
        ..Default::default()
    };
    let Some(meta) = meta else {
        return info;
    };

    if let Some(level) = meta.level.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        info.level = Some(level.to_ascii_lowercase());
        info.source = Some(ThinkingSource::Explicit);
    } else if let Some(level) = meta.max_thinking_tokens.and_then(|t| bucket(t, cfg)) {
        info.level = Some(level.to_string());
        info.source = Some(ThinkingSource::Tokens);
    } else if meta.disabled.unwrap_or(false) {
        info.level = Some(cfg.disabled_level.clone());
        info.source = Some(ThinkingSource::Disabled);
    }
    info
}

/// Active or completed, from the last log entry and the file's age.
pub fn infer_status(
    last_entry: Option<&LogEntry>,
    modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cfg: &StatusConfig,
) -> SessionStatus {
    classify_status(&StatusInput {
        last_entry,
        age: modified.map(|m| now - m),
        active_window: Duration::minutes(cfg.active_window_minutes),
        terminal_subtypes: &cfg.terminal_subtypes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{LogKind, Speaker};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_estimate_cost() {
        let pricing = PricingConfig::default();
        assert!(approx(
            estimate_cost(Some("claude-sonnet-4-5-20250929"), 1_000_000, 1_000_000, &pricing),
            18.0
        ));
        // More specific fragment listed first wins
        assert!(approx(
            estimate_cost(Some("claude-opus-4-5-20251101"), 1_000_000, 0, &pricing),
            5.0
        ));
        assert!(approx(
            estimate_cost(Some("claude-3-opus-20240229"), 0, 1_000_000, &pricing),
            75.0
        ));
        assert!(approx(estimate_cost(Some("gpt-5"), 2_000_000, 0, &pricing), 6.0));
        assert!(approx(estimate_cost(None, 0, 0, &pricing), 0.0));
    }

    fn meta(level: Option<&str>, disabled: Option<bool>, tokens: Option<u64>) -> ThinkingMetadata {
        ThinkingMetadata {
            level: level.map(str::to_string),
            disabled,
            max_thinking_tokens: tokens,
        }
    }

    #[test]
    fn test_infer_thinking_priority() {
        let cfg = ThinkingConfig::default();

        let explicit = infer_thinking(Some(&meta(Some("High"), Some(true), Some(5))), 2, &cfg);
        assert_eq!(explicit.level.as_deref(), Some("high"));
        assert_eq!(explicit.source, Some(ThinkingSource::Explicit));
        assert_eq!(explicit.thinking_blocks, 2);

        let tokens = infer_thinking(Some(&meta(None, Some(true), Some(31_999))), 0, &cfg);
        assert_eq!(tokens.level.as_deref(), Some("high"));
        assert_eq!(tokens.source, Some(ThinkingSource::Tokens));

        let medium = infer_thinking(Some(&meta(None, None, Some(10_000))), 0, &cfg);
        assert_eq!(medium.level.as_deref(), Some("medium"));
        let low = infer_thinking(Some(&meta(None, None, Some(4_000))), 0, &cfg);
        assert_eq!(low.level.as_deref(), Some("low"));

        let disabled = infer_thinking(Some(&meta(None, Some(true), Some(0))), 0, &cfg);
        assert_eq!(disabled.level.as_deref(), Some("off"));
        assert_eq!(disabled.source, Some(ThinkingSource::Disabled));

        let unset = infer_thinking(None, 1, &cfg);
        assert!(unset.level.is_none());
        assert!(unset.source.is_none());
    }

    fn message_entry() -> LogEntry {
        LogEntry {
            id: 0,
            timestamp: String::new(),
            speaker: Speaker::Agent,
            kind: LogKind::Message,
            content: "done".to_string(),
            agent_name: None,
            linked_session_id: None,
            related_tool_call_id: None,
            metadata: Default::default(),
            tool_call: None,
        }
    }

    #[test]
    fn test_infer_status() {
        let cfg = StatusConfig::default();
        let now = Utc::now();
        let entry = message_entry();

        assert_eq!(
            infer_status(Some(&entry), Some(now - Duration::minutes(2)), now, &cfg),
            SessionStatus::Active
        );
        assert_eq!(
            infer_status(Some(&entry), Some(now - Duration::minutes(11)), now, &cfg),
            SessionStatus::Completed
        );
        assert_eq!(infer_status(Some(&entry), None, now, &cfg), SessionStatus::Completed);
        assert_eq!(infer_status(None, Some(now), now, &cfg), SessionStatus::Completed);

        let mut done = message_entry();
        done.speaker = Speaker::System;
        done.metadata.insert("durationMs".to_string(), serde_json::json!(1200));
        assert_eq!(
            infer_status(Some(&done), Some(now), now, &cfg),
            SessionStatus::Completed
        );
    }
}
