//! Output-size presets and the compression envelope.
//!
//! Every non-quiet action response is wrapped in a [`Compressed`] value that
//! reports how large the payload is and whether anything was cut. Sizes are
//! measured in chars of the compact JSON encoding.

use serde::{Deserialize, Serialize};

/// Caller-selected output strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    Aggressive,
    #[default]
    Balanced,
    None,
}

/// Actions that carry a default output budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetedAction {
    Search,
    Read,
    CollectContext,
    LoadMemory,
}

impl CompressionMode {
    /// Default number of search hits. `None` keeps every hit.
    pub fn search_limit(self) -> Option<usize> {
        match self {
            CompressionMode::Aggressive => Some(3),
            CompressionMode::Balanced => Some(5),
            CompressionMode::None => None,
        }
    }

    pub fn search_excerpt(self) -> Option<usize> {
        match self {
            CompressionMode::Aggressive => Some(220),
            CompressionMode::Balanced => Some(500),
            CompressionMode::None => None,
        }
    }

    pub fn read_content_cap(self) -> Option<usize> {
        match self {
            CompressionMode::Aggressive => Some(1200),
            CompressionMode::Balanced => Some(2500),
            CompressionMode::None => None,
        }
    }

    pub fn read_backlink_cap(self) -> Option<usize> {
        match self {
            CompressionMode::Aggressive => Some(5),
            CompressionMode::Balanced => Some(10),
            CompressionMode::None => None,
        }
    }

    pub fn default_max_output_chars(self, action: BudgetedAction) -> Option<usize> {
        let (aggressive, balanced) = match action {
            BudgetedAction::Search => (1800, 2500),
            BudgetedAction::Read => (2200, 4000),
            BudgetedAction::CollectContext => (2800, 5200),
            BudgetedAction::LoadMemory => (2000, 3200),
        };
        match self {
            CompressionMode::Aggressive => Some(aggressive),
            CompressionMode::Balanced => Some(balanced),
            CompressionMode::None => None,
        }
    }

    /// An explicit cap wins over the preset.
    pub fn max_output_chars(self, action: BudgetedAction, explicit: Option<usize>) -> Option<usize> {
        explicit.or_else(|| self.default_max_output_chars(action))
    }
}

/// The `compression` block attached to responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compression {
    pub mode: CompressionMode,
    pub source_chars: usize,
    pub output_chars: usize,
    pub estimated_tokens: usize,
    pub max_output_chars: Option<usize>,
    pub truncated: bool,
    pub expand_hint: String,
}

/// Inputs for [`finalize`]; output size is measured, not supplied.
#[derive(Debug, Clone)]
pub struct CompressionSummary {
    pub mode: CompressionMode,
    pub source_chars: usize,
    pub max_output_chars: Option<usize>,
    pub truncated: bool,
    pub expand_hint: &'static str,
}

/// A payload with its envelope. Serializes as the payload's own fields
/// followed by `compression`.
#[derive(Debug, Clone, Serialize)]
pub struct Compressed<T> {
    #[serde(flatten)]
    pub payload: T,
    pub compression: Compression,
}

/// Measure `payload` and attach the envelope.
pub fn finalize<T: Serialize>(payload: T, summary: CompressionSummary) -> Compressed<T> {
    let output_chars = json_len(&payload);
    Compressed {
        compression: Compression {
            mode: summary.mode,
            source_chars: summary.source_chars,
            output_chars,
            estimated_tokens: estimate_tokens(output_chars),
            max_output_chars: summary.max_output_chars,
            truncated: summary.truncated,
            expand_hint: summary.expand_hint.to_string(),
        },
        payload,
    }
}

/// Rough token estimate: three chars per token, rounded up.
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(3)
}

/// Length in chars of the compact JSON encoding of `value`.
pub fn json_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_string(value)
        .map(|s| s.chars().count())
        .unwrap_or(0)
}

/// First `max_chars` chars followed by `...`, or `value` unchanged when it
/// already fits.
pub fn trim_with_ellipsis(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}

/// First `max_chars` chars of `value`.
pub fn take_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((cut, _)) => &value[..cut],
        None => value,
    }
}

/// Collapse whitespace runs to one space and trim both ends.
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
