// Dispatch data types: how a message is delivered and what came of it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::evaluator::EvaluationResult;

/// Default cap on the quoted input text inside a message body, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 3000;

/// How a notification leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Post through the external tool server
    Live,
    /// Format and log only; no external I/O
    DryRun,
    /// Skip the transport and fabricate a successful delivery
    Simulation,
}

impl DeliveryMode {
    /// Collapse the configuration flags. Dry-run wins over simulation.
    pub fn from_flags(dry_run: bool, use_simulation: bool) -> Self {
        match (dry_run, use_simulation) {
            (true, _) => Self::DryRun,
            (false, true) => Self::Simulation,
            (false, false) => Self::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::DryRun => "dry-run",
            Self::Simulation => "simulation",
        })
    }
}

/// A message ready to be handed to the dispatch client. Consumed once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub channel: String,
    pub body: String,
    pub mode: DeliveryMode,
}

impl NotificationRequest {
    pub fn new(channel: impl Into<String>, body: impl Into<String>, mode: DeliveryMode) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
            mode,
        }
    }

    /// Build the alert for an evaluation.
    pub fn for_evaluation(
        result: &EvaluationResult,
        channel: impl Into<String>,
        mode: DeliveryMode,
        max_chars: usize,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self::new(channel, format_body(result, max_chars, detected_at), mode)
    }
}

/// Render the message body: headline, matched signals, quoted text, timestamp.
pub fn format_body(result: &EvaluationResult, max_chars: usize, detected_at: DateTime<Utc>) -> String {
    let headline = if result.is_urgent() {
        format!(":rotating_light: *URGENT* (urgency {:.2})", result.score())
    } else {
        format!(":information_source: *Notice* (urgency {:.2})", result.score())
    };

    let names = result.matched_names();
    let signals = if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    };

    let quoted: String = truncate_chars(result.text().trim(), max_chars)
        .lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{headline}\nSignals: {signals}\n{quoted}\n_Detected {}_",
        detected_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Why a dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    DestinationNotFound,
    Permission,
    Transport,
    Timeout,
}

/// Terminal result of one dispatch. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub mode: DeliveryMode,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DispatchOutcome {
    pub fn delivered(channel: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            success: true,
            mode: DeliveryMode::Live,
            channel: channel.into(),
            error: None,
            message_id,
            detail: None,
        }
    }

    pub fn dry_run(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            mode: DeliveryMode::DryRun,
            channel: channel.into(),
            error: None,
            message_id: None,
            detail: None,
        }
    }

    pub fn simulated(channel: impl Into<String>, message_id: String) -> Self {
        Self {
            success: true,
            mode: DeliveryMode::Simulation,
            channel: channel.into(),
            error: None,
            message_id: Some(message_id),
            detail: None,
        }
    }

    pub fn failed(channel: impl Into<String>, kind: DispatchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            mode: DeliveryMode::Live,
            channel: channel.into(),
            error: Some(kind),
            message_id: None,
            detail: Some(detail.into()),
        }
    }
}
