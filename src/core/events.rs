//! Channel event types for streaming chat.
//!
//! This module defines the contract between the stream ingestor and the
//! transcript fold. Events are serializable for future JSON output mode
//! support.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events folded into the transcript.
///
/// The first four variants mirror the backend's wire records one-to-one.
/// `Close` and `Error` never appear on the wire; the ingestor synthesizes
/// them when the channel ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental text chunk; more may follow for the same block.
    InitResponse {
        #[serde(default)]
        content: String,
    },

    /// Final text chunk; closes the text block it lands in.
    FinalResponse {
        #[serde(default)]
        content: String,
    },

    /// The agent invoked a tool.
    ToolUse {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        tool_input: Value,
    },

    /// Outcome of a prior tool invocation.
    ToolResult {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        tool_input: Value,
        #[serde(default)]
        tool_result: Value,
    },

    /// Synthetic: the channel closed normally.
    Close,

    /// Synthetic: the channel failed (open or mid-stream).
    Error { message: String },
}

/// Parses one frame payload into a [`ChatEvent`].
///
/// Returns `Ok(None)` for payloads that are not objects or carry an
/// unrecognized `type`; those are skipped so newer backends can add record
/// types without breaking older clients. Malformed JSON is an error; the
/// caller drops the frame and keeps the stream alive.
pub fn parse_frame(data: &str) -> Result<Option<ChatEvent>, serde_json::Error> {
    let value: Value = serde_json::from_str(data)?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Ok(None);
    };
    match kind {
        "init_response" | "final_response" | "tool_use" | "tool_result" => {
            serde_json::from_value(value).map(Some)
        }
        _ => Ok(None),
    }
}
