//! Conversation transcript state and the event fold.
//!
//! [`Transcript::apply`] is the single mutation point for turn content: the
//! ingest loop feeds it one [`ChatEvent`] at a time, in arrival order. It
//! performs no I/O and keeps no state besides the transcript itself, so the
//! fold is unit-testable in isolation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::events::ChatEvent;

/// Opaque turn identifier, ordered by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Who contributed a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One unit of turn content.
///
/// A `ToolResult` follows the `ToolUse` that produced it, but the two are
/// associated only by tool name and position; the wire records carry no
/// shared identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// A run of generated text. While `is_streaming` is true more deltas may
    /// still land here; once cleared the block never reopens.
    Text { content: String, is_streaming: bool },

    /// A request to call an external tool.
    ToolUse { tool_name: String, tool_input: Value },

    /// The outcome of a tool invocation.
    ToolResult {
        tool_name: String,
        tool_input: Value,
        tool_result: Value,
    },
}

impl Block {
    pub fn is_text(&self) -> bool {
        matches!(self, Block::Text { .. })
    }
}

/// One participant contribution to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub blocks: Vec<Block>,
    /// True while the turn may still receive events.
    pub pending: bool,
    /// Error annotation accumulated from terminal failures.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Turn {
    fn new(id: TurnId, role: Role, pending: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            role,
            blocks: Vec::new(),
            pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Concatenated text content of the turn, for display.
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for block in &self.blocks {
            if let Block::Text { content, .. } = block {
                parts.push(content.as_str());
            }
        }
        parts.join("\n\n")
    }

    /// Appends a delta to the open text block, or opens a new one.
    ///
    /// The target is the last text block regardless of what follows it, so a
    /// delta arriving after a tool block continues the same run of text.
    fn append_text(&mut self, content: &str, finalize: bool) {
        if let Some(Block::Text {
            content: existing,
            is_streaming,
        }) = self.blocks.iter_mut().rev().find(|b| b.is_text())
            && *is_streaming
        {
            existing.push_str(content);
            if finalize {
                *is_streaming = false;
            }
            return;
        }
        self.blocks.push(Block::Text {
            content: content.to_owned(),
            is_streaming: !finalize,
        });
    }

    fn finalize_text_blocks(&mut self) {
        for block in &mut self.blocks {
            if let Block::Text { is_streaming, .. } = block {
                *is_streaming = false;
            }
        }
    }

    fn push_error(&mut self, message: &str) {
        match &mut self.error {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(message);
            }
            None => self.error = Some(message.to_owned()),
        }
    }
}

/// Ordered conversation history plus the explicit active-turn reference.
///
/// The transcript only grows during a session. Events always target the
/// turn named by `active`, never the positional last element, so a stale
/// event cannot corrupt a newer turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
    active: Option<TurnId>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The turn currently receiving events, if any.
    pub fn active_turn(&self) -> Option<&Turn> {
        let id = self.active?;
        self.turns.iter().find(|t| t.id == id)
    }

    /// Appends a completed user turn carrying a single text block.
    pub fn push_user(&mut self, text: &str) -> TurnId {
        let id = self.next_turn_id();
        let mut turn = Turn::new(id, Role::User, false);
        turn.blocks.push(Block::Text {
            content: text.to_owned(),
            is_streaming: false,
        });
        self.turns.push(turn);
        id
    }

    /// Appends an empty pending assistant turn and makes it the active one.
    pub fn begin_assistant(&mut self) -> TurnId {
        let id = self.next_turn_id();
        self.turns.push(Turn::new(id, Role::Assistant, true));
        self.active = Some(id);
        id
    }

    /// Folds one event into the active turn.
    ///
    /// A no-op when no active turn exists; events that race past the end of
    /// a conversation are dropped rather than guessed at.
    pub fn apply(&mut self, event: &ChatEvent) {
        let Some(turn) = self.active_turn_mut() else {
            return;
        };

        match event {
            ChatEvent::InitResponse { content } => {
                turn.append_text(content, false);
                turn.pending = true;
            }
            ChatEvent::FinalResponse { content } => {
                turn.append_text(content, true);
            }
            ChatEvent::ToolUse {
                tool_name,
                tool_input,
            } => {
                turn.blocks.push(Block::ToolUse {
                    tool_name: tool_name.clone(),
                    tool_input: tool_input.clone(),
                });
            }
            ChatEvent::ToolResult {
                tool_name,
                tool_input,
                tool_result,
            } => {
                turn.blocks.push(Block::ToolResult {
                    tool_name: tool_name.clone(),
                    tool_input: tool_input.clone(),
                    tool_result: tool_result.clone(),
                });
            }
            ChatEvent::Close => {
                turn.finalize_text_blocks();
                turn.pending = false;
            }
            ChatEvent::Error { message } => {
                turn.push_error(message);
                turn.pending = false;
            }
        }

        turn.updated_at = Utc::now();
    }

    fn active_turn_mut(&mut self) -> Option<&mut Turn> {
        let id = self.active?;
        self.turns.iter_mut().find(|t| t.id == id)
    }

    fn next_turn_id(&mut self) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        id
    }
}
