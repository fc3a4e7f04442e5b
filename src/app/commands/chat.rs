//! Interactive chat command.
//!
//! Provides a REPL-style chat interface on stdin/stdout. Responses are
//! streamed chunk-by-chunk for real-time feedback; tool activity renders as
//! single summary lines between text.

use std::io::Write;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::backend::{BackendClient, BackendConfig};
use crate::config::{Config, paths};
use crate::core::events::ChatEvent;
use crate::core::ingest::{ChatEventRx, StreamOutcome, create_event_channel};
use crate::core::session::ChatSession;

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "you> ";
const ASSISTANT_PREFIX: &str = "assistant> ";

/// Widest a tool input/result renders before truncation.
const TOOL_SUMMARY_MAX_CHARS: usize = 120;

/// Runs the interactive chat loop on stdin/stdout.
///
/// Exits on `:q` or EOF. Ctrl+C interrupts the in-flight response without
/// leaving the loop.
pub async fn run(config: &Config) -> Result<()> {
    use std::io::BufRead;

    let backend = BackendConfig::from_config(config)?;
    let client = BackendClient::new(backend)?;
    let mut session = ChatSession::new(client);

    let mut stdout = std::io::stdout();

    match session.connect().await.context("reach backend")? {
        Some(user) => {
            writeln!(
                stdout,
                "rill chat - signed in as {} ({} to quit)",
                user.username, QUIT_COMMAND
            )?;
        }
        None => {
            anyhow::bail!(
                "Not signed in. Set session_cookie in {} or pass --session-cookie.",
                paths::config_path().display()
            );
        }
    }

    write!(stdout, "{PROMPT_PREFIX}")?;
    stdout.flush()?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        // Handle quit command
        if trimmed == QUIT_COMMAND {
            writeln!(stdout, "Goodbye!")?;
            break;
        }

        // Skip empty lines
        if trimmed.is_empty() {
            write!(stdout, "{PROMPT_PREFIX}")?;
            stdout.flush()?;
            continue;
        }

        let (tx, rx) = create_event_channel();
        let (result, ()) = tokio::join!(session.send_message(trimmed, tx), render_stream(rx));

        match result {
            Ok(StreamOutcome::Completed) => {}
            Ok(StreamOutcome::Cancelled) => {
                writeln!(stdout)?;
                writeln!(stdout, "(interrupted)")?;
            }
            Err(e) => {
                writeln!(stdout, "Error: {e:#}")?;
            }
        }

        write!(stdout, "{PROMPT_PREFIX}")?;
        stdout.flush()?;
    }

    Ok(())
}

/// Renders published events until the channel closes.
///
/// Terminal errors are not printed here; the send result carries them and
/// the caller reports each failure exactly once.
pub(super) async fn render_stream(mut rx: ChatEventRx) {
    let mut stdout = std::io::stdout();
    let mut mid_line = false;

    while let Some(event) = rx.recv().await {
        match event.as_ref() {
            ChatEvent::InitResponse { content } | ChatEvent::FinalResponse { content } => {
                if !content.is_empty() {
                    if !mid_line {
                        let _ = write!(stdout, "{ASSISTANT_PREFIX}");
                        mid_line = true;
                    }
                    let _ = write!(stdout, "{content}");
                    let _ = stdout.flush();
                }
            }
            ChatEvent::ToolUse {
                tool_name,
                tool_input,
            } => {
                mid_line = end_line(&mut stdout, mid_line);
                let _ = writeln!(stdout, "⚙ {} {}", tool_name, summarize(tool_input));
            }
            ChatEvent::ToolResult {
                tool_name,
                tool_result,
                ..
            } => {
                mid_line = end_line(&mut stdout, mid_line);
                let _ = writeln!(stdout, "⚙ {} -> {}", tool_name, summarize(tool_result));
            }
            ChatEvent::Close | ChatEvent::Error { .. } => {
                mid_line = end_line(&mut stdout, mid_line);
            }
        }
    }
}

fn end_line(stdout: &mut std::io::Stdout, mid_line: bool) -> bool {
    if mid_line {
        let _ = writeln!(stdout);
    }
    false
}

/// One-line rendering of an opaque tool payload.
fn summarize(value: &Value) -> String {
    let text = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= TOOL_SUMMARY_MAX_CHARS {
        return text;
    }
    let mut truncated: String = text.chars().take(TOOL_SUMMARY_MAX_CHARS).collect();
    truncated.push('…');
    truncated
}
