//! One-shot send command.

use anyhow::{Context, Result};

use crate::backend::{BackendClient, BackendConfig};
use crate::config::{Config, paths};
use crate::core::ingest::{StreamOutcome, create_event_channel};
use crate::core::interrupt::InterruptedError;
use crate::core::session::ChatSession;

/// Sends a single message and streams the response to stdout.
pub async fn run(config: &Config, message: &str) -> Result<()> {
    let backend = BackendConfig::from_config(config)?;
    let client = BackendClient::new(backend)?;
    let mut session = ChatSession::new(client);

    if session.connect().await.context("reach backend")?.is_none() {
        anyhow::bail!(
            "Not signed in. Set session_cookie in {} or pass --session-cookie.",
            paths::config_path().display()
        );
    }

    let (tx, rx) = create_event_channel();
    let (result, ()) = tokio::join!(session.send_message(message, tx), super::chat::render_stream(rx));

    match result? {
        StreamOutcome::Completed => Ok(()),
        StreamOutcome::Cancelled => Err(InterruptedError.into()),
    }
}
