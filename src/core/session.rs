//! Chat session state.
//!
//! [`ChatSession`] is the explicit context object tying together the backend
//! client, the signed-in user, and the transcript. The user is resolved once
//! at connect and consulted to gate sends; the transcript is owned
//! exclusively here and mutated only through the ingest loop's fold.

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, BackendError, User};
use crate::core::ingest::{self, ChatEventTx, EventSender, StreamOutcome};
use crate::core::interrupt;
use crate::core::transcript::Transcript;

pub struct ChatSession {
    client: BackendClient,
    transcript: Transcript,
    user: Option<User>,
    streaming: bool,
}

impl ChatSession {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            transcript: Transcript::new(),
            user: None,
            streaming: false,
        }
    }

    /// Fetch-on-start: resolves the signed-in user from the backend.
    ///
    /// Returns `None` when the backend reports signed out; sends stay gated
    /// until a later `connect` succeeds.
    pub async fn connect(&mut self) -> Result<Option<&User>, BackendError> {
        self.user = self.client.current_user().await?;
        Ok(self.user.as_ref())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Teardown: forgets the signed-in user (e.g. after a backend logout).
    pub fn clear_user(&mut self) {
        self.user = None;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Sends one user message and streams the response into the transcript.
    ///
    /// The stream's cancellation token is registered with the interrupt
    /// handler for the duration, so Ctrl+C interrupts this exchange only.
    pub async fn send_message(&mut self, text: &str, tx: ChatEventTx) -> Result<StreamOutcome> {
        let cancel = CancellationToken::new();
        interrupt::register(&cancel);
        let result = self.send_message_with_cancel(text, tx, &cancel).await;
        interrupt::clear();
        result
    }

    /// Like [`send_message`](Self::send_message), with a caller-owned
    /// cancellation handle.
    pub async fn send_message_with_cancel(
        &mut self,
        text: &str,
        tx: ChatEventTx,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Message is empty");
        }
        if self.streaming {
            bail!("A response stream is still open; wait for it or interrupt it first");
        }
        if self.user.is_none() {
            bail!("Not signed in; set session_cookie in the config or pass --session-cookie");
        }

        self.transcript.push_user(text);
        self.transcript.begin_assistant();

        self.streaming = true;
        let sender = EventSender::new(tx);
        let result =
            ingest::run_stream(&self.client, text, &mut self.transcript, cancel, &sender).await;
        self.streaming = false;
        result
    }
}
