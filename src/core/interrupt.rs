//! Ctrl+C handling.
//!
//! The handler cancels whichever stream token is currently registered, so an
//! interrupt lands as an explicit cancellation check in the ingest loop
//! rather than as control flow. With no token registered (or on a second
//! Ctrl+C while one stream winds down) the process exits with 130.

use std::fmt;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

static ACTIVE: Mutex<Option<CancellationToken>> = Mutex::new(None);

/// Marker error for an interrupted one-shot run (exit code 130).
#[derive(Debug)]
pub struct InterruptedError;

impl fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler. Call once at startup.
pub fn init() {
    ctrlc::set_handler(|| {
        if !cancel_active() {
            std::process::exit(130);
        }
    })
    .expect("Error setting Ctrl+C handler");
}

/// Registers the token the next Ctrl+C should cancel.
pub fn register(token: &CancellationToken) {
    let mut active = ACTIVE.lock().expect("interrupt registry poisoned");
    *active = Some(token.clone());
}

/// Clears the registered token once its stream resolves.
pub fn clear() {
    let mut active = ACTIVE.lock().expect("interrupt registry poisoned");
    active.take();
}

/// Cancels and unregisters the active token. Returns false if none was
/// registered.
pub fn cancel_active() -> bool {
    let token = {
        let mut active = ACTIVE.lock().expect("interrupt registry poisoned");
        active.take()
    };
    match token {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    }
}
