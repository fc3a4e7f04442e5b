//! Backend transport: HTTP and SSE plumbing for the chat service.

mod client;
mod errors;
mod sse;
mod types;

pub use client::{BackendClient, BackendConfig};
pub use errors::{BackendError, BackendErrorKind};
pub use sse::SseParser;
pub use types::User;
