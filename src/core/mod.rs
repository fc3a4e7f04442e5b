//! Engine modules: channel events, the transcript fold, stream ingestion,
//! and session state.

pub mod events;
pub mod ingest;
pub mod interrupt;
pub mod session;
pub mod transcript;
