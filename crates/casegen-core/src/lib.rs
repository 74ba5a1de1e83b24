//! Domain layer for casegen.
//!
//! Holds the document history store, the chat transcript, the protocol frame
//! types and the traits the outer layers implement (`StreamTransport`,
//! `HistoryRepository`).

pub mod chat;
pub mod config;
pub mod error;
pub mod frame;
pub mod generation;
pub mod requirement;
pub mod version;

// Re-export common error type
pub use error::{CasegenError, Result};
pub use requirement::{RequirementDetails, RequirementRef};
