//! Application layer for casegen.
//!
//! Coordinates generation sessions, the version history and the history
//! backend for each requirement.

pub mod document_controller;
pub mod document_service;

pub use document_controller::{DEFAULT_CONFIRMATION, DocumentController, ExchangeOutcome};
pub use document_service::DocumentService;
