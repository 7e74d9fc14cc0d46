//! HTTP API surface.
//!
//! A thin boundary over the orchestrator: request validation, the
//! `{success, data|error, message}` envelope, and error mapping. All real
//! behavior lives in the workflow, generator and scoring modules.

pub mod routes;
pub mod types;

pub use routes::{serve, AppState};
