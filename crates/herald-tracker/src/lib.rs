//! Remote tracker access: per-source adapters over a Jira-style REST API.
//!
//! Each configured source gets one adapter that owns the field mapping for
//! that tracker instance and normalizes its issues into `FetchedTask`
//! records. Mutations (assign / comment / transition) go through the same
//! adapter so the rest of the system never sees tracker wire shapes.

pub mod adapter;
pub mod jira_client;
pub mod retry;

pub use adapter::{JiraSourceAdapter, SourceAdapter, SourceConfig};
pub use jira_client::{JiraClient, RemoteComment};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned status {status} for {operation}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("invalid tracker response for {operation}: {detail}")]
    InvalidResponse { operation: String, detail: String },
}

#[cfg(test)]
mod tests;
