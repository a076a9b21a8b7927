//! Error taxonomy.
//!
//! Geocoding and capacity errors stay inside their components: the resolver
//! collapses `GeocodeError` to "no coordinate" and the planner turns
//! `CapacityError` into a fail-closed snapshot. `Error` covers the plumbing
//! around them (files, directory data, CLI input).

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("http request failed: {0}")]
    Http(String),
    #[error("provider returned status {0}")]
    Status(String),
    #[error("malformed provider response: {0}")]
    Parse(String),
    #[error("geocode timed out after {0}s")]
    Timeout(u64),
    #[error("zip database: {0}")]
    Io(#[from] io::Error),
    #[error("geocode task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("capacity backend: {0}")]
    Backend(String),
    #[error("invalid date range {from}..{to}")]
    InvalidRange { from: String, to: String },
    #[error("capacity file: {0}")]
    Io(#[from] io::Error),
    #[error("capacity data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("zip directory: {0}")]
    Directory(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
