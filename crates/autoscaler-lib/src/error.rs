//! Error taxonomy for cluster-facing operations
//!
//! The control loop never exits on any of these; callers log at warn/info
//! and carry on with the next task, application, or tick.

use thiserror::Error;

/// Errors surfaced by the cluster client and the sampling path.
#[derive(Debug, Error)]
pub enum AutoscalerError {
    #[error("transport failure talking to the cluster: {0}")]
    Network(#[source] reqwest::Error),

    #[error("malformed response from the cluster: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unexpected http status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("no statistics entry for task {0}")]
    TaskNotFound(String),

    #[error("label {name} does not hold a valid {expected}: {value:?}")]
    InvalidLabel {
        name: String,
        expected: &'static str,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, AutoscalerError>;
