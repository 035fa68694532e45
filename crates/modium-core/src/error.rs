//! Error types for Modium.
//!
//! Timeouts on raced bridge calls and empty listings are deliberately not
//! represented here: a timeout means the answer arrives out-of-band and an
//! empty record set is a valid outcome. Both stay in the `Option`/`Vec`
//! domain of their call sites.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No DevTools endpoint found: {0}")]
    EndpointNotFound(String),

    #[error("No page target found at the DevTools endpoint")]
    NoTargetFound,

    #[error("Evaluation failed in page context: {0}")]
    EvaluationFailed(String),

    #[error("No invoke token captured yet")]
    NoToken,

    #[error("DevTools transport error: {0}")]
    Transport(String),

    #[error("Callback handle already registered: {0}")]
    HandleInUse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
