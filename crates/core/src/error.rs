use crate::domain::property::PropertyId;
use thiserror::Error;

// Source failures are not represented here: a loader that errors or times out is recovered
// locally and only shows up as a degraded `SourceStatus` in the result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("subject property not found: {0}")]
    SubjectNotFound(PropertyId),

    #[error("subject lookup failed: {0:#}")]
    Repository(anyhow::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
