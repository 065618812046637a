//! Typed error surface for the generation pipeline.

use thiserror::Error;

/// Failure modes that abort `generate`. `BuildabilityTargetMissed` is
/// deliberately absent — per the verifier contract it is a warning recorded
/// in `Stats::status`, never a propagated error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter `{field}`: {message}")]
    InvalidParameter { field: &'static str, message: String },

    #[error("numeric instability in stage {stage}")]
    NumericInstability { stage: &'static str },

    #[error("allocation of {requested_bytes} bytes failed")]
    OutOfMemory { requested_bytes: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
