//! Error taxonomy for the IR pipeline.
//!
//! `MalformedIr` is fatal and aborts the current pass. `UnsupportedIr` is
//! reserved for passes with no safe conservative fallback; most passes
//! instead widen/kill affected destinations and never construct this
//! variant. `AnalysisFailure` signals a worklist that failed to converge
//! within its iteration bound, which indicates a bug in the transfer
//! function rather than a property of the input program.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TacError {
    #[error("malformed IR: {0}")]
    MalformedIr(String),

    #[error("unsupported IR construct: {0}")]
    UnsupportedIr(String),

    #[error("analysis did not converge: {0}")]
    AnalysisFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TacError>;
