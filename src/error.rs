//! Engine-wide error type.
//!
//! Board and generator contract violations, remote-evaluation failures and
//! coordinator bookkeeping errors all surface through [`EngineError`].

use thiserror::Error;

/// Errors produced by the board store, move generator, search and the
/// distributed evaluation path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cell index {0} out of range 0..32")]
    IndexOutOfRange(usize),

    #[error("invalid piece code {code} at cell {index}")]
    InvalidPieceCode { index: usize, code: u32 },

    #[error("invalid board: {0}")]
    Validation(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("worker {addr} unavailable: {reason}")]
    WorkerUnavailable { addr: String, reason: String },

    #[error("duplicate task id {0}")]
    DuplicateTask(String),

    #[error("unknown task id {0}")]
    UnknownTask(String),

    #[error("no workers configured")]
    NoWorkers,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn unavailable(addr: impl Into<String>, reason: impl ToString) -> Self {
        EngineError::WorkerUnavailable {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for board-shape errors (bad index, bad code, bad text).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::IndexOutOfRange(_)
                | EngineError::InvalidPieceCode { .. }
                | EngineError::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
