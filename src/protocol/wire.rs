//! RPC wire format.
//!
//! Messages are JSON objects, one per line. Each request carries a numeric
//! `id` that the matching response echoes, so one connection can carry many
//! concurrent calls.
//!
//! Boards travel as three unsigned 32-bit words, 3 bits per cell, cell `i`
//! at bit `3i` of the little-endian 96-bit concatenation (the layout of
//! [`Board`]). Codes: 0 empty, 1 white pawn, 2 white king, 3 black pawn,
//! 4 black king. Codes 5..7 are rejected on decode.

use std::io::{BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::board::{Board, Side};
use crate::error::{EngineError, Result};

/// A board in wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireBoard(pub [u32; 3]);

impl From<&Board> for WireBoard {
    fn from(board: &Board) -> Self {
        WireBoard(board.words())
    }
}

impl TryFrom<WireBoard> for Board {
    type Error = EngineError;

    fn try_from(wire: WireBoard) -> Result<Board> {
        Board::from_words(wire.0)
    }
}

/// A task handed to a pull worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    pub board: WireBoard,
    pub depth: u32,
    pub side: Side,
    pub is_maximizing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    RegisterWorker {
        worker_id: String,
        max_depth: u32,
    },
    /// Static evaluation of `board` for the maximizing player.
    EvaluatePosition {
        board: WireBoard,
        side: Side,
        is_maximizing: bool,
    },
    GetTask {
        worker_id: String,
    },
    SubmitResult {
        task_id: String,
        score: i32,
    },
    /// A pull worker gives up on a task it was assigned.
    ReportFailure {
        task_id: String,
        message: String,
    },
    /// Minimax score of `board` with `side` to move, `depth` plies deep.
    MinimaxSearch {
        board: WireBoard,
        depth: u32,
        side: Side,
        is_maximizing: bool,
    },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::RegisterWorker { .. } => "register_worker",
            Request::EvaluatePosition { .. } => "evaluate_position",
            Request::GetTask { .. } => "get_task",
            Request::SubmitResult { .. } => "submit_result",
            Request::ReportFailure { .. } => "report_failure",
            Request::MinimaxSearch { .. } => "minimax_search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Ack { success: bool },
    Evaluation { success: bool, score: i32 },
    Task { task: Option<TaskSpec> },
    Score { score: i32 },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(flatten)]
    pub response: Response,
}

/// Writes one message followed by a newline and flushes.
pub fn write_frame<W: Write, T: Serialize>(out: &mut W, message: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Reads one message. Returns `Ok(None)` at end of stream; blank lines are skipped.
pub fn read_frame<R: BufRead, T: DeserializeOwned>(input: &mut R) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }
    serde_json::from_str(line.trim())
        .map(Some)
        .map_err(|e| EngineError::Protocol(format!("malformed frame: {e}")))
}
