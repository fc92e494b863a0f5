//! Capture simulator.
//!
//! Applies a single move or capture to a board, promoting pawns that land on
//! the opponent's back rank. Callers that explore alternatives copy the board
//! first; nothing here undoes a mutation.

use crate::board::{Board, Piece};

use super::{Action, Capture, Move};

/// Moves the piece on `from` to `to`, promoting on arrival.
/// Returns the piece as it stands on `to`.
fn relocate(board: &mut Board, from: usize, to: usize) -> Piece {
    let mut piece = board.at(from);
    board.put(from, Piece::Empty);
    if let Some(side) = piece.side() {
        if side.is_promotion_cell(to) {
            piece = piece.promoted();
        }
    }
    board.put(to, piece);
    piece
}

/// Applies a plain move in place.
pub fn apply_move(board: &mut Board, mv: Move) -> Piece {
    relocate(board, mv.from, mv.to)
}

/// Applies one jump in place: the jumped piece is removed immediately.
/// Returns the moving piece after any promotion.
pub fn apply_capture(board: &mut Board, capture: Capture) -> Piece {
    board.put(capture.captured, Piece::Empty);
    relocate(board, capture.from, capture.to)
}

/// Returns a copy of `board` with `action` played.
pub fn apply_action(board: &Board, action: &Action) -> Board {
    let mut next = *board;
    match action {
        Action::Move(mv) => {
            apply_move(&mut next, *mv);
        }
        Action::Capture(chain) => {
            for capture in chain.iter() {
                apply_capture(&mut next, *capture);
            }
        }
    }
    next
}
