//! Plain (non-capturing) move generation.

use crate::board::{neighbor, Board, Piece, Side, ALL_DIRECTIONS, CELL_COUNT};

use super::Move;

/// Returns true if a piece may step in a direction without capturing.
/// Pawns only advance toward the opponent's back rank; kings go anywhere.
#[inline]
fn may_step(piece: Piece, up: bool) -> bool {
    match piece {
        Piece::WhitePawn => up,
        Piece::BlackPawn => !up,
        Piece::WhiteKing | Piece::BlackKing => true,
        Piece::Empty => false,
    }
}

/// Plain moves for the piece on `index`, in direction order.
pub fn piece_moves(board: &Board, index: usize) -> Vec<Move> {
    let piece = board.at(index);
    ALL_DIRECTIONS
        .iter()
        .filter(|dir| may_step(piece, dir.is_up()))
        .filter_map(|&dir| neighbor(index, dir))
        .filter(|&to| board.at(to).is_empty())
        .map(|to| Move::new(index, to))
        .collect()
}

/// All plain moves for `side`, ascending by source index then direction.
pub fn plain_moves(board: &Board, side: Side) -> Vec<Move> {
    let mut moves = Vec::new();
    for index in 0..CELL_COUNT {
        if board.at(index).belongs_to(side) {
            moves.extend(piece_moves(board, index));
        }
    }
    moves
}
