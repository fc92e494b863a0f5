//! Capture and capture-chain generation.
//!
//! Pawns jump an adjacent enemy in any of the four diagonals. Kings slide
//! over empty cells and may jump the first enemy piece met, landing on the
//! cell directly behind it. A chain keeps going while the moved piece has a
//! capture from its landing cell; every maximal chain is reported.
//!
//! Chain enumeration copies the board per branch, so sibling branches never
//! observe each other's removals.

use crate::board::{neighbor, ray, Board, Piece, Side, ALL_DIRECTIONS, CELL_COUNT};

use super::apply::apply_capture;
use super::{Capture, CaptureChain};

/// Single captures available to `piece` standing on `index`, in direction order.
pub fn piece_captures(board: &Board, index: usize, piece: Piece) -> Vec<Capture> {
    let Some(side) = piece.side() else {
        return Vec::new();
    };
    let enemy = side.opponent();
    let mut captures = Vec::new();

    for dir in ALL_DIRECTIONS {
        let target = if piece.is_king() {
            // First occupied cell along the diagonal.
            ray(index, dir).find(|&cell| !board.at(cell).is_empty())
        } else {
            neighbor(index, dir)
        };
        let Some(target) = target else {
            continue;
        };
        if !board.at(target).belongs_to(enemy) {
            continue;
        }
        if let Some(landing) = neighbor(target, dir) {
            if board.at(landing).is_empty() {
                captures.push(Capture::new(index, landing, target));
            }
        }
    }
    captures
}

/// First-step captures for every piece of `side`, ascending by source index.
pub fn valid_captures(board: &Board, side: Side) -> Vec<Capture> {
    let mut captures = Vec::new();
    for index in 0..CELL_COUNT {
        let piece = board.at(index);
        if piece.belongs_to(side) {
            captures.extend(piece_captures(board, index, piece));
        }
    }
    captures
}

/// Returns true if `side` has at least one capture.
pub fn has_capture(board: &Board, side: Side) -> bool {
    (0..CELL_COUNT).any(|index| {
        let piece = board.at(index);
        piece.belongs_to(side) && !piece_captures(board, index, piece).is_empty()
    })
}

/// Every maximal capture chain for `side`.
pub fn capture_chains(board: &Board, side: Side) -> Vec<CaptureChain> {
    let mut chains = Vec::new();
    let mut path = Vec::new();
    for index in 0..CELL_COUNT {
        let piece = board.at(index);
        if piece.belongs_to(side) {
            extend_chain(board, index, piece, &mut path, &mut chains);
        }
    }
    chains
}

/// Maximal capture chains starting from the piece on `index`.
pub fn chains_from(board: &Board, index: usize) -> Vec<CaptureChain> {
    let mut chains = Vec::new();
    let mut path = Vec::new();
    extend_chain(board, index, board.at(index), &mut path, &mut chains);
    chains
}

fn extend_chain(
    board: &Board,
    index: usize,
    piece: Piece,
    path: &mut Vec<Capture>,
    out: &mut Vec<CaptureChain>,
) {
    let captures = piece_captures(board, index, piece);
    if captures.is_empty() {
        if !path.is_empty() {
            out.push(CaptureChain::new(path.clone()));
        }
        return;
    }

    for capture in captures {
        let mut next = *board;
        let landed = apply_capture(&mut next, capture);
        path.push(capture);
        extend_chain(&next, capture.to, landed, path, out);
        path.pop();
    }
}
