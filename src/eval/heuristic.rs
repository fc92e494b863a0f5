//! Heuristic position evaluation.
//!
//! Sums, per piece, a material weight plus two positional terms: pawn
//! advancement toward the promotion row and a penalty for distance from the
//! board center. White pieces count positively and Black negatively; the
//! total is then amplified in the endgame and signed for the requested side.
//!
//! All arithmetic is integer, carried in `i64` and clamped to
//! `±i32::MAX` at the end. Divisions truncate toward zero, which keeps
//! `evaluate(b, White) == -evaluate(b, Black)` exact.

use serde::{Deserialize, Serialize};

use crate::board::{col_of, row_of, Board, Piece, Side, CELL_COUNT};

/// Divisor applied to `granularity * rows_advanced`.
const ADVANCEMENT_DIVISOR: i32 = 4;
/// Divisor applied to `granularity * center_distance`.
const CENTER_DIVISOR: i32 = 6;
/// Positions with fewer pieces than this are scored ×3/2.
const ENDGAME_PIECES: usize = 10;
/// Largest granularity a configuration may ask for.
pub const MAX_GRANULARITY: i32 = 10_000;

/// Relative worth of a pawn and a king.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialScale {
    /// Pawn 1, king 3.
    #[default]
    OneToThree,
    /// Pawn 2, king 5.
    TwoToFive,
}

impl MaterialScale {
    /// Returns (pawn, king) weights.
    pub const fn weights(self) -> (i32, i32) {
        match self {
            MaterialScale::OneToThree => (1, 3),
            MaterialScale::TwoToFive => (2, 5),
        }
    }
}

/// Tunable evaluation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalParams {
    pub granularity: i32,
    pub material: MaterialScale,
}

impl Default for EvalParams {
    fn default() -> Self {
        EvalParams {
            granularity: 100,
            material: MaterialScale::default(),
        }
    }
}

/// Manhattan distance from the four center squares, in whole steps (1..=7).
#[inline]
fn center_distance(index: usize) -> i32 {
    let r = row_of(index) as i32;
    let c = col_of(index) as i32;
    ((2 * r - 7).abs() + (2 * c - 7).abs()) / 2
}

/// Rows a pawn has travelled from its own back rank.
#[inline]
fn rows_advanced(index: usize, side: Side) -> i32 {
    let r = row_of(index) as i32;
    match side {
        Side::White => 7 - r,
        Side::Black => r,
    }
}

/// Unsigned value of one piece on `index`.
fn piece_value(piece: Piece, index: usize, side: Side, params: &EvalParams) -> i64 {
    let g = i64::from(params.granularity);
    let (pawn, king) = params.material.weights();
    let mut value = if piece.is_king() {
        i64::from(king) * g
    } else {
        i64::from(pawn) * g
    };
    if !piece.is_king() {
        value += g * i64::from(rows_advanced(index, side)) / i64::from(ADVANCEMENT_DIVISOR);
    }
    value -= g * i64::from(center_distance(index)) / i64::from(CENTER_DIVISOR);
    value
}

fn white_total(board: &Board, params: &EvalParams) -> i64 {
    let mut total = 0i64;
    for index in 0..CELL_COUNT {
        let piece = board.at(index);
        match piece.side() {
            Some(Side::White) => total += piece_value(piece, index, Side::White, params),
            Some(Side::Black) => total -= piece_value(piece, index, Side::Black, params),
            None => {}
        }
    }
    total
}

#[inline]
fn clamp_score(value: i64) -> i32 {
    value.clamp(-i64::from(i32::MAX), i64::from(i32::MAX)) as i32
}

/// Score from White's point of view before the endgame amplifier.
pub fn raw_score(board: &Board, params: &EvalParams) -> i32 {
    clamp_score(white_total(board, params))
}

/// Scores `board` from `for_side`'s perspective.
pub fn evaluate(board: &Board, for_side: Side, params: &EvalParams) -> i32 {
    let mut total = white_total(board, params);
    if board.piece_count() < ENDGAME_PIECES {
        total = total * 3 / 2;
    }
    match for_side {
        Side::White => clamp_score(total),
        Side::Black => clamp_score(-total),
    }
}
