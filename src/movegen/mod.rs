//! Legal move generation.
//!
//! Generates plain moves and capture chains for one side and enforces the
//! mandatory-capture rule: whenever any capture exists, only capture chains
//! are legal.

pub mod apply;
pub mod captures;
pub mod moves;

use std::fmt;

use crate::board::{Board, Side};
use crate::error::{EngineError, Result};

pub use apply::{apply_action, apply_capture, apply_move};
pub use captures::{capture_chains, chains_from, has_capture, piece_captures, valid_captures};
pub use moves::{piece_moves, plain_moves};

/// A non-capturing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Move {
    pub const fn new(from: usize, to: usize) -> Self {
        Move { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// A single jump: `from` over `captured` onto `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capture {
    pub from: usize,
    pub to: usize,
    pub captured: usize,
}

impl Capture {
    pub const fn new(from: usize, to: usize, captured: usize) -> Self {
        Capture { from, to, captured }
    }
}

/// The jumps made by one piece in one turn. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureChain(Vec<Capture>);

impl CaptureChain {
    pub(crate) fn new(captures: Vec<Capture>) -> Self {
        debug_assert!(!captures.is_empty());
        CaptureChain(captures)
    }

    pub fn captures(&self) -> &[Capture] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Capture> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn start_cell(&self) -> usize {
        self.0[0].from
    }

    pub fn final_cell(&self) -> usize {
        self.0[self.0.len() - 1].to
    }

    pub fn captured_cells(&self) -> Vec<usize> {
        self.0.iter().map(|c| c.captured).collect()
    }
}

/// One turn: a plain move or a full capture chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Move(Move),
    Capture(CaptureChain),
}

impl Action {
    /// The visited cells: source, then every landing cell.
    pub fn path(&self) -> Vec<usize> {
        match self {
            Action::Move(mv) => vec![mv.from, mv.to],
            Action::Capture(chain) => std::iter::once(chain.start_cell())
                .chain(chain.iter().map(|c| c.to))
                .collect(),
        }
    }

    pub fn is_capture(&self) -> bool {
        matches!(self, Action::Capture(_))
    }
}

/// `20-16` for moves, `24x17x10` for capture chains.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move(mv) => write!(f, "{mv}"),
            Action::Capture(chain) => {
                write!(f, "{}", chain.start_cell())?;
                for capture in chain.iter() {
                    write!(f, "x{}", capture.to)?;
                }
                Ok(())
            }
        }
    }
}

/// All legal actions for `side`: capture chains if any exist, else plain moves.
/// An empty result is a valid terminal position, not an error.
pub fn legal_actions(board: &Board, side: Side) -> Vec<Action> {
    let chains = capture_chains(board, side);
    if !chains.is_empty() {
        return chains.into_iter().map(Action::Capture).collect();
    }
    plain_moves(board, side).into_iter().map(Action::Move).collect()
}

/// Checks that `action` is one of the legal actions for `side`.
pub fn validate_action(board: &Board, side: Side, action: &Action) -> Result<()> {
    if let Action::Move(mv) = action {
        if has_capture(board, side) {
            return Err(EngineError::IllegalMove(format!(
                "{mv}: a capture is available and must be taken"
            )));
        }
    }
    if legal_actions(board, side).contains(action) {
        Ok(())
    } else {
        Err(EngineError::IllegalMove(format!(
            "{action} is not legal for {side:?}"
        )))
    }
}

/// Resolves move text (`20-16` or `24x17x10`) against the legal set.
pub fn parse_action(board: &Board, side: Side, text: &str) -> Result<Action> {
    let text = text.trim();
    let is_capture = text.contains('x');
    let cells = text
        .split(['-', 'x'])
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| EngineError::IllegalMove(format!("malformed move text '{text}'")))
        })
        .collect::<Result<Vec<usize>>>()?;
    if cells.len() < 2 {
        return Err(EngineError::IllegalMove(format!("malformed move text '{text}'")));
    }
    if !is_capture && cells.len() == 2 && has_capture(board, side) {
        return Err(EngineError::IllegalMove(format!(
            "{text}: a capture is available and must be taken"
        )));
    }
    legal_actions(board, side)
        .into_iter()
        .find(|a| a.is_capture() == is_capture && a.path() == cells)
        .ok_or_else(|| EngineError::IllegalMove(format!("{text} is not legal for {side:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;

    #[test]
    fn initial_position_has_only_plain_moves() {
        let actions = legal_actions(&Board::initial(), Side::White);
        assert_eq!(actions.len(), 7);
        assert!(actions.iter().all(|a| !a.is_capture()));
    }

    #[test]
    fn enumeration_order_is_stable() {
        let board = Board::initial();
        let first = legal_actions(&board, Side::White);
        let second = legal_actions(&board, Side::White);
        assert_eq!(first, second);
        let froms: Vec<usize> = first.iter().map(|a| a.path()[0]).collect();
        let mut sorted = froms.clone();
        sorted.sort();
        assert_eq!(froms, sorted);
    }

    #[test]
    fn plain_move_rejected_while_capture_available() {
        let mut board = Board::empty();
        board.set(0, Piece::WhitePawn).unwrap();
        board.set(4, Piece::BlackPawn).unwrap();
        board.set(27, Piece::WhitePawn).unwrap();

        let plain = Action::Move(Move::new(27, 23));
        let err = validate_action(&board, Side::White, &plain).unwrap_err();
        assert!(matches!(err, EngineError::IllegalMove(_)));

        let legal = legal_actions(&board, Side::White);
        assert_eq!(legal.len(), 1);
        assert!(validate_action(&board, Side::White, &legal[0]).is_ok());
    }

    #[test]
    fn move_outside_legal_set_is_rejected() {
        let board = Board::initial();
        let backwards = Action::Move(Move::new(20, 24));
        assert!(validate_action(&board, Side::White, &backwards).is_err());
        let wrong_side = Action::Move(Move::new(9, 13));
        assert!(validate_action(&board, Side::White, &wrong_side).is_err());
    }

    #[test]
    fn parse_action_matches_legal_set() {
        let board = Board::initial();
        let action = parse_action(&board, Side::White, "21-17").unwrap();
        assert_eq!(action, Action::Move(Move::new(21, 17)));
        assert!(parse_action(&board, Side::White, "21-13").is_err());
        assert!(parse_action(&board, Side::White, "garbage").is_err());

        let mut board = Board::empty();
        board.set(24, Piece::WhitePawn).unwrap();
        board.set(20, Piece::BlackPawn).unwrap();
        board.set(13, Piece::BlackPawn).unwrap();
        let chain = parse_action(&board, Side::White, "24x17x10").unwrap();
        assert_eq!(chain.to_string(), "24x17x10");
        // A prefix of a chain is not a legal turn.
        assert!(parse_action(&board, Side::White, "24x17").is_err());
        assert!(parse_action(&board, Side::White, "28-24").is_err());
    }

    #[test]
    fn blocked_side_has_no_actions() {
        let mut board = Board::empty();
        board.set(0, Piece::WhitePawn).unwrap();
        assert!(legal_actions(&board, Side::White).is_empty());
        assert!(legal_actions(&board, Side::Black).is_empty());
    }
}
