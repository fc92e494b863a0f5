//! Piece and side types.
//!
//! Each cell holds one of five states, stored as a 3-bit code in the packed
//! board and on the wire.

use serde::{Deserialize, Serialize};

/// The two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Returns the single-character protocol abbreviation.
    pub const fn as_char(self) -> char {
        match self {
            Side::White => 'w',
            Side::Black => 'b',
        }
    }

    /// Parses a side from `w`/`b` or `white`/`black`.
    pub fn from_name(s: &str) -> Option<Side> {
        match s.to_ascii_lowercase().as_str() {
            "w" | "white" => Some(Side::White),
            "b" | "black" => Some(Side::Black),
            _ => None,
        }
    }

    /// Returns true if a piece of this side standing on `index` promotes.
    pub const fn is_promotion_cell(self, index: usize) -> bool {
        match self {
            Side::White => index < 4,
            Side::Black => index >= 28,
        }
    }
}

/// Contents of one playable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Piece {
    #[default]
    Empty,
    WhitePawn,
    WhiteKing,
    BlackPawn,
    BlackKing,
}

pub const ALL_PIECES: [Piece; 5] = [
    Piece::Empty,
    Piece::WhitePawn,
    Piece::WhiteKing,
    Piece::BlackPawn,
    Piece::BlackKing,
];

impl Piece {
    /// Returns the 3-bit storage code.
    pub const fn code(self) -> u32 {
        match self {
            Piece::Empty => 0,
            Piece::WhitePawn => 1,
            Piece::WhiteKing => 2,
            Piece::BlackPawn => 3,
            Piece::BlackKing => 4,
        }
    }

    /// Decodes a 3-bit storage code. Codes 5..7 are unassigned.
    pub const fn from_code(code: u32) -> Option<Piece> {
        match code {
            0 => Some(Piece::Empty),
            1 => Some(Piece::WhitePawn),
            2 => Some(Piece::WhiteKing),
            3 => Some(Piece::BlackPawn),
            4 => Some(Piece::BlackKing),
            _ => None,
        }
    }

    /// Returns the text label used by `Board::serialize`.
    pub const fn label(self) -> char {
        match self {
            Piece::Empty => '.',
            Piece::WhitePawn => 'w',
            Piece::WhiteKing => 'W',
            Piece::BlackPawn => 'b',
            Piece::BlackKing => 'B',
        }
    }

    pub fn from_label(c: char) -> Option<Piece> {
        match c {
            '.' | '-' => Some(Piece::Empty),
            'w' => Some(Piece::WhitePawn),
            'W' => Some(Piece::WhiteKing),
            'b' => Some(Piece::BlackPawn),
            'B' => Some(Piece::BlackKing),
            _ => None,
        }
    }

    pub const fn pawn(side: Side) -> Piece {
        match side {
            Side::White => Piece::WhitePawn,
            Side::Black => Piece::BlackPawn,
        }
    }

    pub const fn king(side: Side) -> Piece {
        match side {
            Side::White => Piece::WhiteKing,
            Side::Black => Piece::BlackKing,
        }
    }

    pub const fn side(self) -> Option<Side> {
        match self {
            Piece::Empty => None,
            Piece::WhitePawn | Piece::WhiteKing => Some(Side::White),
            Piece::BlackPawn | Piece::BlackKing => Some(Side::Black),
        }
    }

    pub const fn is_empty(self) -> bool {
        matches!(self, Piece::Empty)
    }

    pub const fn is_king(self) -> bool {
        matches!(self, Piece::WhiteKing | Piece::BlackKing)
    }

    pub fn belongs_to(self, side: Side) -> bool {
        self.side() == Some(side)
    }

    /// Returns the king of the same color; kings and empty cells are unchanged.
    pub const fn promoted(self) -> Piece {
        match self {
            Piece::WhitePawn => Piece::WhiteKing,
            Piece::BlackPawn => Piece::BlackKing,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for p in ALL_PIECES {
            assert_eq!(Piece::from_code(p.code()), Some(p));
        }
        for code in 5..8 {
            assert_eq!(Piece::from_code(code), None);
        }
    }

    #[test]
    fn label_roundtrip() {
        for p in ALL_PIECES {
            assert_eq!(Piece::from_label(p.label()), Some(p));
        }
        assert_eq!(Piece::from_label('x'), None);
    }

    #[test]
    fn promotion_cells() {
        assert!(Side::White.is_promotion_cell(0));
        assert!(Side::White.is_promotion_cell(3));
        assert!(!Side::White.is_promotion_cell(4));
        assert!(Side::Black.is_promotion_cell(28));
        assert!(!Side::Black.is_promotion_cell(27));
    }

    #[test]
    fn promoted_keeps_color() {
        assert_eq!(Piece::WhitePawn.promoted(), Piece::WhiteKing);
        assert_eq!(Piece::BlackPawn.promoted(), Piece::BlackKing);
        assert_eq!(Piece::BlackKing.promoted(), Piece::BlackKing);
        assert_eq!(Piece::Empty.promoted(), Piece::Empty);
    }

    #[test]
    fn side_names() {
        assert_eq!(Side::from_name("white"), Some(Side::White));
        assert_eq!(Side::from_name("B"), Some(Side::Black));
        assert_eq!(Side::from_name("red"), None);
        assert_eq!(Side::White.opponent(), Side::Black);
    }
}
