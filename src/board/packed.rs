//! Bit-packed board store.
//!
//! 32 cells × 3 bits = 96 bits, held in three `u32` words. Cell `i` occupies
//! bits `3i..3i+3` of the little-endian concatenation `w0 | w1 << 32 | w2 << 64`.
//! Cells 10 (bits 30..33) and 21 (bits 63..66) straddle a word boundary and
//! are read and written in two halves.
//!
//! The in-memory layout is identical to the wire layout, so encoding a board
//! for transmission is a copy of the three words.

use std::fmt;

use super::piece::{Piece, Side};
use super::square::{col_of, row_of, CELL_COUNT};
use crate::error::{EngineError, Result};

const BITS_PER_CELL: usize = 3;
const CELL_MASK: u32 = 0b111;

/// A checkers position: the contents of the 32 playable cells.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    words: [u32; 3],
}

impl Board {
    /// Creates a board with every cell empty.
    pub const fn empty() -> Self {
        Board { words: [0; 3] }
    }

    /// Creates the standard opening position: Black on cells 0..12,
    /// White on cells 20..32.
    pub fn initial() -> Self {
        let mut board = Board::empty();
        for i in 0..12 {
            board.put(i, Piece::BlackPawn);
        }
        for i in 20..CELL_COUNT {
            board.put(i, Piece::WhitePawn);
        }
        board
    }

    /// Builds a board from raw packed words, rejecting unassigned codes.
    pub fn from_words(words: [u32; 3]) -> Result<Self> {
        let board = Board { words };
        for i in 0..CELL_COUNT {
            let code = board.raw(i);
            if Piece::from_code(code).is_none() {
                return Err(EngineError::InvalidPieceCode { index: i, code });
            }
        }
        Ok(board)
    }

    /// Returns the packed words.
    pub const fn words(&self) -> [u32; 3] {
        self.words
    }

    /// Returns the piece on `index`.
    pub fn get(&self, index: usize) -> Result<Piece> {
        check_index(index)?;
        Ok(self.at(index))
    }

    /// Places `piece` on `index`.
    pub fn set(&mut self, index: usize, piece: Piece) -> Result<()> {
        check_index(index)?;
        self.put(index, piece);
        Ok(())
    }

    /// Unchecked read for callers iterating `0..CELL_COUNT`.
    #[inline]
    pub(crate) fn at(&self, index: usize) -> Piece {
        // Every write path goes through `put` or `from_words`, which only
        // store assigned codes.
        Piece::from_code(self.raw(index)).unwrap_or(Piece::Empty)
    }

    #[inline]
    pub(crate) fn put(&mut self, index: usize, piece: Piece) {
        debug_assert!(index < CELL_COUNT);
        let bit = index * BITS_PER_CELL;
        let word = bit / 32;
        let shift = bit % 32;
        let code = piece.code();

        self.words[word] &= !(CELL_MASK << shift);
        self.words[word] |= code << shift;

        let low_bits = 32 - shift;
        if low_bits < BITS_PER_CELL {
            let high_mask = CELL_MASK >> low_bits;
            self.words[word + 1] &= !high_mask;
            self.words[word + 1] |= code >> low_bits;
        }
    }

    #[inline]
    fn raw(&self, index: usize) -> u32 {
        let bit = index * BITS_PER_CELL;
        let word = bit / 32;
        let shift = bit % 32;

        let mut code = (self.words[word] >> shift) & CELL_MASK;
        let low_bits = 32 - shift;
        if low_bits < BITS_PER_CELL {
            let high = self.words[word + 1] & (CELL_MASK >> low_bits);
            code |= high << low_bits;
        }
        code
    }

    /// Returns the 32 cell labels in index order (`.`, `w`, `W`, `b`, `B`).
    pub fn serialize(&self) -> Vec<char> {
        (0..CELL_COUNT).map(|i| self.at(i).label()).collect()
    }

    /// Parses the 32-label text produced by [`Board::serialize`].
    /// Whitespace and `/` separators are ignored.
    pub fn from_labels(text: &str) -> Result<Self> {
        let mut board = Board::empty();
        let mut count = 0;
        for c in text.chars().filter(|c| !c.is_whitespace() && *c != '/') {
            if count >= CELL_COUNT {
                return Err(EngineError::Validation(format!(
                    "expected {CELL_COUNT} cells, got more"
                )));
            }
            let piece = Piece::from_label(c)
                .ok_or_else(|| EngineError::Validation(format!("unknown cell label '{c}'")))?;
            board.put(count, piece);
            count += 1;
        }
        if count != CELL_COUNT {
            return Err(EngineError::Validation(format!(
                "expected {CELL_COUNT} cells, got {count}"
            )));
        }
        Ok(board)
    }

    /// Returns the board as a single 32-character label string.
    pub fn to_labels(&self) -> String {
        self.serialize().into_iter().collect()
    }

    /// Number of non-empty cells.
    pub fn piece_count(&self) -> usize {
        (0..CELL_COUNT).filter(|&i| !self.at(i).is_empty()).count()
    }

    /// Number of pieces belonging to `side`.
    pub fn side_count(&self, side: Side) -> usize {
        (0..CELL_COUNT).filter(|&i| self.at(i).belongs_to(side)).count()
    }

    /// Iterates the occupied cells of `side` in ascending index order.
    pub fn cells_of(&self, side: Side) -> impl Iterator<Item = (usize, Piece)> + '_ {
        (0..CELL_COUNT)
            .map(move |i| (i, self.at(i)))
            .filter(move |(_, p)| p.belongs_to(side))
    }
}

fn check_index(index: usize) -> Result<()> {
    if index < CELL_COUNT {
        Ok(())
    } else {
        Err(EngineError::IndexOutOfRange(index))
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.to_labels())
    }
}

/// Renders the 8×8 grid, row 0 at the top; light squares print as spaces.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut grid = [[' '; 8]; 8];
        for i in 0..CELL_COUNT {
            grid[row_of(i)][col_of(i)] = self.at(i).label();
        }
        for (r, row) in grid.iter().enumerate() {
            let line: String = row.iter().collect();
            if r > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}
