//! Board representation.
//!
//! Contains the packed 32-cell board store, piece and side types, and the
//! canonical index ↔ (row, col) geometry.

pub mod packed;
pub mod piece;
pub mod square;

pub use packed::Board;
pub use piece::{Piece, Side, ALL_PIECES};
pub use square::{col_of, index_of, neighbor, ray, row_of, Direction, ALL_DIRECTIONS, CELL_COUNT};
