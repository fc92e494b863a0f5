//! Packed-index geometry.
//!
//! Only the 32 dark squares are addressable. Index `i` lives at
//! `row = i / 4`, `col = 2 * (i % 4) + (row % 2)`, so even rows start on
//! column 0 and odd rows on column 1. Every other module goes through this
//! mapping; nothing else computes row or column by hand.
//!
//! Under this mapping the one-step diagonal offsets are `{-5, -4, +3, +4}`
//! on even rows and `{-4, -3, +4, +5}` on odd rows. Rather than applying raw
//! offsets with edge guards at every call site, the neighbor table below is
//! built once from (row, col) arithmetic, so wrap-around is impossible.

pub const CELL_COUNT: usize = 32;

/// The four diagonal directions, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::UpLeft,
    Direction::UpRight,
    Direction::DownLeft,
    Direction::DownRight,
];

impl Direction {
    const fn delta(self) -> (i32, i32) {
        match self {
            Direction::UpLeft => (-1, -1),
            Direction::UpRight => (-1, 1),
            Direction::DownLeft => (1, -1),
            Direction::DownRight => (1, 1),
        }
    }

    /// True for the two directions that decrease the row index.
    pub const fn is_up(self) -> bool {
        matches!(self, Direction::UpLeft | Direction::UpRight)
    }

    const fn ordinal(self) -> usize {
        match self {
            Direction::UpLeft => 0,
            Direction::UpRight => 1,
            Direction::DownLeft => 2,
            Direction::DownRight => 3,
        }
    }
}

#[inline]
pub const fn row_of(index: usize) -> usize {
    index / 4
}

#[inline]
pub const fn col_of(index: usize) -> usize {
    2 * (index % 4) + (row_of(index) % 2)
}

/// Maps a (row, col) pair back to a packed index. Light squares and
/// off-board coordinates return `None`.
pub const fn index_of(row: i32, col: i32) -> Option<usize> {
    if row < 0 || row > 7 || col < 0 || col > 7 {
        return None;
    }
    if (col - row % 2) % 2 != 0 {
        return None;
    }
    Some((row as usize) * 4 + ((col - row % 2) / 2) as usize)
}

const NO_CELL: u8 = u8::MAX;

const fn build_neighbors() -> [[u8; 4]; CELL_COUNT] {
    let mut table = [[NO_CELL; 4]; CELL_COUNT];
    let dirs = ALL_DIRECTIONS;
    let mut i = 0;
    while i < CELL_COUNT {
        let mut d = 0;
        while d < 4 {
            let (dr, dc) = dirs[d].delta();
            let r = row_of(i) as i32 + dr;
            let c = col_of(i) as i32 + dc;
            if let Some(n) = index_of(r, c) {
                table[i][d] = n as u8;
            }
            d += 1;
        }
        i += 1;
    }
    table
}

static NEIGHBORS: [[u8; 4]; CELL_COUNT] = build_neighbors();

/// Returns the diagonal neighbor of `index` in direction `dir`, or `None`
/// at the board edge.
#[inline]
pub fn neighbor(index: usize, dir: Direction) -> Option<usize> {
    match NEIGHBORS[index][dir.ordinal()] {
        NO_CELL => None,
        n => Some(n as usize),
    }
}

/// Iterates the cells along `dir` starting after `index`, up to the edge.
pub fn ray(index: usize, dir: Direction) -> impl Iterator<Item = usize> {
    std::iter::successors(neighbor(index, dir), move |&i| neighbor(i, dir))
}
