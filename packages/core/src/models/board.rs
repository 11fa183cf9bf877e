use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_SIZE: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stone {
    Black,
    White,
}

impl Stone {
    pub fn opponent(self) -> Stone {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stone::Black => "black",
            Stone::White => "white",
        }
    }
}

impl fmt::Display for Stone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cell coordinate that is known to be on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    /// Validates raw client coordinates against the board bounds.
    pub fn checked(row: i64, col: i64) -> Option<Position> {
        let size = BOARD_SIZE as i64;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Position {
                row: row as usize,
                col: col as usize,
            })
        } else {
            None
        }
    }

    /// Moves `steps` cells along `(dr, dc)`, returning `None` once off the board.
    pub fn offset(self, dr: i64, dc: i64, steps: i64) -> Option<Position> {
        Position::checked(self.row as i64 + dr * steps, self.col as i64 + dc * steps)
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Position { row, col }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Stone>; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    pub fn stone_at(&self, pos: Position) -> Option<Stone> {
        self.cells[pos.row][pos.col]
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.stone_at(pos).is_none()
    }

    /// Writes a stone into an empty cell. Returns `false` and leaves the board
    /// untouched if the cell is already occupied.
    pub fn place(&mut self, pos: Position, stone: Stone) -> bool {
        let cell = &mut self.cells[pos.row][pos.col];
        if cell.is_some() {
            return false;
        }
        *cell = Some(stone);
        true
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_some())
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|cell| cell.is_some()))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Stone>; BOARD_SIZE]> {
        self.cells.iter()
    }
}
