use crate::models::board::{Board, Position, Stone};

pub const WIN_LENGTH: usize = 5;

/// Horizontal, vertical, diagonal and anti-diagonal, in scan order.
const AXES: [(i64, i64); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Win { winning_line: Vec<Position> },
    Draw,
    Continue,
}

/// Places `player` at `pos`. Returns `false` without touching the board if
/// the cell is taken.
pub fn apply_move(board: &mut Board, pos: Position, player: Stone) -> bool {
    board.place(pos, player)
}

/// Judges the board right after `player` placed a stone at `pos`.
///
/// The first axis holding a run of at least five wins. The reported line is
/// exactly five cells, ordered from one end of the run to the other: the
/// played cell, up to four cells ahead of it, and as many behind it as are
/// needed to make five.
pub fn evaluate(board: &Board, pos: Position, player: Stone) -> Evaluation {
    for (dr, dc) in AXES {
        let forward = run(board, pos, player, dr, dc);
        let backward = run(board, pos, player, -dr, -dc);

        if 1 + forward.len() + backward.len() >= WIN_LENGTH {
            let ahead = forward.len().min(WIN_LENGTH - 1);
            let behind = WIN_LENGTH - 1 - ahead;

            let mut winning_line: Vec<Position> =
                backward[..behind].iter().rev().copied().collect();
            winning_line.push(pos);
            winning_line.extend_from_slice(&forward[..ahead]);
            return Evaluation::Win { winning_line };
        }
    }

    if board.is_full() {
        Evaluation::Draw
    } else {
        Evaluation::Continue
    }
}

/// Contiguous `player` cells from `pos` along `(dr, dc)`, nearest first,
/// bounded by the win length.
fn run(board: &Board, pos: Position, player: Stone, dr: i64, dc: i64) -> Vec<Position> {
    (1..WIN_LENGTH as i64)
        .map_while(|step| pos.offset(dr, dc, step))
        .take_while(|cell| board.stone_at(*cell) == Some(player))
        .collect()
}
