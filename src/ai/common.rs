//! Board-scanning helpers shared by every strategy.

use crate::board::Board;
use crate::types::{Player, Position};

pub const CORNERS: [Position; 4] = [
    Position::new(0, 0),
    Position::new(0, 7),
    Position::new(7, 0),
    Position::new(7, 7),
];

/// The 12 squares touching a corner: two flanking cells plus the diagonal.
pub const DANGER_SQUARES: [Position; 12] = [
    Position::new(0, 1),
    Position::new(1, 0),
    Position::new(1, 1),
    Position::new(0, 6),
    Position::new(1, 6),
    Position::new(1, 7),
    Position::new(6, 0),
    Position::new(6, 1),
    Position::new(7, 1),
    Position::new(6, 6),
    Position::new(6, 7),
    Position::new(7, 6),
];

pub fn valid_moves(board: &Board, player: Player) -> Vec<Position> {
    board.legal_moves(player)
}

pub fn flippable_pieces(board: &Board, player: Player, pos: Position) -> Vec<Position> {
    board.flippable(pos, player)
}

pub fn can_place(board: &Board, player: Player, pos: Position) -> bool {
    board.cell(pos).is_empty() && board.is_legal(pos, player)
}

/// The board after a hypothetical move; `board` itself is not modified.
pub fn result_board(board: &Board, player: Player, pos: Position) -> Board {
    board.with_move(pos, player)
}

pub fn is_corner(pos: Position) -> bool {
    CORNERS.contains(&pos)
}

pub fn is_danger_square(pos: Position) -> bool {
    DANGER_SQUARES.contains(&pos)
}

/// First move with the strictly highest score. Earlier moves win ties.
pub fn first_best<S: PartialOrd>(
    scored: impl IntoIterator<Item = (Position, S)>,
) -> Option<Position> {
    let mut best: Option<(Position, S)> = None;
    for (pos, score) in scored {
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((pos, score)),
        }
    }
    best.map(|(pos, _)| pos)
}
