use crate::ai::common::{first_best, flippable_pieces, is_corner, is_danger_square};
use crate::board::Board;
use crate::types::{Player, Position};

const DANGER_SCORE: i32 = -10;

/// Greedy play: take a corner when offered, avoid squares next to corners,
/// otherwise flip as many stones as possible.
pub fn select(board: &Board, player: Player, moves: &[Position]) -> Option<Position> {
    if let Some(&corner) = moves.iter().find(|&&mv| is_corner(mv)) {
        return Some(corner);
    }

    first_best(moves.iter().map(|&mv| (mv, score(board, player, mv))))
}

fn score(board: &Board, player: Player, mv: Position) -> i32 {
    if is_danger_square(mv) {
        DANGER_SCORE
    } else {
        flippable_pieces(board, player, mv).len() as i32
    }
}
