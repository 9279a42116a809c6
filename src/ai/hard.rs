use crate::ai::common::{first_best, flippable_pieces, result_board, valid_moves};
use crate::board::Board;
use crate::types::{Player, Position};

/// Positional value of each square.
pub const WEIGHTS: [[i32; 8]; 8] = [
    [100, -20, 10, 5, 5, 10, -20, 100],
    [-20, -30, 1, 1, 1, 1, -30, -20],
    [10, 1, 5, 2, 2, 5, 1, 10],
    [5, 1, 2, 1, 1, 2, 1, 5],
    [5, 1, 2, 1, 1, 2, 1, 5],
    [10, 1, 5, 2, 2, 5, 1, 10],
    [-20, -30, 1, 1, 1, 1, -30, -20],
    [100, -20, 10, 5, 5, 10, -20, 100],
];

/// Fewer empty squares than this switches to material counting.
pub const ENDGAME_EMPTY_THRESHOLD: u8 = 16;

const MOBILITY_PENALTY: i32 = 2;

/// One-ply static evaluation: positional weights and opponent mobility in the
/// midgame, final disc count in the endgame.
pub fn select(board: &Board, player: Player, moves: &[Position]) -> Option<Position> {
    let endgame = is_endgame(board);
    first_best(
        moves
            .iter()
            .map(|&mv| (mv, score_move(board, player, mv, endgame))),
    )
}

pub fn is_endgame(board: &Board) -> bool {
    board.empty_count() < ENDGAME_EMPTY_THRESHOLD
}

pub fn score_move(board: &Board, player: Player, mv: Position, endgame: bool) -> i32 {
    let next = result_board(board, player, mv);
    if endgame {
        return i32::from(next.count(player));
    }

    let weight = WEIGHTS[mv.row as usize][mv.col as usize];
    let flips = flippable_pieces(board, player, mv).len() as i32;
    let opponent_mobility = valid_moves(&next, player.opponent()).len() as i32;
    weight + flips - MOBILITY_PENALTY * opponent_mobility
}
