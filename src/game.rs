use log::debug;
use rand::Rng;
use rand::seq::index;

use crate::board::Board;
use crate::error::{GameError, RuleResult};
use crate::types::{GameResult, GameStatus, Grid, NUM_SQUARES, Player, Position};

/// Rule engine: the only owner and writer of the board.
///
/// Methods that take `player: impl Into<Option<Player>>` default to the side
/// to move when given `None`.
#[derive(Debug, Clone)]
pub struct GameLogic {
    board: Board,
    current_player: Player,
    status: GameStatus,
}

impl GameLogic {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            current_player: Player::Black,
            status: GameStatus::Playing,
        }
    }

    /// Resets to the starting position with black to move.
    pub fn initialize(&mut self) {
        self.board = Board::new();
        self.current_player = Player::Black;
        self.status = GameStatus::Playing;
    }

    pub fn board(&self) -> Grid {
        self.board.to_grid()
    }

    /// Copy of the internal bitboard, for strategies and snapshots.
    pub fn board_snapshot(&self) -> Board {
        self.board
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn can_place_at(&self, row: u8, col: u8, player: impl Into<Option<Player>>) -> bool {
        let player = self.resolve(player);
        let pos = Position::new(row, col);
        if !pos.in_bounds() || !self.board.cell(pos).is_empty() {
            return false;
        }
        self.board.is_legal(pos, player)
    }

    pub fn flippable_pieces(
        &self,
        row: u8,
        col: u8,
        player: impl Into<Option<Player>>,
    ) -> Vec<Position> {
        let player = self.resolve(player);
        self.board.flippable(Position::new(row, col), player)
    }

    /// Legal moves in row-major order.
    pub fn valid_moves(&self, player: impl Into<Option<Player>>) -> Vec<Position> {
        let player = self.resolve(player);
        self.board.legal_moves(player)
    }

    pub fn has_valid_move(&self, player: impl Into<Option<Player>>) -> bool {
        let player = self.resolve(player);
        self.board.has_legal_move(player)
    }

    /// Plays for the side to move. Returns the flipped squares; an empty list
    /// means the move was illegal and nothing changed.
    pub fn place_stone(&mut self, row: u8, col: u8) -> Vec<Position> {
        let pos = Position::new(row, col);
        if !self.can_place_at(row, col, None) {
            return Vec::new();
        }
        self.board.place(pos, self.current_player)
    }

    /// Hands the turn to the opponent, passing back when the opponent cannot
    /// move. Returns `false` and ends the game when neither side can move.
    pub fn next_turn(&mut self) -> bool {
        self.current_player = self.current_player.opponent();
        if self.has_valid_move(None) {
            return true;
        }

        let other = self.current_player.opponent();
        if !self.has_valid_move(other) {
            debug!("neither side can move, game over");
            self.status = GameStatus::Ended;
            return false;
        }

        debug!("{:?} has no legal move and passes", self.current_player);
        self.current_player = other;
        true
    }

    pub fn is_game_over(&self) -> bool {
        self.status == GameStatus::Ended
    }

    /// Forces the game to end.
    pub fn end_game(&mut self) {
        self.status = GameStatus::Ended;
    }

    pub fn stone_count(&self, player: Player) -> u8 {
        self.board.count(player)
    }

    pub fn black_count(&self) -> u8 {
        self.board.count(Player::Black)
    }

    pub fn white_count(&self) -> u8 {
        self.board.count(Player::White)
    }

    pub fn empty_count(&self) -> u8 {
        self.board.empty_count()
    }

    pub fn result(&self) -> GameResult {
        let (black_count, white_count) = self.board.counts();
        GameResult {
            winner: if black_count > white_count {
                Player::Black.as_u8()
            } else if white_count > black_count {
                Player::White.as_u8()
            } else {
                0
            },
            black_count,
            white_count,
        }
    }

    /// Replaces the board from raw rows. Fails unless the input is 8x8 with
    /// values in `0..=2`.
    pub fn set_board<R: AsRef<[u8]>>(&mut self, rows: &[R]) -> RuleResult<()> {
        self.board = Board::from_rows(rows)?;
        Ok(())
    }

    pub fn set_position(&mut self, board: Board) {
        self.board = board;
    }

    /// Sets the side to move from its wire value (1=black, 2=white).
    pub fn set_current_player(&mut self, player: u8) -> RuleResult<()> {
        self.current_player = Player::try_from(player)?;
        Ok(())
    }

    /// Debug helper: fills a random position with `empty_count` empty squares.
    pub fn generate_end_game_position(
        &mut self,
        empty_count: usize,
        favored: Option<Player>,
    ) -> RuleResult<()> {
        self.generate_end_game_position_with(&mut rand::rng(), empty_count, favored)
    }

    /// As [`Self::generate_end_game_position`], drawing from `rng`.
    ///
    /// Stones are dealt row-major with a coin flip per square until each
    /// colour's quota runs out, so the split is approximate. The favoured
    /// colour's quota is one above an even split.
    pub fn generate_end_game_position_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        empty_count: usize,
        favored: Option<Player>,
    ) -> RuleResult<()> {
        if empty_count > NUM_SQUARES {
            return Err(GameError::InvalidEmptyCount(empty_count));
        }

        let stones = NUM_SQUARES - empty_count;
        let (mut remaining_black, mut remaining_white) = match favored {
            Some(Player::Black) => {
                let black = (stones / 2 + 1).min(stones);
                (black, stones - black)
            }
            Some(Player::White) => {
                let white = (stones / 2 + 1).min(stones);
                (stones - white, white)
            }
            None => (stones / 2, stones - stones / 2),
        };

        let mut keep_empty = [false; NUM_SQUARES];
        for square in index::sample(rng, NUM_SQUARES, empty_count) {
            keep_empty[square] = true;
        }

        let mut board = Board::empty();
        for (square, _) in keep_empty.iter().enumerate().filter(|(_, empty)| !**empty) {
            if remaining_black == 0 && remaining_white == 0 {
                break;
            }
            let Some(pos) = Position::from_index(square) else {
                continue;
            };
            let color = if rng.random_bool(0.5) && remaining_black > 0 {
                remaining_black -= 1;
                Player::Black
            } else if remaining_white > 0 {
                remaining_white -= 1;
                Player::White
            } else {
                remaining_black -= 1;
                Player::Black
            };
            board.set(pos, color.into());
        }

        self.board = board;
        self.status = GameStatus::Playing;
        if self.board.has_legal_move(Player::Black) {
            self.current_player = Player::Black;
        } else if self.board.has_legal_move(Player::White) {
            self.current_player = Player::White;
        } else {
            self.status = GameStatus::Ended;
        }
        debug!(
            "generated end game position: {} empty, {:?} to move, {:?}",
            self.board.empty_count(),
            self.current_player,
            self.status
        );
        Ok(())
    }

    fn resolve(&self, player: impl Into<Option<Player>>) -> Player {
        player.into().unwrap_or(self.current_player)
    }
}

impl Default for GameLogic {
    fn default() -> Self {
        Self::new()
    }
}
