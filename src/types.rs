use serde::{Deserialize, Serialize};

use crate::error::GameError;

pub const BOARD_SIZE: usize = 8;
pub const NUM_SQUARES: usize = BOARD_SIZE * BOARD_SIZE;

/// Side to move. Black always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    Black,
    White,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }

    /// Wire value: 1=black, 2=white.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Black => 1,
            Self::White => 2,
        }
    }
}

impl TryFrom<u8> for Player {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Black),
            2 => Ok(Self::White),
            other => Err(GameError::InvalidPlayer(other)),
        }
    }
}

/// Contents of one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    #[default]
    Empty,
    Black,
    White,
}

impl Cell {
    /// Wire value: 0=empty, 1=black, 2=white.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Black => 1,
            Self::White => 2,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::Black => Self::Black,
            Player::White => Self::White,
        }
    }
}

/// Row-major copy of the board. Plain value: mutating it never touches the engine.
pub type Grid = [[Cell; BOARD_SIZE]; BOARD_SIZE];

/// A board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Returns `None` when the index is outside `0..64`.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < NUM_SQUARES).then(|| Self {
            row: (index / BOARD_SIZE) as u8,
            col: (index % BOARD_SIZE) as u8,
        })
    }

    pub fn in_bounds(self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// `row * 8 + col`; only meaningful for in-bounds positions.
    pub fn index(self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }

    /// Euclidean distance between square centres.
    pub fn distance_to(self, other: Position) -> f64 {
        let dr = f64::from(self.row) - f64::from(other.row);
        let dc = f64::from(self.col) - f64::from(other.col);
        (dr * dr + dc * dc).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Playing,
    Ended,
}

/// Which seats are CPU-controlled. Fixed for the lifetime of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    #[serde(rename = "twoPlayers")]
    TwoPlayers,
    #[serde(rename = "playerVsCPU")]
    PlayerVsCpu,
    #[serde(rename = "cpuVsCpu")]
    CpuVsCpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuLevel {
    Easy,
    #[default]
    Medium,
    Hard,
    Ultimate,
}

/// Public game state returned from WASM APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameState {
    /// 64 cells, row-major, 0=empty, 1=black, 2=white.
    pub board: Vec<u8>,
    pub current_player: u8,
    pub human_player: u8,
    pub black_count: u8,
    pub white_count: u8,
    pub is_game_over: bool,
    pub is_animating: bool,
    /// `true` when the last turn switch skipped a side that had no move.
    pub is_pass: bool,
    /// Squares flipped by the last move; empty before the first move.
    pub flipped: Vec<Position>,
    pub mode: GameMode,
}

/// Final result after game over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameResult {
    /// 0 on a draw, otherwise the winning player's wire value.
    pub winner: u8,
    pub black_count: u8,
    pub white_count: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_wire_values_round_trip_and_reject_neutral() {
        assert_eq!(Player::try_from(1).unwrap(), Player::Black);
        assert_eq!(Player::try_from(2).unwrap(), Player::White);
        assert!(matches!(
            Player::try_from(0),
            Err(GameError::InvalidPlayer(0))
        ));
        assert!(matches!(
            Player::try_from(3),
            Err(GameError::InvalidPlayer(3))
        ));
        assert_eq!(Player::Black.opponent(), Player::White);
    }

    #[test]
    fn position_index_and_distance() {
        let pos = Position::new(2, 3);
        assert_eq!(pos.index(), 19);
        assert_eq!(Position::from_index(19), Some(pos));
        assert_eq!(Position::from_index(64), None);
        assert!(!Position::new(8, 0).in_bounds());
        assert_eq!(Position::new(0, 0).distance_to(Position::new(3, 4)), 5.0);
    }
}
