//! Error types for the rule engine and the learned-model boundary.
//!
//! Illegal moves are not errors: the engine signals them with an empty flip
//! list and strategies with `None`.

use thiserror::Error;

/// Invalid input handed to the rule engine. Fatal to the call, not the game.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("board must be 8x8, got {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("invalid cell value {value} at ({row}, {col}); expected 0, 1 or 2")]
    InvalidCell { row: usize, col: usize, value: u8 },

    #[error("player must be 1 (black) or 2 (white), got {0}")]
    InvalidPlayer(u8),

    #[error("empty square count must be at most 64, got {0}")]
    InvalidEmptyCount(usize),
}

/// Result type alias for rule engine operations
pub type RuleResult<T> = Result<T, GameError>;

/// Failures of the learned-model dependency. Always recovered by falling back
/// to the hard strategy.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model fetch failed: {0}")]
    Fetch(String),

    #[error("invalid model data: {0}")]
    Format(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model output has {actual} scores, expected at least {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("could not start model loading: {0}")]
    Spawn(String),
}
