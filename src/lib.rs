pub mod ai;
pub mod animation;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod game;
pub mod runtime;
pub mod session;
pub mod types;
pub mod wasm;

#[cfg(test)]
pub(crate) mod test_support;

pub use ai::CpuPlayer;
pub use board::Board;
pub use config::{RetryPolicy, Settings, Timing};
pub use error::{GameError, ModelError, RuleResult};
pub use game::GameLogic;
pub use runtime::{Host, Timer};
pub use session::GameSession;
pub use types::{CpuLevel, GameMode, GameResult, GameState, GameStatus, Player, Position};
