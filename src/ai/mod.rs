//! CPU move selection.

pub mod common;
pub mod easy;
pub mod hard;
pub mod medium;
pub mod model;
pub mod ntuple;
pub mod ultimate;

use log::debug;

use crate::ai::easy::EasyStrategy;
use crate::ai::model::ModelStatus;
use crate::ai::ultimate::UltimateStrategy;
use crate::board::Board;
use crate::config::RetryPolicy;
use crate::runtime::Host;
use crate::types::{CpuLevel, Player, Position};

/// One strategy per difficulty level.
#[derive(Debug)]
pub enum Strategy {
    Easy(EasyStrategy),
    Medium,
    Hard,
    Ultimate(UltimateStrategy),
}

impl Strategy {
    pub fn build(level: CpuLevel, host: &Host, retry: RetryPolicy) -> Self {
        match level {
            CpuLevel::Easy => Self::Easy(EasyStrategy::new()),
            CpuLevel::Medium => Self::Medium,
            CpuLevel::Hard => Self::Hard,
            CpuLevel::Ultimate => Self::Ultimate(UltimateStrategy::new(host, retry)),
        }
    }

    /// `None` means the side to move has to pass.
    pub async fn select_move(&self, board: &Board, player: Player) -> Option<Position> {
        let moves = common::valid_moves(board, player);
        if moves.is_empty() {
            return None;
        }
        match self {
            Self::Easy(easy) => easy.select(&moves),
            Self::Medium => medium::select(board, player, &moves),
            Self::Hard => hard::select(board, player, &moves),
            Self::Ultimate(ultimate) => ultimate.select(board, player, &moves).await,
        }
    }
}

/// A CPU seat: a level and the strategy built for it.
#[derive(Debug)]
pub struct CpuPlayer {
    level: CpuLevel,
    strategy: Strategy,
    host: Host,
    retry: RetryPolicy,
}

impl CpuPlayer {
    pub fn new(level: CpuLevel, host: &Host, retry: RetryPolicy) -> Self {
        Self {
            level,
            strategy: Strategy::build(level, host, retry),
            host: host.clone(),
            retry,
        }
    }

    /// Wraps a prebuilt strategy, e.g. a seeded [`EasyStrategy`].
    pub fn with_strategy(level: CpuLevel, strategy: Strategy, host: &Host) -> Self {
        Self {
            level,
            strategy,
            host: host.clone(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn level(&self) -> CpuLevel {
        self.level
    }

    /// Switches level by building a fresh strategy. The old one, including
    /// any model it loaded, is dropped.
    pub fn set_level(&mut self, level: CpuLevel) {
        debug!("cpu level {:?} -> {:?}", self.level, level);
        self.level = level;
        self.strategy = Strategy::build(level, &self.host, self.retry);
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Load state of the learned model, for ultimate CPUs only.
    pub fn model_status(&self) -> Option<ModelStatus> {
        match &self.strategy {
            Strategy::Ultimate(ultimate) => Some(ultimate.status()),
            _ => None,
        }
    }

    pub async fn select_move(&self, board: &Board, player: Player) -> Option<Position> {
        self.strategy.select_move(board, player).await
    }
}
