//! Decides which seat a CPU plays and asks it for a move after a short
//! thinking delay.

use std::rc::Rc;

use log::debug;

use crate::ai::CpuPlayer;
use crate::ai::model::ModelStatus;
use crate::board::Board;
use crate::config::{RetryPolicy, Timing};
use crate::runtime::Host;
use crate::types::{CpuLevel, GameMode, Player, Position};

/// Cheap to clone: the CPU seats are shared, so a clone can be taken out of
/// session state before awaiting.
#[derive(Debug, Clone)]
pub struct CpuController {
    mode: GameMode,
    /// The only CPU in player-vs-CPU, black in CPU-vs-CPU.
    primary: Option<Rc<CpuPlayer>>,
    /// White in CPU-vs-CPU.
    secondary: Option<Rc<CpuPlayer>>,
    host: Host,
    timing: Timing,
    retry: RetryPolicy,
}

impl CpuController {
    pub fn new(host: Host, timing: Timing, retry: RetryPolicy) -> Self {
        Self {
            mode: GameMode::TwoPlayers,
            primary: None,
            secondary: None,
            host,
            timing,
            retry,
        }
    }

    /// Rebuilds every CPU seat for `mode`. Existing CPUs are dropped.
    pub fn update_settings(&mut self, mode: GameMode, level: CpuLevel, level2: CpuLevel) {
        let cpu = |level| Some(Rc::new(CpuPlayer::new(level, &self.host, self.retry)));
        let (primary, secondary) = match mode {
            GameMode::TwoPlayers => (None, None),
            GameMode::PlayerVsCpu => (cpu(level), None),
            GameMode::CpuVsCpu => (cpu(level), cpu(level2)),
        };
        debug!("controller configured for {mode:?}");
        self.mode = mode;
        self.primary = primary;
        self.secondary = secondary;
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn is_cpu_vs_cpu_mode(&self) -> bool {
        self.mode == GameMode::CpuVsCpu && self.primary.is_some() && self.secondary.is_some()
    }

    pub fn is_player_vs_cpu_mode(&self) -> bool {
        self.mode == GameMode::PlayerVsCpu && self.primary.is_some()
    }

    /// Whether `current` is a CPU seat.
    pub fn is_opponent_turn(&self, human: Player, current: Player) -> bool {
        match self.mode {
            GameMode::CpuVsCpu => true,
            GameMode::PlayerVsCpu => current != human,
            GameMode::TwoPlayers => false,
        }
    }

    /// The CPU bound to `current`'s seat.
    pub fn active_cpu(&self, current: Player) -> Option<Rc<CpuPlayer>> {
        match self.mode {
            GameMode::PlayerVsCpu => self.primary.clone(),
            GameMode::CpuVsCpu => match current {
                Player::Black => self.primary.clone(),
                Player::White => self.secondary.clone(),
            },
            GameMode::TwoPlayers => None,
        }
    }

    /// Model state of every ultimate CPU, black seat first.
    pub fn model_statuses(&self) -> Vec<ModelStatus> {
        [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .filter_map(|cpu| cpu.model_status())
            .collect()
    }

    /// Waits the thinking time, then asks the seat's CPU for a move on the
    /// board returned by `board`. That closure runs after the wait, so it sees
    /// the position as it is then; returning `None` from it abandons the turn.
    ///
    /// Returns `None` when no CPU sits in that seat or it has to pass.
    pub async fn decide_cpu_move(
        &self,
        current: Player,
        board: impl FnOnce() -> Option<Board>,
    ) -> Option<Position> {
        let cpu = self.active_cpu(current)?;

        self.host
            .timer
            .sleep(self.timing.thinking_time(self.mode))
            .await;

        let board = board()?;
        let mv = cpu.select_move(&board, current).await;
        debug!("{current:?} cpu ({:?}) chose {mv:?}", cpu.level());
        mv
    }
}
