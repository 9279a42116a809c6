//! Boundary to the learned model used by the ultimate CPU.
//!
//! A model maps an `[1, 8, 8, 3]` board tensor (mover, opponent, empty) to at
//! least 64 move scores indexed `row * 8 + col`. Loading runs as one owned
//! task driving [`LoadState`] from `Idle` to `Loaded` or `FailedPermanently`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use log::{debug, info, warn};
use serde::Serialize;

use crate::board::Board;
use crate::config::RetryPolicy;
use crate::error::ModelError;
use crate::runtime::Timer;
use crate::types::{BOARD_SIZE, Cell, Player, Position};

pub const CHANNELS: usize = 3;
const MOVER: usize = 0;
const OPPONENT: usize = 1;
const EMPTY: usize = 2;

/// One-hot board encoding from the mover's point of view, NHWC with batch 1.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardTensor {
    data: [[[f32; CHANNELS]; BOARD_SIZE]; BOARD_SIZE],
}

impl BoardTensor {
    pub const SHAPE: [usize; 4] = [1, BOARD_SIZE, BOARD_SIZE, CHANNELS];

    pub fn zeros() -> Self {
        Self {
            data: [[[0.0; CHANNELS]; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    pub fn encode(board: &Board, mover: Player) -> Self {
        let mut tensor = Self::zeros();
        for (r, row) in tensor.data.iter_mut().enumerate() {
            for (c, channels) in row.iter_mut().enumerate() {
                let cell = board.cell(Position::new(r as u8, c as u8));
                let channel = if cell.is_empty() {
                    EMPTY
                } else if cell == Cell::from(mover) {
                    MOVER
                } else {
                    OPPONENT
                };
                channels[channel] = 1.0;
            }
        }
        tensor
    }

    pub fn get(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.data
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.get(channel))
            .copied()
            .unwrap_or(0.0)
    }

    /// Row-major, channel-last values for hosts that take a flat buffer.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().flatten().flatten().copied().collect()
    }

    /// Decodes the tensor with the mover as black and the opponent as white.
    pub fn to_relative_board(&self) -> Board {
        let mut board = Board::empty();
        for r in 0..BOARD_SIZE {
            for c in 0..BOARD_SIZE {
                let cell = if self.get(r, c, MOVER) > 0.5 {
                    Cell::Black
                } else if self.get(r, c, OPPONENT) > 0.5 {
                    Cell::White
                } else {
                    Cell::Empty
                };
                board.set(Position::new(r as u8, c as u8), cell);
            }
        }
        board
    }
}

/// A loaded inference function.
pub trait Model {
    fn predict(&self, input: &BoardTensor) -> LocalBoxFuture<'_, Result<Vec<f32>, ModelError>>;
}

/// Where a model comes from (network asset, bundled bytes, ...).
pub trait ModelSource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

pub enum LoadState {
    Idle,
    Loading { attempt: u32 },
    Loaded(Rc<dyn Model>),
    FailedPermanently {
        attempts: u32,
        error: Option<ModelError>,
    },
}

impl fmt::Debug for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Loading { attempt } => {
                f.debug_struct("Loading").field("attempt", attempt).finish()
            }
            Self::Loaded(_) => f.write_str("Loaded"),
            Self::FailedPermanently { attempts, error } => f
                .debug_struct("FailedPermanently")
                .field("attempts", attempts)
                .field("error", error)
                .finish(),
        }
    }
}

/// Shared handle to a model's load state.
#[derive(Debug, Clone)]
pub struct ModelSlot {
    state: Rc<RefCell<LoadState>>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoadState::Idle)),
        }
    }

    pub fn status(&self) -> ModelStatus {
        match &*self.state.borrow() {
            LoadState::Idle => ModelStatus::Idle,
            LoadState::Loading { .. } => ModelStatus::Loading,
            LoadState::Loaded(_) => ModelStatus::Ready,
            LoadState::FailedPermanently { .. } => ModelStatus::Failed,
        }
    }

    pub fn model(&self) -> Option<Rc<dyn Model>> {
        match &*self.state.borrow() {
            LoadState::Loaded(model) => Some(Rc::clone(model)),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ModelStatus::Ready
    }

    pub fn is_loading(&self) -> bool {
        self.status() == ModelStatus::Loading
    }

    pub fn has_failed(&self) -> bool {
        self.status() == ModelStatus::Failed
    }

    /// Number of load attempts made so far.
    pub fn attempts(&self) -> u32 {
        match &*self.state.borrow() {
            LoadState::Idle | LoadState::Loaded(_) => 0,
            LoadState::Loading { attempt } => *attempt,
            LoadState::FailedPermanently { attempts, .. } => *attempts,
        }
    }

    pub fn mark_failed(&self, error: Option<ModelError>) {
        let attempts = self.attempts();
        *self.state.borrow_mut() = LoadState::FailedPermanently { attempts, error };
    }

    /// Moves `Idle` to `Loading` and returns the task that finishes the load.
    /// Returns `None` in every other state, so at most one load ever runs.
    ///
    /// The task holds only a weak reference and stops once the slot is dropped.
    pub fn begin_load(
        &self,
        source: Rc<dyn ModelSource>,
        timer: Rc<dyn Timer>,
        policy: RetryPolicy,
    ) -> Option<LocalBoxFuture<'static, ()>> {
        {
            let mut state = self.state.borrow_mut();
            if !matches!(*state, LoadState::Idle) {
                return None;
            }
            *state = LoadState::Loading { attempt: 1 };
        }

        let weak = Rc::downgrade(&self.state);
        Some(Box::pin(run_load(weak, source, timer, policy)))
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_load(
    state: Weak<RefCell<LoadState>>,
    source: Rc<dyn ModelSource>,
    timer: Rc<dyn Timer>,
    policy: RetryPolicy,
) {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let Some(cell) = state.upgrade() else {
            return;
        };
        *cell.borrow_mut() = LoadState::Loading { attempt };
        drop(cell);
        debug!("loading model, attempt {attempt}/{max_attempts}");

        let outcome = match source.load().await {
            Ok(model) => warm_up(model).await,
            Err(err) => Err(err),
        };

        let Some(cell) = state.upgrade() else {
            return;
        };
        match outcome {
            Ok(model) => {
                info!("model ready after {attempt} attempt(s)");
                *cell.borrow_mut() = LoadState::Loaded(model);
                return;
            }
            Err(err) if attempt >= max_attempts => {
                warn!("model unavailable after {attempt} attempts: {err}");
                *cell.borrow_mut() = LoadState::FailedPermanently {
                    attempts: attempt,
                    error: Some(err),
                };
                return;
            }
            Err(err) => {
                drop(cell);
                let delay = policy.backoff(attempt);
                debug!("model load attempt {attempt} failed: {err}; retrying in {delay:?}");
                timer.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Runs one prediction on an all-zero input so the first real move is not
/// the one paying for lazy initialisation.
async fn warm_up(model: Rc<dyn Model>) -> Result<Rc<dyn Model>, ModelError> {
    model.predict(&BoardTensor::zeros()).await?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell as StdCell;
    use std::time::Duration;

    use futures::executor::block_on;
    use futures::future;

    use super::*;
    use crate::test_support::{FixedModel, RecordingTimer};

    /// Fails the first `failures` loads, then succeeds.
    struct FlakySource {
        failures: u32,
        calls: Rc<StdCell<u32>>,
    }

    impl ModelSource for FlakySource {
        fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            let result: Result<Rc<dyn Model>, ModelError> = if call <= self.failures {
                Err(ModelError::Fetch(format!("attempt {call} refused")))
            } else {
                Ok(Rc::new(FixedModel::new(vec![0.0; 64])))
            };
            Box::pin(future::ready(result))
        }
    }

    fn flaky(failures: u32) -> (Rc<dyn ModelSource>, Rc<StdCell<u32>>) {
        let calls = Rc::new(StdCell::new(0));
        let source = FlakySource {
            failures,
            calls: Rc::clone(&calls),
        };
        (Rc::new(source), calls)
    }

    #[test]
    fn encode_uses_mover_relative_channels() {
        let board = Board::new();

        let black = BoardTensor::encode(&board, Player::Black);
        let white = BoardTensor::encode(&board, Player::White);

        // (3,4) is black.
        assert_eq!(black.get(3, 4, MOVER), 1.0);
        assert_eq!(white.get(3, 4, OPPONENT), 1.0);
        assert_eq!(black.get(0, 0, EMPTY), 1.0);
        assert_eq!(black.to_vec().len(), 8 * 8 * 3);
        assert_eq!(black.to_vec().iter().sum::<f32>(), 64.0);
        assert_eq!(white.to_relative_board().count(Player::Black), 2);
    }

    #[test]
    fn load_succeeds_after_retries_with_backoff() {
        let (source, calls) = flaky(2);
        let timer = RecordingTimer::new();
        let slot = ModelSlot::new();

        let task = slot
            .begin_load(source, timer.clone(), RetryPolicy::default())
            .expect("idle slot starts loading");
        assert!(slot.is_loading());
        block_on(task);

        assert!(slot.is_ready());
        assert!(slot.model().is_some());
        assert_eq!(calls.get(), 3);
        assert_eq!(
            timer.requested(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[test]
    fn load_gives_up_after_max_attempts() {
        let (source, calls) = flaky(u32::MAX);
        let timer = RecordingTimer::new();
        let slot = ModelSlot::new();

        block_on(
            slot.begin_load(source, timer.clone(), RetryPolicy::default())
                .unwrap(),
        );

        assert!(slot.has_failed());
        assert_eq!(slot.attempts(), 3);
        assert_eq!(calls.get(), 3);
        assert_eq!(timer.requested().len(), 2);
    }

    #[test]
    fn second_load_is_refused_while_one_is_running() {
        let (source, calls) = flaky(0);
        let timer = RecordingTimer::new();
        let slot = ModelSlot::new();

        let first = slot.begin_load(Rc::clone(&source), timer.clone(), RetryPolicy::default());
        let second = slot.begin_load(Rc::clone(&source), timer.clone(), RetryPolicy::default());
        assert!(first.is_some());
        assert!(second.is_none());

        block_on(first.unwrap());
        assert!(slot.begin_load(source, timer, RetryPolicy::default()).is_none());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dropped_slot_stops_pending_load() {
        let (source, calls) = flaky(0);
        let slot = ModelSlot::new();
        let task = slot
            .begin_load(source, RecordingTimer::new(), RetryPolicy::default())
            .unwrap();

        drop(slot);
        block_on(task);

        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn failed_warm_up_counts_as_failed_attempt() {
        struct BrokenSource;

        impl ModelSource for BrokenSource {
            fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
                Box::pin(future::ready(Ok(
                    Rc::new(FixedModel::failing()) as Rc<dyn Model>
                )))
            }
        }

        let slot = ModelSlot::new();
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        block_on(
            slot.begin_load(Rc::new(BrokenSource), RecordingTimer::new(), policy)
                .unwrap(),
        );

        assert!(slot.has_failed());
    }
}
