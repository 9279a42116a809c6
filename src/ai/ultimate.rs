use std::fmt;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, warn};
use web_time::Instant;

use crate::ai::common::first_best;
use crate::ai::hard;
use crate::ai::model::{BoardTensor, ModelSlot, ModelSource, ModelStatus};
use crate::board::Board;
use crate::config::RetryPolicy;
use crate::error::ModelError;
use crate::runtime::{Host, Timer};
use crate::types::{NUM_SQUARES, Player, Position};

/// Plays the legal move the learned model scores highest. Any trouble with
/// the model (not loaded, failed, unusable output) silently yields the hard
/// strategy's move instead.
pub struct UltimateStrategy {
    slot: ModelSlot,
    source: Option<Rc<dyn ModelSource>>,
    timer: Rc<dyn Timer>,
    spawner: Rc<dyn LocalSpawn>,
    retry: RetryPolicy,
}

impl UltimateStrategy {
    /// Starts loading the host's model right away.
    pub fn new(host: &Host, retry: RetryPolicy) -> Self {
        let strategy = Self {
            slot: ModelSlot::new(),
            source: host.model_source.clone(),
            timer: Rc::clone(&host.timer),
            spawner: Rc::clone(&host.spawner),
            retry,
        };
        strategy.ensure_loading();
        strategy
    }

    pub fn status(&self) -> ModelStatus {
        self.slot.status()
    }

    pub fn is_model_ready(&self) -> bool {
        self.slot.is_ready()
    }

    pub fn is_model_loading(&self) -> bool {
        self.slot.is_loading()
    }

    pub fn has_model_load_failed(&self) -> bool {
        self.slot.has_failed()
    }

    /// Starts a load if none has been started yet.
    fn ensure_loading(&self) {
        let Some(source) = self.source.clone() else {
            if self.slot.status() == ModelStatus::Idle {
                debug!("no model source configured, ultimate CPU plays the hard strategy");
                self.slot.mark_failed(None);
            }
            return;
        };
        let Some(task) = self
            .slot
            .begin_load(source, Rc::clone(&self.timer), self.retry)
        else {
            return;
        };
        if let Err(err) = self.spawner.spawn_local(task) {
            warn!("could not spawn model loading: {err}");
            self.slot
                .mark_failed(Some(ModelError::Spawn(err.to_string())));
        }
    }

    pub async fn select(
        &self,
        board: &Board,
        player: Player,
        moves: &[Position],
    ) -> Option<Position> {
        if moves.is_empty() {
            return None;
        }
        self.ensure_loading();

        match self.infer(board, player, moves).await {
            Ok(Some(mv)) => return Some(mv),
            Ok(None) => debug!("model is {:?}, using hard strategy", self.status()),
            Err(err) => warn!("{err}; using hard strategy"),
        }
        hard::select(board, player, moves)
    }

    /// `Ok(None)` when no model is loaded.
    async fn infer(
        &self,
        board: &Board,
        player: Player,
        moves: &[Position],
    ) -> Result<Option<Position>, ModelError> {
        let Some(model) = self.slot.model() else {
            return Ok(None);
        };

        let input = BoardTensor::encode(board, player);
        let started = Instant::now();
        let scores = model.predict(&input).await?;
        debug!("inference took {:?}", started.elapsed());
        if scores.len() < NUM_SQUARES {
            return Err(ModelError::ShapeMismatch {
                expected: NUM_SQUARES,
                actual: scores.len(),
            });
        }

        pick_scored_move(&scores, moves)
            .map(Some)
            .ok_or_else(|| ModelError::Inference("no usable score for any legal move".into()))
    }
}

impl fmt::Debug for UltimateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UltimateStrategy")
            .field("slot", &self.slot)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Highest-scoring legal move. Missing, NaN and negative-infinite scores are
/// ignored; extra trailing outputs are never read.
fn pick_scored_move(scores: &[f32], moves: &[Position]) -> Option<Position> {
    first_best(moves.iter().filter_map(|&mv| {
        let index = mv.index();
        if index >= NUM_SQUARES {
            return None;
        }
        scores
            .get(index)
            .copied()
            .filter(|score| !score.is_nan() && *score != f32::NEG_INFINITY)
            .map(|score| (mv, score))
    }))
}
