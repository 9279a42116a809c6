//! Flip animation sequencing.
//!
//! Purely cosmetic: flips ripple out from the placed stone, each marked as
//! "flipping" for a fixed duration. The only thing the game waits on is the
//! `animating` flag, which gates new input.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::config::Timing;
use crate::runtime::Timer;
use crate::types::Position;

/// One scheduled flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlipStep {
    pub position: Position,
    pub delay: Duration,
}

/// Orders flips by distance from `placed` (stable for equal distances) and
/// delays each by `floor(distance * unit_delay_ms)` milliseconds.
pub fn schedule(placed: Position, flips: &[Position], unit_delay_ms: u64) -> Vec<FlipStep> {
    let mut by_distance: Vec<(Position, f64)> = flips
        .iter()
        .map(|&pos| (pos, pos.distance_to(placed)))
        .collect();
    by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));

    by_distance
        .into_iter()
        .map(|(position, distance)| FlipStep {
            position,
            delay: Duration::from_millis((distance * unit_delay_ms as f64).floor() as u64),
        })
        .collect()
}

#[derive(Debug, Default)]
struct AnimationState {
    flipping: HashSet<Position>,
    animating: bool,
    /// Bumped by every reset; callbacks from older animations check it and
    /// do nothing.
    epoch: u64,
}

#[derive(Clone)]
pub struct FlipAnimator {
    state: Rc<RefCell<AnimationState>>,
    timer: Rc<dyn Timer>,
    timing: Timing,
}

impl FlipAnimator {
    pub fn new(timer: Rc<dyn Timer>, timing: Timing) -> Self {
        Self {
            state: Rc::new(RefCell::new(AnimationState::default())),
            timer,
            timing,
        }
    }

    pub fn is_flipping(&self, pos: Position) -> bool {
        self.state.borrow().flipping.contains(&pos)
    }

    pub fn is_animating(&self) -> bool {
        self.state.borrow().animating
    }

    pub fn set_animating(&self, animating: bool) {
        self.state.borrow_mut().animating = animating;
    }

    /// Clears every marker and the animating flag. Pending flips from earlier
    /// animations become no-ops.
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.epoch += 1;
        state.flipping.clear();
        state.animating = false;
    }

    /// Sets the animating flag immediately and returns the future that plays
    /// the flips concurrently, waits the settle pause and clears the flag.
    pub fn animate(&self, placed: Position, flips: &[Position]) -> LocalBoxFuture<'static, ()> {
        let epoch = {
            let mut state = self.state.borrow_mut();
            state.animating = true;
            state.epoch
        };

        let flip_duration = Duration::from_millis(self.timing.flip_duration_ms);
        let steps = schedule(placed, flips, self.timing.flip_unit_delay_ms);
        let flips: Vec<_> = steps
            .into_iter()
            .map(|step| {
                let state = Rc::clone(&self.state);
                let timer = Rc::clone(&self.timer);
                async move {
                    timer.sleep(step.delay).await;
                    if !mark(&state, epoch, step.position, true) {
                        return;
                    }
                    timer.sleep(flip_duration).await;
                    mark(&state, epoch, step.position, false);
                }
            })
            .collect();

        let state = Rc::clone(&self.state);
        let timer = Rc::clone(&self.timer);
        let settle = Duration::from_millis(self.timing.settle_ms);
        async move {
            future::join_all(flips).await;
            timer.sleep(settle).await;
            let mut state = state.borrow_mut();
            if state.epoch == epoch {
                state.animating = false;
            }
        }
        .boxed_local()
    }
}

/// Adds or removes a flipping marker unless the animation was reset.
fn mark(state: &RefCell<AnimationState>, epoch: u64, pos: Position, flipping: bool) -> bool {
    let mut state = state.borrow_mut();
    if state.epoch != epoch {
        return false;
    }
    if flipping {
        state.flipping.insert(pos);
    } else {
        state.flipping.remove(&pos);
    }
    true
}

impl std::fmt::Debug for FlipAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlipAnimator")
            .field("state", &self.state)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}
