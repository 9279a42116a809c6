//! Deterministic stand-ins for host services, shared by unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::ai::model::{BoardTensor, Model, ModelSource};
use crate::error::ModelError;
use crate::runtime::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Never,
    Always,
    AfterFirstCall,
}

/// Returns the same scores for every input.
#[derive(Debug)]
pub struct FixedModel {
    scores: Vec<f32>,
    failure: Failure,
    calls: Cell<u32>,
    last_input: RefCell<Option<BoardTensor>>,
}

impl FixedModel {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            failure: Failure::Never,
            calls: Cell::new(0),
            last_input: RefCell::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            failure: Failure::Always,
            ..Self::new(Vec::new())
        }
    }

    /// Survives the warm-up prediction, then errors on every real move.
    pub fn failing_after_warm_up() -> Self {
        Self {
            failure: Failure::AfterFirstCall,
            ..Self::new(vec![0.0; 64])
        }
    }

    pub fn last_input(&self) -> Option<BoardTensor> {
        self.last_input.borrow().clone()
    }
}

impl Model for FixedModel {
    fn predict(&self, input: &BoardTensor) -> LocalBoxFuture<'_, Result<Vec<f32>, ModelError>> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        *self.last_input.borrow_mut() = Some(input.clone());

        let fails = match self.failure {
            Failure::Never => false,
            Failure::Always => true,
            Failure::AfterFirstCall => call > 1,
        };
        let result = if fails {
            Err(ModelError::Inference(format!("prediction {call} rejected")))
        } else {
            Ok(self.scores.clone())
        };
        Box::pin(future::ready(result))
    }
}

/// Hands out the same model on every load.
pub struct ReadySource {
    model: Rc<FixedModel>,
}

impl ReadySource {
    pub fn new(model: FixedModel) -> Self {
        Self {
            model: Rc::new(model),
        }
    }
}

impl ModelSource for ReadySource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
        let model: Rc<dyn Model> = self.model.clone();
        Box::pin(future::ready(Ok(model)))
    }
}

/// A load that never finishes.
#[derive(Debug, Default)]
pub struct PendingSource {
    loads: Cell<u32>,
}

impl PendingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> u32 {
        self.loads.get()
    }
}

impl ModelSource for PendingSource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
        self.loads.set(self.loads.get() + 1);
        Box::pin(future::pending())
    }
}

/// Resolves every sleep at once and remembers what was asked for.
#[derive(Debug, Default)]
pub struct RecordingTimer {
    requested: RefCell<Vec<Duration>>,
}

impl RecordingTimer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn requested(&self) -> Vec<Duration> {
        self.requested.borrow().clone()
    }
}

impl Timer for RecordingTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        self.requested.borrow_mut().push(duration);
        future::ready(()).boxed_local()
    }
}

/// Virtual clock: sleeps only resolve when the test advances time past
/// their deadline.
#[derive(Debug, Default)]
pub struct ManualTimer {
    now: Cell<Duration>,
    pending: RefCell<Vec<(Duration, oneshot::Sender<()>)>>,
}

impl ManualTimer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Moves the clock forward and wakes every sleep that is now due.
    pub fn advance(&self, by: Duration) {
        let now = self.now.get() + by;
        self.now.set(now);

        let due: Vec<_> = {
            let mut pending = self.pending.borrow_mut();
            let (due, waiting): (Vec<_>, Vec<_>) = pending
                .drain(..)
                .partition(|(deadline, _)| *deadline <= now);
            *pending = waiting;
            due
        };
        for (_, sender) in due {
            let _ = sender.send(());
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Timer for ManualTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let (sender, receiver) = oneshot::channel();
        self.pending
            .borrow_mut()
            .push((self.now.get() + duration, sender));
        receiver.map(|_| ()).boxed_local()
    }
}
