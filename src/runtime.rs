//! Host services the engine needs but does not own: timers, task spawning and
//! the learned-model source.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::task::LocalSpawn;

use crate::ai::model::ModelSource;

/// Suspends for a fixed duration on the host's event loop.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

#[derive(Clone)]
pub struct Host {
    pub timer: Rc<dyn Timer>,
    pub spawner: Rc<dyn LocalSpawn>,
    /// `None` leaves the ultimate CPU permanently on its fallback.
    pub model_source: Option<Rc<dyn ModelSource>>,
}

impl Host {
    pub fn new(timer: Rc<dyn Timer>, spawner: Rc<dyn LocalSpawn>) -> Self {
        Self {
            timer,
            spawner,
            model_source: None,
        }
    }

    pub fn with_model_source(mut self, source: Rc<dyn ModelSource>) -> Self {
        self.model_source = Some(source);
        self
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("has_model_source", &self.model_source.is_some())
            .finish_non_exhaustive()
    }
}
