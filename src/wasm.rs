//! Browser bindings.

use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use js_sys::{Float32Array, Function, Promise, Uint8Array};
use log::warn;
use once_cell::sync::OnceCell;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

use crate::ai::model::{BoardTensor, Model, ModelSource};
use crate::ai::ntuple::NTupleSource;
use crate::config::Settings;
use crate::error::ModelError;
use crate::runtime::{Host, Timer};
use crate::session::GameSession;
use crate::types::{BOARD_SIZE, Player};

static LOGGER: OnceCell<()> = OnceCell::new();

/// Installs the console logger and panic hook. Later calls do nothing.
#[wasm_bindgen]
pub fn init(level: Option<String>) {
    console_error_panic_hook::set_once();
    LOGGER.get_or_init(|| {
        let level = level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or(log::Level::Info);
        _ = console_log::init_with_level(level);
    });
}

#[wasm_bindgen]
pub fn wasm_ready() -> bool {
    true
}

/// `setTimeout` wrapped in a promise.
#[derive(Debug, Default)]
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let ms = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().map(|window| {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            });
            if !matches!(scheduled, Some(Ok(_))) {
                warn!("setTimeout unavailable, not waiting {ms} ms");
                _ = resolve.call0(&JsValue::NULL);
            }
        });
        Box::pin(async move {
            _ = JsFuture::from(promise).await;
        })
    }
}

/// Runs tasks on the browser microtask queue.
#[derive(Debug, Default)]
pub struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// A model backed by a JS function `(input: Float32Array) => scores`, where
/// the input is the flattened `[1, 8, 8, 3]` tensor and the scores may be an
/// array-like or a promise of one.
struct JsModel {
    predict: Function,
}

impl Model for JsModel {
    fn predict(&self, input: &BoardTensor) -> LocalBoxFuture<'_, Result<Vec<f32>, ModelError>> {
        let data = Float32Array::from(input.to_vec().as_slice());
        let called = self.predict.call1(&JsValue::NULL, &data);
        Box::pin(async move {
            let output = called.map_err(|err| ModelError::Inference(describe(&err)))?;
            let output = JsFuture::from(Promise::resolve(&output))
                .await
                .map_err(|err| ModelError::Inference(describe(&err)))?;
            Ok(Float32Array::new(&output).to_vec())
        })
    }
}

/// Calls a JS loader that resolves to the prediction function.
pub struct JsModelSource {
    loader: Function,
}

impl JsModelSource {
    pub fn new(loader: Function) -> Self {
        Self { loader }
    }
}

impl ModelSource for JsModelSource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn Model>, ModelError>> {
        let called = self.loader.call0(&JsValue::NULL);
        Box::pin(async move {
            let value = called.map_err(|err| ModelError::Fetch(describe(&err)))?;
            let value = JsFuture::from(Promise::resolve(&value))
                .await
                .map_err(|err| ModelError::Fetch(describe(&err)))?;
            let predict = value
                .dyn_into::<Function>()
                .map_err(|_| ModelError::Format("model loader must resolve to a function".into()))?;
            Ok(Rc::new(JsModel { predict }) as Rc<dyn Model>)
        })
    }
}

/// N-tuple weights fetched through a JS function resolving to bytes
/// (`Uint8Array` or `ArrayBuffer`).
fn ntuple_source(fetch: Function) -> NTupleSource {
    NTupleSource::new(move || {
        let called = fetch.call0(&JsValue::NULL);
        Box::pin(async move {
            let value = called.map_err(|err| ModelError::Fetch(describe(&err)))?;
            let bytes = JsFuture::from(Promise::resolve(&value))
                .await
                .map_err(|err| ModelError::Fetch(describe(&err)))?;
            Ok(Uint8Array::new(&bytes).to_vec())
        })
    })
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| String::from(err.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

fn parse_settings(settings: JsValue) -> Result<Settings, JsError> {
    if settings.is_undefined() || settings.is_null() {
        return Ok(Settings::default());
    }
    Ok(serde_wasm_bindgen::from_value(settings)?)
}

fn browser_host(source: Option<Rc<dyn ModelSource>>) -> Host {
    let mut host = Host::new(Rc::new(BrowserTimer), Rc::new(BrowserSpawner));
    host.model_source = source;
    host
}

#[wasm_bindgen]
pub struct ReversiApp {
    session: GameSession,
}

#[wasm_bindgen]
impl ReversiApp {
    /// `model_loader`, when given, backs the ultimate CPU: it must resolve to
    /// a prediction function (see [`JsModelSource`]).
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue, model_loader: Option<Function>) -> Result<ReversiApp, JsError> {
        init(None);
        let source = model_loader
            .map(|loader| Rc::new(JsModelSource::new(loader)) as Rc<dyn ModelSource>);
        let session = GameSession::new(parse_settings(settings)?, browser_host(source));
        Ok(Self { session })
    }

    /// Ultimate CPU backed by the in-crate N-tuple evaluator.
    #[wasm_bindgen(js_name = withNTupleWeights)]
    pub fn with_ntuple_weights(
        settings: JsValue,
        fetch_weights: Function,
    ) -> Result<ReversiApp, JsError> {
        init(None);
        let source: Rc<dyn ModelSource> = Rc::new(ntuple_source(fetch_weights));
        let session = GameSession::new(parse_settings(settings)?, browser_host(Some(source)));
        Ok(Self { session })
    }

    pub fn state(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.state())?)
    }

    /// `undefined` until the game is over.
    pub fn result(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.result())?)
    }

    pub fn settings(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.settings())?)
    }

    pub fn legal_moves(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.legal_moves())?)
    }

    pub fn is_flipping(&self, row: u8, col: u8) -> bool {
        self.session.is_flipping(row, col)
    }

    pub fn is_cpu_turn(&self) -> bool {
        self.session.is_cpu_turn()
    }

    pub fn model_status(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.session.model_statuses())?)
    }

    /// Resolves to `true` once the move has been placed, animated and the
    /// turn handed over; `false` when it was refused.
    pub fn play(&self, row: u8, col: u8) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move { Ok(JsValue::from_bool(session.play(row, col).await)) })
    }

    /// Resolves to the CPU's move, or `undefined` when no CPU moved.
    pub fn cpu_turn(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let mv = session.cpu_turn().await;
            serde_wasm_bindgen::to_value(&mv).map_err(JsValue::from)
        })
    }

    /// Resolves to the number of CPU moves played.
    pub fn run_cpu(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let played = session.run_cpu_turns().await;
            Ok(JsValue::from_f64(played as f64))
        })
    }

    pub fn restart(&self) {
        self.session.restart();
    }

    pub fn configure(&self, settings: JsValue) -> Result<(), JsError> {
        self.session.configure(parse_settings(settings)?);
        Ok(())
    }

    pub fn debug_end_game(&self) {
        self.session.debug_end_game();
    }

    pub fn debug_generate_end_game(
        &self,
        empty_count: usize,
        favored: Option<u8>,
    ) -> Result<(), JsError> {
        let favored = favored.map(Player::try_from).transpose()?;
        self.session.debug_generate_end_game(empty_count, favored)?;
        Ok(())
    }

    /// `cells` is row-major, 0=empty, 1=black, 2=white.
    pub fn debug_set_position(&self, cells: Vec<u8>, current_player: u8) -> Result<(), JsError> {
        let rows: Vec<&[u8]> = cells.chunks(BOARD_SIZE).collect();
        self.session.debug_set_position(&rows, current_player)?;
        Ok(())
    }
}
