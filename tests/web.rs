//! Browser smoke tests.
//!
//! Run with: wasm-pack test --headless --chrome

#![cfg(target_arch = "wasm32")]

use js_sys::Function;
use reversi_arena::wasm::{BrowserTimer, ReversiApp};
use reversi_arena::{CpuLevel, GameMode, Settings, Timer};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn settings(settings: &Settings) -> JsValue {
    serde_wasm_bindgen::to_value(settings).unwrap()
}

#[wasm_bindgen_test]
fn app_starts_from_the_opening_position() {
    let app = ReversiApp::new(JsValue::UNDEFINED, None).unwrap();

    let state = app.state().unwrap();
    let board: Vec<u8> =
        serde_wasm_bindgen::from_value(js_sys::Reflect::get(&state, &"board".into()).unwrap())
            .unwrap();
    assert_eq!(board.len(), 64);
    assert_eq!(board.iter().filter(|&&cell| cell != 0).count(), 4);
}

#[wasm_bindgen_test]
fn malformed_settings_are_rejected() {
    assert!(ReversiApp::new(JsValue::from_str("fast please"), None).is_err());
}

#[wasm_bindgen_test]
async fn browser_timer_resolves() {
    BrowserTimer.sleep(std::time::Duration::from_millis(5)).await;
}

#[wasm_bindgen_test]
async fn click_is_placed_after_animation() {
    let app = ReversiApp::new(JsValue::UNDEFINED, None).unwrap();

    let placed = JsFuture::from(app.play(2, 3)).await.unwrap();
    assert_eq!(placed.as_bool(), Some(true));

    let refused = JsFuture::from(app.play(0, 0)).await.unwrap();
    assert_eq!(refused.as_bool(), Some(false));
}

#[wasm_bindgen_test]
async fn js_model_backs_the_ultimate_cpu() {
    let loader = Function::new_no_args("return (input) => new Array(64).fill(0);");
    let app = ReversiApp::new(
        settings(&Settings {
            mode: GameMode::CpuVsCpu,
            cpu_level: CpuLevel::Ultimate,
            cpu2_level: CpuLevel::Easy,
            ..Settings::default()
        }),
        Some(loader),
    )
    .unwrap();

    BrowserTimer.sleep(std::time::Duration::from_millis(50)).await;
    let statuses: Vec<String> =
        serde_wasm_bindgen::from_value(app.model_status().unwrap()).unwrap();
    assert_eq!(statuses, vec!["ready".to_string()]);

    let mv = JsFuture::from(app.cpu_turn()).await.unwrap();
    assert!(!mv.is_undefined());
}
