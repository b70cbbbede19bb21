use std::sync::Arc;
use std::time::Duration;

use wasm_bindgen::prelude::*;

use super::*;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// JS event time stamps are fractional milliseconds
fn event_time(time_stamp: f64) -> Duration {
    Duration::from_secs_f64(time_stamp.max(0.0) / 1000.0)
}

/// Recognition session for a browser input pad.
/// Matching runs synchronously: results are ready when `end_stroke` returns.
#[wasm_bindgen]
pub struct WasmRecognizer {
    session: RecognitionSession,
}

#[wasm_bindgen]
impl WasmRecognizer {
    #[wasm_bindgen(constructor)]
    pub fn new(top_k: usize) -> WasmRecognizer {
        let mut config = SessionConfig::default();
        if top_k > 0 {
            config.top_k = top_k;
        }
        let store = Arc::new(CorpusStore::new());
        WasmRecognizer {
            session: RecognitionSession::with_executor(config, store, Box::new(InlineExecutor)),
        }
    }

    /// Loads a compact JSON corpus; loading an already loaded name does nothing
    pub fn load_corpus(&self, name: &str, json: String) -> Result<(), JsValue> {
        self.session.store().load_blocking(name, CorpusSource::Json(json)).map_err(to_js)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.session.store().is_ready(name)
    }

    pub fn begin_stroke(&mut self, x: f32, y: f32, time_stamp: f64) -> Result<(), JsValue> {
        self.session.begin_stroke_at(Point::new(x, y), event_time(time_stamp)).map_err(to_js)
    }

    pub fn extend_stroke(&mut self, x: f32, y: f32, time_stamp: f64) -> Result<(), JsValue> {
        self.session.extend_stroke_at(Point::new(x, y), event_time(time_stamp)).map_err(to_js)
    }

    pub fn end_stroke(&mut self) -> bool {
        self.session.end_stroke()
    }

    pub fn undo(&mut self) -> Result<bool, JsValue> {
        self.session.undo_last_stroke().map_err(to_js)
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Current candidates as a JSON array of `{hanzi, score}`
    pub fn results(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.results()).map_err(to_js)
    }

    /// Returns the chosen glyph and starts a new character
    pub fn commit(&mut self, index: usize) -> Result<String, JsValue> {
        self.session.commit(index).map(String::from).map_err(to_js)
    }

    /// One-shot lookup of a whole character given as `number[][][]`
    #[allow(deprecated)]
    pub fn lookup(&self, input: &JsValue, limit: usize) -> Result<String, JsValue> {
        let input: Vec<Vec<Vec<f32>>> = input.into_serde().map_err(to_js)?;
        let strokes = strokes_from_arrays(&input).map_err(to_js)?;
        let store = self.session.store();
        let corpora: Vec<Arc<Corpus>> = store
            .ready_names()
            .iter()
            .filter_map(|name| store.entries(name).ok())
            .collect();
        let refs: Vec<&Corpus> = corpora.iter().map(|c| c.as_ref()).collect();
        let matches = match_typed(&strokes, &refs, limit).map_err(to_js)?;
        serde_json::to_string(&matches).map_err(to_js)
    }
}
