use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_derive::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::entities::*;
use super::error::{RecogError, RecogResult};
use super::normalizer::normalize_all;

/// A reference character with every way it is known to be drawn
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub hanzi: char,
    // Each variant is one full stroke sequence, in writing order
    pub variants: Vec<Vec<StrokeEncoding>>,
}

/// A named, immutable set of reference characters, in source order
#[derive(Debug, Clone)]
pub struct Corpus {
    name: String,
    entries: Vec<CorpusEntry>,
}

/// Raw reference data for one corpus
#[derive(Debug, Clone)]
pub enum CorpusSource {
    /// Compact JSON: glyph rows pointing into one base64 blob of direction buckets
    Json(String),
    /// bincode-serialized variant records, as written by `Corpus::to_bincode`
    Bincode(Vec<u8>),
    /// Entries built in memory
    Entries(Vec<CorpusEntry>),
}

// On-disk form of the JSON corpus
#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct CorpusFile {
    // Glyph / Stroke count / First byte of the glyph's strokes in the blob
    chars: Vec<(String, u16, u32)>,
    // All stroke encodings back to back, SEGMENT_COUNT bytes per stroke
    encodings: String,
}

// On-disk form of one variant in the bincode corpus
#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct VariantRecord {
    hanzi: char,
    stroke_count: u16,
    directions: Vec<u8>,
}

impl CorpusSource {
    /// Reads a corpus file; `.bin` files are taken as bincode, everything else as compact JSON
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn read(path: &std::path::Path) -> std::io::Result<CorpusSource> {
        if path.extension().map_or(false, |ext| ext == "bin") {
            Ok(CorpusSource::Bincode(tokio::fs::read(path).await?))
        } else {
            Ok(CorpusSource::Json(tokio::fs::read_to_string(path).await?))
        }
    }
}

impl Corpus {
    /// Parses reference data; this is CPU-bound and may take a while for large corpora
    pub fn parse(name: &str, source: CorpusSource) -> RecogResult<Corpus> {
        match source {
            CorpusSource::Json(text) => parse_json(name, &text),
            CorpusSource::Bincode(bytes) => parse_bincode(name, &bytes),
            CorpusSource::Entries(entries) => {
                let mut builder = CorpusBuilder::new(name);
                for entry in entries {
                    for variant in entry.variants {
                        builder
                            .add_variant(entry.hanzi, variant)
                            .map_err(|e| RecogError::corpus_load(name, e))?;
                    }
                }
                Ok(builder.build())
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hanzi: char) -> Option<&CorpusEntry> {
        self.entries.iter().find(|e| e.hanzi == hanzi)
    }

    /// Writes the compact JSON form
    pub fn to_json(&self) -> RecogResult<String> {
        let mut blob: Vec<u8> = Vec::new();
        let mut chars: Vec<(String, u16, u32)> = Vec::new();
        for entry in &self.entries {
            for variant in &entry.variants {
                let start = u32::try_from(blob.len()).map_err(|e| RecogError::Encode(e.to_string()))?;
                let count = u16::try_from(variant.len()).map_err(|e| RecogError::Encode(e.to_string()))?;
                chars.push((entry.hanzi.to_string(), count, start));
                for enc in variant {
                    blob.extend_from_slice(&enc.directions);
                }
            }
        }
        let file = CorpusFile {
            chars,
            encodings: base64::encode(&blob),
        };
        serde_json::to_string(&file).map_err(|e| RecogError::Encode(e.to_string()))
    }

    /// Writes the bincode form
    pub fn to_bincode(&self) -> RecogResult<Vec<u8>> {
        let mut records: Vec<VariantRecord> = Vec::new();
        for entry in &self.entries {
            for variant in &entry.variants {
                let stroke_count = u16::try_from(variant.len()).map_err(|e| RecogError::Encode(e.to_string()))?;
                let mut directions = Vec::with_capacity(variant.len() * SEGMENT_COUNT);
                for enc in variant {
                    directions.extend_from_slice(&enc.directions);
                }
                records.push(VariantRecord {
                    hanzi: entry.hanzi,
                    stroke_count,
                    directions,
                });
            }
        }
        bincode::serialize(&records).map_err(|e| RecogError::Encode(e.to_string()))
    }
}

fn parse_json(name: &str, text: &str) -> RecogResult<Corpus> {
    let file: CorpusFile = serde_json::from_str(text).map_err(|e| RecogError::corpus_load(name, e))?;
    let blob = base64::decode(&file.encodings).map_err(|e| RecogError::corpus_load(name, e))?;
    let mut builder = CorpusBuilder::new(name);
    for (ix, (glyph, stroke_count, start)) in file.chars.iter().enumerate() {
        let hanzi = single_char(glyph)
            .ok_or_else(|| RecogError::corpus_load(name, format!("row {}: expected one character, got {:?}", ix, glyph)))?;
        let start = *start as usize;
        let end = start + (*stroke_count as usize) * SEGMENT_COUNT;
        let bytes = blob
            .get(start..end)
            .ok_or_else(|| RecogError::corpus_load(name, format!("row {}: strokes run past the end of the blob", ix)))?;
        let variant = decode_variant(bytes).ok_or_else(|| RecogError::corpus_load(name, format!("row {}: bad direction bucket", ix)))?;
        builder
            .add_variant(hanzi, variant)
            .map_err(|e| RecogError::corpus_load(name, format!("row {}: {}", ix, e)))?;
    }
    Ok(builder.build())
}

fn parse_bincode(name: &str, bytes: &[u8]) -> RecogResult<Corpus> {
    let records: Vec<VariantRecord> = bincode::deserialize(bytes).map_err(|e| RecogError::corpus_load(name, e))?;
    let mut builder = CorpusBuilder::new(name);
    for (ix, record) in records.into_iter().enumerate() {
        if record.directions.len() != record.stroke_count as usize * SEGMENT_COUNT {
            return Err(RecogError::corpus_load(name, format!("record {}: stroke count does not match data", ix)));
        }
        let variant = decode_variant(&record.directions)
            .ok_or_else(|| RecogError::corpus_load(name, format!("record {}: bad direction bucket", ix)))?;
        builder
            .add_variant(record.hanzi, variant)
            .map_err(|e| RecogError::corpus_load(name, format!("record {}: {}", ix, e)))?;
    }
    Ok(builder.build())
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(c)
}

fn decode_variant(bytes: &[u8]) -> Option<Vec<StrokeEncoding>> {
    bytes.chunks(SEGMENT_COUNT).map(StrokeEncoding::from_bytes).collect()
}

/// Assembles a corpus; variants of a glyph seen before join the glyph's existing entry
pub struct CorpusBuilder {
    name: String,
    entries: Vec<CorpusEntry>,
    index: HashMap<char, usize>,
}

impl CorpusBuilder {
    pub fn new(name: &str) -> CorpusBuilder {
        CorpusBuilder {
            name: name.to_string(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add_variant(&mut self, hanzi: char, variant: Vec<StrokeEncoding>) -> RecogResult<&mut Self> {
        if variant.is_empty() {
            return Err(RecogError::InvalidInput(format!("variant of {} has no strokes", hanzi)));
        }
        match self.index.get(&hanzi) {
            Some(&ix) => self.entries[ix].variants.push(variant),
            None => {
                self.index.insert(hanzi, self.entries.len());
                self.entries.push(CorpusEntry {
                    hanzi,
                    variants: vec![variant],
                });
            }
        }
        Ok(self)
    }

    /// Adds a variant from reference polylines, encoded the same way as live input
    pub fn add_strokes(&mut self, hanzi: char, strokes: &[Stroke]) -> RecogResult<&mut Self> {
        self.add_variant(hanzi, normalize_all(strokes))
    }

    pub fn build(self) -> Corpus {
        Corpus {
            name: self.name,
            entries: self.entries,
        }
    }
}

#[derive(Default)]
struct Loaded {
    by_name: HashMap<String, Arc<Corpus>>,
    // Names in the order they became ready
    order: Vec<String>,
}

/// Read-only reference corpora, loaded once and shared by all matching calls
pub struct CorpusStore {
    loaded: RwLock<Loaded>,
    loading: AtomicUsize,
    ready_tx: watch::Sender<usize>,
}

// Keeps the in-flight count right even if a load future is dropped midway
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> LoadingGuard<'a> {
        counter.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusStore {
    pub fn new() -> CorpusStore {
        let (ready_tx, _) = watch::channel(0);
        CorpusStore {
            loaded: RwLock::new(Loaded::default()),
            loading: AtomicUsize::new(0),
            ready_tx,
        }
    }

    /// Parses `source` on a blocking worker and makes it available under `name`.
    /// Loading a name that is already ready is a no-op.
    pub async fn load(&self, name: &str, source: CorpusSource) -> RecogResult<()> {
        if self.is_ready(name) {
            debug!("Corpus {name} already loaded");
            return Ok(());
        }
        let _guard = LoadingGuard::new(&self.loading);
        let owned_name = name.to_string();
        let parsed = tokio::task::spawn_blocking(move || Corpus::parse(&owned_name, source))
            .await
            .map_err(|e| RecogError::corpus_load(name, e))
            .and_then(|res| res);
        self.finish_load(name, parsed)
    }

    /// Same as `load`, on the calling thread; for hosts without a tokio runtime
    pub fn load_blocking(&self, name: &str, source: CorpusSource) -> RecogResult<()> {
        if self.is_ready(name) {
            debug!("Corpus {name} already loaded");
            return Ok(());
        }
        let _guard = LoadingGuard::new(&self.loading);
        self.finish_load(name, Corpus::parse(name, source))
    }

    fn finish_load(&self, name: &str, parsed: RecogResult<Corpus>) -> RecogResult<()> {
        match parsed {
            Ok(corpus) => {
                info!("Corpus {name} loaded with {} characters", corpus.len());
                self.insert(corpus);
                Ok(())
            }
            Err(e) => {
                error!("Corpus {name} unavailable: {e}");
                Err(e)
            }
        }
    }

    fn insert(&self, corpus: Corpus) {
        let count = {
            let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
            // A concurrent load of the same name may have won; keep the first
            if !loaded.by_name.contains_key(corpus.name()) {
                loaded.order.push(corpus.name().to_string());
                loaded.by_name.insert(corpus.name().to_string(), Arc::new(corpus));
            }
            loaded.order.len()
        };
        self.ready_tx.send_replace(count);
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.read().by_name.contains_key(name)
    }

    /// The entries of a loaded corpus, shared rather than copied
    pub fn entries(&self, name: &str) -> RecogResult<Arc<Corpus>> {
        self.read()
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| RecogError::NotReady(name.to_string()))
    }

    pub fn ready_names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    pub fn ready_count(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Notified with the number of ready corpora each time one finishes loading
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.ready_tx.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Loaded> {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 一 drawn two ways (rightwards, diagonal), 丨, and 十 sharing the blob's first two strokes
    static CORPUS_1: &str = r#"{"chars":[["一",1,0],["丨",1,16],["一",1,32],["十",2,0]],"encodings":"AAAAAAAAAAAAAAAAAAAAAAQEBAQEBAQEBAQEBAQEBAQCAgICAgICAgICAgICAgIC"}"#;

    fn line(x1: f32, y1: f32, x2: f32, y2: f32) -> Stroke {
        Stroke::new(vec![Point::new(x1, y1), Point::new(x2, y2)])
    }

    #[test]
    fn test_parse_json() {
        let corpus = Corpus::parse("mmah", CorpusSource::Json(CORPUS_1.to_string())).unwrap();
        assert_eq!(corpus.name(), "mmah");
        let glyphs: Vec<char> = corpus.entries().iter().map(|e| e.hanzi).collect();
        assert_eq!(glyphs, vec!['一', '丨', '十']);
        let yi = corpus.get('一').unwrap();
        assert_eq!(yi.variants.len(), 2);
        assert_eq!(yi.variants[1][0].directions, [2u8; SEGMENT_COUNT]);
        let shi = corpus.get('十').unwrap();
        assert_eq!(shi.variants[0].len(), 2);
        assert_eq!(shi.variants[0][1].directions, [4u8; SEGMENT_COUNT]);
    }

    #[test]
    fn test_parse_json_malformed() {
        let cases = [
            "not json",
            r#"{"chars":[["一",1,0]],"encodings":"!!!"}"#,
            r#"{"chars":[["一",2,0]],"encodings":"AAAAAAAAAAAAAAAAAAAAAA=="}"#,
            r#"{"chars":[["一二",1,0]],"encodings":"AAAAAAAAAAAAAAAAAAAAAA=="}"#,
            r#"{"chars":[["一",0,0]],"encodings":"AAAAAAAAAAAAAAAAAAAAAA=="}"#,
            r#"{"chars":[["一",1,0]],"encodings":"AAAAAAAAAAAAAAAAAAAAyA=="}"#,
        ];
        for case in cases.iter() {
            let res = Corpus::parse("bad", CorpusSource::Json(case.to_string()));
            assert!(matches!(res, Err(RecogError::CorpusLoad { .. })), "accepted {}", case);
        }
    }

    #[test]
    fn test_builder_and_formats() {
        let mut builder = CorpusBuilder::new("orig");
        builder.add_strokes('一', &[line(0.0, 50.0, 100.0, 50.0)]).unwrap();
        builder
            .add_strokes('十', &[line(0.0, 50.0, 100.0, 50.0), line(50.0, 0.0, 50.0, 100.0)])
            .unwrap();
        builder.add_strokes('一', &[line(0.0, 0.0, 100.0, 10.0)]).unwrap();
        let corpus = builder.build();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get('一').unwrap().variants.len(), 2);

        let from_json = Corpus::parse("orig", CorpusSource::Json(corpus.to_json().unwrap())).unwrap();
        assert_eq!(from_json.entries(), corpus.entries());
        let from_bin = Corpus::parse("orig", CorpusSource::Bincode(corpus.to_bincode().unwrap())).unwrap();
        assert_eq!(from_bin.entries(), corpus.entries());
    }

    #[test]
    fn test_empty_variant_rejected() {
        let mut builder = CorpusBuilder::new("x");
        assert!(matches!(builder.add_variant('一', vec![]), Err(RecogError::InvalidInput(_))));
        let entries = vec![CorpusEntry { hanzi: '一', variants: vec![vec![]] }];
        assert!(matches!(Corpus::parse("x", CorpusSource::Entries(entries)), Err(RecogError::CorpusLoad { .. })));
    }

    #[test]
    fn test_bincode_garbage() {
        let res = Corpus::parse("bin", CorpusSource::Bincode(vec![1, 2, 3]));
        assert!(matches!(res, Err(RecogError::CorpusLoad { .. })));
    }

    #[tokio::test]
    async fn test_store_load() {
        let store = CorpusStore::new();
        assert!(!store.is_ready("mmah"));
        assert!(matches!(store.entries("mmah"), Err(RecogError::NotReady(_))));

        store.load("mmah", CorpusSource::Json(CORPUS_1.to_string())).await.unwrap();
        assert!(store.is_ready("mmah"));
        assert!(!store.is_loading());
        let first = store.entries("mmah").unwrap();
        assert_eq!(first.len(), 3);

        // Second load of the same name is a no-op, even with different data
        store.load("mmah", CorpusSource::Json("garbage".to_string())).await.unwrap();
        let second = store.entries("mmah").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_store_failure_is_isolated() {
        let store = CorpusStore::new();
        let mut ready = store.subscribe();
        let bad = store.load("orig", CorpusSource::Json("{".to_string())).await;
        assert!(matches!(bad, Err(RecogError::CorpusLoad { .. })));
        store.load("mmah", CorpusSource::Json(CORPUS_1.to_string())).await.unwrap();
        assert!(!store.is_ready("orig"));
        assert!(store.is_ready("mmah"));
        assert_eq!(store.ready_names(), vec!["mmah".to_string()]);
        assert_eq!(*ready.borrow_and_update(), 1);
    }

    #[test]
    fn test_store_load_blocking() {
        let store = CorpusStore::new();
        store.load_blocking("mmah", CorpusSource::Json(CORPUS_1.to_string())).unwrap();
        assert_eq!(store.ready_count(), 1);
    }
}
