use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::capture::*;
use super::config::SessionConfig;
use super::corpus::*;
use super::entities::*;
use super::error::{RecogError, RecogResult};
use super::matcher::match_character;
use super::normalizer::normalize;

/// Whether matching can run yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No corpus ready and none loading
    Idle,
    /// Loads in flight, none finished yet
    Loading,
    /// At least one corpus is ready
    Ready,
}

/// The result set the UI sees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    /// Generation of the most recent match request
    pub generation: u64,
    /// Best first
    pub matches: Vec<Match>,
    /// True while the most recent request has not published yet
    pub pending: bool,
}

/// One match computation, detached from the session that requested it.
/// Publishes only if no newer request was made in the meantime.
pub struct MatchJob {
    generation: u64,
    candidate: Vec<StrokeEncoding>,
    corpora: Vec<Arc<Corpus>>,
    top_k: usize,
    results: Arc<watch::Sender<Recognition>>,
}

impl MatchJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Computes and publishes; returns false if the result was stale and dropped
    pub fn run(self) -> bool {
        let corpora: Vec<&Corpus> = self.corpora.iter().map(|c| c.as_ref()).collect();
        let matches = match match_character(&self.candidate, &corpora, self.top_k) {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Match for generation {} failed: {e}", self.generation);
                Vec::new()
            }
        };
        let generation = self.generation;
        let count = matches.len();
        // Checked under the channel's lock, so a clear can't slip in between check and write
        let published = self.results.send_if_modified(move |current| {
            if current.generation != generation {
                return false;
            }
            current.matches = matches;
            current.pending = false;
            true
        });
        if published {
            debug!("Published {count} matches for generation {generation}");
        } else {
            debug!("Dropped stale matches for generation {generation}");
        }
        published
    }
}

/// Decides where match jobs run
pub trait MatchExecutor: Send + Sync {
    fn execute(&self, job: MatchJob);
}

/// Runs jobs on tokio's blocking pool; inline when called outside a runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingExecutor;

impl MatchExecutor for BlockingExecutor {
    fn execute(&self, job: MatchJob) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || job.run());
            }
            Err(_) => {
                job.run();
            }
        }
    }
}

/// Runs jobs on the calling thread before returning
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl MatchExecutor for InlineExecutor {
    fn execute(&self, job: MatchJob) {
        job.run();
    }
}

type CommitCallback = Box<dyn FnMut(&str) + Send>;

/// Drives recognition of one character at a time: captures strokes, keeps their
/// encodings in step, and re-matches whenever the stroke count changes.
pub struct RecognitionSession {
    config: SessionConfig,
    store: Arc<CorpusStore>,
    capture: StrokeCapture,
    // One per completed stroke, same order
    encodings: Vec<StrokeEncoding>,
    generation: u64,
    results: Arc<watch::Sender<Recognition>>,
    executor: Box<dyn MatchExecutor>,
    on_commit: Option<CommitCallback>,
}

impl RecognitionSession {
    pub fn new(config: SessionConfig, store: Arc<CorpusStore>) -> RecognitionSession {
        Self::with_executor(config, store, Box::new(BlockingExecutor))
    }

    pub fn with_executor(config: SessionConfig, store: Arc<CorpusStore>, executor: Box<dyn MatchExecutor>) -> RecognitionSession {
        let (results, _) = watch::channel(Recognition::default());
        RecognitionSession {
            capture: StrokeCapture::new(config.throttle_window),
            config,
            store,
            encodings: Vec::new(),
            generation: 0,
            results: Arc::new(results),
            executor,
            on_commit: None,
        }
    }

    /// Called with the chosen glyph whenever a candidate is committed
    pub fn on_commit(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_commit = Some(Box::new(callback));
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CorpusStore> {
        &self.store
    }

    /// Loads all sources concurrently. Every outcome is returned, in input order;
    /// failed corpora stay unavailable and do not affect the others.
    pub async fn load_corpora(&self, sources: Vec<(String, CorpusSource)>) -> Vec<(String, RecogResult<()>)> {
        let mut outcomes: Vec<(String, Option<RecogResult<()>>)> =
            sources.iter().map(|(name, _)| (name.clone(), None)).collect();
        let mut tasks = JoinSet::new();
        for (ix, (name, source)) in sources.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let res = store.load(&name, source).await;
                (ix, res)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ix, res)) => outcomes[ix].1 = Some(res),
                Err(e) => error!("Corpus load task failed: {e}"),
            }
        }
        if self.store.ready_count() == 0 {
            warn!("No corpus could be loaded; recognition stays off");
        }
        outcomes
            .into_iter()
            .map(|(name, res)| {
                let res = res.unwrap_or_else(|| Err(RecogError::corpus_load(&name, "load task did not finish")));
                (name, res)
            })
            .collect()
    }

    /// Reads and loads the corpora named in the config
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn load_configured(&self) -> Vec<(String, RecogResult<()>)> {
        let mut sources = Vec::new();
        let mut failed = Vec::new();
        for spec in &self.config.corpora {
            match CorpusSource::read(&spec.path).await {
                Ok(source) => sources.push((spec.name.clone(), source)),
                Err(e) => {
                    error!("Cannot read corpus {} from {}: {e}", spec.name, spec.path.display());
                    failed.push((spec.name.clone(), Err(RecogError::corpus_load(&spec.name, e))));
                }
            }
        }
        let mut outcomes = self.load_corpora(sources).await;
        outcomes.extend(failed);
        outcomes
    }

    pub fn load_state(&self) -> LoadState {
        if self.store.ready_count() > 0 {
            LoadState::Ready
        } else if self.store.is_loading() {
            LoadState::Loading
        } else {
            LoadState::Idle
        }
    }

    pub fn character_state(&self) -> CharacterState {
        self.capture.state()
    }

    pub fn begin_stroke(&mut self, point: Point) -> RecogResult<()> {
        self.capture.begin_stroke(point)
    }

    pub fn begin_stroke_at(&mut self, point: Point, at: Duration) -> RecogResult<()> {
        self.capture.begin_stroke_at(point, at)
    }

    pub fn extend_stroke(&mut self, point: Point) -> RecogResult<()> {
        self.capture.extend_stroke(point)
    }

    pub fn extend_stroke_at(&mut self, point: Point, at: Duration) -> RecogResult<()> {
        self.capture.extend_stroke_at(point, at)
    }

    /// Completes the active stroke and re-matches. Returns false if no stroke was active.
    pub fn end_stroke(&mut self) -> bool {
        let encoding = match self.capture.end_stroke() {
            Some(stroke) => normalize(stroke),
            None => return false,
        };
        self.encodings.push(encoding);
        self.rematch();
        true
    }

    /// Drops the last completed stroke and re-matches. Returns false, and triggers
    /// nothing, if there was no stroke to drop.
    pub fn undo_last_stroke(&mut self) -> RecogResult<bool> {
        if self.capture.undo_last_stroke()?.is_none() {
            return Ok(false);
        }
        self.encodings.pop();
        self.rematch();
        Ok(true)
    }

    /// Drops the whole character and its results; late results for it are discarded
    pub fn clear(&mut self) {
        self.capture.clear();
        self.encodings.clear();
        self.rematch();
    }

    /// Hands the candidate at `index` to the commit callback and starts a new character
    pub fn commit(&mut self, index: usize) -> RecogResult<char> {
        let chosen = self.results.borrow().matches.get(index).map(|m| m.hanzi);
        let hanzi = chosen.ok_or_else(|| RecogError::InvalidInput(format!("no candidate at position {}", index)))?;
        if let Some(callback) = self.on_commit.as_mut() {
            callback(hanzi.encode_utf8(&mut [0u8; 4]));
        }
        self.clear();
        Ok(hanzi)
    }

    pub fn strokes(&self) -> &[Stroke] {
        self.capture.strokes()
    }

    pub fn encodings(&self) -> &[StrokeEncoding] {
        &self.encodings
    }

    pub fn active_points(&self) -> Option<&[Point]> {
        self.capture.active_points()
    }

    /// Current candidates, best first
    pub fn results(&self) -> Vec<Match> {
        self.results.borrow().matches.clone()
    }

    pub fn recognition(&self) -> Recognition {
        self.results.borrow().clone()
    }

    /// Notified each time the result set changes
    pub fn subscribe(&self) -> watch::Receiver<Recognition> {
        self.results.subscribe()
    }

    // Ready corpora: configured ones in preference order, then any others in load order
    fn ready_corpora(&self) -> Vec<Arc<Corpus>> {
        let mut names: Vec<String> = self
            .config
            .corpus_names()
            .filter(|name| self.store.is_ready(name))
            .map(str::to_string)
            .collect();
        for name in self.store.ready_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names.iter().filter_map(|name| self.store.entries(name).ok()).collect()
    }

    fn rematch(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let corpora = if self.encodings.is_empty() {
            Vec::new()
        } else {
            self.ready_corpora()
        };
        if corpora.is_empty() {
            if !self.encodings.is_empty() {
                debug!("No corpus ready; dropping match request {generation}");
            }
            self.results.send_modify(|current| {
                current.generation = generation;
                current.matches.clear();
                current.pending = false;
            });
            return;
        }
        self.results.send_modify(|current| {
            current.generation = generation;
            current.pending = true;
        });
        self.executor.execute(MatchJob {
            generation,
            candidate: self.encodings.clone(),
            corpora,
            top_k: self.config.top_k,
            results: Arc::clone(&self.results),
        });
    }
}
