extern crate serde_derive;
extern crate hanzi_handwriting;

use serde_derive::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hanzi_handwriting::{CorpusSource, CorpusStore, InlineExecutor, Point, RecognitionSession, SessionConfig};

const USAGE: &str = "usage: cli_demo <corpus file>... --samples <samples.jsonl> [--iters N]";

// One recorded character per line of the samples file
#[derive(Serialize, Deserialize)]
struct Sample {
    char: String,
    strokes: Vec<Vec<Vec<f32>>>,
}

struct Args {
    corpora: Vec<PathBuf>,
    samples: PathBuf,
    iters: usize,
}

fn parse_args() -> Result<Args, String> {
    let mut corpora = Vec::new();
    let mut samples = None;
    let mut iters = 1;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--samples" => samples = args.next().map(PathBuf::from),
            "--iters" => {
                iters = args
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| "--iters needs a number".to_string())?;
            }
            _ => corpora.push(PathBuf::from(arg)),
        }
    }
    let samples = samples.ok_or_else(|| USAGE.to_string())?;
    if corpora.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(Args { corpora, samples, iters })
}

fn corpus_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn read_samples(path: &Path) -> Result<Vec<Sample>, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    let mut res: Vec<Sample> = Vec::new();
    for (ix, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Sample>(line) {
            Ok(sample) => res.push(sample),
            Err(e) => warn!("Skipping sample on line {}: {e}", ix + 1),
        }
    }
    Ok(res)
}

// Replays the sample like pointer input: one move event per point, 16ms apart
fn replay(session: &mut RecognitionSession, sample: &Sample) -> Result<(), Box<dyn Error>> {
    let mut at = Duration::ZERO;
    for stroke in &sample.strokes {
        let mut points = stroke.iter().filter_map(|p| match p.as_slice() {
            [x, y, ..] => Some(Point::new(*x, *y)),
            _ => None,
        });
        let Some(first) = points.next() else {
            continue;
        };
        session.begin_stroke_at(first, at)?;
        for point in points {
            at += Duration::from_millis(16);
            session.extend_stroke_at(point, at)?;
        }
        session.end_stroke();
        at += Duration::from_millis(200);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = parse_args()?;
    let mut sources = Vec::new();
    for path in &args.corpora {
        match CorpusSource::read(path).await {
            Ok(source) => sources.push((corpus_name(path), source)),
            Err(e) => error!("Cannot read {}: {e}", path.display()),
        }
    }

    let config = SessionConfig::load();
    let store = Arc::new(CorpusStore::new());
    let mut session = RecognitionSession::with_executor(config, store, Box::new(InlineExecutor));
    for (name, res) in session.load_corpora(sources).await {
        match res {
            Ok(()) => info!("Corpus {name} ready"),
            Err(e) => error!("{e}"),
        }
    }

    info!("Loading evaluation data.");
    let samples = read_samples(&args.samples).await?;
    info!("Loaded {} samples; starting {} cycles of evaluation.", samples.len(), args.iters);

    let start = Instant::now();
    let mut guessed = 0;
    let mut top_k_hits = 0;
    for _ in 0..args.iters {
        for sample in &samples {
            replay(&mut session, sample)?;
            let matches = session.results();
            let expected = sample.char.chars().next();
            if matches.first().map(|m| m.hanzi) == expected {
                guessed += 1;
            }
            if matches.iter().any(|m| Some(m.hanzi) == expected) {
                top_k_hits += 1;
            }
            session.clear();
        }
    }
    let duration = start.elapsed();
    let total = samples.len() * args.iters;
    println!(
        "Finished {} lookups in {:?}. Correct first guesses: {}. Found among candidates: {}.",
        total, duration, guessed, top_k_hits
    );
    Ok(())
}
