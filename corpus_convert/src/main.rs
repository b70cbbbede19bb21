extern crate serde_derive;
extern crate hanzi_handwriting;

use serde_derive::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hanzi_handwriting::{strokes_from_arrays, Corpus, CorpusBuilder};

// One authored reference drawing. A glyph may appear several times, once per variant.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct AuthoredChar {
    hanzi: String,
    strokes: Vec<Vec<Vec<f32>>>,
}

fn parse_authored(fname: &Path, name: &str) -> Result<Corpus, Box<dyn Error>> {
    let file = File::open(fname)?;
    let chars: Vec<AuthoredChar> = serde_json::from_reader(file)?;

    let mut builder = CorpusBuilder::new(name);
    for authored in &chars {
        let mut glyphs = authored.hanzi.chars();
        let hanzi = match (glyphs.next(), glyphs.next()) {
            (Some(hanzi), None) => hanzi,
            _ => {
                warn!("Skipping {:?}: not a single glyph", authored.hanzi);
                continue;
            }
        };
        let strokes = match strokes_from_arrays(&authored.strokes) {
            Ok(strokes) if !strokes.is_empty() => strokes,
            Ok(_) => {
                warn!("Skipping {hanzi}: no strokes");
                continue;
            }
            Err(e) => {
                warn!("Skipping {hanzi}: {e}");
                continue;
            }
        };
        builder.add_strokes(hanzi, &strokes)?;
    }
    Ok(builder.build())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let (input, prefix) = match (args.next(), args.next()) {
        (Some(input), Some(prefix)) => (PathBuf::from(input), PathBuf::from(prefix)),
        _ => return Err("usage: corpus_convert <authored.json> <output prefix>".into()),
    };
    let name = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());

    let corpus = parse_authored(&input, &name)?;
    let variants: usize = corpus.entries().iter().map(|e| e.variants.len()).sum();
    info!("Encoded {} characters, {} variants", corpus.len(), variants);

    let json_path = prefix.with_extension("json");
    fs::write(&json_path, corpus.to_json()?)?;
    info!("Wrote {}", json_path.display());

    let bin_path = prefix.with_extension("bin");
    fs::write(&bin_path, corpus.to_bincode()?)?;
    info!("Wrote {}", bin_path.display());
    Ok(())
}
