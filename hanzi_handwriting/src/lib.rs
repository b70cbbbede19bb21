//! Handwritten Chinese character recognition.
//!
//! Strokes come in as raw pointer points ([`StrokeCapture`]), are reduced to
//! translation and scale invariant direction encodings ([`normalize`]), and are
//! scored against reference corpora ([`CorpusStore`], [`match_character`]).
//! [`RecognitionSession`] ties these together for an interactive input pad.

extern crate serde_derive;

mod capture;
mod config;
mod corpus;
mod entities;
mod error;
mod match_collector;
mod matcher;
mod normalizer;
mod session;
mod throttle;
#[cfg(feature = "wasm")]
mod wasm;

pub use capture::{CharacterState, StrokeCapture};
pub use config::{CorpusSpec, SessionConfig, DEFAULT_THROTTLE_MS, DEFAULT_TOP_K};
pub use corpus::{Corpus, CorpusBuilder, CorpusEntry, CorpusSource, CorpusStore};
pub use entities::{Match, Point, Stroke, StrokeEncoding, DIRECTION_BUCKETS, NO_DIRECTION, SEGMENT_COUNT};
pub use error::{RecogError, RecogResult};
pub use match_collector::MatchCollector;
pub use matcher::{match_character, stroke_similarity, STROKE_MISMATCH_PENALTY};
pub use normalizer::{normalize, normalize_all, REFERENCE_SIZE};
pub use session::{BlockingExecutor, InlineExecutor, LoadState, MatchExecutor, MatchJob, Recognition, RecognitionSession};
pub use throttle::PointThrottle;
#[cfg(feature = "wasm")]
pub use wasm::WasmRecognizer;

/// Normalizes a whole character and matches it in one go, without a session
pub fn match_typed(strokes: &[Stroke], corpora: &[&Corpus], limit: usize) -> RecogResult<Vec<Match>> {
    let encodings = normalize_all(strokes);
    match_character(&encodings, corpora, limit)
}

/// Converts the nested-array stroke shape used by JS callers (`number[][][]`)
pub fn strokes_from_arrays(input: &[Vec<Vec<f32>>]) -> RecogResult<Vec<Stroke>> {
    let mut strokes: Vec<Stroke> = Vec::with_capacity(input.len());
    for raw_stroke in input {
        if raw_stroke.is_empty() {
            return Err(RecogError::InvalidInput("stroke without points".to_string()));
        }
        let mut stroke = Stroke {
            points: Vec::with_capacity(raw_stroke.len()),
        };
        for raw_point in raw_stroke {
            match raw_point.as_slice() {
                [x, y, ..] => stroke.points.push(Point::new(*x, *y)),
                _ => return Err(RecogError::InvalidInput("point needs two coordinates".to_string())),
            }
        }
        strokes.push(stroke);
    }
    Ok(strokes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // This is a hand-drawn 十
    static STROKES_2: &str = "[[[76,127],[77,127],[84,127],[97,128],[119,128],[125,129],[138,130],[147,130],[153,131],[154,131],[158,131],[162,131],[167,131],[168,131],[169,131],[169,131]],[[129,60],[129,62],[128,74],[128,102],[128,118],[129,143],[130,162],[130,170],[130,178],[131,184],[131,188],[131,193],[131,196],[131,198],[131,203],[131,203]]]";

    fn reference_corpus() -> Corpus {
        let line = |x1: f32, y1: f32, x2: f32, y2: f32| Stroke::new(vec![Point::new(x1, y1), Point::new(x2, y2)]);
        let mut builder = CorpusBuilder::new("mmah");
        builder.add_strokes('一', &[line(0.0, 50.0, 100.0, 50.0)]).unwrap();
        builder.add_strokes('二', &[line(20.0, 30.0, 80.0, 30.0), line(0.0, 70.0, 100.0, 70.0)]).unwrap();
        builder.add_strokes('十', &[line(0.0, 50.0, 100.0, 50.0), line(50.0, 0.0, 50.0, 100.0)]).unwrap();
        builder.add_strokes('卜', &[line(50.0, 0.0, 50.0, 100.0), line(50.0, 40.0, 90.0, 60.0)]).unwrap();
        builder.build()
    }

    #[test]
    fn test_hand_drawn_shi() {
        let raw: Vec<Vec<Vec<f32>>> = serde_json::from_str(STROKES_2).unwrap();
        let strokes = strokes_from_arrays(&raw).unwrap();
        let corpus = reference_corpus();
        let matches = match_typed(&strokes, &[&corpus], 3).unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].hanzi, '十');
    }

    #[test]
    fn test_bad_arrays() {
        assert!(strokes_from_arrays(&[vec![]]).is_err());
        assert!(strokes_from_arrays(&[vec![vec![1.0]]]).is_err());
        assert!(strokes_from_arrays(&[]).unwrap().is_empty());
    }
}
