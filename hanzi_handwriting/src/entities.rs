use serde_derive::{Deserialize, Serialize};

/// Number of direction segments in every stroke encoding
pub const SEGMENT_COUNT: usize = 16;
/// Number of quantized direction buckets covering 0..2*PI
pub const DIRECTION_BUCKETS: u8 = 16;
/// Bucket value of a segment that has no direction (taps)
pub const NO_DIRECTION: u8 = u8::MAX;

/// A raw input point, in device pixel space
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }
}

/// One pen-down to pen-up gesture
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Stroke {
        Stroke { points }
    }
}

/// Translation and scale invariant fingerprint of one stroke
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrokeEncoding {
    // One direction bucket per resampled segment, or NO_DIRECTION for each segment of a tap
    pub directions: [u8; SEGMENT_COUNT],
}

impl StrokeEncoding {
    /// The encoding of a stroke without any direction
    pub fn point() -> StrokeEncoding {
        StrokeEncoding {
            directions: [NO_DIRECTION; SEGMENT_COUNT],
        }
    }

    pub fn is_point(&self) -> bool {
        self.directions.iter().all(|d| *d == NO_DIRECTION)
    }

    /// Rebuilds an encoding from its byte form; None if the length or any bucket is off
    pub fn from_bytes(bytes: &[u8]) -> Option<StrokeEncoding> {
        if bytes.len() != SEGMENT_COUNT {
            return None;
        }
        if bytes.iter().any(|b| *b >= DIRECTION_BUCKETS && *b != NO_DIRECTION) {
            return None;
        }
        let mut directions = [0u8; SEGMENT_COUNT];
        directions.copy_from_slice(bytes);
        Some(StrokeEncoding { directions })
    }
}

/// A scored candidate character
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub hanzi: char,
    pub score: f32,
}
