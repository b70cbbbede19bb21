use super::entities::*;

/// Side length of the square every stroke is scaled into
pub const REFERENCE_SIZE: f32 = 256.0;

struct Rect {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Rect {
    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Computes the direction encoding of one stroke.
/// The result does not change (beyond one bucket of quantization noise) if the stroke
/// is translated or scaled uniformly. Taps and strokes whose points all coincide
/// produce the point encoding.
pub fn normalize(stroke: &Stroke) -> StrokeEncoding {
    let points = &stroke.points;
    if points.len() < 2 {
        return StrokeEncoding::point();
    }
    let bounding_rect = get_bounding_rect(points);
    // The larger side is what we scale to the reference size
    let side = f32::max(bounding_rect.width(), bounding_rect.height());
    if !side.is_finite() || side <= 0.0 {
        return StrokeEncoding::point();
    }
    let centered = center_and_scale(points, &bounding_rect, side);
    let resampled = resample(&centered, SEGMENT_COUNT + 1);
    encode_directions(&resampled)
}

/// Normalizes every stroke of a character, keeping stroke order
pub fn normalize_all(strokes: &[Stroke]) -> Vec<StrokeEncoding> {
    strokes.iter().map(normalize).collect()
}

// Gets distance between two points
fn dist(a: Point, b: Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

// Gets direction, in radians in 0..2*PI, from point a to b
// 0 is to the right, PI / 2 is down (device space has y pointing down)
fn dir(a: Point, b: Point) -> f32 {
    let angle = (b.y - a.y).atan2(b.x - a.x);
    if angle < 0f32 {
        angle + 2f32 * std::f32::consts::PI
    } else {
        angle
    }
}

// Quantizes the direction from a to b into 0..DIRECTION_BUCKETS
fn direction_bucket(a: Point, b: Point) -> u8 {
    if a == b {
        return NO_DIRECTION;
    }
    let buckets = DIRECTION_BUCKETS as f32;
    let bucket = (dir(a, b) * buckets / std::f32::consts::PI / 2f32).round();
    // A direction just below 2*PI rounds up into the first bucket
    if bucket >= buckets {
        0
    } else {
        bucket as u8
    }
}

// Moves the bounding box's center to the origin and scales the larger side to REFERENCE_SIZE
fn center_and_scale(points: &[Point], bounding_rect: &Rect, side: f32) -> Vec<Point> {
    let center_x = (bounding_rect.left + bounding_rect.right) / 2f32;
    let center_y = (bounding_rect.top + bounding_rect.bottom) / 2f32;
    let factor = REFERENCE_SIZE / side;
    points
        .iter()
        .map(|p| Point::new((p.x - center_x) * factor, (p.y - center_y) * factor))
        .collect()
}

// Resamples the path into n points equally spaced along its arc length.
// Caller guarantees at least two points and a positive path length.
fn resample(points: &[Point], n: usize) -> Vec<Point> {
    let mut cumulative: Vec<f32> = Vec::with_capacity(points.len());
    cumulative.push(0f32);
    for i in 1..points.len() {
        let so_far = cumulative[i - 1];
        cumulative.push(so_far + dist(points[i - 1], points[i]));
    }
    let total = cumulative[points.len() - 1];
    let last = points.len() - 1;

    let mut res: Vec<Point> = Vec::with_capacity(n);
    // Index of the raw segment's end point; only ever moves forward
    let mut j = 1;
    for i in 0..n {
        let target = total * (i as f32) / ((n - 1) as f32);
        while j < last && cumulative[j] < target {
            j += 1;
        }
        let span = cumulative[j] - cumulative[j - 1];
        let t = if span > 0f32 {
            ((target - cumulative[j - 1]) / span).clamp(0f32, 1f32)
        } else {
            1f32
        };
        let a = points[j - 1];
        let b = points[j];
        res.push(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
    }
    res
}

fn encode_directions(resampled: &[Point]) -> StrokeEncoding {
    let mut directions = [NO_DIRECTION; SEGMENT_COUNT];
    for (i, pair) in resampled.windows(2).take(SEGMENT_COUNT).enumerate() {
        directions[i] = direction_bucket(pair[0], pair[1]);
    }
    StrokeEncoding { directions }
}

fn get_bounding_rect(points: &[Point]) -> Rect {
    let mut res = Rect {
        top: f32::MAX,
        bottom: f32::MIN,
        left: f32::MAX,
        right: f32::MIN,
    };
    for pt in points {
        if pt.x < res.left { res.left = pt.x; }
        if pt.x > res.right { res.right = pt.x; }
        if pt.y < res.top { res.top = pt.y; }
        if pt.y > res.bottom { res.bottom = pt.y; }
    }
    res
}
