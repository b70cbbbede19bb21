use std::time::{Duration, Instant};

use super::entities::*;
use super::error::{RecogError, RecogResult};
use super::throttle::PointThrottle;

/// Where the character being drawn currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterState {
    /// No strokes, nothing being drawn
    Empty,
    /// At least one completed stroke, pen is up
    Drawing,
    /// Pen is down
    ActiveStroke,
}

/// Records pointer input into the ordered strokes of one character
#[derive(Debug)]
pub struct StrokeCapture {
    strokes: Vec<Stroke>,
    // Points of the stroke being drawn, if the pen is down
    active: Option<Vec<Point>>,
    throttle: PointThrottle<Point>,
    // Time origin for the untimed calls, set on first use
    origin: Option<Instant>,
}

impl StrokeCapture {
    pub fn new(throttle_window: Duration) -> StrokeCapture {
        StrokeCapture {
            strokes: Vec::new(),
            active: None,
            throttle: PointThrottle::new(throttle_window),
            origin: None,
        }
    }

    fn now(&mut self) -> Duration {
        self.origin.get_or_insert_with(Instant::now).elapsed()
    }

    pub fn begin_stroke(&mut self, point: Point) -> RecogResult<()> {
        let at = self.now();
        self.begin_stroke_at(point, at)
    }

    /// `at` is the event time, measured from any fixed origin
    pub fn begin_stroke_at(&mut self, point: Point, at: Duration) -> RecogResult<()> {
        if self.active.is_some() {
            return Err(RecogError::InvalidState("a stroke is already active"));
        }
        self.throttle.start(at);
        self.active = Some(vec![point]);
        Ok(())
    }

    pub fn extend_stroke(&mut self, point: Point) -> RecogResult<()> {
        let at = self.now();
        self.extend_stroke_at(point, at)
    }

    pub fn extend_stroke_at(&mut self, point: Point, at: Duration) -> RecogResult<()> {
        let active = self
            .active
            .as_mut()
            .ok_or(RecogError::InvalidState("no active stroke to extend"))?;
        if let Some(point) = self.throttle.offer(point, at) {
            active.push(point);
        }
        Ok(())
    }

    /// Freezes the active stroke and appends it to the character.
    /// Returns None, and changes nothing, if no stroke was active.
    pub fn end_stroke(&mut self) -> Option<&Stroke> {
        let mut points = self.active.take()?;
        if let Some(last) = self.throttle.finish() {
            points.push(last);
        }
        self.strokes.push(Stroke::new(points));
        self.strokes.last()
    }

    /// Drops the most recent completed stroke; Ok(None) if there is none
    pub fn undo_last_stroke(&mut self) -> RecogResult<Option<Stroke>> {
        if self.active.is_some() {
            return Err(RecogError::InvalidState("cannot undo while a stroke is active"));
        }
        Ok(self.strokes.pop())
    }

    /// Drops every stroke, including one being drawn. Returns the number of completed strokes removed.
    pub fn clear(&mut self) -> usize {
        self.active = None;
        self.throttle.reset();
        let removed = self.strokes.len();
        self.strokes.clear();
        removed
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Points of the stroke being drawn, for live rendering
    pub fn active_points(&self) -> Option<&[Point]> {
        self.active.as_deref()
    }

    pub fn state(&self) -> CharacterState {
        if self.active.is_some() {
            CharacterState::ActiveStroke
        } else if self.strokes.is_empty() {
            CharacterState::Empty
        } else {
            CharacterState::Drawing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> StrokeCapture {
        StrokeCapture::new(Duration::from_millis(6))
    }

    #[test]
    fn test_stroke_lifecycle() {
        let mut cap = capture();
        assert_eq!(cap.state(), CharacterState::Empty);
        cap.begin_stroke(Point::new(1.0, 1.0)).unwrap();
        assert_eq!(cap.state(), CharacterState::ActiveStroke);
        let stroke = cap.end_stroke().unwrap();
        assert_eq!(stroke.points, vec![Point::new(1.0, 1.0)]);
        assert_eq!(cap.state(), CharacterState::Drawing);
        assert_eq!(cap.stroke_count(), 1);
    }

    #[test]
    fn test_out_of_sequence() {
        let mut cap = capture();
        assert!(matches!(cap.extend_stroke(Point::new(0.0, 0.0)), Err(RecogError::InvalidState(_))));
        assert!(cap.end_stroke().is_none());
        cap.begin_stroke(Point::new(0.0, 0.0)).unwrap();
        assert!(matches!(cap.begin_stroke(Point::new(1.0, 0.0)), Err(RecogError::InvalidState(_))));
        assert!(matches!(cap.undo_last_stroke(), Err(RecogError::InvalidState(_))));
        // Rejected calls leave the active stroke intact
        assert_eq!(cap.active_points().unwrap().len(), 1);
        assert_eq!(cap.stroke_count(), 0);
    }

    #[test]
    fn test_throttled_points_keep_first_and_last() {
        let mut cap = capture();
        cap.begin_stroke_at(Point::new(0.0, 0.0), Duration::ZERO).unwrap();
        for i in 1..10u64 {
            cap.extend_stroke_at(Point::new(i as f32, 0.0), Duration::from_millis(i)).unwrap();
        }
        let stroke = cap.end_stroke().unwrap();
        let xs: Vec<f32> = stroke.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 6.0, 9.0]);
    }

    #[test]
    fn test_undo_and_clear() {
        let mut cap = capture();
        assert!(cap.undo_last_stroke().unwrap().is_none());
        for i in 0..3 {
            cap.begin_stroke(Point::new(i as f32, 0.0)).unwrap();
            cap.end_stroke();
        }
        let undone = cap.undo_last_stroke().unwrap().unwrap();
        assert_eq!(undone.points[0].x, 2.0);
        assert_eq!(cap.stroke_count(), 2);
        cap.begin_stroke(Point::new(9.0, 9.0)).unwrap();
        assert_eq!(cap.clear(), 2);
        assert_eq!(cap.state(), CharacterState::Empty);
        assert!(cap.active_points().is_none());
    }
}
