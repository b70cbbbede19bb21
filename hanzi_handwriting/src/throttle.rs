use std::time::Duration;

/// Coalesces high-frequency move events.
///
/// Timestamps are durations since any fixed origin (e.g. an input event's time stamp).
/// A point arriving within `window` of the last retained point is held back as the
/// pending point, replacing any earlier pending one. A point arriving later is retained
/// and the pending point is dropped. `finish` flushes the pending point, so the last
/// point of a gesture always survives. At most one point per window is retained in
/// between the first and the last.
#[derive(Debug, Clone)]
pub struct PointThrottle<T> {
    window: Duration,
    last_retained: Option<Duration>,
    pending: Option<T>,
}

impl<T> PointThrottle<T> {
    pub fn new(window: Duration) -> PointThrottle<T> {
        PointThrottle {
            window,
            last_retained: None,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Starts a new gesture; the first item is always retained
    pub fn start(&mut self, at: Duration) {
        self.last_retained = Some(at);
        self.pending = None;
    }

    /// Offers an item; returns it back if it should be retained now
    pub fn offer(&mut self, item: T, at: Duration) -> Option<T> {
        let due = match self.last_retained {
            Some(last) => at.saturating_sub(last) >= self.window,
            None => true,
        };
        if due {
            self.last_retained = Some(at);
            self.pending = None;
            Some(item)
        } else {
            self.pending = Some(item);
            None
        }
    }

    /// Ends the gesture, handing back the held-back item if there is one
    pub fn finish(&mut self) -> Option<T> {
        self.last_retained = None;
        self.pending.take()
    }

    pub fn reset(&mut self) {
        self.last_retained = None;
        self.pending = None;
    }
}
