//! Virtual playback clock advanced by wall-clock deltas between animation frames.

/// Playback clock state. `current_time` always stays within `[0, total_time]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    current_time: f64,
    total_time: f64,
    is_playing: bool,
    last_frame_ms: Option<f64>, // performance.now() of the previous frame
}

impl Timebase {
    pub fn new(total_time: f64) -> Self {
        Self {
            current_time: 0.0,
            total_time: total_time.max(0.0),
            is_playing: false,
            last_frame_ms: None,
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn last_frame_ms(&self) -> Option<f64> {
        self.last_frame_ms
    }

    /// The run reached its end; only a seek or reset makes it playable again.
    pub fn is_finished(&self) -> bool {
        self.current_time >= self.total_time
    }

    /// Advance by `delta_seconds` (may be negative). Returns `true` when this tick
    /// ended the run.
    pub fn tick(&mut self, delta_seconds: f64) -> bool {
        if delta_seconds.is_finite() {
            self.current_time = (self.current_time + delta_seconds).clamp(0.0, self.total_time);
        }
        if self.is_playing && self.is_finished() {
            self.is_playing = false;
            self.last_frame_ms = None;
            return true;
        }
        false
    }

    /// Advance to the frame timestamp `now_ms`, using the previous frame as baseline.
    pub fn advance_to(&mut self, now_ms: f64) -> bool {
        let delta = self
            .last_frame_ms
            .map(|last| (now_ms - last) / 1000.0)
            .unwrap_or(0.0);
        self.last_frame_ms = Some(now_ms);
        self.tick(delta)
    }

    pub fn seek(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.current_time = seconds.clamp(0.0, self.total_time);
        }
    }

    /// Start playing with `now_ms` as the frame baseline. Refused once finished.
    pub fn play(&mut self, now_ms: f64) -> bool {
        if self.is_finished() {
            return false;
        }
        self.is_playing = true;
        self.last_frame_ms = Some(now_ms);
        true
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
        self.last_frame_ms = None;
    }

    pub fn reset(&mut self) {
        self.pause();
        self.current_time = 0.0;
    }
}

/// `M:SS` clock text.
pub fn format_time(seconds: f64) -> String {
    let whole = if seconds.is_finite() { seconds.max(0.0).floor() as u64 } else { 0 };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Time under the pointer on a progress bar `width` pixels wide.
pub fn hover_time(offset_x: f64, width: f64, total_time: f64) -> f64 {
    if width <= 0.0 {
        return 0.0;
    }
    (offset_x / width).clamp(0.0, 1.0) * total_time
}
