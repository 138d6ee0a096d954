use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    pub max_fps: u32,
    pub idle_interval: Duration,
    pub fast_frames_after_update: u32,
    pub summary_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            max_fps: 30,
            idle_interval: Duration::from_secs(1),
            fast_frames_after_update: 6,
            summary_interval: Duration::from_secs(10),
        }
    }
}

impl PacingConfig {
    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.max_fps.max(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub frames: u64,
    pub window: Duration,
}

/// Frame cadence state machine. Active mode reschedules at the capped frame
/// interval while the activity counter is positive; Idle mode polls once per
/// idle interval. The host kicks the pacer (deadline = now) when input
/// arrives and pauses it across suspend.
pub struct FramePacer {
    config: PacingConfig,
    last_frame: Instant,
    fast_frames_remaining: u32,
    paused: bool,
    frame_counter: u64,
    summary_window: Duration,
}

impl FramePacer {
    pub fn new(config: PacingConfig, now: Instant) -> Self {
        Self {
            config,
            last_frame: now,
            // One guaranteed fast frame so the first render happens promptly.
            fast_frames_remaining: 1,
            paused: false,
            frame_counter: 0,
            summary_window: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        // Time spent suspended must not leak into the next frame's delta.
        self.last_frame = now;
    }

    /// Remaining frame budget; the caller sleeps this long before running the
    /// pass so a wall-clock frame never beats the cap. Zero when the frame is
    /// already over budget (no catch-up).
    pub fn pace_delay(&self, now: Instant) -> Duration {
        self.config.frame_budget().saturating_sub(now.duration_since(self.last_frame))
    }

    /// Advances the time base and returns the frame delta in milliseconds.
    /// Call after any pacing sleep.
    pub fn begin_frame(&mut self, now: Instant) -> f64 {
        let dt = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_counter += 1;
        self.summary_window += dt;
        dt.as_secs_f64() * 1000.0
    }

    /// Frame-count summary once per summary interval. Quiet windows (idle
    /// polling only) report nothing.
    pub fn take_summary(&mut self) -> Option<FrameSummary> {
        if self.summary_window < self.config.summary_interval {
            return None;
        }
        let summary = FrameSummary { frames: self.frame_counter, window: self.summary_window };
        self.frame_counter = 0;
        self.summary_window = Duration::ZERO;
        if summary.frames > 2 * self.config.summary_interval.as_secs() {
            Some(summary)
        } else {
            None
        }
    }

    /// Input was processed or the script reported a visual change: stay in
    /// Active mode for the next few frames.
    pub fn mark_activity(&mut self) {
        self.fast_frames_remaining = self.config.fast_frames_after_update;
    }

    /// Interval until the next scheduled fire, consuming one fast frame if
    /// any remain.
    pub fn next_interval(&mut self) -> Duration {
        if self.fast_frames_remaining > 0 {
            self.fast_frames_remaining -= 1;
            self.config.frame_budget()
        } else {
            self.config.idle_interval
        }
    }
}
