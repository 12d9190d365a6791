//! Playback transport model for the podcast player.
//!
//! [`Transport`] holds play/pause, position, volume and rate for the loaded
//! clip. It does not decode audio; a sink (or a test) drives it by reporting
//! elapsed wall time through [`Transport::tick`] and the clip length through
//! [`Transport::set_duration`].

/// Playback rates offered by the rate button, in cycling order.
pub const PLAYBACK_RATES: [f32; 4] = [0.5, 1.0, 1.5, 2.0];

#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    playing: bool,
    /// Seconds from the start of the clip.
    position: f64,
    /// Clip length in seconds; `None` until the sink reports it.
    duration: Option<f64>,
    volume: f32,
    rate: f32,
    skip_secs: f64,
}

impl Transport {
    pub fn new(skip_secs: f64, volume: f32) -> Self {
        Self {
            playing: false,
            position: 0.0,
            duration: None,
            volume: volume.clamp(0.0, 1.0),
            rate: 1.0,
            skip_secs,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Flip between playing and paused; returns the new playing flag.
    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    /// Jump to `secs`, clamped to `[0, duration]`.
    pub fn seek(&mut self, secs: f64) {
        self.position = self.clamp_position(secs);
    }

    /// Advance by the skip increment without passing the end of the clip.
    pub fn skip_forward(&mut self) {
        self.position = self.clamp_position(self.position + self.skip_secs);
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Move to the next entry of [`PLAYBACK_RATES`], wrapping around.
    pub fn cycle_rate(&mut self) -> f32 {
        let next = PLAYBACK_RATES
            .iter()
            .position(|r| *r == self.rate)
            .map_or(0, |i| (i + 1) % PLAYBACK_RATES.len());
        self.rate = PLAYBACK_RATES[next];
        self.rate
    }

    /// Stop and rewind; volume, rate and duration are kept.
    pub fn reset(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }

    pub fn set_duration(&mut self, secs: f64) {
        if secs.is_finite() && secs >= 0.0 {
            self.duration = Some(secs);
            self.position = self.clamp_position(self.position);
        }
    }

    /// Advance the playhead by `elapsed` wall-clock seconds at the current
    /// rate. Reaching the end stops playback and rewinds to 0; returns `true`
    /// when that happened.
    pub fn tick(&mut self, elapsed: f64) -> bool {
        if !self.playing || elapsed <= 0.0 {
            return false;
        }
        self.position += elapsed * f64::from(self.rate);
        match self.duration {
            Some(end) if self.position >= end => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    fn clamp_position(&self, secs: f64) -> f64 {
        if secs.is_nan() {
            return self.position;
        }
        let upper = self.duration.unwrap_or(f64::INFINITY);
        secs.clamp(0.0, upper)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(10.0, 1.0)
    }
}

/// Render seconds as `MM:SS`; invalid input renders as `00:00`.
///
/// ```
/// use documind::podcast::format_time;
///
/// assert_eq!(format_time(0.0), "00:00");
/// assert_eq!(format_time(75.9), "01:15");
/// assert_eq!(format_time(f64::NAN), "00:00");
/// ```
pub fn format_time(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "00:00".into();
    }
    let whole = secs.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
