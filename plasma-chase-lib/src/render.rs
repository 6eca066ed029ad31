//! Chaser rendering
//!
//! One frame is a pure function of the shared state and the chaser offset:
//!
//! ```text
//!   index:   ... 5    6     7     8     9     10    11 ...
//!   pixel:   ... off  4%    16%   36%   64%   HEAD  off ...
//!                     └──────── trail ─────────┘
//! ```
//!
//! In paint mode every pixel the head has visited keeps its color at
//! [`PAINT_DIM`] brightness, and the trail only ever brightens it.

use std::time::Duration;

use crate::color::{max_channels, scale, BLACK, RGB8};
use crate::sink::PixelSink;
use crate::state::SharedState;

/// Number of fading pixels behind the head
pub const TRAIL_LENGTH: usize = 4;

/// Brightness of painted pixels relative to the paint color
pub const PAINT_DIM: f32 = 0.4;

/// Delay between frames while paused
pub const PAUSED_DELAY: Duration = Duration::from_millis(100);

/// Frame delay at speed 0 if it were not a pause; each speed step takes off
/// [`SPEED_STEP_MS`].
const BASE_FRAME_DELAY_MS: u64 = 210;
const SPEED_STEP_MS: u64 = 2;
const MIN_FRAME_DELAY_MS: u64 = 10;

/// Geometry of the animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChaseSettings {
    pub led_count: usize,
    pub trail_length: usize,
    pub paint_dim: f32,
}

impl ChaseSettings {
    /// Default trail and paint brightness for a strip of `led_count` pixels
    #[must_use]
    pub const fn new(led_count: usize) -> Self {
        Self {
            led_count,
            trail_length: TRAIL_LENGTH,
            paint_dim: PAINT_DIM,
        }
    }
}

/// How long to wait after a frame rendered at `speed`.
///
/// Speed 1 waits 208ms, speed 100 waits 10ms; the map is linear in between
/// and never drops below 10ms.
#[must_use]
pub fn frame_delay(speed: u8) -> Duration {
    if speed == 0 {
        return PAUSED_DELAY;
    }
    let ms = BASE_FRAME_DELAY_MS
        .saturating_sub(u64::from(speed) * SPEED_STEP_MS)
        .max(MIN_FRAME_DELAY_MS);
    Duration::from_millis(ms)
}

/// Color of the trail pixel `t` steps behind a head of `color`.
///
/// Each channel is `c * (1 - t / n)^2` with `n = trail_length + 1`, truncated.
/// Integer math keeps every step exact, so `t = 3` of 4 gives `c * 4 / 25`.
#[must_use]
pub fn trail_color(color: RGB8, t: usize, trail_length: usize) -> RGB8 {
    let n = u32::try_from(trail_length + 1).unwrap_or(u32::MAX);
    let remaining = n.saturating_sub(u32::try_from(t).unwrap_or(u32::MAX));
    let numerator = u64::from(remaining).pow(2);
    let denominator = u64::from(n).pow(2);
    #[allow(clippy::cast_possible_truncation)] // numerator <= denominator
    let channel = |c: u8| (u64::from(c) * numerator / denominator) as u8;
    RGB8::new(channel(color.r), channel(color.g), channel(color.b))
}

/// Renders frames and owns the chaser position.
pub struct Animator {
    settings: ChaseSettings,
    offset: usize,
    frame: Vec<RGB8>,
}

impl Animator {
    #[must_use]
    pub fn new(settings: ChaseSettings) -> Self {
        Self {
            settings,
            offset: 0,
            frame: vec![BLACK; settings.led_count],
        }
    }

    /// Start the head at `offset` instead of pixel 0.
    #[must_use]
    pub fn starting_at(mut self, offset: usize) -> Self {
        self.offset = offset.checked_rem(self.settings.led_count).unwrap_or(0);
        self
    }

    /// Current head position, always a valid pixel index
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The most recently rendered frame
    pub fn frame(&self) -> &[RGB8] {
        &self.frame
    }

    pub fn settings(&self) -> &ChaseSettings {
        &self.settings
    }

    /// Compute the frame for the current offset.
    ///
    /// In paint mode this also stamps the head pixel into the canvas. While
    /// paused the same pixel is restamped with the same color each frame,
    /// which changes nothing.
    pub fn render(&mut self, state: &SharedState) -> &[RGB8] {
        let led_count = self.settings.led_count;
        if led_count == 0 {
            return &self.frame;
        }

        let head = self.offset % led_count;
        let color = state.color();
        let paint_mode = state.paint_mode();
        let dim = self.settings.paint_dim;

        if paint_mode {
            state.stamp(head, color);
            state.with_canvas(|canvas| {
                for (i, pixel) in self.frame.iter_mut().enumerate() {
                    *pixel = canvas.get(i).map_or(BLACK, |&c| scale(c, dim));
                }
            });
        } else {
            self.frame.fill(BLACK);
        }

        self.frame[head] = color;

        // A trail longer than the strip would wrap onto the head
        let trail_length = self.settings.trail_length.min(led_count - 1);
        for t in 1..=trail_length {
            let index = (head + led_count - t) % led_count;
            let trail = trail_color(color, t, self.settings.trail_length);
            // The base layer already holds the dimmed painted color (or black)
            self.frame[index] = if paint_mode {
                max_channels(self.frame[index], trail)
            } else {
                trail
            };
        }

        &self.frame
    }

    /// Move the head one step unless paused, returning the delay until the
    /// next frame.
    pub fn advance(&mut self, speed: u8) -> Duration {
        if speed > 0 && self.settings.led_count > 0 {
            self.offset = (self.offset + 1) % self.settings.led_count;
        }
        frame_delay(speed)
    }

    /// Render, push the frame to `sink`, flush and advance.
    ///
    /// A failed flush leaves the offset where it was.
    pub fn tick<S: PixelSink>(
        &mut self,
        state: &SharedState,
        sink: &mut S,
    ) -> Result<Duration, S::Error> {
        self.render(state);
        for (index, &color) in self.frame.iter().enumerate() {
            sink.set(index, color);
        }
        sink.flush()?;
        Ok(self.advance(state.speed()))
    }
}
