//! State shared between the animation, the button and the control listener.
//!
//! Every field is independently atomic: scalar fields live in atomics and the
//! painted canvas sits behind its own mutex. A reader may observe a mutation
//! that landed mid-frame, but never a half-written value. Compound
//! invariants (such as "the canvas is black whenever paint mode is off") only
//! hold between toggles.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::color::{parse_hex_color, to_hex, HexColorError, BLACK, PRESET_COLORS, RGB8};

/// Highest accepted speed
pub const MAX_SPEED: u8 = 100;

/// Speed at power-on, and the speed a paused chase resumes at
pub const DEFAULT_SPEED: u8 = 25;

/// Colors travel through an `AtomicU32` as `0x00RRGGBB` so readers always see
/// all three channels from the same write.
const fn pack(color: RGB8) -> u32 {
    (color.r as u32) << 16 | (color.g as u32) << 8 | color.b as u32
}

#[allow(clippy::cast_possible_truncation)]
const fn unpack(packed: u32) -> RGB8 {
    RGB8::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
}

/// Values rendered into the status page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub speed: u8,
    pub color: RGB8,
    pub paint_mode: bool,
}

/// Central state shared across tasks
pub struct SharedState {
    speed: AtomicU8,
    color: AtomicU32,
    paint_mode: AtomicBool,
    color_cycle_index: AtomicUsize,
    /// Per-pixel painted colors; the length never changes after construction
    canvas: Mutex<Vec<RGB8>>,
    /// Speed restored by [`SharedState::toggle_pause`]
    resume_speed: u8,
    /// Cleared once to stop every task loop
    running: AtomicBool,
    /// Set while the control listener is servicing a request
    busy: AtomicBool,
}

impl SharedState {
    /// Create the power-on state for a strip of `led_count` pixels.
    #[must_use]
    pub fn new(led_count: usize) -> Self {
        Self::with_default_speed(led_count, DEFAULT_SPEED)
    }

    /// Like [`SharedState::new`] with a configured start/resume speed.
    ///
    /// A resume speed of 0 could never unpause, so 0 falls back to
    /// [`DEFAULT_SPEED`].
    #[must_use]
    pub fn with_default_speed(led_count: usize, default_speed: u8) -> Self {
        let default_speed = match default_speed {
            0 => DEFAULT_SPEED,
            speed => speed.min(MAX_SPEED),
        };
        Self {
            speed: AtomicU8::new(default_speed),
            color: AtomicU32::new(pack(PRESET_COLORS[0])),
            paint_mode: AtomicBool::new(false),
            color_cycle_index: AtomicUsize::new(0),
            canvas: Mutex::new(vec![BLACK; led_count]),
            resume_speed: default_speed,
            running: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }

    /// Number of pixels in the painted canvas
    pub fn led_count(&self) -> usize {
        self.lock_canvas().len()
    }

    pub fn speed(&self) -> u8 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Store a speed, clamped to `0..=100`. Returns the stored value.
    pub fn set_speed(&self, speed: u32) -> u8 {
        // Clamped to MAX_SPEED first, so the narrowing cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        let clamped = speed.min(u32::from(MAX_SPEED)) as u8;
        self.speed.store(clamped, Ordering::Relaxed);
        clamped
    }

    pub fn is_paused(&self) -> bool {
        self.speed() == 0
    }

    /// Pause a running chase, or resume a paused one at the default speed.
    ///
    /// Returns the new speed.
    pub fn toggle_pause(&self) -> u8 {
        let resume = self.resume_speed;
        let toggle = |speed: u8| if speed > 0 { 0 } else { resume };
        // The closure always returns Some, so both arms carry the old value
        let previous = self
            .speed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| Some(toggle(s)))
            .unwrap_or_else(|s| s);
        toggle(previous)
    }

    pub fn color(&self) -> RGB8 {
        unpack(self.color.load(Ordering::Relaxed))
    }

    pub fn set_color(&self, color: RGB8) {
        self.color.store(pack(color), Ordering::Relaxed);
    }

    /// Current color as six lowercase hex digits
    pub fn hex(&self) -> String {
        to_hex(self.color())
    }

    /// Parse and store a hex color; malformed input leaves the color unchanged.
    pub fn set_hex(&self, text: &str) -> Result<RGB8, HexColorError> {
        let color = parse_hex_color(text)?;
        self.set_color(color);
        Ok(color)
    }

    /// Step to the next preset color (wrapping) and make it the chase color.
    pub fn next_color(&self) -> RGB8 {
        let step = |i: usize| (i + 1) % PRESET_COLORS.len();
        let previous = self
            .color_cycle_index
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some(step(i)))
            .unwrap_or_else(|i| i);
        let color = PRESET_COLORS[step(previous)];
        self.set_color(color);
        color
    }

    pub fn color_cycle_index(&self) -> usize {
        self.color_cycle_index.load(Ordering::Relaxed)
    }

    pub fn paint_mode(&self) -> bool {
        self.paint_mode.load(Ordering::Relaxed)
    }

    /// Set paint mode explicitly.
    ///
    /// Turning it on keeps the canvas; turning it off (even when already off)
    /// wipes it.
    pub fn set_paint_mode(&self, enabled: bool) {
        self.paint_mode.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.clear_canvas();
        }
    }

    /// Flip paint mode, clearing the canvas only when it turns off.
    ///
    /// Returns the new mode.
    pub fn toggle_paint(&self) -> bool {
        let was_on = self.paint_mode.fetch_xor(true, Ordering::Relaxed);
        if was_on {
            self.clear_canvas();
        }
        !was_on
    }

    /// Record `color` as the persisted color of pixel `index`.
    ///
    /// Out-of-range indices are ignored.
    pub fn stamp(&self, index: usize, color: RGB8) {
        if let Some(pixel) = self.lock_canvas().get_mut(index) {
            *pixel = color;
        }
    }

    pub fn clear_canvas(&self) {
        debug!("Clearing painted canvas");
        self.lock_canvas().fill(BLACK);
    }

    /// Run `f` against the painted canvas without copying it.
    pub fn with_canvas<R>(&self, f: impl FnOnce(&[RGB8]) -> R) -> R {
        f(&self.lock_canvas())
    }

    /// Copy of the painted canvas
    pub fn canvas(&self) -> Vec<RGB8> {
        self.lock_canvas().clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            speed: self.speed(),
            color: self.color(),
            paint_mode: self.paint_mode(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask every task loop to finish its current iteration and return.
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// True while a control request is being serviced
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Mark a control request in progress until the guard drops.
    pub fn begin_request(&self) -> RequestGuard<'_> {
        self.busy.store(true, Ordering::Relaxed);
        RequestGuard { state: self }
    }

    // The canvas is plain data; a panic while holding the lock cannot leave it
    // in a state worse than "some pixels already restamped".
    fn lock_canvas(&self) -> MutexGuard<'_, Vec<RGB8>> {
        self.canvas.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the busy flag on drop
pub struct RequestGuard<'a> {
    state: &'a SharedState,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Relaxed);
    }
}

/// Requests shutdown of all tasks when dropped.
///
/// Held by `main` around the run loop so every exit path, including an
/// error return or a panic unwinding through `main`, stops the animation
/// task and lets it blank the strip.
pub struct ShutdownOnDrop<'a> {
    state: &'a SharedState,
}

impl<'a> ShutdownOnDrop<'a> {
    #[must_use]
    pub fn new(state: &'a SharedState) -> Self {
        Self { state }
    }
}

impl Drop for ShutdownOnDrop<'_> {
    fn drop(&mut self) {
        self.state.request_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painted(state: &SharedState) -> usize {
        state.canvas().iter().filter(|&&c| c != BLACK).count()
    }

    #[test]
    fn test_defaults() {
        let state = SharedState::new(50);
        assert_eq!(state.speed(), 25);
        assert_eq!(state.color(), RGB8::new(255, 0, 0));
        assert!(!state.paint_mode());
        assert_eq!(state.led_count(), 50);
        assert_eq!(painted(&state), 0);
        assert!(state.is_running());
        assert!(!state.is_busy());
    }

    #[test]
    fn test_set_speed_clamps() {
        let state = SharedState::new(10);
        assert_eq!(state.set_speed(500), 100);
        assert_eq!(state.speed(), 100);
        assert_eq!(state.set_speed(0), 0);
        assert!(state.is_paused());
        assert_eq!(state.set_speed(u32::MAX), 100);
    }

    #[test]
    fn test_pack_unpack() {
        for color in PRESET_COLORS {
            assert_eq!(unpack(pack(color)), color);
        }
    }

    #[test]
    fn test_set_hex_then_hex() {
        let state = SharedState::new(10);
        state.set_hex("#1A2b3C").unwrap();
        assert_eq!(state.hex(), "1a2b3c");
    }

    #[test]
    fn test_set_hex_invalid_keeps_color() {
        let state = SharedState::new(10);
        state.set_color(RGB8::new(1, 2, 3));
        assert!(state.set_hex("12345").is_err());
        assert!(state.set_hex("zz0000").is_err());
        assert_eq!(state.color(), RGB8::new(1, 2, 3));
    }

    #[test]
    fn test_toggle_pause() {
        let state = SharedState::new(10);
        state.set_speed(80);
        assert_eq!(state.toggle_pause(), 0);
        assert_eq!(state.toggle_pause(), DEFAULT_SPEED);
        assert_eq!(state.toggle_pause(), 0);
    }

    #[test]
    fn test_toggle_pause_custom_resume_speed() {
        let state = SharedState::with_default_speed(10, 60);
        assert_eq!(state.speed(), 60);
        state.toggle_pause();
        assert_eq!(state.toggle_pause(), 60);
    }

    #[test]
    fn test_zero_default_speed_still_resumes() {
        let state = SharedState::with_default_speed(10, 0);
        assert_eq!(state.speed(), DEFAULT_SPEED);
        assert_eq!(state.toggle_pause(), 0);
        assert_eq!(state.toggle_pause(), DEFAULT_SPEED);
    }

    #[test]
    fn test_next_color_cycles_and_wraps() {
        let state = SharedState::new(10);
        assert_eq!(state.next_color(), PRESET_COLORS[1]);
        assert_eq!(state.color_cycle_index(), 1);
        for _ in 0..PRESET_COLORS.len() - 1 {
            state.next_color();
        }
        assert_eq!(state.color_cycle_index(), 0);
        assert_eq!(state.color(), PRESET_COLORS[0]);
    }

    #[test]
    fn test_toggle_paint_twice_clears_once_on_off() {
        let state = SharedState::new(10);
        assert!(state.toggle_paint());
        state.stamp(3, RGB8::new(9, 9, 9));
        // Turning on must not have cleared anything stamped afterwards
        assert_eq!(painted(&state), 1);

        assert!(!state.toggle_paint());
        assert_eq!(painted(&state), 0);
    }

    #[test]
    fn test_toggle_paint_on_keeps_existing_canvas() {
        let state = SharedState::new(10);
        state.stamp(0, RGB8::new(1, 1, 1));
        state.toggle_paint();
        assert_eq!(painted(&state), 1);
    }

    #[test]
    fn test_set_paint_mode_on_is_idempotent() {
        let state = SharedState::new(10);
        state.set_paint_mode(true);
        state.stamp(4, RGB8::new(0, 0, 200));
        state.set_paint_mode(true);
        assert!(state.paint_mode());
        assert_eq!(painted(&state), 1);
    }

    #[test]
    fn test_set_paint_mode_off_always_clears() {
        let state = SharedState::new(10);
        state.stamp(4, RGB8::new(0, 0, 200));
        state.set_paint_mode(false);
        assert_eq!(painted(&state), 0);
    }

    #[test]
    fn test_stamp_out_of_range_ignored() {
        let state = SharedState::new(4);
        state.stamp(4, RGB8::new(1, 1, 1));
        assert_eq!(state.canvas().len(), 4);
        assert_eq!(painted(&state), 0);
    }

    #[test]
    fn test_request_guard_clears_busy() {
        let state = SharedState::new(4);
        {
            let _guard = state.begin_request();
            assert!(state.is_busy());
        }
        assert!(!state.is_busy());
    }

    #[test]
    fn test_shutdown_on_drop() {
        let state = SharedState::new(4);
        {
            let _guard = ShutdownOnDrop::new(&state);
            assert!(state.is_running());
        }
        assert!(!state.is_running());
    }

    #[test]
    fn test_concurrent_color_writes_never_tear() {
        let state = SharedState::new(4);
        let a = RGB8::new(255, 0, 0);
        let b = RGB8::new(0, 0, 255);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..10_000 {
                    state.set_color(if i % 2 == 0 { a } else { b });
                }
            });
            for _ in 0..10_000 {
                let seen = state.color();
                assert!(seen == a || seen == b, "torn color {seen:?}");
            }
        });
    }
}
