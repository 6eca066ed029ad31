//! Long-running task loops
//!
//! Each loop runs on its own thread until [`SharedState::request_shutdown`]
//! and yields by sleeping. Hardware specifics stay behind [`PixelSink`],
//! [`ButtonInput`] and [`Heartbeat`].

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::gesture::{GestureRecognizer, GestureTiming};
use crate::render::{Animator, ChaseSettings, PAUSED_DELAY};
use crate::sink::{ClearOnDrop, PixelSink};
use crate::state::SharedState;

/// Longest single sleep inside a loop, so shutdown is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Liveness signal fed once per loop iteration
pub trait Heartbeat {
    fn beat(&self);
}

/// No watchdog
impl Heartbeat for () {
    fn beat(&self) {}
}

/// A momentary push button
pub trait ButtonInput {
    /// True while the button is held down
    fn is_pressed(&mut self) -> bool;
}

/// Sleep for `duration`, waking early once shutdown is requested.
pub fn sleep_while_running(state: &SharedState, duration: Duration) {
    let deadline = Instant::now() + duration;
    while state.is_running() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

/// Drive the strip until shutdown, then blank it.
///
/// The sink is owned by this task for its whole life; it is cleared on the
/// way out even if the loop unwinds.
pub fn run_animation<S: PixelSink>(
    state: &SharedState,
    sink: S,
    settings: ChaseSettings,
    heartbeat: &impl Heartbeat,
) {
    let mut sink = ClearOnDrop::new(sink);
    let mut animator = Animator::new(settings);
    info!(
        "Animation task started: {} LEDs, trail {}",
        settings.led_count, settings.trail_length
    );

    while state.is_running() {
        heartbeat.beat();
        let delay = match animator.tick(state, &mut *sink) {
            Ok(delay) => delay,
            Err(e) => {
                warn!("Failed to write LED frame: {e:?}");
                PAUSED_DELAY
            }
        };
        sleep_while_running(state, delay);
    }

    info!("Animation task stopping");
}

/// Poll the button and apply recognized gestures until shutdown.
pub fn run_button(
    state: &SharedState,
    mut input: impl ButtonInput,
    timing: GestureTiming,
    heartbeat: &impl Heartbeat,
) {
    let mut recognizer = GestureRecognizer::new(timing);
    info!(
        "Button task started: long press {:?}, double press window {:?}",
        timing.long_press, timing.double_press_window
    );

    while state.is_running() {
        heartbeat.beat();
        if let Some(gesture) = recognizer.poll(input.is_pressed(), Instant::now()) {
            debug!("Button: {gesture}");
            gesture.apply(state);
        }
        thread::sleep(timing.poll_interval);
    }

    info!("Button task stopping");
}
