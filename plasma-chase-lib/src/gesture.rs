//! Button gesture recognition
//!
//! The button is sampled on a fixed poll interval and every sample is fed to
//! [`GestureRecognizer::poll`] together with the time it was taken. The
//! recognizer never sleeps or blocks itself; waiting for a second tap is just
//! a state that later polls resolve, so the caller's loop keeps yielding to
//! the other tasks.
//!
//! ```text
//!            press                    held >= long_press
//!   Idle ───────────► Pressed ─────────────────────────────► (LongPress fired)
//!    ▲                   │ release (no long press)                 │ release
//!    │                   ▼                                         │
//!    │  window expires  WaitSecondTap ◄────────────────────────────┘ (to Idle)
//!    ├──(SinglePress)──┤   │ press within window
//!    │                     ▼
//!    └──(DoublePress)── SecondPress
//!          release within window
//! ```
//!
//! Contact bounce is not filtered separately: the poll interval is the only
//! debounce, and a noisy contact simply reads as a sustained press.

use core::fmt;
use std::time::{Duration, Instant};

use crate::state::SharedState;

/// Button sampling period
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Hold time that turns a press into a long press
pub const LONG_PRESS: Duration = Duration::from_millis(600);

/// Time after a release during which a second press counts as a double press
pub const DOUBLE_PRESS_WINDOW: Duration = Duration::from_millis(300);

/// Timing thresholds for gesture classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTiming {
    pub poll_interval: Duration,
    pub long_press: Duration,
    pub double_press_window: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            long_press: LONG_PRESS,
            double_press_window: DOUBLE_PRESS_WINDOW,
        }
    }
}

/// A classified button interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Short press with no second press inside the window: next preset color
    SinglePress,
    /// Two short presses inside the window: pause or resume
    DoublePress,
    /// Held past the long-press threshold: toggle paint mode
    LongPress,
}

impl Gesture {
    /// Perform the state change bound to this gesture.
    pub fn apply(self, state: &SharedState) {
        match self {
            Self::SinglePress => {
                state.next_color();
            }
            Self::DoublePress => {
                state.toggle_pause();
            }
            Self::LongPress => {
                state.toggle_paint();
            }
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SinglePress => "single press (next color)",
            Self::DoublePress => "double press (toggle pause)",
            Self::LongPress => "long press (toggle paint)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// First press in progress
    Pressed { since: Instant, long_fired: bool },
    /// First press released; waiting for a second one until `deadline`
    WaitSecondTap { deadline: Instant },
    /// Second press in progress; it must be released before `deadline`
    SecondPress { since: Instant, deadline: Instant },
}

/// Turns raw pressed/released samples into [`Gesture`]s.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    timing: GestureTiming,
    phase: Phase,
}

impl GestureRecognizer {
    #[must_use]
    pub fn new(timing: GestureTiming) -> Self {
        Self {
            timing,
            phase: Phase::Idle,
        }
    }

    pub fn timing(&self) -> &GestureTiming {
        &self.timing
    }

    /// True when no press or double-press window is in progress
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Feed one sample. Returns a gesture at most once per completed
    /// interaction (a long press fires while still held).
    pub fn poll(&mut self, pressed: bool, now: Instant) -> Option<Gesture> {
        let (next, gesture) = match (self.phase, pressed) {
            (Phase::Idle, false) => (Phase::Idle, None),
            (Phase::Idle, true) => (Self::press_started(now), None),

            (Phase::Pressed { since, long_fired }, true) => {
                if !long_fired && now.saturating_duration_since(since) >= self.timing.long_press {
                    let held = Phase::Pressed {
                        since,
                        long_fired: true,
                    };
                    (held, Some(Gesture::LongPress))
                } else {
                    (self.phase, None)
                }
            }
            (Phase::Pressed { long_fired: true, .. }, false) => (Phase::Idle, None),
            (Phase::Pressed { long_fired: false, .. }, false) => {
                (self.wait_for_second_tap(now), None)
            }

            (Phase::WaitSecondTap { deadline }, false) => {
                if now >= deadline {
                    (Phase::Idle, Some(Gesture::SinglePress))
                } else {
                    (self.phase, None)
                }
            }
            (Phase::WaitSecondTap { deadline }, true) => {
                if now >= deadline {
                    // The window ran out before this press was seen: the first
                    // tap stands alone and this press starts a new interaction.
                    (Self::press_started(now), Some(Gesture::SinglePress))
                } else {
                    (Phase::SecondPress { since: now, deadline }, None)
                }
            }

            (Phase::SecondPress { since, deadline }, true) => {
                if now >= deadline {
                    // Held past the window: not a double press. The first tap
                    // was a single press and this one carries on as a fresh
                    // press (which may still become a long press).
                    let carried = Phase::Pressed {
                        since,
                        long_fired: false,
                    };
                    (carried, Some(Gesture::SinglePress))
                } else {
                    (self.phase, None)
                }
            }
            (Phase::SecondPress { deadline, .. }, false) => {
                if now <= deadline {
                    (Phase::Idle, Some(Gesture::DoublePress))
                } else {
                    // Released exactly between two polls straddling the
                    // deadline: treat the second press as a new tap.
                    (self.wait_for_second_tap(now), Some(Gesture::SinglePress))
                }
            }
        };
        self.phase = next;
        gesture
    }

    fn press_started(now: Instant) -> Phase {
        Phase::Pressed {
            since: now,
            long_fired: false,
        }
    }

    fn wait_for_second_tap(&self, now: Instant) -> Phase {
        Phase::WaitSecondTap {
            deadline: now + self.timing.double_press_window,
        }
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureTiming::default())
    }
}
