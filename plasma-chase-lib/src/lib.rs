//! LED chaser core for Plasma Chase
//!
//! A colored head travels along an addressable strip with a fading trail.
//! The chase is driven by three tasks sharing one [`SharedState`]: the
//! animation loop, a push button (single, double and long press) and an
//! HTTP control listener. Everything here is hardware-agnostic and can be
//! tested without embedded hardware; the strip and the button are reached
//! through [`PixelSink`] and [`ButtonInput`].

pub mod color;
pub mod config;
pub mod control;
pub mod gesture;
pub mod page;
pub mod render;
pub mod server;
pub mod sink;
pub mod state;
pub mod status;
pub mod tasks;

pub use color::{HexColorError, BLACK, PRESET_COLORS, RGB8};
pub use config::{ChaseConfig, ConfigError, LogLevel};
pub use control::{handle_request, ControlCommand, ControlError};
pub use gesture::{Gesture, GestureRecognizer, GestureTiming};
pub use render::{Animator, ChaseSettings};
pub use server::{AlwaysUp, ControlServer, LinkMonitor};
pub use sink::{ClearOnDrop, PixelSink};
pub use state::{SharedState, ShutdownOnDrop, StateSnapshot};
pub use status::status_color;
pub use tasks::{run_animation, run_button, ButtonInput, Heartbeat};
