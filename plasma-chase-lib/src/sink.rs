//! Boundary to the LED hardware.

use core::fmt::Debug;
use core::ops::{Deref, DerefMut};

use log::{info, warn};

use crate::color::{BLACK, RGB8};

/// A strip of addressable pixels.
///
/// `set` only updates a buffer; nothing reaches the LEDs until `flush`.
pub trait PixelSink {
    type Error: Debug;

    /// Number of pixels on the strip
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer a color for pixel `index`. Out-of-range indices are ignored.
    fn set(&mut self, index: usize, color: RGB8);

    /// Push the buffered pixels to the hardware.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Turn every pixel off and flush.
    fn clear(&mut self) -> Result<(), Self::Error> {
        for index in 0..self.len() {
            self.set(index, BLACK);
        }
        self.flush()
    }
}

/// Owns a [`PixelSink`] and blanks it when dropped.
///
/// The animation task keeps its strip inside this guard, so the strip goes
/// dark on every way out of the task: a normal shutdown, an early return or
/// a panic unwinding through the loop.
pub struct ClearOnDrop<S: PixelSink> {
    sink: S,
}

impl<S: PixelSink> ClearOnDrop<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: PixelSink> Deref for ClearOnDrop<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.sink
    }
}

impl<S: PixelSink> DerefMut for ClearOnDrop<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: PixelSink> Drop for ClearOnDrop<S> {
    fn drop(&mut self) {
        match self.sink.clear() {
            Ok(()) => info!("LED strip cleared ({} pixels)", self.sink.len()),
            Err(e) => warn!("Failed to clear LED strip: {e:?}"),
        }
    }
}
