//! Push button input
//!
//! ## Hardware wiring
//!
//! The internal pull-up (~45kΩ) is enabled, so the button connects the GPIO
//! pin to GND when pressed. Gesture timing samples the pin every 50ms, which
//! also rides over contact bounce.

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver, Pull};
use log::info;
use plasma_chase_lib::ButtonInput;

pub struct Button {
    pin: PinDriver<'static, AnyIOPin, Input>,
}

impl Button {
    pub fn new(gpio: u8) -> Result<Self> {
        // SAFETY: We trust the user-configured GPIO pin number is valid
        let pin = unsafe { AnyIOPin::new(i32::from(gpio)) };
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        info!("Button initialized on GPIO {gpio}");
        Ok(Self { pin })
    }
}

impl ButtonInput for Button {
    /// Active low
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}
