use anyhow::Result;
use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::RmtChannel;
use log::debug;
use plasma_chase_lib::{PixelSink, BLACK, RGB8};
use smart_leds::{brightness, SmartLedsWrite};
use ws2812_esp32_rmt_driver::Ws2812Esp32Rmt;

type DriverError = <Ws2812Esp32Rmt<'static> as SmartLedsWrite>::Error;

/// WS2812 strip on an RMT channel
pub struct StripDriver {
    driver: Ws2812Esp32Rmt<'static>,
    pixels: Vec<RGB8>,
    brightness: u8,
}

impl StripDriver {
    pub fn new<C: RmtChannel, P: OutputPin>(
        pin: impl Peripheral<P = P> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        led_count: usize,
        brightness: u8,
    ) -> Result<Self> {
        debug!("Creating LED strip driver: {led_count} LEDs, brightness {brightness}");
        let driver = Ws2812Esp32Rmt::new(channel, pin)?;

        Ok(Self {
            driver,
            pixels: vec![BLACK; led_count],
            brightness,
        })
    }
}

impl PixelSink for StripDriver {
    type Error = DriverError;

    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn flush(&mut self) -> Result<(), DriverError> {
        self.driver
            .write(brightness(self.pixels.iter().copied(), self.brightness))
    }
}

/// Single WS2812 pixel used as a status indicator
pub struct StatusLed {
    driver: Ws2812Esp32Rmt<'static>,
    shown: Option<RGB8>,
}

impl StatusLed {
    pub fn new<C: RmtChannel, P: OutputPin>(
        pin: impl Peripheral<P = P> + 'static,
        channel: impl Peripheral<P = C> + 'static,
    ) -> Result<Self> {
        debug!("Creating status LED driver");
        Ok(Self {
            driver: Ws2812Esp32Rmt::new(channel, pin)?,
            shown: None,
        })
    }

    /// Show `color`, skipping the write when it is already displayed.
    pub fn show(&mut self, color: RGB8) -> Result<()> {
        if self.shown != Some(color) {
            self.driver.write(core::iter::once(color))?;
            self.shown = Some(color);
        }
        Ok(())
    }
}
