use anyhow::Result;
use esp_idf_hal::cpu::Core;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};
use plasma_chase_lib::{
    run_animation, run_button, status_color, ControlServer, Heartbeat, SharedState,
    ShutdownOnDrop, BLACK,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod button;
mod config;
mod leds;
mod task;
mod wifi;

use crate::task::{spawn_task, TaskWatchdog};
use button::Button;
use config::ConfigStore;
use leds::{StatusLed, StripDriver};

/// Status LED refresh period, well under the 50ms flicker half period
const STATUS_REFRESH: Duration = Duration::from_millis(10);

/// Mirror the chase color on the status pixel until shutdown, then turn it off.
fn run_status_led(state: &SharedState, mut led: StatusLed, watchdog: &TaskWatchdog) {
    let start = Instant::now();

    while state.is_running() {
        watchdog.beat();
        let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if let Err(e) = led.show(status_color(state.color(), state.is_busy(), now_ms)) {
            warn!("Failed to update status LED: {e:?}");
        }
        thread::sleep(STATUS_REFRESH);
    }

    if let Err(e) = led.show(BLACK) {
        warn!("Failed to turn off status LED: {e:?}");
    }
}

fn main() -> Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Starting plasma-chase {}...", env!("GIT_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let config = ConfigStore::open(nvs.clone())?.load_or_default();

    // Apply configured log level for all targets
    let level = config.chase.log_level.as_level_filter();
    if let Err(e) = esp_idf_svc::log::set_target_level("*", level) {
        warn!("Failed to set log level: {e}");
    } else {
        info!("Log level set to {:?}", config.chase.log_level);
    }

    info!(
        "Initializing LED strip on GPIO {} ({} LEDs)...",
        config.strip_gpio, config.chase.led_count
    );
    // SAFETY: We trust the user-configured GPIO pin number is valid for this board
    let strip_pin = unsafe { AnyIOPin::new(i32::from(config.strip_gpio)) };
    let strip = StripDriver::new(
        strip_pin,
        peripherals.rmt.channel0,
        config.chase.led_count,
        config.brightness,
    )?;

    let button = Button::new(config.button_gpio)?;

    let status_led = match config.status_gpio {
        Some(gpio) => {
            info!("Initializing status LED on GPIO {gpio}...");
            // SAFETY: As above, the configured pin is trusted
            let pin = unsafe { AnyIOPin::new(i32::from(gpio)) };
            Some(StatusLed::new(pin, peripherals.rmt.channel1)?)
        }
        None => None,
    };

    // No task is started until the network is up and the port is ours
    let link = wifi::connect(peripherals.modem, sys_loop, nvs, &config.wifi)?;
    let server = ControlServer::bind(("0.0.0.0", config.chase.http_port))?;

    let state = Arc::new(SharedState::with_default_speed(
        config.chase.led_count,
        config.chase.default_speed,
    ));

    let animation = {
        let state = state.clone();
        let settings = config.chase.settings();
        spawn_task(c"chase", Some(Core::Core1), move |watchdog| {
            run_animation(&state, strip, settings, watchdog);
        })?
    };

    {
        let state = state.clone();
        let timing = config.chase.timing();
        spawn_task(c"button", None, move |watchdog| {
            run_button(&state, button, timing, watchdog);
        })?;
    }

    if let Some(led) = status_led {
        let state = state.clone();
        spawn_task(c"status_led", None, move |watchdog| {
            run_status_led(&state, led, watchdog);
        })?;
    }

    info!("All systems running!");

    {
        // Any way out of the server loop stops the other tasks
        let _shutdown = ShutdownOnDrop::new(&state);
        let watchdog = TaskWatchdog::register_or_unwatched(c"control");
        server.run(&state, &link, &watchdog);
    }

    // The animation task blanks the strip on its way out
    if animation.join().is_err() {
        error!("Animation task panicked");
    }
    info!("Shut down");
    Ok(())
}
