//! Desktop simulator for Plasma Chase
//!
//! Runs the firmware's three tasks on the host: the strip is drawn in the
//! terminal, the button is driven from stdin and the control page is served
//! on a real TCP port.
//!
//! Usage: cargo run -p plasma-chase-sim -- --port 8080
//! Then open http://127.0.0.1:8080/ and type `tap`, `double`, `hold` or
//! `quit` on stdin. Ctrl+C also shuts down cleanly.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter, Log, Metadata, Record};
use plasma_chase_lib::{
    run_animation, run_button, AlwaysUp, ButtonInput, ChaseConfig, ControlServer, LogLevel,
    PixelSink, SharedState, ShutdownOnDrop, BLACK, RGB8,
};

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Port for the control page [default: 8080, or the config file's].
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of simulated LEDs (overrides the config file).
    #[arg(short = 'n', long)]
    leds: Option<usize>,

    /// JSON file with chase settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Do not draw the strip in the terminal.
    #[arg(long)]
    no_render: bool,
}

/// Minimal stderr logger
struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Draws the strip as a row of truecolor blocks on stdout
struct TerminalStrip {
    pixels: Vec<RGB8>,
    enabled: bool,
}

impl PixelSink for TerminalStrip {
    type Error = io::Error;

    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut line = String::with_capacity(self.pixels.len() * 20 + 8);
        line.push('\r');
        for p in &self.pixels {
            let _ = write!(line, "\x1b[38;2;{};{};{}m█", p.r, p.g, p.b);
        }
        line.push_str("\x1b[0m");
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.flush()
    }
}

/// Port used when neither the command line nor a config file names one
const DEFAULT_PORT: u16 = 8080;

/// How often the main thread checks for a shutdown request
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Button held down while the flag is set
struct SimButton<'a>(&'a AtomicBool);

impl ButtonInput for SimButton<'_> {
    fn is_pressed(&mut self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn press(button: &AtomicBool, hold: Duration) {
    button.store(true, Ordering::Relaxed);
    thread::sleep(hold);
    button.store(false, Ordering::Relaxed);
}

/// Turn stdin commands into button presses until `quit` or end of input.
fn read_commands(button: &AtomicBool, config: &ChaseConfig) {
    let tap = Duration::from_millis(config.poll_interval_ms * 2);
    let gap = Duration::from_millis(config.poll_interval_ms * 2);
    let hold = Duration::from_millis(config.long_press_ms + config.poll_interval_ms * 2);

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "" => {}
            "tap" | "t" => press(button, tap),
            "double" | "d" => {
                press(button, tap);
                thread::sleep(gap);
                press(button, tap);
            }
            "hold" | "h" => press(button, hold),
            "quit" | "q" => return,
            other => warn!("Unknown command {other:?} (tap, double, hold, quit)"),
        }
    }
    info!("Input closed, shutting down");
}

/// Run the three tasks until something requests shutdown.
///
/// Any task ending, panics included, stops the others; the animation task
/// blanks `strip` on its way out.
fn run_tasks<S: PixelSink + Send>(
    state: &SharedState,
    strip: S,
    button: &AtomicBool,
    server: &ControlServer,
    config: &ChaseConfig,
) {
    thread::scope(|s| {
        s.spawn(|| {
            let _shutdown = ShutdownOnDrop::new(state);
            run_animation(state, strip, config.settings(), &());
        });
        s.spawn(|| {
            let _shutdown = ShutdownOnDrop::new(state);
            run_button(state, SimButton(button), config.timing(), &());
        });
        s.spawn(|| {
            let _shutdown = ShutdownOnDrop::new(state);
            server.run(state, &AlwaysUp, &());
        });

        while state.is_running() {
            thread::sleep(SHUTDOWN_POLL);
        }
    });
}

fn parse_log_level(text: &str) -> Result<LogLevel> {
    serde_json::from_value(serde_json::Value::String(text.to_lowercase()))
        .with_context(|| format!("Invalid log level '{text}'"))
}

fn load_config(args: &Args) -> Result<ChaseConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => ChaseConfig::default(),
    };

    match (args.port, &args.config) {
        (Some(port), _) => config.http_port = port,
        (None, None) => config.http_port = DEFAULT_PORT,
        (None, Some(_)) => {}
    }
    if let Some(leds) = args.leds {
        config.led_count = leds;
    }
    if let Some(level) = &args.log_level {
        config.log_level = parse_log_level(level)?;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level = config.log_level.as_level_filter();
    log::set_boxed_logger(Box::new(StderrLogger { level }))?;
    log::set_max_level(level);

    info!("Starting plasma-chase-sim with {} LEDs", config.led_count);

    let server = ControlServer::bind(("0.0.0.0", config.http_port))
        .with_context(|| format!("Failed to bind port {}", config.http_port))?;
    info!("Control page at http://127.0.0.1:{}/", config.http_port);

    let state = Arc::new(SharedState::with_default_speed(
        config.led_count,
        config.default_speed,
    ));
    let button = Arc::new(AtomicBool::new(false));
    let strip = TerminalStrip {
        pixels: vec![BLACK; config.led_count],
        enabled: !args.no_render,
    };

    {
        let state = Arc::clone(&state);
        ctrlc::set_handler(move || {
            info!("Interrupted, shutting down");
            state.request_shutdown();
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    // Detached: a blocking stdin read must not hold up shutdown
    {
        let state = Arc::clone(&state);
        let button = Arc::clone(&button);
        let config = config.clone();
        thread::spawn(move || {
            read_commands(&button, &config);
            state.request_shutdown();
        });
    }

    run_tasks(&state, strip, &button, &server, &config);

    if !args.no_render {
        println!();
    }
    info!("Shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::time::Instant;

    struct RecordingStrip {
        pixels: Vec<RGB8>,
        frames: Arc<Mutex<Vec<Vec<RGB8>>>>,
    }

    impl PixelSink for RecordingStrip {
        type Error = Infallible;

        fn len(&self) -> usize {
            self.pixels.len()
        }

        fn set(&mut self, index: usize, color: RGB8) {
            self.pixels[index] = color;
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            self.frames.lock().unwrap().push(self.pixels.clone());
            Ok(())
        }
    }

    #[test]
    fn test_interrupt_from_another_thread_blanks_strip() {
        let config = ChaseConfig {
            led_count: 6,
            ..ChaseConfig::default()
        };
        let state = Arc::new(SharedState::new(config.led_count));
        let button = AtomicBool::new(false);
        let server = ControlServer::bind("127.0.0.1:0").unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let strip = RecordingStrip {
            pixels: vec![BLACK; config.led_count],
            frames: Arc::clone(&frames),
        };

        // Stands in for the Ctrl+C handler
        let interrupt = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                state.request_shutdown();
            })
        };

        let start = Instant::now();
        run_tasks(&state, strip, &button, &server, &config);
        interrupt.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 2);
        assert_ne!(frames[0], vec![BLACK; 6]);
        assert_eq!(frames.last().unwrap(), &vec![BLACK; 6]);
    }
}
