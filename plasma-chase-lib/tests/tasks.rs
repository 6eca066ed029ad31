//! End-to-end runs of the task loops on real threads and sockets

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use plasma_chase_lib::{
    run_animation, AlwaysUp, ChaseSettings, ControlServer, PixelSink, SharedState,
    ShutdownOnDrop, BLACK, RGB8,
};

fn request(addr: std::net::SocketAddr, line: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(line.as_bytes()).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
fn test_control_server_over_loopback() {
    let state = SharedState::new(20);
    let server = ControlServer::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|s| {
        s.spawn(|| server.run(&state, &AlwaysUp, &()));
        let _shutdown = ShutdownOnDrop::new(&state);

        let response = request(
            addr,
            "GET /?speed=60&color=%2300ff00 HTTP/1.1\r\nHost: test\r\n\r\n",
        );
        assert!(response.starts_with("HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n"));
        assert!(response.contains("value=\"60\""));
        assert!(response.contains("value=\"#00ff00\""));

        // A malformed key stops processing but the page still comes back
        let response = request(addr, "GET /?speed=oops&remember=1 HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.0 200 OK"));

        // Plain page fetch
        let response = request(addr, "GET / HTTP/1.1\r\n\r\n");
        assert!(response.contains("</html>"));
    });

    assert_eq!(state.speed(), 60);
    assert_eq!(state.color(), RGB8::new(0, 255, 0));
    assert!(!state.paint_mode());
    assert!(!state.is_busy());
}

#[derive(Clone)]
struct RecordingStrip {
    pixels: Vec<RGB8>,
    frames: Arc<Mutex<Vec<Vec<RGB8>>>>,
}

impl PixelSink for RecordingStrip {
    type Error = std::convert::Infallible;

    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.frames.lock().unwrap().push(self.pixels.clone());
        Ok(())
    }
}

#[test]
fn test_animation_runs_then_clears_on_shutdown() {
    let state = SharedState::new(8);
    state.set_speed(100);
    let frames = Arc::new(Mutex::new(Vec::new()));
    let strip = RecordingStrip {
        pixels: vec![BLACK; 8],
        frames: frames.clone(),
    };

    thread::scope(|s| {
        s.spawn(|| run_animation(&state, strip, ChaseSettings::new(8), &()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while frames.lock().unwrap().len() < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        state.request_shutdown();
    });

    let frames = frames.lock().unwrap();
    assert!(frames.len() >= 5);
    // Head moves one pixel per frame
    assert_eq!(frames[0][0], RGB8::new(255, 0, 0));
    assert_eq!(frames[1][1], RGB8::new(255, 0, 0));
    // Last flush is the shutdown sweep
    assert_eq!(frames.last().unwrap(), &vec![BLACK; 8]);
}
