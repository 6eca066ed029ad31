//! Control listener
//!
//! A single-threaded HTTP/1.0 responder: accept, read the request line,
//! apply it, write the page, close. The listening socket is non-blocking so
//! the loop can notice shutdown, feed its heartbeat and check the network
//! link between connections.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::control::handle_request;
use crate::state::SharedState;
use crate::tasks::Heartbeat;

/// Most bytes read from one request
pub const READ_LIMIT: usize = 1024;

/// Read and write timeout on accepted connections
pub const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// How often the network link is checked
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Sleep between accept attempts when nobody is connecting
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Reports whether the network link is usable
pub trait LinkMonitor {
    fn is_up(&self) -> bool;
}

/// For hosts where the link is not managed by this process
pub struct AlwaysUp;

impl LinkMonitor for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}

pub struct ControlServer {
    listener: TcpListener,
}

impl ControlServer {
    /// Bind the listening socket.
    ///
    /// Done before any task starts so a port conflict aborts startup.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve requests until shutdown.
    ///
    /// Connection failures are logged and dropped; the loop keeps going.
    pub fn run(&self, state: &SharedState, link: &impl LinkMonitor, heartbeat: &impl Heartbeat) {
        match self.local_addr() {
            Ok(addr) => info!("Control server listening on {addr}"),
            Err(e) => warn!("Control server started, local address unknown: {e}"),
        }

        let mut link_up = true;
        let mut last_check = Instant::now();

        while state.is_running() {
            heartbeat.beat();

            if last_check.elapsed() >= HEALTH_CHECK_INTERVAL {
                last_check = Instant::now();
                link_up = check_link(link, link_up);
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("Control client connected: {peer}");
                    let _busy = state.begin_request();
                    if let Err(e) = serve_connection(state, stream) {
                        warn!("Control request from {peer} failed: {e}");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    error!("Error accepting control connection: {e:?}");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        info!("Control server stopping");
    }
}

/// Log link transitions and return the new link state.
fn check_link(link: &impl LinkMonitor, was_up: bool) -> bool {
    let up = link.is_up();
    match (was_up, up) {
        (true, false) => warn!("Network link lost; waiting for it to come back"),
        (false, true) => info!("Network link restored"),
        _ => {}
    }
    up
}

fn serve_connection(state: &SharedState, mut stream: TcpStream) -> io::Result<()> {
    // Accepted sockets may inherit non-blocking mode from the listener
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;
    serve(state, &mut stream)?;
    stream.shutdown(Shutdown::Write)?;
    drain(&mut stream);
    Ok(())
}

/// Discard whatever the client sent past the request line.
///
/// Closing a socket with unread input resets the connection, which can throw
/// away the response before the client has read it.
fn drain(stream: &mut TcpStream) {
    let mut scratch = [0u8; 256];
    let mut total = 0;
    while total < READ_LIMIT * 4 {
        match stream.read(&mut scratch) {
            Ok(0) | Err(_) => break,
            Ok(n) => total += n,
        }
    }
}

/// Handle one request on `stream`: read it, apply it and write the response.
pub fn serve<S: Read + Write>(state: &SharedState, stream: &mut S) -> io::Result<()> {
    let request = read_request_head(stream)?;
    let response = handle_request(state, &request);
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

/// Read until the end of the request line, end of stream or [`READ_LIMIT`].
fn read_request_head(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; READ_LIMIT];
    let mut len = 0;
    while len < READ_LIMIT {
        let n = stream.read(&mut buf[len..])?;
        if n == 0 {
            break;
        }
        len += n;
        if buf[..len].contains(&b'\n') {
            break;
        }
    }
    buf.truncate(len);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;

    /// Reads from a fixed input in small chunks, records everything written
    struct MockStream {
        input: Cursor<Vec<u8>>,
        chunk: usize,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8], chunk: usize) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                chunk,
                output: Vec::new(),
            }
        }

        fn output(&self) -> String {
            String::from_utf8(self.output.clone()).unwrap()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.input.read(&mut buf[..n])
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FlakyLink {
        up: Cell<bool>,
    }

    impl LinkMonitor for FlakyLink {
        fn is_up(&self) -> bool {
            self.up.get()
        }
    }

    #[test]
    fn test_serve_applies_and_responds() {
        let state = SharedState::new(10);
        let mut stream =
            MockStream::new(b"GET /?speed=90&remember=1 HTTP/1.1\r\nHost: a\r\n\r\n", 7);

        serve(&state, &mut stream).unwrap();

        assert_eq!(state.speed(), 90);
        assert!(state.paint_mode());
        let response = stream.output();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.contains("id=\"remember\" checked"));
    }

    #[test]
    fn test_request_line_split_across_reads() {
        let state = SharedState::new(10);
        let mut stream = MockStream::new(b"GET /?color=0000ff HTTP/1.1\r\n", 3);
        serve(&state, &mut stream).unwrap();
        assert_eq!(state.hex(), "0000ff");
    }

    #[test]
    fn test_read_stops_at_limit() {
        let mut input = b"GET /?".to_vec();
        input.resize(READ_LIMIT * 2, b'a');
        let mut stream = MockStream::new(&input, 512);
        let head = read_request_head(&mut stream).unwrap();
        assert_eq!(head.len(), READ_LIMIT);
    }

    #[test]
    fn test_empty_request_still_gets_page() {
        let state = SharedState::new(10);
        let mut stream = MockStream::new(b"", 16);
        serve(&state, &mut stream).unwrap();
        assert!(stream.output().starts_with("HTTP/1.0 200 OK\r\n"));
    }

    #[test]
    fn test_check_link_transitions() {
        let link = FlakyLink { up: Cell::new(false) };
        assert!(!check_link(&link, true));
        assert!(!check_link(&link, false));
        link.up.set(true);
        assert!(check_link(&link, false));
    }

    #[test]
    fn test_bind_port_conflict_is_an_error() {
        let server = ControlServer::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        assert!(ControlServer::bind(addr).is_err());
    }
}
