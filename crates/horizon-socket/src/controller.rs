//! Connection state machine: owns the socket and the `Closed`/`Open`/`Fault`
//! state.
//!
//! | From | Event | To |
//! |---|---|---|
//! | any | `reconnect()` succeeds | `Open` |
//! | any | `reconnect()` fails | `Fault` |
//! | `Open`/`Fault` | `close()` | `Closed` |
//! | `Open` | send/receive fails | `Fault` |
//!
//! [`check`](ConnectionController::check) never changes the state; it only
//! annotates the status text when the socket is neither readable nor
//! writable.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use horizon_socket_core::logging::targets;

use crate::config::SocketConfig;
use crate::error::{Result, SocketError};
use crate::state::ConnectionState;
use crate::status::StatusBoard;

/// Outcome of one bounded receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Received {
    /// `n` bytes were written to the front of the buffer.
    Data(usize),
    /// Non-blocking mode and nothing is pending.
    Empty,
    /// The read timeout elapsed without data.
    TimedOut,
    /// The peer closed its side of the connection.
    Eof,
}

/// Non-blocking read/write readiness of the socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Data, end-of-stream or a pending error can be observed by a read.
    pub readable: bool,
    /// The socket is still connected and has no pending error.
    pub writable: bool,
}

impl Readiness {
    /// Whether either direction reported ready.
    pub fn any(&self) -> bool {
        self.readable || self.writable
    }
}

/// Owns the TCP socket and its connection state.
pub struct ConnectionController {
    config: SocketConfig,
    stream: Option<TcpStream>,
    board: Arc<StatusBoard>,
}

impl ConnectionController {
    /// Create a controller in the `Closed` state. No connection is attempted.
    pub fn new(config: SocketConfig) -> Self {
        Self::with_board(config, Arc::new(StatusBoard::new()))
    }

    /// Create a controller that reports through an existing status board.
    pub fn with_board(config: SocketConfig, board: Arc<StatusBoard>) -> Self {
        Self {
            config,
            stream: None,
            board,
        }
    }

    /// The configuration this controller connects with.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.board.state()
    }

    /// Current status text.
    pub fn status(&self) -> String {
        self.board.status()
    }

    /// Whether the state is `Open`.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Local address of the live socket, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Peer address of the live socket, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Close any existing socket and connect again.
    ///
    /// On failure the state becomes `Fault`, the status text names the
    /// endpoint and the cause, and the error is returned.
    pub fn reconnect(&mut self) -> Result<()> {
        if let Err(err) = self.close() {
            tracing::warn!(target: targets::CONTROLLER, "ignoring close failure before reconnect: {err}");
        }

        let address = self.config.address();
        tracing::info!(target: targets::CONTROLLER, "Reconnect({address})");

        match self.open_stream() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.board.set_status(ConnectionState::Open.status_text());
                self.board.transition(ConnectionState::Open);
                tracing::info!(target: targets::CONTROLLER, "Reconnected to {address}");
                Ok(())
            }
            Err(source) => Err(self.fault(SocketError::connect(address, source))),
        }
    }

    /// Release the socket. The state is `Closed` afterwards in every case.
    ///
    /// A failure while shutting the socket down is recorded in the status
    /// text and returned, but the handle is released regardless. Calling this
    /// while already closed does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            if self.state() != ConnectionState::Closed {
                self.board.set_status(ConnectionState::Closed.status_text());
                self.board.transition(ConnectionState::Closed);
            }
            return Ok(());
        };

        let outcome = match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The peer already tore the connection down.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        };
        drop(stream);

        match outcome {
            Ok(()) => {
                self.board.set_status(ConnectionState::Closed.status_text());
                self.board.transition(ConnectionState::Closed);
                Ok(())
            }
            Err(e) => {
                let status = format!("Unable to close {}\n{e}", self.config.address());
                tracing::warn!(target: targets::CONTROLLER, "{status}");
                self.board.set_status(status);
                self.board.transition(ConnectionState::Closed);
                Err(SocketError::Close(e))
            }
        }
    }

    /// Liveness query.
    ///
    /// Polls the socket for read/write readiness without blocking. If neither
    /// direction is ready the status text records the anomaly, but the state
    /// is left alone: the return value is derived from the current state only.
    pub fn check(&self) -> bool {
        if let Some(stream) = &self.stream {
            self.report_readiness(self.poll_readiness(stream));
        }
        self.state().is_alive()
    }

    /// Whether a receive would return without waiting: data, end-of-stream
    /// or an error is pending. `false` without a socket.
    pub fn has_pending_input(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| self.peek_ready(stream))
    }

    /// Send all of `bytes`. Any failure moves the state to `Fault`.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.write_all(bytes).and_then(|()| stream.flush()),
            None => return Err(self.fault(SocketError::NotConnected)),
        };

        match result {
            Ok(()) => {
                tracing::trace!(target: targets::CONTROLLER, bytes = bytes.len(), "sent");
                Ok(())
            }
            Err(e) => Err(self.fault(SocketError::Send(e))),
        }
    }

    /// Perform one receive into `buf`, bounded by the read timeout.
    ///
    /// Timeouts and an empty non-blocking read are reported as outcomes, not
    /// errors. Any other failure moves the state to `Fault`.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Received> {
        let non_blocking = self.config.is_non_blocking();
        let result = match self.stream.as_mut() {
            Some(stream) => loop {
                match stream.read(buf) {
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    other => break other,
                }
            },
            None => return Err(self.fault(SocketError::NotConnected)),
        };

        match result {
            Ok(0) => Ok(Received::Eof),
            Ok(n) => {
                tracing::trace!(target: targets::CONTROLLER, bytes = n, "received");
                Ok(Received::Data(n))
            }
            Err(e) if is_timeout(&e) => Ok(if non_blocking {
                Received::Empty
            } else {
                Received::TimedOut
            }),
            Err(e) => Err(self.fault(SocketError::Receive(e))),
        }
    }

    /// Record that the peer closed the connection. The state becomes `Fault`
    /// so the next auto-reconnect replaces the socket.
    pub fn mark_peer_closed(&mut self) {
        let status = format!(
            "Unable to connect to {}\nsocket closed on server side",
            self.config.address()
        );
        tracing::error!(target: targets::CONTROLLER, "{status}");
        self.board.set_status(status);
        self.board.transition(ConnectionState::Fault);
    }

    /// Update status and state for `err`, then hand it back for propagation.
    pub(crate) fn fault(&mut self, err: SocketError) -> SocketError {
        let detail = match &err {
            SocketError::Connect { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        let status = format!("Unable to connect to {}\n{detail}", self.config.address());
        tracing::error!(target: targets::CONTROLLER, "{status}");
        self.board.set_status(status);
        self.board.transition(ConnectionState::Fault);
        err
    }

    fn open_stream(&self) -> io::Result<TcpStream> {
        let addrs = (self.config.hostname.as_str(), self.config.port).to_socket_addrs()?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = if self.config.is_non_blocking() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, self.config.read_timeout)
            };
            match attempt.and_then(|stream| self.configure(stream)) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(target: targets::CONTROLLER, %addr, "connect attempt failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "hostname resolved to no addresses")
        }))
    }

    fn configure(&self, stream: TcpStream) -> io::Result<TcpStream> {
        stream.set_nodelay(self.config.no_delay)?;
        if self.config.is_non_blocking() {
            stream.set_nonblocking(true)?;
        } else {
            stream.set_read_timeout(Some(self.config.read_timeout))?;
            stream.set_write_timeout(Some(self.config.read_timeout))?;
        }
        Ok(stream)
    }

    fn report_readiness(&self, readiness: Readiness) {
        tracing::debug!(target: targets::CONTROLLER, ?readiness, "Check()");
        if !readiness.any() {
            let status = format!(
                "Unable to connect to {}\nCheck(): socket closed on server side?",
                self.config.address()
            );
            tracing::error!(target: targets::CONTROLLER, "{status}");
            self.board.set_status(status);
        }
    }

    fn poll_readiness(&self, stream: &TcpStream) -> Readiness {
        let readable = self.peek_ready(stream);
        let writable = matches!(stream.take_error(), Ok(None)) && stream.peer_addr().is_ok();
        Readiness { readable, writable }
    }

    fn peek_ready(&self, stream: &TcpStream) -> bool {
        let restore_blocking = !self.config.is_non_blocking();
        if restore_blocking && stream.set_nonblocking(true).is_err() {
            return false;
        }

        let mut byte = [0u8; 1];
        let ready = match stream.peek(&mut byte) {
            // Pending data or end-of-stream.
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            // A pending error also makes the socket readable.
            Err(_) => true,
        };

        if restore_blocking && let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!(target: targets::CONTROLLER, "failed to restore blocking mode: {e}");
        }
        ready
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl std::fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionController")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Duration;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn refused_port() -> u16 {
        let (listener, port) = listener();
        drop(listener);
        port
    }

    fn config(port: u16) -> SocketConfig {
        SocketConfig::new("127.0.0.1", port).read_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_initial_state() {
        let controller = ConnectionController::new(config(1));
        assert_eq!(controller.state(), ConnectionState::Closed);
        assert!(!controller.check());
        assert!(controller.local_addr().is_none());
    }

    #[test]
    fn test_reconnect_success() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));

        controller.reconnect().unwrap();
        let (_peer, _) = listener.accept().unwrap();

        assert_eq!(controller.state(), ConnectionState::Open);
        assert!(controller.is_open());
        assert!(!controller.has_pending_input());
        assert!(controller.check());
        assert_eq!(controller.peer_addr().map(|a| a.port()), Some(port));
        assert_eq!(controller.status(), "The device is in Open state.");
    }

    #[test]
    fn test_reconnect_failure_sets_fault() {
        let port = refused_port();
        let mut controller = ConnectionController::new(config(port));

        let err = controller.reconnect().unwrap_err();
        assert!(matches!(err, SocketError::Connect { .. }));
        assert_eq!(controller.state(), ConnectionState::Fault);
        assert!(controller.status().contains(&format!("127.0.0.1:{port}")));
        assert!(!controller.check());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));
        controller.reconnect().unwrap();
        let _peer = listener.accept().unwrap();

        controller.close().unwrap();
        assert_eq!(controller.state(), ConnectionState::Closed);
        controller.close().unwrap();
        assert_eq!(controller.state(), ConnectionState::Closed);
        assert!(!controller.check());
    }

    #[test]
    fn test_close_after_failed_reconnect() {
        let mut controller = ConnectionController::new(config(refused_port()));
        assert!(controller.reconnect().is_err());

        controller.close().unwrap();
        assert_eq!(controller.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_send_without_socket_faults() {
        let mut controller = ConnectionController::new(config(1));
        let err = controller.send(b"x").unwrap_err();
        assert!(matches!(err, SocketError::NotConnected));
        assert_eq!(controller.state(), ConnectionState::Fault);
    }

    #[test]
    fn test_receive_outcomes() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));
        controller.reconnect().unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(controller.receive(&mut buf).unwrap(), Received::TimedOut);
        assert_eq!(controller.state(), ConnectionState::Open);

        peer.write_all(b"hi").unwrap();
        assert_eq!(controller.receive(&mut buf).unwrap(), Received::Data(2));
        assert_eq!(&buf[..2], b"hi");

        drop(peer);
        assert_eq!(controller.receive(&mut buf).unwrap(), Received::Eof);
    }

    #[test]
    fn test_receive_non_blocking_reports_empty() {
        let (listener, port) = listener();
        let mut controller =
            ConnectionController::new(SocketConfig::new("127.0.0.1", port).read_timeout(Duration::ZERO));
        controller.reconnect().unwrap();
        let _peer = listener.accept().unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(controller.receive(&mut buf).unwrap(), Received::Empty);
    }

    #[test]
    fn test_check_does_not_transition_on_peer_close() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));
        controller.reconnect().unwrap();
        let (peer, _) = listener.accept().unwrap();
        drop(peer);
        std::thread::sleep(Duration::from_millis(20));

        // End-of-stream makes the socket readable, and the state stays Open.
        assert!(controller.check());
        assert_eq!(controller.state(), ConnectionState::Open);
    }

    #[test]
    fn test_mark_peer_closed() {
        let mut controller = ConnectionController::new(config(1));
        controller.mark_peer_closed();
        assert_eq!(controller.state(), ConnectionState::Fault);
        assert!(controller.status().contains("closed on server side"));
    }

    #[test]
    fn test_unready_socket_annotates_status_only() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));
        controller.reconnect().unwrap();
        let _peer = listener.accept().unwrap();

        controller.report_readiness(Readiness {
            readable: false,
            writable: true,
        });
        assert_eq!(controller.status(), "The device is in Open state.");

        controller.report_readiness(Readiness::default());
        assert!(controller.status().ends_with("Check(): socket closed on server side?"));
        assert_eq!(controller.state(), ConnectionState::Open);
        assert!(controller.check());
    }

    #[test]
    fn test_pending_input() {
        let (listener, port) = listener();
        let mut controller = ConnectionController::new(config(port));
        assert!(!controller.has_pending_input());

        controller.reconnect().unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        assert!(!controller.has_pending_input());

        peer.write_all(b"x").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(controller.has_pending_input());

        // Peeking leaves the data in place.
        let mut buf = [0u8; 4];
        assert_eq!(controller.receive(&mut buf).unwrap(), Received::Data(1));
    }
}
