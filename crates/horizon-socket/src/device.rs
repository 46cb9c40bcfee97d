//! The command surface a hosting framework wires up.

use std::net::SocketAddr;
use std::sync::Arc;

use horizon_socket_core::Signal;
use horizon_socket_core::logging::targets;
use parking_lot::Mutex;

use crate::codec::TextCodec;
use crate::config::SocketConfig;
use crate::controller::ConnectionController;
use crate::error::Result;
use crate::reader::DelimitedReader;
use crate::state::ConnectionState;
use crate::status::StatusBoard;

struct DeviceInner {
    controller: ConnectionController,
    reader: DelimitedReader,
}

impl DeviceInner {
    fn reconnect(&mut self) -> Result<()> {
        // Text buffered from the previous connection must not leak into the new one.
        self.reader.clear();
        self.controller.reconnect()
    }

    /// Heal the connection first when auto-reconnect is on and it is not
    /// `Open` or fails the liveness check.
    fn ensure_connected(&mut self) -> Result<()> {
        if !self.controller.config().auto_reconnect {
            return Ok(());
        }
        if !self.controller.is_open() || !self.controller.check() {
            tracing::info!(target: targets::DEVICE, state = %self.controller.state(), "auto-reconnecting");
            self.reconnect()?;
        }
        Ok(())
    }

    fn write(&mut self, codec: &TextCodec, text: &str) -> Result<()> {
        tracing::info!(target: targets::DEVICE, "Write({text:?})");
        self.ensure_connected()?;
        let bytes = codec.encode(text).map_err(|err| self.controller.fault(err))?;
        self.controller.send(&bytes)
    }

    fn read_until(&mut self, delimiter: Option<&str>) -> Result<String> {
        self.ensure_connected()?;
        self.reader.read_until(&mut self.controller, delimiter)
    }
}

/// A single TCP client connection exposed as commands.
///
/// Commands take `&self` and are serialized by an internal lock, so at most
/// one operation is in flight. The observable state lives outside that lock:
/// [`state`](Self::state), [`status`](Self::status) and the change signals can
/// be used while a command is running. A slot connected to those signals must
/// not issue commands on the same device, since it runs while the command's
/// lock is held.
///
/// Dropping the device closes the socket.
///
/// # Example
///
/// ```no_run
/// use horizon_socket::{SocketConfig, SocketDevice};
///
/// let config = SocketConfig::new("127.0.0.1", 5025).auto_reconnect(true);
/// let device = SocketDevice::new(config)?;
///
/// device.state_changed().connect(|state| println!("state: {state}"));
///
/// device.write("*IDN?\n")?;
/// let identity = device.read_until("\n")?;
/// println!("{identity}");
/// # Ok::<(), horizon_socket::SocketError>(())
/// ```
pub struct SocketDevice {
    config: SocketConfig,
    codec: TextCodec,
    board: Arc<StatusBoard>,
    inner: Mutex<DeviceInner>,
}

impl SocketDevice {
    /// Create a device in the `Closed` state. No connection is attempted.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: SocketConfig) -> Result<Self> {
        config.validate()?;
        let codec = config.codec()?;
        let board = Arc::new(StatusBoard::new());
        let controller = ConnectionController::with_board(config.clone(), board.clone());
        let reader = DelimitedReader::new(codec, config.recv_buffer_size);

        tracing::info!(target: targets::DEVICE, address = %config.address(), encoding = codec.name(), "device created");

        Ok(Self {
            config,
            codec,
            board,
            inner: Mutex::new(DeviceInner { controller, reader }),
        })
    }

    /// Create a device and connect it immediately.
    pub fn connect(config: SocketConfig) -> Result<Self> {
        let device = Self::new(config)?;
        device.reconnect()?;
        Ok(device)
    }

    /// Close any existing socket and connect again.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn reconnect(&self) -> Result<()> {
        self.inner.lock().reconnect()
    }

    /// Release the socket. The device is `Closed` afterwards even when an
    /// error is returned.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn close(&self) -> Result<()> {
        self.inner.lock().controller.close()
    }

    /// Whether the socket is available, judged from the current state.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn check(&self) -> bool {
        self.inner.lock().controller.check()
    }

    /// Encode `text` and send it.
    ///
    /// Text the configured encoding cannot represent is not sent; the error
    /// moves the device to `Fault`.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn write(&self, text: &str) -> Result<()> {
        self.inner.lock().write(&self.codec, text)
    }

    /// Read whatever arrives within one timeout window.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn read(&self) -> Result<String> {
        self.inner.lock().read_until(None)
    }

    /// Read up to `delimiter`, or whatever arrived before the timeout.
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn read_until(&self, delimiter: &str) -> Result<String> {
        self.inner.lock().read_until(Some(delimiter))
    }

    /// [`write`](Self::write) followed by [`read`](Self::read).
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn write_and_read(&self, text: &str) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.write(&self.codec, text)?;
        inner.read_until(None)
    }

    /// [`write`](Self::write) followed by [`read_until`](Self::read_until).
    #[tracing::instrument(skip_all, target = "horizon_socket::device", level = "trace")]
    pub fn write_and_read_until(&self, text: &str, delimiter: &str) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.write(&self.codec, text)?;
        inner.read_until(Some(delimiter))
    }

    /// Text received but not yet returned by a read.
    pub fn buffered(&self) -> String {
        self.inner.lock().reader.buffered().to_string()
    }

    /// Configured host.
    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// The configuration this device was created with.
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

    /// Signal emitted on every state transition.
    pub fn state_changed(&self) -> &Signal<ConnectionState> {
        self.board.state_changed()
    }

    /// Signal emitted whenever the status text changes.
    pub fn status_changed(&self) -> &Signal<String> {
        self.board.status_changed()
    }

    /// Local address of the live socket, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().controller.local_addr()
    }
}

impl Drop for SocketDevice {
    fn drop(&mut self) {
        tracing::debug!(target: targets::DEVICE, "dropping device for {}", self.config.address());
        if let Err(err) = self.inner.get_mut().controller.close() {
            tracing::warn!(target: targets::DEVICE, "close on drop failed: {err}");
        }
    }
}

impl std::fmt::Debug for SocketDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketDevice")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .finish()
    }
}
