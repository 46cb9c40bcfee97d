//! A single TCP client connection exposed as a small set of commands.
//!
//! This crate provides:
//!
//! - **SocketDevice**: the command surface (`reconnect`, `close`, `check`,
//!   `write`, `read`, `read_until`, `write_and_read`) with optional
//!   auto-reconnect and observable state
//! - **ConnectionController**: the `Closed`/`Open`/`Fault` state machine that
//!   owns the socket
//! - **DelimitedReader**: "read until delimiter or timeout" with a carry-over
//!   buffer that survives between calls
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use horizon_socket::{SocketConfig, SocketDevice};
//!
//! let config = SocketConfig::new("10.0.0.12", 4001)
//!     .read_timeout(Duration::from_millis(500))
//!     .auto_reconnect(true);
//!
//! let device = SocketDevice::connect(config)?;
//! device.write("MEAS:VOLT?\r\n")?;
//! let reading = device.read_until("\r\n")?;
//! println!("voltage: {reading}");
//! # Ok::<(), horizon_socket::SocketError>(())
//! ```
//!
//! # Reads and timeouts
//!
//! Each read sleeps for a poll interval (a hundredth of the read timeout, at
//! least one millisecond) before every receive. A receive that times out ends
//! the read with whatever text has accumulated; partial data is a normal
//! result, not an error. Text after a matched delimiter is kept for the next
//! read.
//!
//! # Configuration files
//!
//! ```ignore
//! let config = SocketConfig::load("socket.toml")?;
//! let device = SocketDevice::new(config)?;
//! ```

pub mod codec;
mod config;
pub mod controller;
mod device;
mod error;
pub mod reader;
mod state;
mod status;

pub use codec::TextCodec;
pub use config::{
    DEFAULT_ENCODING, DEFAULT_READ_TIMEOUT, DEFAULT_RECV_BUFFER_SIZE, MAX_RECV_BUFFER_SIZE, SocketConfig,
};
pub use controller::{ConnectionController, Readiness, Received};
pub use device::SocketDevice;
pub use error::{Result, SocketError};
pub use reader::DelimitedReader;
pub use state::ConnectionState;
pub use status::StatusBoard;
