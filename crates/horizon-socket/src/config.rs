//! Configuration for the socket device.

use std::path::Path;
use std::time::Duration;

use horizon_socket_core::logging::targets;
use serde::Deserialize;

use crate::codec::TextCodec;
use crate::error::{Result, SocketError};

/// Default per-receive timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);
/// Default text codec label.
pub const DEFAULT_ENCODING: &str = "utf-8";
/// Default size of a single socket receive.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;
/// Largest accepted size of a single socket receive.
pub const MAX_RECV_BUFFER_SIZE: usize = 1 << 20;

/// Lower bound for the delimiter-search poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Poll attempts per read-timeout window.
const POLLS_PER_TIMEOUT: u32 = 100;

/// Configuration for a socket device.
///
/// Built either with [`SocketConfig::new`] and the builder methods, or loaded
/// from a TOML document:
///
/// ```toml
/// hostname = "10.0.0.12"
/// port = 4001
/// read_timeout_ms = 500
/// auto_reconnect = true
/// encoding = "latin1"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    /// The host to connect to.
    pub hostname: String,
    /// The port to connect to.
    pub port: u16,
    /// Per-receive timeout, also used as the connect timeout. Zero switches
    /// receives to non-blocking mode and connects without a timeout.
    #[serde(rename = "read_timeout_ms", with = "duration_ms", default = "default_read_timeout")]
    pub read_timeout: Duration,
    /// Reconnect before a write or read when the connection is not healthy.
    #[serde(default)]
    pub auto_reconnect: bool,
    /// Encoding label used to convert between text and bytes.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    #[serde(default)]
    pub no_delay: bool,
    /// Maximum number of bytes taken from the socket per receive.
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

impl SocketConfig {
    /// Create a configuration for `host:port` with default settings.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            read_timeout: DEFAULT_READ_TIMEOUT,
            auto_reconnect: false,
            encoding: default_encoding(),
            no_delay: false,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }

    /// Parse and validate a TOML configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SocketError::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(target: targets::CONFIG, path = %path.display(), address = %config.address(), "loaded socket configuration");
        Ok(config)
    }

    /// Set the per-receive timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enable or disable auto-reconnect.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the encoding label.
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Sleep between delimiter-search attempts: a hundredth of the read
    /// timeout, never below one millisecond.
    pub fn poll_interval(&self) -> Duration {
        (self.read_timeout / POLLS_PER_TIMEOUT).max(MIN_POLL_INTERVAL)
    }

    /// Whether receives run in non-blocking mode.
    pub fn is_non_blocking(&self) -> bool {
        self.read_timeout.is_zero()
    }

    /// Resolve the configured encoding label.
    pub fn codec(&self) -> Result<TextCodec> {
        TextCodec::for_label(&self.encoding)
    }

    /// Check that the configuration can be used to open a connection.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(SocketError::config("hostname must not be empty"));
        }
        if self.port == 0 {
            return Err(SocketError::config("port must be non-zero"));
        }
        if self.recv_buffer_size == 0 || self.recv_buffer_size > MAX_RECV_BUFFER_SIZE {
            return Err(SocketError::config(format!(
                "recv_buffer_size must be between 1 and {MAX_RECV_BUFFER_SIZE}, got {}",
                self.recv_buffer_size
            )));
        }
        self.codec()?;
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
