//! Error types for the socket device.

use std::io;
use std::path::PathBuf;

/// A specialized Result type for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;

/// Errors raised by the socket device.
///
/// Every variant that moves the connection into the `Fault` state is returned
/// only after the state and status text have been updated.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Resolving or connecting to the endpoint failed.
    #[error("Unable to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// A send or receive was attempted without a live socket.
    #[error("Socket is not connected")]
    NotConnected,

    /// Sending on the socket failed.
    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    /// The text to send holds a character the configured encoding cannot
    /// represent. Nothing was sent.
    #[error("Send failed: '{character}' cannot be encoded as {encoding}")]
    Encode {
        encoding: &'static str,
        character: char,
    },

    /// Receiving from the socket failed for a reason other than a timeout.
    #[error("Receive failed: {0}")]
    Receive(#[source] io::Error),

    /// Releasing the socket failed. The connection is closed regardless.
    #[error("Close failed: {0}")]
    Close(#[source] io::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Parsing a configuration document failed.
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SocketError {
    /// Create a connect error for `address`.
    pub fn connect(address: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            address: address.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a configuration file error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
