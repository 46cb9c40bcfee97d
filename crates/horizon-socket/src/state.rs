//! Connection state of the socket device.

/// Current state of the socket connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket is held.
    #[default]
    Closed,
    /// Connected and ready to send/receive data.
    Open,
    /// The last connect, send or receive failed. The status text holds the
    /// diagnostic.
    Fault,
}

impl ConnectionState {
    /// Whether this state counts as alive for liveness checks.
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::Closed | Self::Fault)
    }

    /// Default status text reported while in this state.
    pub fn status_text(self) -> String {
        format!("The device is in {self} state.")
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::Fault => write!(f, "Fault"),
        }
    }
}
