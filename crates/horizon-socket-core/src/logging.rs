//! Logging facilities for Horizon Socket.
//!
//! Horizon Socket uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_socket=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_socket_core::signal";
    /// Connection state machine target.
    pub const CONTROLLER: &str = "horizon_socket::controller";
    /// Delimited reader target.
    pub const READER: &str = "horizon_socket::reader";
    /// Command surface target.
    pub const DEVICE: &str = "horizon_socket::device";
    /// Configuration loading target.
    pub const CONFIG: &str = "horizon_socket::config";
}
