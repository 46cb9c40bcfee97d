//! Core primitives for Horizon Socket.
//!
//! This crate provides the notification plumbing that the socket device uses
//! to publish its observable state to whatever framework hosts it:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Property System**: Values with change detection, optionally paired
//!   with a signal that fires on every update
//! - **Logging**: Target names for filtering `tracing` output by subsystem
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_socket_core::Signal;
//!
//! let state_changed = Signal::<String>::new();
//!
//! let conn_id = state_changed.connect(|state| {
//!     println!("State changed to: {}", state);
//! });
//!
//! state_changed.emit("Open".to_string());
//! state_changed.disconnect(conn_id);
//! ```
//!
//! # Observable Property Example
//!
//! ```
//! use horizon_socket_core::ObservableProperty;
//!
//! let status = ObservableProperty::new(String::from("idle"));
//! status.changed().connect(|text| println!("status: {text}"));
//!
//! status.publish(String::from("connected"));
//! assert_eq!(status.get(), "connected");
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use property::{ObservableProperty, Property};
pub use signal::{ConnectionId, Signal};
