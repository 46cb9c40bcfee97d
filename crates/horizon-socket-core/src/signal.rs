//! Change notification for observable device values.
//!
//! A [`Signal`] holds a table of slots (callbacks). [`emit`](Signal::emit)
//! calls every slot synchronously on the emitting thread, in the order the
//! slots were connected. The table lock is released before the first slot
//! runs, so a slot may connect or disconnect slots on the same signal; such
//! changes apply from the next emission.
//!
//! # Example
//!
//! ```
//! use horizon_socket_core::Signal;
//!
//! let status_changed = Signal::<String>::new();
//!
//! let id = status_changed.connect(|text| {
//!     println!("status: {text}");
//! });
//!
//! assert_eq!(status_changed.emit("The device is in Open state.".to_string()), 1);
//! status_changed.disconnect(id);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle returned by [`Signal::connect`], used to disconnect the slot.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of callbacks notified with `&Args` on every emission.
///
/// `Signal<Args>` is `Send + Sync`; slots run on whichever thread emits.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a signal with no slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Add a slot. It stays connected until [`disconnect`](Self::disconnect).
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Remove a slot. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Call every slot with `args`. Returns how many slots ran.
    pub fn emit(&self, args: Args) -> usize {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slots = slots.len(), "emit");

        for slot in &slots {
            slot(&args);
        }
        slots.len()
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}
