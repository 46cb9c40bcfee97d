//! Property system for Horizon Socket.
//!
//! - **Property<T>**: a value with change detection
//! - **ObservableProperty<T>**: a property paired with a signal that is
//!   emitted on every publish, used for values a hosting framework watches
//!   (connection state, status text)
//!
//! # Example
//!
//! ```
//! use horizon_socket_core::Property;
//!
//! let prop = Property::new(42);
//! assert!(!prop.set(42));
//! assert!(prop.set(100));
//! assert_eq!(prop.get(), 100);
//! ```

use std::fmt;

use parking_lot::RwLock;

use crate::signal::Signal;

/// A value that tracks changes.
///
/// `set()` compares the new value with the current one and reports whether
/// the value actually changed.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Overwrite the value, returning the previous one.
    pub fn swap(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.write(), value)
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property").field("value", &self.get()).finish()
    }
}

/// A property whose every update is published on a signal.
///
/// [`publish`](Self::publish) always emits, even when the new value equals
/// the old one: subscribers are told about every transition, including
/// re-entering the same state. Use [`set_if_changed`](Self::set_if_changed)
/// to emit only on actual changes.
pub struct ObservableProperty<T: 'static> {
    value: Property<T>,
    changed: Signal<T>,
}

impl<T: Clone + 'static> ObservableProperty<T> {
    /// Create an observable property with an initial value and no subscribers.
    pub fn new(value: T) -> Self {
        Self {
            value: Property::new(value),
            changed: Signal::new(),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.value.with(f)
    }

    /// The signal emitted with the new value on every publish.
    pub fn changed(&self) -> &Signal<T> {
        &self.changed
    }

    /// Store `value` and emit it, returning the previous value.
    ///
    /// The value is stored before the signal fires, so slots that read the
    /// property back observe the new value.
    pub fn publish(&self, value: T) -> T {
        let old = self.value.swap(value.clone());
        self.changed.emit(value);
        old
    }
}

impl<T: Clone + PartialEq + 'static> ObservableProperty<T> {
    /// Store `value` and emit it only if it differs from the current value.
    pub fn set_if_changed(&self, value: T) -> bool {
        let changed = self.value.set(value.clone());
        if changed {
            self.changed.emit(value);
        }
        changed
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for ObservableProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableProperty")
            .field("value", &self.get())
            .field("subscribers", &self.changed.connection_count())
            .finish()
    }
}
