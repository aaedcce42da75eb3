//! ChangeSignal - a minimal typed publish/subscribe channel.
//!
//! Every observable container owns one signal per notification stream.
//! Delivery is synchronous: `emit` returns only after every listener that
//! was connected at the start of the emission has run.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`ChangeSignal::connect`], used to disconnect a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A per-instance notification channel.
pub struct ChangeSignal<T> {
    slots: RwLock<Vec<(ListenerId, Slot<T>)>>,
    next_id: AtomicU64,
}

impl<T> ChangeSignal<T> {
    /// Create a signal with no listeners.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. Listeners run in registration order.
    pub fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.slots.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        slots.len() != before
    }

    /// Invoke every connected listener with `args`.
    ///
    /// The listener list is snapshotted first, so listeners may connect or
    /// disconnect (themselves included) while the emission is running.
    pub fn emit(&self, args: &T) {
        let snapshot: Vec<Slot<T>> = self
            .slots
            .read()
            .iter()
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        for slot in snapshot {
            slot(args);
        }
    }

    /// Sever every listener.
    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Number of connected listeners.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl<T> Default for ChangeSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ChangeSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_in_registration_order() {
        let signal = ChangeSignal::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        signal.connect(move |v| s1.lock().push(("first", *v)));
        let s2 = seen.clone();
        signal.connect(move |v| s2.lock().push(("second", *v)));

        signal.emit(&7);

        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_disconnect() {
        let signal = ChangeSignal::<u32>::new();
        let count = Arc::new(Mutex::new(0));

        let c = count.clone();
        let id = signal.connect(move |_| *c.lock() += 1);
        signal.emit(&1);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&2);

        assert_eq!(*count.lock(), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn test_listener_can_disconnect_during_emit() {
        let signal = Arc::new(ChangeSignal::<u32>::new());
        let count = Arc::new(Mutex::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&signal);
        let c = count.clone();
        let id_slot = own_id.clone();
        let id = signal.connect(move |_| {
            *c.lock() += 1;
            if let (Some(signal), Some(id)) = (weak.upgrade(), *id_slot.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(&1);
        signal.emit(&2);

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_clear() {
        let signal = ChangeSignal::<()>::new();
        signal.connect(|_| {});
        signal.connect(|_| {});
        assert_eq!(signal.len(), 2);

        signal.clear();
        assert!(signal.is_empty());
    }
}
