//! ScalarValue - an observable box around a single JSON value.

use crate::change::ValueChange;
use crate::signal::ChangeSignal;
use crate::Disposable;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct ValueInner {
    value: RwLock<Value>,
    changed: ChangeSignal<ValueChange>,
    disposed: AtomicBool,
}

/// An observable single value.
///
/// Cloning yields another handle to the same box. The value has no remote
/// binding of its own; a store bridges it into a shared document.
#[derive(Clone)]
pub struct ScalarValue {
    inner: Arc<ValueInner>,
}

impl ScalarValue {
    /// Create a box holding `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(ValueInner {
                value: RwLock::new(value.into()),
                changed: ChangeSignal::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.inner.value.read().clone()
    }

    /// Replace the value.
    ///
    /// Deep-equal values are ignored; otherwise a [`ValueChange`] is emitted
    /// before this returns.
    pub fn set(&self, value: impl Into<Value>) {
        let new_value = value.into();
        let old_value = {
            let mut current = self.inner.value.write();
            if *current == new_value {
                return;
            }
            std::mem::replace(&mut *current, new_value.clone())
        };

        self.inner.changed.emit(&ValueChange {
            old_value,
            new_value,
        });
    }

    /// Notification stream for value changes.
    pub fn changed(&self) -> &ChangeSignal<ValueChange> {
        &self.inner.changed
    }

    /// True if both handles refer to the same box.
    pub fn ptr_eq(&self, other: &ScalarValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Disposable for ScalarValue {
    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.changed.clear();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl Default for ScalarValue {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarValue")
            .field("value", &*self.inner.value.read())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_set_emits_old_and_new() {
        let value = ScalarValue::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        value.changed().connect(move |change| s.lock().push(change.clone()));

        value.set(2);

        assert_eq!(value.get(), json!(2));
        assert_eq!(
            *seen.lock(),
            vec![ValueChange {
                old_value: json!(1),
                new_value: json!(2)
            }]
        );
    }

    #[test]
    fn test_deep_equal_set_is_noop() {
        let value = ScalarValue::new(json!({"a": [1, 2]}));
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        value.changed().connect(move |_| *c.lock() += 1);

        value.set(json!({"a": [1, 2]}));

        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let value = ScalarValue::new("x");
        value.changed().connect(|_| {});

        value.dispose();
        value.dispose();

        assert!(value.is_disposed());
        assert!(value.changed().is_empty());
    }
}
