//! Single-value mailbox between threads.

use std::sync::Arc;

use parking_lot::Mutex;

/// Overwrite mailbox: a producer puts the freshest value, a consumer takes
/// it when ready. Intermediate values are intentionally lost; only the
/// latest matters.
pub struct SharedSlot<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> SharedSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Deposit a value, replacing any unconsumed one. Returns the value
    /// that was displaced, if any.
    pub fn put(&self, value: T) -> Option<T> {
        self.inner.lock().replace(value)
    }

    /// Take the value out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.inner.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl<T> Default for SharedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SharedSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_overwrites_and_reports_displacement() {
        let slot = SharedSlot::new();
        assert_eq!(slot.put(1), None);
        assert_eq!(slot.put(2), Some(1));
        assert_eq!(slot.take(), Some(2));
        assert!(slot.is_empty());
    }

    #[test]
    fn clones_share_the_same_slot() {
        let a = SharedSlot::new();
        let b = a.clone();
        a.put("x");
        assert_eq!(b.take(), Some("x"));
        assert!(a.is_empty());
    }
}
