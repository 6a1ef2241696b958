use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Atomically swapped immutable snapshot.
///
/// Readers take an `Arc` to the current value and never block. Writers build
/// the replacement off-lock and publish it in one swap. Each refresh draws a
/// ticket before reading its source; a snapshot is published only if no
/// later ticket has been published, so a slow refresh never overwrites the
/// result of a newer one.
pub(crate) struct SnapshotCell<T> {
    current: ArcSwap<T>,
    issued: AtomicU64,
    published: Mutex<u64>,
}

impl<T> SnapshotCell<T> {
    pub(crate) fn new(initial: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            issued: AtomicU64::new(0),
            published: Mutex::new(0),
        }
    }

    pub(crate) fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    pub(crate) fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns `false` when the value was discarded as stale.
    pub(crate) fn publish(&self, ticket: u64, value: T) -> bool {
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if ticket <= *published {
            return false;
        }
        self.current.store(Arc::new(value));
        *published = ticket;
        true
    }

    pub(crate) fn generation(&self) -> u64 {
        *self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
