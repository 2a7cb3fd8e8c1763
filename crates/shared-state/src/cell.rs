//! Reader/Writer Shared Cell

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A shared cell handle, cloned into every thread that touches the value
pub type Shared<T> = Arc<SharedCell<T>>;

/// One value behind a reader/writer lock.
///
/// Any number of readers may hold a view at the same time, or exactly one
/// writer. Views are guards: they release the lock when dropped, which covers
/// early returns, `?` and unwinding. The lock does not poison.
///
/// No queuing fairness is guaranteed between readers and writers. A steady
/// stream of readers may delay a writer; callers keep critical sections short.
pub struct SharedCell<T> {
    value: RwLock<T>,
}

impl<T> SharedCell<T> {
    /// Create a new cell holding `value`
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Create a new cell already wrapped for sharing
    pub fn shared(value: T) -> Shared<T> {
        Arc::new(Self::new(value))
    }

    /// Acquire a scoped read view
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read()
    }

    /// Acquire a scoped exclusive write view
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write()
    }

    /// Try to acquire a read view without blocking
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.value.try_read()
    }

    /// Replace the value under an exclusive lock
    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }

    /// Mutate the value under an exclusive lock and return the closure's result
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.value.write();
        f(&mut guard)
    }

    /// Inspect the value under a read lock and return the closure's result
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read();
        f(&guard)
    }

    /// Consume the cell and return the value
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> SharedCell<T> {
    /// Clone the current value out under a read lock
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: Default> Default for SharedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.try_read() {
            Some(guard) => f.debug_struct("SharedCell").field("value", &*guard).finish(),
            None => f.debug_struct("SharedCell").field("value", &"<locked>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_read_and_write_views() {
        let cell = SharedCell::new(1.0_f64);
        {
            let mut view = cell.write();
            *view = 0.25;
        }
        assert_eq!(*cell.read(), 0.25);
        assert_eq!(cell.get(), 0.25);
    }

    #[test]
    fn test_concurrent_readers() {
        let cell = SharedCell::new(vec![1, 2, 3]);
        let first = cell.read();
        let second = cell.read();
        assert_eq!(first.len() + second.len(), 6);
    }

    #[test]
    fn test_writer_excludes_readers() {
        let cell = SharedCell::new(0u32);
        let guard = cell.write();
        assert!(cell.try_read().is_none());
        drop(guard);
        assert!(cell.try_read().is_some());
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let cell = SharedCell::shared(5u32);
        let worker = Arc::clone(&cell);
        let result = thread::spawn(move || {
            let _view = worker.write();
            panic!("writer failed mid-update");
        })
        .join();
        assert!(result.is_err());

        // The lock is free again and not poisoned.
        cell.set(6);
        assert_eq!(cell.get(), 6);
    }

    #[test]
    fn test_update_across_threads() {
        let cell = SharedCell::shared(0usize);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.update(|v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.get(), 4000);
    }
}
