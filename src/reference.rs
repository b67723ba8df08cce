//! Shared value handles with a release hook.
//!
//! A [`CloseableRef`] is an atomically reference counted handle around a
//! value. When the last handle is dropped the value is handed to its
//! [`ResourceReleaser`], exactly once, on whichever thread dropped that last
//! handle. This is the ownership model the memory cache builds on: the cache
//! keeps one handle per entry and every client reference keeps the entry
//! alive, so a value can never be released while anyone can still read it.
//!
//! ```
//! use counting_cache::CloseableRef;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&released);
//! let value = CloseableRef::new(vec![0u8; 4], move |_buf: Vec<u8>| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! let other = value.clone();
//! drop(value);
//! assert_eq!(released.load(Ordering::SeqCst), 0);
//! other.close();
//! assert_eq!(released.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::Arc;

/// Releases the underlying resource of a value once nothing references it.
///
/// Releasers run outside the cache lock and may run on any thread. They must
/// not call back into the cache that held the value.
pub trait ResourceReleaser<V>: Send + Sync {
    /// Releases `value`.
    fn release(&self, value: V);
}

impl<V, F> ResourceReleaser<V> for F
where
    F: Fn(V) + Send + Sync,
{
    #[inline]
    fn release(&self, value: V) {
        self(value)
    }
}

struct Shared<V> {
    value: ManuallyDrop<V>,
    releaser: Option<Arc<dyn ResourceReleaser<V>>>,
}

impl<V> Drop for Shared<V> {
    fn drop(&mut self) {
        // SAFETY: `value` is taken exactly once, here, and never touched again
        let value = unsafe { ManuallyDrop::take(&mut self.value) };
        match self.releaser.take() {
            Some(releaser) => releaser.release(value),
            None => drop(value),
        }
    }
}

/// A cloneable, thread-safe handle to a value that is released when the last
/// handle goes away.
pub struct CloseableRef<V> {
    inner: Arc<Shared<V>>,
}

impl<V> CloseableRef<V> {
    /// Wraps `value`, releasing it through `releaser` when the last handle is
    /// dropped.
    pub fn new<R>(value: V, releaser: R) -> Self
    where
        R: ResourceReleaser<V> + 'static,
    {
        Self::with_releaser(value, Arc::new(releaser))
    }

    /// Wraps `value` with a releaser that may be shared across many values.
    pub fn with_releaser(value: V, releaser: Arc<dyn ResourceReleaser<V>>) -> Self {
        CloseableRef {
            inner: Arc::new(Shared {
                value: ManuallyDrop::new(value),
                releaser: Some(releaser),
            }),
        }
    }

    /// Wraps `value` without a releaser. The value is simply dropped.
    pub fn of(value: V) -> Self {
        CloseableRef {
            inner: Arc::new(Shared {
                value: ManuallyDrop::new(value),
                releaser: None,
            }),
        }
    }

    /// Returns the wrapped value.
    #[inline]
    pub fn get(&self) -> &V {
        &self.inner.value
    }

    /// Drops this handle. Equivalent to `drop(handle)`.
    #[inline]
    pub fn close(self) {}

    /// Number of live handles to the same value.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns true if both handles point at the same value.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }
}

impl<V> Clone for CloseableRef<V> {
    fn clone(&self) -> Self {
        CloseableRef {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Deref for CloseableRef<V> {
    type Target = V;

    #[inline]
    fn deref(&self) -> &V {
        self.get()
    }
}

impl<V: fmt::Debug> fmt::Debug for CloseableRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseableRef")
            .field("value", self.get())
            .field("handles", &self.handle_count())
            .finish()
    }
}
