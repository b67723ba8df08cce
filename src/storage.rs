//! Disk storage collaborator.
//!
//! The memory cache never talks to disk. A disk cache layered next to it
//! stores encoded resources through the [`DiskStorage`] interface defined
//! here and runs its own eviction over [`DiskStorage::entries`], oldest
//! access first, independent of any memory cache state.
//!
//! Writes are two-phase: [`DiskStorage::insert`] returns an [`Inserter`]
//! that buffers data as a temporary resource, and only
//! [`Inserter::commit`] makes it visible under its id. Temporaries that were
//! never committed or cleaned up are dropped by
//! [`DiskStorage::purge_unexpected_resources`].
//!
//! [`HeapDiskStorage`] keeps everything in memory and is what the tests and
//! benchmarks use.
//!
//! ```
//! use counting_cache::storage::{evict_oldest, DiskStorage, HeapDiskStorage};
//!
//! let storage = HeapDiskStorage::new("thumbnails");
//! let mut inserter = storage.insert("a").unwrap();
//! inserter.write_data(b"hello").unwrap();
//! inserter.commit().unwrap();
//!
//! assert_eq!(&*storage.get_resource("a").unwrap().unwrap(), b"hello");
//! assert_eq!(evict_oldest(&storage, 0).unwrap(), 5);
//! assert!(!storage.contains("a").unwrap());
//! ```

use crate::clock::{Clock, MonotonicClock};
use log::debug;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

/// Immutable bytes of a committed resource.
pub type BinaryResource = Arc<[u8]>;

/// Disk storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No committed or pending resource has this id.
    #[error("resource not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// The inserter was already committed or cleaned up.
    #[error("inserter for {id} already committed")]
    AlreadyCommitted {
        /// The id of the inserter.
        id: String,
    },

    /// The storage is not usable.
    #[error("storage {name} is disabled")]
    Disabled {
        /// The storage name.
        name: String,
    },

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type of storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A committed resource as seen by eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Resource id.
    pub id: String,
    /// Time of the last access, on the storage's clock.
    pub timestamp: Duration,
    /// Size in bytes.
    pub size: u64,
}

/// Pending write of one resource.
pub trait Inserter {
    /// Appends `data` to the pending resource.
    fn write_data(&mut self, data: &[u8]) -> Result<()>;

    /// Publishes the pending resource under its id, replacing any previous
    /// resource with that id.
    fn commit(&mut self) -> Result<BinaryResource>;

    /// Discards the pending resource. Returns false if there was nothing to
    /// discard.
    fn clean_up(&mut self) -> bool;
}

/// Storage of resources identified by string ids.
pub trait DiskStorage: Send + Sync {
    /// Whether the storage can be used at all.
    fn is_enabled(&self) -> bool;

    /// Returns the committed resource for `id` and marks it accessed.
    fn get_resource(&self, id: &str) -> Result<Option<BinaryResource>>;

    /// Returns true if a resource is committed under `id`.
    fn contains(&self, id: &str) -> Result<bool>;

    /// Marks `id` accessed. Returns false if no such resource exists.
    fn touch(&self, id: &str) -> Result<bool>;

    /// Starts writing a resource under `id`.
    fn insert(&self, id: &str) -> Result<Box<dyn Inserter + '_>>;

    /// All committed resources.
    fn entries(&self) -> Result<Vec<StorageEntry>>;

    /// Removes the resource under `id` and returns the bytes freed, 0 if it
    /// did not exist.
    fn remove(&self, id: &str) -> Result<u64>;

    /// Removes every resource, committed or pending.
    fn clear_all(&self) -> Result<()>;

    /// Drops leftovers that no committed resource accounts for, such as
    /// abandoned pending writes.
    fn purge_unexpected_resources(&self);

    /// Name for logs and dumps.
    fn storage_name(&self) -> &str;
}

/// Removes committed resources, least recently accessed first, until their
/// total size is at most `target_bytes`. Returns the bytes freed.
pub fn evict_oldest(storage: &dyn DiskStorage, target_bytes: u64) -> Result<u64> {
    let mut entries = storage.entries()?;
    let mut total: u64 = entries.iter().map(|e| e.size).sum();
    if total <= target_bytes {
        return Ok(0);
    }
    entries.sort_by_key(|e| e.timestamp);

    let mut freed = 0;
    for entry in entries {
        if total <= target_bytes {
            break;
        }
        let removed = storage.remove(&entry.id)?;
        total = total.saturating_sub(removed);
        freed += removed;
    }
    debug!(
        "{}: evicted {} bytes, {} left",
        storage.storage_name(),
        freed,
        total
    );
    Ok(freed)
}

struct StoredResource {
    data: BinaryResource,
    timestamp: Duration,
}

#[derive(Default)]
struct HeapState {
    committed: HashMap<String, StoredResource>,
    pending: HashMap<String, Vec<u8>>,
}

/// [`DiskStorage`] kept entirely in memory.
pub struct HeapDiskStorage {
    name: String,
    enabled: bool,
    clock: Box<dyn Clock>,
    state: Mutex<HeapState>,
}

impl HeapDiskStorage {
    /// Creates an empty, enabled storage.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, MonotonicClock::new())
    }

    /// Creates an empty, enabled storage stamping accesses with `clock`.
    pub fn with_clock<C: Clock + 'static>(name: impl Into<String>, clock: C) -> Self {
        HeapDiskStorage {
            name: name.into(),
            enabled: true,
            clock: Box::new(clock),
            state: Mutex::new(HeapState::default()),
        }
    }

    /// Creates a storage that refuses every write.
    pub fn disabled(name: impl Into<String>) -> Self {
        HeapDiskStorage {
            enabled: false,
            ..Self::new(name)
        }
    }

    /// Number of pending, uncommitted writes.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Total size of committed resources, in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.state
            .lock()
            .committed
            .values()
            .map(|r| r.data.len() as u64)
            .sum()
    }
}

impl DiskStorage for HeapDiskStorage {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn get_resource(&self, id: &str) -> Result<Option<BinaryResource>> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Ok(state.committed.get_mut(id).map(|resource| {
            resource.timestamp = now;
            Arc::clone(&resource.data)
        }))
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().committed.contains_key(id))
    }

    fn touch(&self, id: &str) -> Result<bool> {
        Ok(self.get_resource(id)?.is_some())
    }

    fn insert(&self, id: &str) -> Result<Box<dyn Inserter + '_>> {
        if !self.enabled {
            return Err(StorageError::Disabled {
                name: self.name.clone(),
            });
        }
        self.state.lock().pending.insert(id.to_string(), Vec::new());
        Ok(Box::new(HeapInserter {
            storage: self,
            id: id.to_string(),
            done: false,
        }))
    }

    fn entries(&self) -> Result<Vec<StorageEntry>> {
        let state = self.state.lock();
        Ok(state
            .committed
            .iter()
            .map(|(id, resource)| StorageEntry {
                id: id.clone(),
                timestamp: resource.timestamp,
                size: resource.data.len() as u64,
            })
            .collect())
    }

    fn remove(&self, id: &str) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .committed
            .remove(id)
            .map_or(0, |resource| resource.data.len() as u64))
    }

    fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.committed.clear();
        state.pending.clear();
        Ok(())
    }

    fn purge_unexpected_resources(&self) {
        let purged = {
            let mut state = self.state.lock();
            let purged = state.pending.len();
            state.pending.clear();
            purged
        };
        if purged > 0 {
            debug!("{}: purged {} pending resources", self.name, purged);
        }
    }

    fn storage_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for HeapDiskStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeapDiskStorage")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("committed", &state.committed.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

struct HeapInserter<'a> {
    storage: &'a HeapDiskStorage,
    id: String,
    done: bool,
}

impl HeapInserter<'_> {
    fn check_open(&self) -> Result<()> {
        if self.done {
            Err(StorageError::AlreadyCommitted {
                id: self.id.clone(),
            })
        } else {
            Ok(())
        }
    }
}

impl Inserter for HeapInserter<'_> {
    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        let mut state = self.storage.state.lock();
        match state.pending.get_mut(&self.id) {
            Some(buffer) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            // purged while we were writing
            None => Err(StorageError::NotFound {
                id: self.id.clone(),
            }),
        }
    }

    fn commit(&mut self) -> Result<BinaryResource> {
        self.check_open()?;
        let now = self.storage.clock.now();
        let mut state = self.storage.state.lock();
        let buffer = state
            .pending
            .remove(&self.id)
            .ok_or_else(|| StorageError::NotFound {
                id: self.id.clone(),
            })?;
        let data: BinaryResource = buffer.into();
        state.committed.insert(
            self.id.clone(),
            StoredResource {
                data: Arc::clone(&data),
                timestamp: now,
            },
        );
        self.done = true;
        Ok(data)
    }

    fn clean_up(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.done = true;
        self.storage.state.lock().pending.remove(&self.id).is_some()
    }
}
