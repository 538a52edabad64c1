//! Persistence store capability.
//!
//! The core never implements storage itself; it talks to a store through
//! this trait. Every transfer is a discrete open → read/write → close
//! sequence and streams are closed when dropped, so an early return on an
//! error path still releases the stream.

use crate::driver::EdgeError;
use std::io::{Read, Write};

/// Access mode for [`PersistenceStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing stream for reading.
    Read,
    /// Create or truncate a stream for writing.
    Write,
}

impl OpenMode {
    /// Conventional single-letter form ("r" / "w").
    pub const fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
        }
    }
}

/// An open named byte stream.
///
/// A stream opened with [`OpenMode::Read`] may reject writes and vice versa.
pub trait StoreStream: Read + Write {
    /// Flush pending data and release the stream.
    fn close(mut self: Box<Self>) -> std::io::Result<()> {
        self.flush()
    }
}

impl<T: Read + Write> StoreStream for T {}

/// External file-storage capability.
pub trait PersistenceStore {
    /// Mount the store. Mounting an already mounted store succeeds.
    fn mount(&mut self) -> Result<(), EdgeError>;

    /// Unmount the store. Unmounting an unmounted store is a no-op.
    fn unmount(&mut self);

    /// Whether the store is currently mounted.
    fn is_mounted(&self) -> bool;

    /// Open a named stream. Names carry a leading `/`.
    ///
    /// # Errors
    /// `EdgeError::NotMounted` if the store is not mounted,
    /// `EdgeError::OpenFailed` if the stream cannot be opened.
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreStream + '_>, EdgeError>;
}

/// Scoped mount held for the duration of a batch operation.
///
/// Mounts on construction only when the store is not mounted yet and
/// unmounts on drop only what it mounted itself.
pub struct MountGuard<'a> {
    store: &'a mut dyn PersistenceStore,
    owned: bool,
}

impl<'a> MountGuard<'a> {
    /// Mount `store` if needed.
    ///
    /// # Errors
    /// Propagates the store's mount failure; nothing is left mounted.
    pub fn mount(store: &'a mut dyn PersistenceStore) -> Result<Self, EdgeError> {
        let owned = if store.is_mounted() {
            false
        } else {
            store.mount()?;
            true
        };
        Ok(Self { store, owned })
    }

    /// Access the mounted store.
    pub fn store(&mut self) -> &mut dyn PersistenceStore {
        &mut *self.store
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            self.store.unmount();
        }
    }
}
