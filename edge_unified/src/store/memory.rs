//! In-memory persistence store.

use edge_common::driver::EdgeError;
use edge_common::store::{OpenMode, PersistenceStore, StoreStream};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// Store keeping every stream in a `HashMap`.
///
/// Writes land directly in the map; a stream opened for writing truncates
/// the previous content.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
    mounted: bool,
    refuse_mount: bool,
    mounts: usize,
    unmounts: usize,
}

impl MemoryStore {
    /// Create an unmounted, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that is already mounted.
    pub fn mounted() -> Self {
        Self { mounted: true, ..Self::default() }
    }

    /// Create a store whose mount always fails.
    pub fn unmountable() -> Self {
        Self { refuse_mount: true, ..Self::default() }
    }

    /// Content of stream `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Replace the content of stream `name`.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), bytes.into());
    }

    /// Delete stream `name`.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    /// Whether stream `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Number of streams.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store holds no streams.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Successful mounts and unmounts so far.
    pub fn mount_counts(&self) -> (usize, usize) {
        (self.mounts, self.unmounts)
    }
}

impl PersistenceStore for MemoryStore {
    fn mount(&mut self) -> Result<(), EdgeError> {
        if self.refuse_mount {
            return Err(EdgeError::MountFailed("memory store refuses mount".to_string()));
        }
        if !self.mounted {
            self.mounted = true;
            self.mounts += 1;
        }
        Ok(())
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.mounted = false;
            self.unmounts += 1;
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Box<dyn StoreStream + '_>, EdgeError> {
        if !self.mounted {
            return Err(EdgeError::NotMounted);
        }
        match mode {
            OpenMode::Read => {
                let bytes = self.files.get(name).cloned().ok_or_else(|| EdgeError::OpenFailed {
                    name: name.to_string(),
                    reason: "no such stream".to_string(),
                })?;
                Ok(Box::new(MemoryStream::Reader(Cursor::new(bytes))))
            }
            OpenMode::Write => {
                let buffer = self.files.entry(name.to_string()).or_default();
                buffer.clear();
                Ok(Box::new(MemoryStream::Writer(buffer)))
            }
        }
    }
}

enum MemoryStream<'a> {
    Reader(Cursor<Vec<u8>>),
    Writer(&'a mut Vec<u8>),
}

impl Read for MemoryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MemoryStream::Reader(cursor) => cursor.read(buf),
            MemoryStream::Writer(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream opened for writing",
            )),
        }
    }
}

impl Write for MemoryStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MemoryStream::Writer(buffer) => {
                buffer.extend_from_slice(buf);
                Ok(buf.len())
            }
            MemoryStream::Reader(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream opened for reading",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
