//! Persistence key resolution and payload codecs.
//!
//! Two encodings exist:
//! - structured: a JSON object produced by a driver's serializer pair,
//!   portable across builds and devices;
//! - raw: a fixed-int little-endian `bincode` image of the whole payload.
//!   Raw images are only meant to be read back by the same build; any
//!   layout change shows up as a structural mismatch on restore.

use bincode::Options;
use edge_common::consts::{RAW_EXTENSION, STRUCTURED_EXTENSION};
use edge_common::driver::EdgeError;
use edge_common::store::{OpenMode, PersistenceStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};

/// Upper bound on a raw image, guards restore against corrupt length prefixes.
pub const RAW_SIZE_LIMIT: u64 = 64 * 1024;

/// Resolve the stream name for a save or restore.
///
/// `name` is used verbatim (with a leading `/` added if missing); without a
/// name the key is `/` + `stem` + the extension of the active encoding.
pub fn resolve_key(name: Option<&str>, stem: &str, structured: bool) -> String {
    match name {
        Some(name) if !name.is_empty() => {
            if name.starts_with('/') {
                name.to_string()
            } else {
                format!("/{name}")
            }
        }
        _ => {
            let extension = if structured { STRUCTURED_EXTENSION } else { RAW_EXTENSION };
            format!("/{stem}{extension}")
        }
    }
}

fn raw_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(RAW_SIZE_LIMIT)
        .reject_trailing_bytes()
}

/// Encode a payload as a raw image.
pub fn encode_raw<T: Serialize>(key: &str, data: &T) -> Result<Vec<u8>, EdgeError> {
    raw_options().serialize(data).map_err(|e| EdgeError::Encode {
        name: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a raw image. Short, oversized or trailing data is a mismatch.
pub fn decode_raw<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, EdgeError> {
    raw_options().deserialize(bytes).map_err(|e| EdgeError::StructuralMismatch {
        name: key.to_string(),
        reason: e.to_string(),
    })
}

/// Read a whole stream. The stream is closed before returning.
pub fn read_stream(store: &mut dyn PersistenceStore, key: &str) -> Result<Vec<u8>, EdgeError> {
    let mut stream = store.open(key, OpenMode::Read)?;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).map_err(|e| EdgeError::Io {
        name: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(bytes)
}

/// Replace a stream's content with `bytes`. Returns the number of bytes written.
pub fn write_stream(
    store: &mut dyn PersistenceStore,
    key: &str,
    bytes: &[u8],
) -> Result<usize, EdgeError> {
    let io_error = |e: std::io::Error| EdgeError::Io {
        name: key.to_string(),
        reason: e.to_string(),
    };
    let mut stream = store.open(key, OpenMode::Write)?;
    stream.write_all(bytes).map_err(io_error)?;
    stream.close().map_err(io_error)?;
    Ok(bytes.len())
}
