//! System-wide constants for the EdgeUnified workspace.
//!
//! Single source of truth for persistence naming and default paths.
//! Imported by all crates — no duplication permitted.

/// File extension for payloads persisted through a structured serializer.
pub const STRUCTURED_EXTENSION: &str = ".json";

/// File extension for payloads persisted as a raw binary image.
pub const RAW_EXTENSION: &str = ".dat";

/// Prefix marking a page description that lives in the persistence store.
///
/// Matched case-insensitively, e.g. `file:/gpio.json` or `FILE:/gpio.json`.
pub const FILE_SOURCE_PREFIX: &str = "file:";

/// Initial capacity reserved when encoding a structured document.
pub const DEFAULT_DOCUMENT_CAPACITY: usize = 256;

/// Default configuration file path for the host binary.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/edge/config.toml";

/// Default root directory of the persistence store.
pub const DEFAULT_STORE_ROOT: &str = "/var/lib/edge";

/// Default sleep between event-loop iterations of the host binary (ms).
pub const DEFAULT_IDLE_MS: u64 = 1;
