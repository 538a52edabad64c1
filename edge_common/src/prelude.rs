//! Prelude module for common re-exports.
//!
//! ```rust
//! use edge_common::prelude::*;
//! ```

// ─── Drivers ────────────────────────────────────────────────────────
pub use crate::driver::{DriverState, EdgeDriver, EdgeError, PersistFlags};

// ─── Persistence ────────────────────────────────────────────────────
pub use crate::document::EdgeDocument;
pub use crate::store::{MountGuard, OpenMode, PersistenceStore, StoreStream};

// ─── UI binding ─────────────────────────────────────────────────────
pub use crate::binding::{PageArgs, PageSource, RequestHandler, UiBinding, UiHost};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, SystemClock, Ticks};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, EdgeConfig, LogLevel, SharedConfig};
