//! Edge driver trait and error types.
//!
//! This module defines:
//! - `EdgeDriver` trait - Type-erased interface the registry drives
//! - `EdgeError` enum - Error types for persistence and binding operations
//! - `PersistFlags` bitflags - Automatic restore/save selection
//! - `DriverState` enum - Observable lifecycle state

use crate::clock::Ticks;
use crate::store::PersistenceStore;
use bitflags::bitflags;
use thiserror::Error;
use tracing::warn;

/// Error types for edge operations.
///
/// Persistence failures never escape `EdgeDriver::save` / `EdgeDriver::restore`
/// (those report 0 bytes); the `try_*` variants surface them as values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeError {
    /// Store has not been mounted
    #[error("Persistence store not mounted")]
    NotMounted,

    /// Store mount failed
    #[error("Mount failed: {0}")]
    MountFailed(String),

    /// Named stream could not be opened
    #[error("Failed to open {name}: {reason}")]
    OpenFailed {
        /// Stream name
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Read or write on an open stream failed
    #[error("I/O error on {name}: {reason}")]
    Io {
        /// Stream name
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Stored bytes could not be decoded
    #[error("Failed to decode {name}: {reason}")]
    Decode {
        /// Stream name
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Payload could not be encoded
    #[error("Failed to encode {name}: {reason}")]
    Encode {
        /// Stream name
        name: String,
        /// Underlying cause
        reason: String,
    },

    /// Stored data decoded but does not have the expected shape
    #[error("Structural mismatch in {name}: {reason}")]
    StructuralMismatch {
        /// Stream name
        name: String,
        /// What was found instead
        reason: String,
    },

    /// Driver has no default store bound
    #[error("No persistence store bound to driver '{0}'")]
    NoStore(String),

    /// Binding descriptor carries no page description
    #[error("UI binding has no page source")]
    MissingSource,

    /// Page description could not be resolved or accepted
    #[error("UI binding rejected: {0}")]
    BindingRejected(String),
}

bitflags! {
    /// Automatic persistence selection for a driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PersistFlags: u8 {
        /// Restore the payload from the default store on `start`
        const AUTO_RESTORE = 0x01;
        /// Save the payload to the default store on `end`
        const AUTO_SAVE = 0x10;
    }
}

/// Observable lifecycle state of a driver.
///
/// ```text
///   ┌─────────┐   start()   ┌─────────┐
///   │ Stopped │ ──────────► │ Running │ ◄─┐ process()
///   └─────────┘             └─────────┘ ──┘
///        ▲      end()/error()    │
///        └───────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    /// Not started yet, ended, or stopped by an error.
    #[default]
    Stopped,
    /// Participating in the event loop.
    Running,
}

/// Trait defining the interface the registry uses to drive a task.
///
/// `edge_unified::Driver<T>` is the canonical implementation; the trait is
/// what lets one registry hold drivers of different payload types.
///
/// # Contract
///
/// | Operation | Blocking | Effect on `enabled` |
/// |-----------|----------|---------------------|
/// | `start()` | no | set |
/// | `process()` | **never** | unchanged |
/// | `end()` | no | cleared (after optional save) |
/// | `error()` | no | cleared (no save) |
pub trait EdgeDriver {
    /// Stable identifier of the payload type, supplied at construction.
    fn type_tag(&self) -> &str;

    /// Persistence key used when no explicit name is given (leading `/`).
    fn default_key(&self) -> String;

    /// Current lifecycle state.
    fn state(&self) -> DriverState;

    /// Whether `process()` is currently allowed to run.
    fn is_enabled(&self) -> bool {
        self.state() == DriverState::Running
    }

    /// Current process interval in ticks (0 = every tick).
    fn interval(&self) -> Ticks;

    /// Enter the running state.
    ///
    /// `Some(interval)` replaces the period and resets the tick clock,
    /// `None` keeps the current period.
    fn start(&mut self, interval: Option<Ticks>);

    /// One scheduling pass. Runs the process callback when the interval elapsed.
    fn process(&mut self);

    /// Leave the running state, saving first when auto-save is enabled.
    fn end(&mut self) {
        self.end_with(true);
    }

    /// `end()` with the auto-save suppressed when `allow_save` is false.
    ///
    /// The registry uses this for drivers whose persistence key belongs to
    /// another attached driver.
    fn end_with(&mut self, allow_save: bool);

    /// Forward an application error code and leave the running state.
    fn error(&mut self, code: i32);

    /// Save the payload, reporting failures as values.
    fn try_save(&self, store: &mut dyn PersistenceStore, name: Option<&str>)
    -> Result<usize, EdgeError>;

    /// Restore the payload, reporting failures as values.
    fn try_restore(
        &mut self,
        store: &mut dyn PersistenceStore,
        name: Option<&str>,
    ) -> Result<usize, EdgeError>;

    /// Save the payload. Returns bytes written, 0 when nothing was saved.
    fn save(&self, store: &mut dyn PersistenceStore, name: Option<&str>) -> usize {
        match self.try_save(store, name) {
            Ok(size) => size,
            Err(e) => {
                warn!("Save of '{}' failed: {}", self.type_tag(), e);
                0
            }
        }
    }

    /// Restore the payload. Returns bytes consumed; 0 means the restore did
    /// not happen and the payload is unchanged.
    fn restore(&mut self, store: &mut dyn PersistenceStore, name: Option<&str>) -> usize {
        match self.try_restore(store, name) {
            Ok(size) => size,
            Err(e) => {
                warn!("Restore of '{}' failed: {}", self.type_tag(), e);
                0
            }
        }
    }
}
