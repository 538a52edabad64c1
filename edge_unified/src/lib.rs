//! # Edge Unified Library
//!
//! Cooperative driver registry and scheduler for single-threaded edge hosts.
//!
//! Drivers own a typed payload and run periodically from one shared event
//! loop. Payloads can be persisted to a store and drivers can publish UI
//! pages to a host that may not exist yet when they are attached.
//! The type-erased contract (`EdgeDriver`) lives in `edge_common::driver`.
//!
//! # Module Structure
//!
//! - [`driver`] - `Driver<T>`, callbacks and `DriverContext`
//! - [`registry`] - `Registry`, attach/tick/abort and batch persistence
//! - [`binding`] - Deferred UI binding queue
//! - [`persistence`] - Key resolution and payload codecs
//! - [`store`] - Directory and in-memory persistence stores
//! - [`ui`] - In-memory page table UI host
//! - [`drivers`] - Demo driver implementations
//! - [`core`] - EdgeCore struct, event loop management
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    edge_unified (single crate)                   │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ Persistence │◄──►│   Registry   │◄──►│  BindingQueue       │  │
//! │  │ Store       │    │  (tick loop) │    │  ──► UiHost         │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │                            ▼                                     │
//! │                   ┌────────────────┐                             │
//! │                   │  EdgeDriver    │ (trait object)              │
//! │                   │  = Driver<T>   │                             │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod binding;
pub mod core;
pub mod driver;
pub mod drivers;
pub mod persistence;
pub mod registry;
pub mod store;
pub mod ui;

// Re-export key types for convenience
pub use crate::binding::{BindingQueue, SharedHost};
pub use crate::core::EdgeCore;
pub use crate::driver::{Driver, DriverContext, EdgeData, SharedDriver, SharedStore};
pub use crate::registry::Registry;
pub use crate::store::{DirStore, MemoryStore};
pub use crate::ui::PageTable;
