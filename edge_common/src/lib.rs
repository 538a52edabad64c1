//! EdgeUnified Common Library
//!
//! This crate provides the contracts shared by every EdgeUnified crate:
//! the type-erased driver interface, the persistence store, UI host and clock
//! capabilities, the structured document and configuration loading.
//!
//! # Module Structure
//!
//! - [`driver`] - `EdgeDriver` trait, `EdgeError`, persistence flags
//! - [`store`] - Persistence store capability and scoped mounting
//! - [`document`] - Structured key-value document
//! - [`binding`] - UI binding descriptors and the UI host capability
//! - [`clock`] - Wraparound-tolerant tick clock
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Persistence naming and default paths
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use edge_common::prelude::*;
//! ```

pub mod binding;
pub mod clock;
pub mod config;
pub mod consts;
pub mod document;
pub mod driver;
pub mod prelude;
pub mod store;
