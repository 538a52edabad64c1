//! Demo driver implementations.
//!
//! Simulated peripherals wired into the host binary:
//!
//! - [`blink`] - LED blinker with raw persistence
//! - [`publisher`] - Telemetry publisher with structured persistence and retry
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Define the payload type and a `create()` returning a shared `Driver<T>`
//! 3. Expose its UI pages through a `bindings()` function
//! 4. Add it to [`DemoDrivers`]

pub mod blink;
pub mod publisher;

use crate::driver::{SharedClock, SharedDriver, SharedStore};
use crate::registry::Registry;
use blink::BlinkDriver;
use edge_common::binding::UiBinding;
use edge_common::config::EdgeConfig;
use publisher::{PublisherDriver, SharedTransport};

/// Handles to every built-in driver.
pub struct DemoDrivers {
    /// LED blinker.
    pub blink: BlinkDriver,
    /// Telemetry publisher.
    pub publisher: PublisherDriver,
}

impl DemoDrivers {
    /// Build all drivers from `config`, sharing `clock` and `store`.
    pub fn create(
        config: &EdgeConfig,
        clock: SharedClock,
        store: Option<SharedStore>,
        transport: SharedTransport,
    ) -> Self {
        Self {
            blink: blink::create(&config.blink, clock.clone(), store.clone()),
            publisher: publisher::create(&config.publisher, clock, store, transport),
        }
    }

    /// Shared handles in attach order.
    pub fn handles(&self) -> Vec<SharedDriver> {
        vec![self.blink.clone(), self.publisher.clone()]
    }

    /// Attach every driver, keeping the periods their on-start callbacks set.
    pub fn attach(&self, registry: &mut Registry) {
        registry.attach_many(self.handles(), None);
    }

    /// UI pages of every driver.
    pub fn bindings(&self) -> Vec<UiBinding> {
        let mut bindings = blink::bindings(&self.blink);
        bindings.extend(publisher::bindings(&self.publisher));
        bindings
    }
}
