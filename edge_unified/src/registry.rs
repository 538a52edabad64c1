//! Driver registry and cooperative scheduler.
//!
//! The registry holds shared handles to attached drivers and runs one
//! scheduling pass per [`Registry::tick`]. It is an ordinary value owned by
//! the host program; tests can build as many as they need.
//!
//! # Module Structure
//!
//! ```text
//! ┌──────────────────────────── Registry ───────────────────────────┐
//! │  drivers: Vec<SharedDriver>   (attach order, duplicates allowed) │
//! │  bindings: BindingQueue       (FIFO until a UI host is bound)    │
//! │  store: Option<SharedStore>   (resolves file: page sources)      │
//! └──────────────────────────────────────────────────────────────────┘
//!      tick ──► process() on each driver, in order
//!      abort(code) / end_all ──► error(code) / end() on each driver
//!      save_all / restore_all ──► per-driver save / restore under a MountGuard
//! ```

use crate::binding::{BindingQueue, SharedHost};
use crate::driver::{SharedDriver, SharedStore};
use edge_common::binding::UiBinding;
use edge_common::clock::Ticks;
use edge_common::driver::{EdgeDriver, EdgeError};
use edge_common::store::{MountGuard, PersistenceStore};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Ordered collection of attached drivers plus the deferred binding queue.
#[derive(Default)]
pub struct Registry {
    drivers: Vec<SharedDriver>,
    bindings: BindingQueue,
    store: Option<SharedStore>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `store` to load `file:` page sources.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.bindings.set_store(store.clone());
        self.store = Some(store);
        self
    }

    /// Store used for `file:` page sources, if any.
    pub fn store(&self) -> Option<&SharedStore> {
        self.store.as_ref()
    }

    /// Append `driver` and start it.
    ///
    /// `interval` of `Some` replaces the driver's period. Attaching the same
    /// handle twice makes it run twice per tick.
    pub fn attach(&mut self, driver: SharedDriver, interval: Option<Ticks>) {
        if let Some(key) = key_of(&driver) {
            let clash = self.drivers.iter().any(|other| {
                !same_driver(other, &driver) && key_of(other).as_deref() == Some(key.as_str())
            });
            if clash {
                warn!(
                    "Persistence key {} is shared by several drivers; use persist_as() to separate them",
                    key
                );
            }
        }
        self.drivers.push(driver.clone());
        match driver.try_borrow_mut() {
            Ok(mut d) => {
                d.start(interval);
                info!("Attached driver '{}' ({} attached)", d.type_tag(), self.drivers.len());
            }
            Err(_) => warn!("Driver busy, attached without start"),
        }
    }

    /// Attach each driver in order. Earlier attachments stay in effect.
    pub fn attach_many<I>(&mut self, drivers: I, interval: Option<Ticks>)
    where
        I: IntoIterator<Item = SharedDriver>,
    {
        for driver in drivers {
            self.attach(driver, interval);
        }
    }

    /// Remove every handle pointing at `driver`. Does not call `end()`.
    ///
    /// Returns the number of handles removed.
    pub fn detach<D: EdgeDriver + ?Sized>(&mut self, driver: &Rc<RefCell<D>>) -> usize {
        let before = self.drivers.len();
        self.drivers
            .retain(|other| !std::ptr::addr_eq(Rc::as_ptr(other), Rc::as_ptr(driver)));
        let removed = before - self.drivers.len();
        debug!("Detached {} driver handle(s)", removed);
        removed
    }

    /// Whether a handle pointing at `driver` is attached.
    pub fn contains<D: EdgeDriver + ?Sized>(&self, driver: &Rc<RefCell<D>>) -> bool {
        self.drivers
            .iter()
            .any(|other| std::ptr::addr_eq(Rc::as_ptr(other), Rc::as_ptr(driver)))
    }

    /// One scheduling pass: `process()` on every driver in attach order.
    pub fn tick(&mut self) {
        for driver in &self.drivers {
            match driver.try_borrow_mut() {
                Ok(mut d) => d.process(),
                Err(_) => debug!("Driver busy, skipped this tick"),
            }
        }
    }

    /// Forward `code` to every driver via `error()`, in attach order.
    pub fn abort(&mut self, code: i32) {
        info!("Aborting {} drivers with code {}", self.drivers.len(), code);
        for driver in &self.drivers {
            match driver.try_borrow_mut() {
                Ok(mut d) => d.error(code),
                Err(_) => warn!("Driver busy, abort skipped"),
            }
        }
    }

    /// Call `end()` on every driver in attach order.
    ///
    /// A driver whose persistence key belongs to an earlier attached driver
    /// ends without its auto-save, so it cannot overwrite the owner's file.
    pub fn end_all(&mut self) {
        info!("Ending {} drivers", self.drivers.len());
        let owners = self.key_owners();
        for (driver, owns_key) in self.drivers.iter().zip(owners) {
            match driver.try_borrow_mut() {
                Ok(mut d) => d.end_with(owns_key),
                Err(_) => warn!("Driver busy, end skipped"),
            }
        }
    }

    /// Hand a UI binding to the host, or queue it until one is bound.
    pub fn join(&mut self, binding: UiBinding) {
        self.bindings.join(binding);
    }

    /// Join each binding in order.
    pub fn join_many<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = UiBinding>,
    {
        self.bindings.join_many(bindings);
    }

    /// Bind the UI host (first call only) and flush pending bindings to it.
    pub fn bind_host(&mut self, host: SharedHost) {
        self.bindings.bind_host(host);
    }

    /// `bind_host` followed by `tick`, for loops that own the host.
    pub fn tick_with_host(&mut self, host: SharedHost) {
        self.bind_host(host);
        self.tick();
    }

    /// Ask the bound UI host to drop the page at `uri`.
    pub fn release(&mut self, uri: &str) -> bool {
        self.bindings.release(uri)
    }

    /// Restore every driver from `store`, in attach order.
    ///
    /// With `auto_mount` the store is mounted for the batch and unmounted
    /// afterwards. Each entry of the result is the byte count of one driver's
    /// restore (0 when it did not happen).
    ///
    /// # Errors
    /// Returns the mount failure; no driver is touched in that case.
    pub fn restore_all(
        &mut self,
        store: &mut dyn PersistenceStore,
        auto_mount: bool,
    ) -> Result<Vec<usize>, EdgeError> {
        let every = vec![true; self.drivers.len()];
        self.batch(store, auto_mount, &every, |driver, store| match driver.try_borrow_mut() {
            Ok(mut d) => d.restore(store, None),
            Err(_) => 0,
        })
    }

    /// Save every driver to `store`, in attach order.
    ///
    /// Only the first driver owning a persistence key writes it; later
    /// drivers with the same key report 0.
    ///
    /// # Errors
    /// Returns the mount failure; no driver is touched in that case.
    pub fn save_all(
        &mut self,
        store: &mut dyn PersistenceStore,
        auto_mount: bool,
    ) -> Result<Vec<usize>, EdgeError> {
        let owners = self.key_owners();
        self.batch(store, auto_mount, &owners, |driver, store| match driver.try_borrow() {
            Ok(d) => d.save(store, None),
            Err(_) => 0,
        })
    }

    /// Default persistence keys claimed by more than one distinct driver.
    pub fn key_collisions(&self) -> Vec<String> {
        let mut owners: HashMap<String, *const ()> = HashMap::new();
        let mut collisions = Vec::new();
        for driver in &self.drivers {
            let Some(key) = key_of(driver) else { continue };
            let id = identity(driver);
            let owner = *owners.entry(key.clone()).or_insert(id);
            if owner != id && !collisions.contains(&key) {
                collisions.push(key);
            }
        }
        collisions
    }

    /// Number of attached handles.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether no driver is attached.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Attached handles in attach order.
    pub fn drivers(&self) -> &[SharedDriver] {
        &self.drivers
    }

    /// Number of bindings waiting for a UI host.
    pub fn pending_bindings(&self) -> usize {
        self.bindings.pending()
    }

    /// Whether a UI host has been bound.
    pub fn has_host(&self) -> bool {
        self.bindings.has_host()
    }

    fn batch<F>(
        &self,
        store: &mut dyn PersistenceStore,
        auto_mount: bool,
        selected: &[bool],
        op: F,
    ) -> Result<Vec<usize>, EdgeError>
    where
        F: FnMut(&SharedDriver, &mut dyn PersistenceStore) -> usize,
    {
        if auto_mount {
            let mut guard = MountGuard::mount(store)?;
            Ok(self.run_batch(guard.store(), selected, op))
        } else {
            Ok(self.run_batch(store, selected, op))
        }
    }

    fn run_batch<F>(
        &self,
        store: &mut dyn PersistenceStore,
        selected: &[bool],
        mut op: F,
    ) -> Vec<usize>
    where
        F: FnMut(&SharedDriver, &mut dyn PersistenceStore) -> usize,
    {
        let sizes: Vec<usize> = self
            .drivers
            .iter()
            .zip(selected)
            .map(|(driver, &run)| if run { op(driver, &mut *store) } else { 0 })
            .collect();
        debug!("Persistence batch over {} drivers", sizes.len());
        sizes
    }

    /// Per attached handle, whether it is the first driver claiming its
    /// persistence key. Later drivers with the same key are warned about.
    fn key_owners(&self) -> Vec<bool> {
        let mut owners: HashMap<String, *const ()> = HashMap::new();
        self.drivers
            .iter()
            .map(|driver| {
                let Some(key) = key_of(driver) else { return true };
                let id = identity(driver);
                let owner = *owners.entry(key.clone()).or_insert(id);
                if owner != id {
                    warn!("Persistence key {} already belongs to another driver", key);
                }
                owner == id
            })
            .collect()
    }
}

fn identity(driver: &SharedDriver) -> *const () {
    Rc::as_ptr(driver) as *const ()
}

fn same_driver(a: &SharedDriver, b: &SharedDriver) -> bool {
    identity(a) == identity(b)
}

fn key_of(driver: &SharedDriver) -> Option<String> {
    driver.try_borrow().ok().map(|d| d.default_key())
}
