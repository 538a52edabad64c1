//! Typed driver implementation.
//!
//! `Driver<T>` owns one payload of type `T` together with its lifecycle
//! callbacks, its interval timer and its persistence settings. It implements
//! [`EdgeDriver`] so drivers of different payload types can share one
//! [`Registry`](crate::registry::Registry).
//!
//! # Module Structure
//!
//! ```text
//! ┌──────────────────────── Driver<T> ────────────────────────┐
//! │  data: T          on_start / on_process / on_end / on_error│
//! │  interval         serializer / deserializer (optional)     │
//! │  last_tick        store (optional)   clock                 │
//! └────────────────────────────┬───────────────────────────────┘
//!                              │ callbacks receive
//!                              ▼
//!                 DriverContext { data, interval, now }
//! ```

use crate::persistence::{decode_raw, encode_raw, read_stream, resolve_key, write_stream};
use edge_common::clock::{Clock, SystemClock, Ticks, elapsed};
use edge_common::document::EdgeDocument;
use edge_common::driver::{DriverState, EdgeDriver, EdgeError, PersistFlags};
use edge_common::store::PersistenceStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Payload types a driver can own.
///
/// `Serialize + DeserializeOwned` backs the raw persistence image.
pub trait EdgeData: Serialize + DeserializeOwned + 'static {}

impl<T: Serialize + DeserializeOwned + 'static> EdgeData for T {}

/// Lifecycle callback (on-start, on-process, on-end).
pub type Callback<T> = Box<dyn FnMut(&mut DriverContext<'_, T>)>;

/// Error callback, receives the caller-defined error code.
pub type ErrorCallback<T> = Box<dyn FnMut(&mut DriverContext<'_, T>, i32)>;

/// Writes payload fields into a structured document.
pub type Serializer<T> = Box<dyn Fn(&T, &mut EdgeDocument)>;

/// Reads payload fields back from a structured document.
pub type Deserializer<T> = Box<dyn Fn(&mut T, &EdgeDocument)>;

/// Shared handle to a persistence store.
pub type SharedStore = Rc<RefCell<dyn PersistenceStore>>;

/// Shared handle to a tick source.
pub type SharedClock = Rc<dyn Clock>;

/// Shared, type-erased driver handle as held by the registry.
pub type SharedDriver = Rc<RefCell<dyn EdgeDriver>>;

/// View handed to callbacks: the payload plus the driver's timer.
pub struct DriverContext<'a, T> {
    data: &'a mut T,
    interval: &'a mut Ticks,
    last_tick: &'a mut Ticks,
    now: Ticks,
}

impl<T> DriverContext<'_, T> {
    /// Tick count at which the callback was invoked.
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Current process interval.
    pub fn interval(&self) -> Ticks {
        *self.interval
    }

    /// Change the process interval and restart the period from now.
    pub fn set_interval(&mut self, interval: Ticks) {
        *self.interval = interval;
        *self.last_tick = self.now;
    }

    /// Process on every tick.
    pub fn clear_interval(&mut self) {
        *self.interval = 0;
    }

    /// Payload.
    pub fn data(&self) -> &T {
        &*self.data
    }

    /// Mutable payload.
    pub fn data_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

impl<T> Deref for DriverContext<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.data
    }
}

impl<T> DerefMut for DriverContext<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

#[derive(Clone, Copy)]
enum Hook {
    Start,
    Process,
    End,
}

/// A periodic task owning one payload.
///
/// Drivers start in [`DriverState::Stopped`]. They are usually wrapped with
/// [`Driver::into_shared`] and attached to a registry; the caller keeps its
/// own clone of the handle to reach the payload later.
///
/// # Example
///
/// ```rust
/// use edge_unified::driver::Driver;
/// use edge_common::driver::EdgeDriver;
///
/// let mut counter = Driver::new("Counter", 0u32)
///     .on_process(|ctx| **ctx += 1);
/// counter.start(Some(0));
/// counter.process();
/// assert_eq!(*counter.data(), 1);
/// ```
pub struct Driver<T: EdgeData> {
    data: T,
    type_tag: String,
    persist_name: Option<String>,
    enabled: bool,
    interval: Ticks,
    last_tick: Ticks,
    persistence: PersistFlags,
    on_start: Option<Callback<T>>,
    on_process: Option<Callback<T>>,
    on_end: Option<Callback<T>>,
    on_error: Option<ErrorCallback<T>>,
    serializer: Option<Serializer<T>>,
    deserializer: Option<Deserializer<T>>,
    store: Option<SharedStore>,
    clock: SharedClock,
}

impl<T: EdgeData> Driver<T> {
    /// Create a stopped driver with no callbacks, measuring time with [`SystemClock`].
    pub fn new(type_tag: impl Into<String>, data: T) -> Self {
        let clock: SharedClock = Rc::new(SystemClock::new());
        let last_tick = clock.now();
        Self {
            data,
            type_tag: type_tag.into(),
            persist_name: None,
            enabled: false,
            interval: 0,
            last_tick,
            persistence: PersistFlags::empty(),
            on_start: None,
            on_process: None,
            on_end: None,
            on_error: None,
            serializer: None,
            deserializer: None,
            store: None,
            clock,
        }
    }

    /// Set the on-start callback.
    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut DriverContext<'_, T>) + 'static,
    {
        self.on_start = Some(Box::new(f));
        self
    }

    /// Set the on-process callback.
    pub fn on_process<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut DriverContext<'_, T>) + 'static,
    {
        self.on_process = Some(Box::new(f));
        self
    }

    /// Set the on-end callback.
    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut DriverContext<'_, T>) + 'static,
    {
        self.on_end = Some(Box::new(f));
        self
    }

    /// Set the on-error callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut DriverContext<'_, T>, i32) + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Set the three lifecycle callbacks at once.
    pub fn bind<S, P, E>(self, start: S, process: P, end: E) -> Self
    where
        S: FnMut(&mut DriverContext<'_, T>) + 'static,
        P: FnMut(&mut DriverContext<'_, T>) + 'static,
        E: FnMut(&mut DriverContext<'_, T>) + 'static,
    {
        self.on_start(start).on_process(process).on_end(end)
    }

    /// Persist through a structured document instead of the raw image.
    pub fn serializer<S, D>(mut self, serialize: S, deserialize: D) -> Self
    where
        S: Fn(&T, &mut EdgeDocument) + 'static,
        D: Fn(&mut T, &EdgeDocument) + 'static,
    {
        self.serializer = Some(Box::new(serialize));
        self.deserializer = Some(Box::new(deserialize));
        self
    }

    /// Measure intervals with `clock`. Restarts the current period.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.last_tick = clock.now();
        self.clock = clock;
        self
    }

    /// Default store for auto-restore, auto-save and `*_default` calls.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `name` instead of the type tag as the default persistence stem.
    pub fn persist_as(mut self, name: impl Into<String>) -> Self {
        self.persist_name = Some(name.into());
        self
    }

    /// Restore from the default store on start.
    pub fn auto_restore(mut self, enable: bool) -> Self {
        self.set_auto_restore(enable);
        self
    }

    /// Save to the default store on end.
    pub fn auto_save(mut self, enable: bool) -> Self {
        self.set_auto_save(enable);
        self
    }

    /// Wrap into a shared handle.
    pub fn into_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Payload.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable payload.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Change the process interval and restart the period from now.
    pub fn set_interval(&mut self, interval: Ticks) {
        self.interval = interval;
        self.last_tick = self.clock.now();
    }

    /// Process on every tick.
    pub fn clear_interval(&mut self) {
        self.interval = 0;
    }

    /// Tick at which the current period started.
    pub fn last_tick(&self) -> Ticks {
        self.last_tick
    }

    /// Enable or disable processing without running any callback.
    pub fn enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    /// Toggle auto-restore.
    pub fn set_auto_restore(&mut self, enable: bool) {
        self.persistence.set(PersistFlags::AUTO_RESTORE, enable);
    }

    /// Toggle auto-save.
    pub fn set_auto_save(&mut self, enable: bool) {
        self.persistence.set(PersistFlags::AUTO_SAVE, enable);
    }

    /// Current auto persistence flags.
    pub fn persistence(&self) -> PersistFlags {
        self.persistence
    }

    /// Whether saves go through the structured document.
    pub fn is_structured(&self) -> bool {
        self.serializer.is_some()
    }

    /// Save to the default store under the default key.
    pub fn save_default(&self) -> usize {
        self.with_default_store(|store| self.save(store, None))
    }

    /// Restore from the default store under the default key.
    pub fn restore_default(&mut self) -> usize {
        let Some(store) = self.store.clone() else {
            warn!("Driver '{}' has no default store", self.type_tag);
            return 0;
        };
        let Ok(mut store) = store.try_borrow_mut() else {
            warn!("Default store of '{}' is busy", self.type_tag);
            return 0;
        };
        self.restore(&mut *store, None)
    }

    fn with_default_store(&self, f: impl FnOnce(&mut dyn PersistenceStore) -> usize) -> usize {
        let Some(store) = self.store.as_ref() else {
            warn!("Driver '{}' has no default store", self.type_tag);
            return 0;
        };
        match store.try_borrow_mut() {
            Ok(mut store) => f(&mut *store),
            Err(_) => {
                warn!("Default store of '{}' is busy", self.type_tag);
                0
            }
        }
    }

    fn stem(&self) -> &str {
        self.persist_name.as_deref().unwrap_or(&self.type_tag)
    }

    fn fire(&mut self, hook: Hook, now: Ticks) {
        let callback = match hook {
            Hook::Start => &mut self.on_start,
            Hook::Process => &mut self.on_process,
            Hook::End => &mut self.on_end,
        };
        if let Some(callback) = callback.as_mut() {
            let mut ctx = DriverContext {
                data: &mut self.data,
                interval: &mut self.interval,
                last_tick: &mut self.last_tick,
                now,
            };
            callback(&mut ctx);
        }
    }
}

impl<T: EdgeData> EdgeDriver for Driver<T> {
    fn type_tag(&self) -> &str {
        &self.type_tag
    }

    fn default_key(&self) -> String {
        resolve_key(None, self.stem(), self.serializer.is_some())
    }

    fn state(&self) -> DriverState {
        if self.enabled { DriverState::Running } else { DriverState::Stopped }
    }

    fn interval(&self) -> Ticks {
        self.interval
    }

    fn start(&mut self, interval: Option<Ticks>) {
        self.enabled = true;
        if self.persistence.contains(PersistFlags::AUTO_RESTORE) {
            self.restore_default();
        }
        if let Some(interval) = interval {
            self.set_interval(interval);
        }
        let now = self.clock.now();
        self.fire(Hook::Start, now);
        debug!("Driver '{}' started (interval {})", self.type_tag, self.interval);
    }

    fn process(&mut self) {
        if !self.enabled || self.on_process.is_none() {
            return;
        }
        let now = self.clock.now();
        if elapsed(now, self.last_tick) < self.interval {
            return;
        }
        self.last_tick = now;
        self.fire(Hook::Process, now);
    }

    fn end_with(&mut self, allow_save: bool) {
        let now = self.clock.now();
        self.fire(Hook::End, now);
        if self.persistence.contains(PersistFlags::AUTO_SAVE) {
            if allow_save {
                self.save_default();
            } else {
                warn!("Auto-save of '{}' to {} skipped", self.type_tag, self.default_key());
            }
        }
        self.enabled = false;
        debug!("Driver '{}' ended", self.type_tag);
    }

    fn error(&mut self, code: i32) {
        let now = self.clock.now();
        if let Some(callback) = self.on_error.as_mut() {
            let mut ctx = DriverContext {
                data: &mut self.data,
                interval: &mut self.interval,
                last_tick: &mut self.last_tick,
                now,
            };
            callback(&mut ctx, code);
        }
        self.enabled = false;
        info!("Driver '{}' stopped by error {}", self.type_tag, code);
    }

    fn try_save(
        &self,
        store: &mut dyn PersistenceStore,
        name: Option<&str>,
    ) -> Result<usize, EdgeError> {
        let key = resolve_key(name, self.stem(), self.serializer.is_some());
        let bytes = match &self.serializer {
            Some(serialize) => {
                let mut doc = EdgeDocument::new();
                serialize(&self.data, &mut doc);
                doc.to_vec(&key)?
            }
            None => encode_raw(&key, &self.data)?,
        };
        let size = write_stream(store, &key, &bytes)?;
        debug!("Saved '{}' to {} ({} bytes)", self.type_tag, key, size);
        Ok(size)
    }

    fn try_restore(
        &mut self,
        store: &mut dyn PersistenceStore,
        name: Option<&str>,
    ) -> Result<usize, EdgeError> {
        let key = resolve_key(name, self.stem(), self.deserializer.is_some());
        let bytes = read_stream(store, &key)?;
        match &self.deserializer {
            Some(deserialize) => {
                let doc = EdgeDocument::from_slice(&key, &bytes)?;
                deserialize(&mut self.data, &doc);
            }
            None => self.data = decode_raw(&key, &bytes)?,
        }
        debug!("Restored '{}' from {} ({} bytes)", self.type_tag, key, bytes.len());
        Ok(bytes.len())
    }
}

impl<T: EdgeData + fmt::Debug> fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("type_tag", &self.type_tag)
            .field("data", &self.data)
            .field("enabled", &self.enabled)
            .field("interval", &self.interval)
            .field("last_tick", &self.last_tick)
            .field("persistence", &self.persistence)
            .field("structured", &self.serializer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use edge_common::clock::ManualClock;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Gpio {
        pin: i32,
        cycle: u32,
    }

    fn counting(clock: &ManualClock) -> Driver<u32> {
        Driver::new("Counter", 0u32)
            .with_clock(Rc::new(clock.clone()))
            .on_process(|ctx| **ctx += 1)
    }

    #[test]
    fn new_driver_is_stopped() {
        let clock = ManualClock::default();
        let mut driver = counting(&clock);
        assert_eq!(driver.state(), DriverState::Stopped);
        driver.process();
        assert_eq!(*driver.data(), 0);
    }

    #[test]
    fn interval_gating() {
        let clock = ManualClock::default();
        let mut driver = counting(&clock);
        driver.start(Some(500));

        clock.set(499);
        driver.process();
        assert_eq!(*driver.data(), 0);
        assert_eq!(driver.last_tick(), 0);

        clock.set(500);
        driver.process();
        assert_eq!(*driver.data(), 1);
        assert_eq!(driver.last_tick(), 500);

        clock.set(999);
        driver.process();
        assert_eq!(*driver.data(), 1);

        clock.set(1000);
        driver.process();
        assert_eq!(*driver.data(), 2);
    }

    #[test]
    fn zero_interval_runs_every_pass() {
        let clock = ManualClock::default();
        let mut driver = counting(&clock);
        driver.start(Some(0));
        driver.process();
        driver.process();
        assert_eq!(*driver.data(), 2);
    }

    #[test]
    fn interval_survives_tick_wrap() {
        let clock = ManualClock::starting_at(u32::MAX - 100);
        let mut driver = counting(&clock);
        driver.start(Some(200));
        clock.advance(199);
        driver.process();
        assert_eq!(*driver.data(), 0);
        clock.advance(1);
        driver.process();
        assert_eq!(*driver.data(), 1);
    }

    #[test]
    fn start_without_interval_keeps_period() {
        let clock = ManualClock::default();
        let mut driver = counting(&clock);
        driver.set_interval(300);
        driver.start(None);
        assert_eq!(driver.interval(), 300);
    }

    #[test]
    fn callback_can_change_interval() {
        let clock = ManualClock::default();
        let mut driver = Driver::new("Retry", 0u32)
            .with_clock(Rc::new(clock.clone()))
            .on_process(|ctx| {
                **ctx += 1;
                ctx.set_interval(50);
            });
        driver.start(Some(0));
        driver.process();
        assert_eq!(driver.interval(), 50);
        clock.set(49);
        driver.process();
        assert_eq!(*driver.data(), 1);
        clock.set(50);
        driver.process();
        assert_eq!(*driver.data(), 2);
    }

    #[test]
    fn error_disables_and_forwards_code() {
        let clock = ManualClock::default();
        let mut driver = Driver::new("Gpio", Gpio::default())
            .with_clock(Rc::new(clock.clone()))
            .on_error(|ctx, code| ctx.pin = code);
        driver.start(Some(0));
        driver.error(7);
        assert_eq!(driver.data().pin, 7);
        assert_eq!(driver.state(), DriverState::Stopped);
    }

    #[test]
    fn end_runs_callback_each_time() {
        let clock = ManualClock::default();
        let mut driver = Driver::new("Counter", 0u32)
            .with_clock(Rc::new(clock.clone()))
            .on_end(|ctx| **ctx += 1);
        driver.start(None);
        driver.end();
        driver.end();
        assert_eq!(*driver.data(), 2);
        assert!(!driver.is_enabled());
    }

    #[test]
    fn default_key_follows_encoding() {
        let raw = Driver::new("Gpio", Gpio::default());
        assert_eq!(raw.default_key(), "/Gpio.dat");

        let structured = Driver::new("Gpio", Gpio::default())
            .serializer(|_, _| {}, |_, _| {})
            .persist_as("Led");
        assert_eq!(structured.default_key(), "/Led.json");
    }

    #[test]
    fn raw_save_restore() {
        let mut store = MemoryStore::mounted();
        let saved = Driver::new("Gpio", Gpio { pin: 2, cycle: 500 });
        assert_eq!(saved.save(&mut store, None), 8);

        let mut restored = Driver::new("Gpio", Gpio::default());
        assert_eq!(restored.restore(&mut store, None), 8);
        assert_eq!(restored.data(), &Gpio { pin: 2, cycle: 500 });
    }

    #[test]
    fn structured_restore_failure_leaves_payload() {
        let mut store = MemoryStore::mounted();
        store.insert("/Gpio.json", b"[1, 2]".to_vec());
        let mut driver = Driver::new("Gpio", Gpio { pin: 4, cycle: 1 }).serializer(
            |data, doc| doc.set("pin", data.pin),
            |data, doc| data.pin = doc.get_i64("pin").unwrap_or_default() as i32,
        );
        assert!(matches!(
            driver.try_restore(&mut store, None),
            Err(EdgeError::StructuralMismatch { .. })
        ));
        assert_eq!(driver.restore(&mut store, None), 0);
        assert_eq!(driver.data().pin, 4);
    }

    #[test]
    fn auto_persistence_uses_default_store() {
        let store = Rc::new(RefCell::new(MemoryStore::mounted()));
        let shared: SharedStore = store.clone();
        let mut first = Driver::new("Gpio", Gpio { pin: 9, cycle: 100 })
            .with_store(shared.clone())
            .auto_save(true);
        first.start(None);
        first.end();
        assert!(store.borrow().contains("/Gpio.dat"));

        let mut second = Driver::new("Gpio", Gpio::default())
            .with_store(shared)
            .auto_restore(true);
        second.start(None);
        assert_eq!(second.data(), &Gpio { pin: 9, cycle: 100 });
    }

    #[test]
    fn end_with_suppressed_save_keeps_stored_copy() {
        let store = Rc::new(RefCell::new(MemoryStore::mounted()));
        store.borrow_mut().insert("/Gpio.dat", vec![0u8; 8]);
        let shared: SharedStore = store.clone();
        let mut driver = Driver::new("Gpio", Gpio { pin: 3, cycle: 30 })
            .with_store(shared)
            .auto_save(true)
            .on_end(|ctx| ctx.cycle = 0);
        driver.start(None);
        driver.end_with(false);
        assert_eq!(driver.data().cycle, 0);
        assert!(!driver.is_enabled());
        assert_eq!(store.borrow().get("/Gpio.dat"), Some(&[0u8; 8][..]));
    }

    #[test]
    fn default_persistence_without_store_reports_zero() {
        let mut driver = Driver::new("Gpio", Gpio::default());
        assert_eq!(driver.save_default(), 0);
        assert_eq!(driver.restore_default(), 0);
    }
}
