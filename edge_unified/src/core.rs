//! Edge Core struct and event loop management.
//!
//! The `EdgeCore` struct is the main entry point of the host binary.
//! It owns the persistence store, the registry with the demo drivers, the
//! in-memory page table and the cooperative event loop.

use edge_common::clock::SystemClock;
use edge_common::config::{ConfigError, EdgeConfig};
use edge_common::driver::EdgeError;
use edge_common::store::PersistenceStore;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::driver::{SharedClock, SharedStore};
use crate::drivers::DemoDrivers;
use crate::drivers::publisher::SimulatedTransport;
use crate::registry::Registry;
use crate::store::DirStore;
use crate::ui::PageTable;

/// Host startup and shutdown failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistence store unusable
    #[error(transparent)]
    Store(#[from] EdgeError),

    /// `run()` called before `init()`
    #[error("Core not initialized")]
    NotInitialized,
}

/// Edge Core owns the registry and runs the event loop.
pub struct EdgeCore {
    /// Host configuration
    config: EdgeConfig,
    /// Directory-backed store shared with the drivers
    store: Rc<RefCell<DirStore>>,
    /// Page table standing in for the web portal
    pages: Rc<RefCell<PageTable>>,
    /// Transport used by the publisher
    transport: Rc<RefCell<SimulatedTransport>>,
    /// Tick source shared by every driver
    clock: SharedClock,
    /// Attached drivers and pending UI bindings
    registry: Registry,
    /// Demo driver handles, set by `init()`
    drivers: Option<DemoDrivers>,
    /// Running flag for event loop control
    running: Arc<AtomicBool>,
    /// Loop statistics
    stats: LoopStats,
}

/// Event loop statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopStats {
    /// Number of ticks executed
    pub tick_count: u64,
    /// Longest observed tick
    pub max_tick_us: u64,
    /// Sum of tick durations for average calculation
    pub total_tick_us: u64,
}

impl EdgeCore {
    /// Create a new EdgeCore with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: EdgeConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let store = DirStore::new(&config.store.root).create_missing(config.store.create_missing);
        info!(
            "EdgeCore '{}' created (store={:?}, idle={}ms)",
            config.shared.service_name, config.store.root, config.event_loop.idle_ms
        );

        Ok(Self {
            config,
            store: Rc::new(RefCell::new(store)),
            pages: Rc::new(RefCell::new(PageTable::new())),
            transport: Rc::new(RefCell::new(SimulatedTransport::new())),
            clock: Rc::new(SystemClock::new()),
            registry: Registry::new(),
            drivers: None,
            running: Arc::new(AtomicBool::new(false)),
            stats: LoopStats::default(),
        })
    }

    /// Replace the store root from the configuration.
    pub fn with_store_root(mut self, root: &Path) -> Self {
        let store = DirStore::new(root).create_missing(self.config.store.create_missing);
        self.store = Rc::new(RefCell::new(store));
        self
    }

    /// Replace the tick source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Mount the store, attach the drivers and bind the UI host.
    ///
    /// Drivers restore their payload while being attached; their pages are
    /// joined before the host exists and flushed when it is bound.
    ///
    /// # Errors
    /// Returns error if the store cannot be mounted.
    pub fn init(&mut self) -> Result<(), CoreError> {
        self.store.borrow_mut().mount()?;
        let store: SharedStore = self.store.clone();
        self.registry = Registry::new().with_store(store.clone());

        let drivers = DemoDrivers::create(
            &self.config,
            self.clock.clone(),
            Some(store),
            self.transport.clone(),
        );
        drivers.attach(&mut self.registry);
        self.registry.join_many(drivers.bindings());
        debug!("{} UI bindings pending", self.registry.pending_bindings());
        self.registry.bind_host(self.pages.clone());

        for key in self.registry.key_collisions() {
            warn!("Persistence key {} is shared by several drivers", key);
        }
        info!(
            "EdgeCore initialized: {} drivers, {} pages",
            self.registry.len(),
            self.pages.borrow().len()
        );
        self.drivers = Some(drivers);
        Ok(())
    }

    /// Run the event loop until the running flag is cleared or the tick
    /// limit is reached.
    ///
    /// # Errors
    /// Returns `CoreError::NotInitialized` if `init()` has not run.
    pub fn run(&mut self) -> Result<(), CoreError> {
        if self.drivers.is_none() {
            return Err(CoreError::NotInitialized);
        }
        let idle = Duration::from_millis(self.config.event_loop.idle_ms);
        let max_ticks = self.config.event_loop.max_ticks;
        info!("Starting event loop (idle={}ms, max_ticks={})", idle.as_millis(), max_ticks);
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            if max_ticks > 0 && self.stats.tick_count >= max_ticks {
                break;
            }
            let tick_start = Instant::now();
            self.registry.tick();

            let tick_us = tick_start.elapsed().as_micros() as u64;
            self.stats.tick_count += 1;
            self.stats.total_tick_us += tick_us;
            self.stats.max_tick_us = self.stats.max_tick_us.max(tick_us);

            if self.stats.tick_count % 10_000 == 0 {
                debug!(
                    "Event loop: {} ticks, avg={}us, max={}us",
                    self.stats.tick_count,
                    self.stats.total_tick_us / self.stats.tick_count,
                    self.stats.max_tick_us
                );
            }

            if !idle.is_zero() {
                std::thread::sleep(idle);
            }
        }

        info!("Event loop stopped after {} ticks", self.stats.tick_count);
        Ok(())
    }

    /// End every driver (saving those with auto-save) and unmount the store.
    pub fn shutdown(&mut self) {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.registry.end_all();
        self.store.borrow_mut().unmount();
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Loop statistics so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The UI host.
    pub fn pages(&self) -> Rc<RefCell<PageTable>> {
        self.pages.clone()
    }

    /// Demo driver handles, once initialized.
    pub fn drivers(&self) -> Option<&DemoDrivers> {
        self.drivers.as_ref()
    }

    /// Store root directory.
    pub fn store_root(&self) -> PathBuf {
        self.store.borrow().root().to_path_buf()
    }

    /// Publisher transport.
    pub fn transport(&self) -> Rc<RefCell<SimulatedTransport>> {
        self.transport.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_common::clock::ManualClock;
    use edge_common::config::ConfigLoader;
    use tempfile::TempDir;

    fn config(root: &Path, max_ticks: u64) -> EdgeConfig {
        let mut config = EdgeConfig::parse("[shared]\nservice_name = \"test\"\n").unwrap();
        config.store.root = root.to_path_buf();
        config.event_loop.idle_ms = 0;
        config.event_loop.max_ticks = max_ticks;
        config.blink.cycle_ms = 10;
        config
    }

    #[test]
    fn invalid_config_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(tmp.path(), 1);
        config.blink.cycle_ms = 0;
        assert!(matches!(EdgeCore::new(config), Err(CoreError::Config(_))));
    }

    #[test]
    fn run_requires_init() {
        let tmp = TempDir::new().unwrap();
        let mut core = EdgeCore::new(config(tmp.path(), 1)).unwrap();
        assert!(matches!(core.run(), Err(CoreError::NotInitialized)));
    }

    #[test]
    fn init_flushes_pages_and_shutdown_saves() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("store");
        let clock = ManualClock::default();
        let mut core = EdgeCore::new(config(&root, 5))
            .unwrap()
            .with_clock(Rc::new(clock.clone()));
        core.init().unwrap();

        assert_eq!(core.registry().len(), 2);
        assert_eq!(core.registry().pending_bindings(), 0);
        assert!(core.pages().borrow().contains("/blink_settings"));
        assert!(core.pages().borrow().contains("/publisher_start"));

        clock.set(10);
        core.run().unwrap();
        assert_eq!(core.stats().tick_count, 5);
        let toggles = core.drivers().unwrap().blink.borrow().data().toggles;
        assert_eq!(toggles, 1);

        core.shutdown();
        assert!(root.join("Blink.dat").is_file());
        assert!(root.join("Publisher.json").is_file());
    }

    #[test]
    fn missing_root_fails_without_create() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(&tmp.path().join("absent"), 1);
        config.store.create_missing = false;
        let mut core = EdgeCore::new(config).unwrap();
        assert!(matches!(core.init(), Err(CoreError::Store(EdgeError::MountFailed(_)))));
    }
}
