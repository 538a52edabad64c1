//! Simulated LED blinker.
//!
//! Toggles a simulated output level every `cycle_ms`. The payload is
//! persisted as a raw image (`/Blink.dat`).

use crate::driver::{Driver, SharedClock, SharedStore};
use edge_common::binding::{PageArgs, UiBinding};
use edge_common::config::BlinkConfig;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace};

/// Type tag and persistence stem.
pub const TYPE_TAG: &str = "Blink";

/// Settings page: shows the current pin and cycle.
pub const SETTINGS_PAGE: &str = r#"{
  "title": "LED",
  "uri": "/blink_settings",
  "menu": true,
  "element": [
    {"name": "pin", "type": "ACInput", "label": "LED Pin", "global": true},
    {"name": "cycle_ms", "type": "ACInput", "label": "Blinking Cycle [ms]", "global": true},
    {"name": "apply", "type": "ACSubmit", "value": "Apply", "uri": "/blink_apply"}
  ]
}"#;

/// Apply page: takes the submitted pin and cycle.
pub const APPLY_PAGE: &str = r#"{
  "title": "LED",
  "uri": "/blink_apply",
  "menu": false,
  "element": [
    {"name": "pin", "type": "ACText", "format": "LED Pin: %s", "global": true},
    {"name": "cycle_ms", "type": "ACText", "format": "Blinking Cycle: %s [ms]", "global": true}
  ]
}"#;

/// Blinker payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blink {
    /// Output pin number.
    pub pin: u8,
    /// Toggle period in milliseconds.
    pub cycle_ms: u32,
    /// Simulated output level.
    pub level: bool,
    /// Number of toggles since the payload was created.
    pub toggles: u64,
}

impl From<&BlinkConfig> for Blink {
    fn from(config: &BlinkConfig) -> Self {
        Self {
            pin: config.pin,
            cycle_ms: config.cycle_ms,
            level: false,
            toggles: 0,
        }
    }
}

/// Shared handle to a blinker driver.
pub type BlinkDriver = Rc<RefCell<Driver<Blink>>>;

/// Build a blinker. With a store it restores on start and saves on end.
pub fn create(config: &BlinkConfig, clock: SharedClock, store: Option<SharedStore>) -> BlinkDriver {
    let mut driver = Driver::new(TYPE_TAG, Blink::from(config))
        .with_clock(clock)
        .on_start(|ctx| {
            let cycle = ctx.cycle_ms;
            ctx.set_interval(cycle);
            info!("Blinking pin {} every {} ms", ctx.pin, cycle);
        })
        .on_process(|ctx| {
            ctx.level = !ctx.level;
            ctx.toggles += 1;
            trace!("Pin {} -> {}", ctx.pin, ctx.level);
        })
        .on_end(|ctx| {
            ctx.level = false;
        });
    if let Some(store) = store {
        driver = driver.with_store(store).auto_restore(true).auto_save(true);
    }
    driver.into_shared()
}

/// Settings and apply pages served by `driver`.
pub fn bindings(driver: &BlinkDriver) -> Vec<UiBinding> {
    let settings = Rc::downgrade(driver);
    let apply = Rc::downgrade(driver);
    vec![
        UiBinding::with_handler(SETTINGS_PAGE, move |_: &PageArgs| settings_body(&settings)),
        UiBinding::with_handler(APPLY_PAGE, move |args: &PageArgs| apply_settings(&apply, args)),
    ]
}

fn settings_body(driver: &Weak<RefCell<Driver<Blink>>>) -> String {
    let Some(driver) = driver.upgrade() else {
        return String::new();
    };
    let Ok(driver) = driver.try_borrow() else {
        return String::new();
    };
    serde_json::to_string(driver.data()).unwrap_or_default()
}

fn apply_settings(driver: &Weak<RefCell<Driver<Blink>>>, args: &PageArgs) -> String {
    let Some(driver) = driver.upgrade() else {
        return String::new();
    };
    let Ok(mut driver) = driver.try_borrow_mut() else {
        return String::new();
    };
    if let Some(pin) = args.get("pin").and_then(|v| v.trim().parse::<u8>().ok()) {
        driver.data_mut().pin = pin;
    }
    let cycle = args
        .get("cycle_ms")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|cycle| *cycle > 0);
    if let Some(cycle) = cycle {
        driver.data_mut().cycle_ms = cycle;
        driver.set_interval(cycle);
    }
    let saved = driver.save_default();
    debug!("Blink settings applied ({} bytes saved)", saved);
    serde_json::to_string(driver.data()).unwrap_or_default()
}
