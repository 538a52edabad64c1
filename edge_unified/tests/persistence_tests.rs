//! Persistence integration tests.
//!
//! Tests driver save/restore against a directory store: structured and raw
//! round trips, missing and corrupt streams, batch save/restore with scoped
//! mounting, key collisions and `file:` page sources.

use edge_common::binding::UiBinding;
use edge_common::driver::{EdgeDriver, EdgeError};
use edge_common::store::PersistenceStore;
use edge_unified::driver::{Driver, SharedDriver, SharedStore};
use edge_unified::registry::Registry;
use edge_unified::store::{DirStore, MemoryStore};
use edge_unified::ui::PageTable;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Mqtt {
    server: String,
    channel: u32,
    period_s: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Gpio {
    pin: i32,
    cycle: u32,
}

fn mqtt_driver(data: Mqtt) -> Driver<Mqtt> {
    Driver::new("Mqtt", data).serializer(
        |data, doc| {
            doc.set("server", data.server.as_str());
            doc.set("channel", data.channel);
            doc.set("period", data.period_s);
        },
        |data, doc| {
            if let Some(server) = doc.get_str("server") {
                data.server = server.to_string();
            }
            if let Some(channel) = doc.get_u64("channel") {
                data.channel = channel as u32;
            }
            if let Some(period) = doc.get_u64("period") {
                data.period_s = period as u32;
            }
        },
    )
}

fn mounted_store(tmp: &TempDir) -> DirStore {
    let mut store = DirStore::new(tmp.path());
    store.mount().unwrap();
    store
}

#[test]
fn structured_round_trip() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);
    let original = Mqtt { server: "broker.local".into(), channel: 1234, period_s: 30 };

    let saved = mqtt_driver(original.clone()).save(&mut store, None);
    assert!(saved > 0);
    let text = fs::read_to_string(tmp.path().join("Mqtt.json")).unwrap();
    assert!(text.contains("\"server\""));

    let mut restored = mqtt_driver(Mqtt::default());
    assert_eq!(restored.restore(&mut store, None), saved);
    assert_eq!(restored.data(), &original);
}

#[test]
fn unknown_keys_survive_restore_but_not_save() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);
    fs::write(tmp.path().join("Mqtt.json"), r#"{"channel": 9, "extra": true}"#).unwrap();

    let mut driver = mqtt_driver(Mqtt { server: "keep".into(), channel: 1, period_s: 60 });
    assert!(driver.restore(&mut store, None) > 0);
    assert_eq!(driver.data(), &Mqtt { server: "keep".into(), channel: 9, period_s: 60 });

    assert!(driver.save(&mut store, None) > 0);
    let text = fs::read_to_string(tmp.path().join("Mqtt.json")).unwrap();
    assert!(text.contains("\"channel\":9"));
    assert!(!text.contains("extra"));
}

#[test]
fn raw_round_trip_with_explicit_name() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);

    let saved = Driver::new("Gpio", Gpio { pin: 5, cycle: 250 });
    assert_eq!(saved.save(&mut store, Some("led.dat")), 8);
    assert!(tmp.path().join("led.dat").is_file());

    let mut restored = Driver::new("Gpio", Gpio::default());
    assert_eq!(restored.restore(&mut store, Some("/led.dat")), 8);
    assert_eq!(restored.data(), &Gpio { pin: 5, cycle: 250 });
}

#[test]
fn missing_stream_restores_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);
    let mut driver = mqtt_driver(Mqtt { server: "a".into(), channel: 2, period_s: 3 });

    assert_eq!(driver.restore(&mut store, None), 0);
    assert!(matches!(
        driver.try_restore(&mut store, None),
        Err(EdgeError::OpenFailed { .. })
    ));
    assert_eq!(driver.data(), &Mqtt { server: "a".into(), channel: 2, period_s: 3 });
}

#[test]
fn corrupt_streams_leave_payload_unchanged() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);
    fs::write(tmp.path().join("Mqtt.json"), "{ not json").unwrap();
    fs::write(tmp.path().join("Gpio.dat"), [1u8, 2, 3]).unwrap();

    let mut mqtt = mqtt_driver(Mqtt::default());
    assert!(matches!(
        mqtt.try_restore(&mut store, None),
        Err(EdgeError::Decode { .. })
    ));

    let mut gpio = Driver::new("Gpio", Gpio { pin: 1, cycle: 1 });
    assert_eq!(gpio.restore(&mut store, None), 0);
    assert_eq!(gpio.data(), &Gpio { pin: 1, cycle: 1 });
}

#[test]
fn unmounted_store_saves_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut store = DirStore::new(tmp.path());
    let driver = Driver::new("Gpio", Gpio::default());
    assert_eq!(driver.save(&mut store, None), 0);
    assert!(matches!(
        driver.try_save(&mut store, None),
        Err(EdgeError::NotMounted)
    ));
}

#[test]
fn batch_save_and_restore_with_auto_mount() {
    let tmp = TempDir::new().unwrap();
    let mqtt = mqtt_driver(Mqtt { server: "x".into(), channel: 7, period_s: 30 }).into_shared();
    let gpio = Driver::new("Gpio", Gpio { pin: 3, cycle: 100 }).into_shared();

    let mut registry = Registry::new();
    let drivers: [SharedDriver; 2] = [mqtt.clone(), gpio.clone()];
    registry.attach_many(drivers, None);

    let mut store = DirStore::new(tmp.path());
    let sizes = registry.save_all(&mut store, true).unwrap();
    assert_eq!(sizes.len(), 2);
    assert!(sizes.iter().all(|size| *size > 0));
    assert!(!store.is_mounted());

    *mqtt.borrow_mut().data_mut() = Mqtt::default();
    *gpio.borrow_mut().data_mut() = Gpio::default();
    let sizes = registry.restore_all(&mut store, true).unwrap();
    assert_eq!(sizes[1], 8);
    assert_eq!(mqtt.borrow().data().channel, 7);
    assert_eq!(gpio.borrow().data(), &Gpio { pin: 3, cycle: 100 });
}

#[test]
fn batch_without_mount_reports_zero() {
    let tmp = TempDir::new().unwrap();
    let gpio = Driver::new("Gpio", Gpio::default()).into_shared();
    let mut registry = Registry::new();
    registry.attach(gpio, None);

    let mut store = DirStore::new(tmp.path());
    assert_eq!(registry.save_all(&mut store, false).unwrap(), vec![0]);
}

#[test]
fn batch_mount_failure_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let gpio = Driver::new("Gpio", Gpio { pin: 8, cycle: 8 }).into_shared();
    let mut registry = Registry::new();
    registry.attach(gpio.clone(), None);

    let mut store = DirStore::new(tmp.path().join("absent"));
    assert!(matches!(
        registry.restore_all(&mut store, true),
        Err(EdgeError::MountFailed(_))
    ));
    assert_eq!(gpio.borrow().data(), &Gpio { pin: 8, cycle: 8 });
}

#[test]
fn colliding_keys_are_detected_and_separable() {
    let tmp = TempDir::new().unwrap();
    let left = Driver::new("Gpio", Gpio { pin: 1, cycle: 10 }).into_shared();
    let right = Driver::new("Gpio", Gpio { pin: 2, cycle: 20 }).into_shared();

    let mut registry = Registry::new();
    let drivers: [SharedDriver; 2] = [left.clone(), right.clone()];
    registry.attach_many(drivers, None);
    assert_eq!(registry.key_collisions(), vec!["/Gpio.dat".to_string()]);

    let mut store = mounted_store(&tmp);
    let sizes = registry.save_all(&mut store, false).unwrap();
    assert_eq!(sizes, vec![8, 0]);

    let renamed = Driver::new("Gpio", Gpio { pin: 2, cycle: 20 }).persist_as("GpioRight").into_shared();
    registry.detach(&right);
    registry.attach(renamed, None);
    assert!(registry.key_collisions().is_empty());
    assert_eq!(registry.save_all(&mut store, false).unwrap(), vec![8, 8]);
    assert!(tmp.path().join("GpioRight.dat").is_file());
}

#[test]
fn colliding_drivers_all_restore_from_shared_key() {
    let tmp = TempDir::new().unwrap();
    let mut store = mounted_store(&tmp);
    Driver::new("Gpio", Gpio { pin: 42, cycle: 42 }).save(&mut store, None);

    let left = Driver::new("Gpio", Gpio::default()).into_shared();
    let right = Driver::new("Gpio", Gpio::default()).into_shared();
    let mut registry = Registry::new();
    let drivers: [SharedDriver; 2] = [left.clone(), right.clone()];
    registry.attach_many(drivers, None);

    assert_eq!(registry.restore_all(&mut store, false).unwrap(), vec![8, 8]);
    assert_eq!(left.borrow().data(), &Gpio { pin: 42, cycle: 42 });
    assert_eq!(right.borrow().data(), &Gpio { pin: 42, cycle: 42 });
}

#[test]
fn end_all_auto_save_keeps_first_owner_data() {
    let tmp = TempDir::new().unwrap();
    let store: SharedStore = Rc::new(RefCell::new(mounted_store(&tmp)));
    let auto_saving = |pin| {
        Driver::new("Gpio", Gpio { pin, cycle: 0 })
            .with_store(store.clone())
            .auto_save(true)
            .into_shared()
    };
    let first = auto_saving(1);
    let second = auto_saving(2);

    let mut registry = Registry::new();
    let drivers: [SharedDriver; 2] = [first.clone(), second.clone()];
    registry.attach_many(drivers, None);
    registry.end_all();
    assert!(!second.borrow().is_enabled());

    let mut check = Driver::new("Gpio", Gpio::default());
    assert_eq!(check.restore(&mut *store.borrow_mut(), None), 8);
    assert_eq!(check.data().pin, 1);
}

#[test]
fn auto_save_on_end_through_default_store() {
    let tmp = TempDir::new().unwrap();
    let store: SharedStore = Rc::new(RefCell::new(mounted_store(&tmp)));

    let gpio = Driver::new("Gpio", Gpio { pin: 6, cycle: 60 })
        .with_store(store.clone())
        .auto_save(true)
        .into_shared();
    let mut registry = Registry::new();
    registry.attach(gpio, None);
    registry.end_all();
    assert!(tmp.path().join("Gpio.dat").is_file());

    let restored = Driver::new("Gpio", Gpio::default())
        .with_store(store)
        .auto_restore(true)
        .into_shared();
    registry.attach(restored.clone(), None);
    assert_eq!(restored.borrow().data(), &Gpio { pin: 6, cycle: 60 });
}

#[test]
fn file_page_sources_resolve_through_registry_store() {
    let mut memory = MemoryStore::mounted();
    memory.insert("/gpio_page.json", br#"{"uri": "/gpio", "title": "GPIO"}"#.to_vec());
    let store: SharedStore = Rc::new(RefCell::new(memory));

    let mut registry = Registry::new().with_store(store);
    registry.join(UiBinding::new("file:/gpio_page.json"));
    registry.join(UiBinding::new("FILE:/missing.json"));
    assert_eq!(registry.pending_bindings(), 1);

    let pages = Rc::new(RefCell::new(PageTable::new()));
    registry.bind_host(pages.clone());
    assert_eq!(pages.borrow().title("/gpio"), Some("GPIO"));
}
