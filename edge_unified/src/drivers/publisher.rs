//! Simulated telemetry publisher.
//!
//! Publishes one message per interval through a [`Transport`]. A failed
//! publish is retried on the next `retry_interval_ms` period, up to
//! `max_retries` times, after which the driver drops back to its normal
//! period. Each attempt is a single call; the retry state lives in the
//! payload.
//!
//! Settings are persisted as a structured document (`/Publisher.json`).

use crate::driver::{Driver, SharedClock, SharedStore};
use edge_common::binding::{PageArgs, UiBinding};
use edge_common::clock::Ticks;
use edge_common::config::PublisherConfig;
use edge_common::document::EdgeDocument;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Type tag and persistence stem.
pub const TYPE_TAG: &str = "Publisher";

/// Settings page: broker and period.
pub const SETTINGS_PAGE: &str = r#"{
  "title": "Publisher Setting",
  "uri": "/publisher_setting",
  "menu": true,
  "element": [
    {"name": "server", "type": "ACInput", "label": "Server", "global": true},
    {"name": "topic", "type": "ACInput", "label": "Topic", "global": true},
    {"name": "interval_ms", "type": "ACInput", "label": "Update period [ms]", "global": true},
    {"name": "save", "type": "ACSubmit", "value": "Save&amp;Start", "uri": "/publisher_start"}
  ]
}"#;

/// Start page: applies the submitted settings and restarts publishing.
pub const START_PAGE: &str = r#"{
  "title": "Publisher Setting",
  "uri": "/publisher_start",
  "menu": false,
  "element": [
    {"name": "server", "type": "ACText", "format": "Server: %s", "global": true},
    {"name": "topic", "type": "ACText", "format": "Topic: %s", "global": true}
  ]
}"#;

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No broker configured
    #[error("No server configured")]
    NoServer,

    /// Broker did not accept the connection
    #[error("Connection to {0} refused")]
    Refused(String),
}

/// One-shot message delivery. Implementations must not block.
pub trait Transport {
    /// Attempt a single publish.
    fn publish(&mut self, server: &str, topic: &str, message: &str) -> Result<(), TransportError>;
}

/// Shared handle to a transport.
pub type SharedTransport = Rc<RefCell<dyn Transport>>;

/// Transport that records messages instead of sending them.
///
/// The first `fail_first` attempts are refused.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    fail_first: usize,
    attempts: usize,
    published: Vec<(String, String)>,
}

impl SimulatedTransport {
    /// Transport accepting every publish.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport refusing the first `count` attempts.
    pub fn failing_first(count: usize) -> Self {
        Self { fail_first: count, ..Self::default() }
    }

    /// Number of publish attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Accepted `(topic, message)` pairs.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }
}

impl Transport for SimulatedTransport {
    fn publish(&mut self, server: &str, topic: &str, message: &str) -> Result<(), TransportError> {
        self.attempts += 1;
        if server.is_empty() {
            return Err(TransportError::NoServer);
        }
        if self.attempts <= self.fail_first {
            return Err(TransportError::Refused(server.to_string()));
        }
        self.published.push((topic.to_string(), message.to_string()));
        Ok(())
    }
}

/// Publisher payload: persisted settings plus runtime retry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    /// Broker host name.
    pub server: String,
    /// Topic messages are published to.
    pub topic: String,
    /// Period between successful publishes.
    pub interval_ms: u32,
    /// Period between retries.
    pub retry_interval_ms: u32,
    /// Retries before giving up on a message.
    pub max_retries: u8,
    /// Retries spent on the current message.
    pub retry: u8,
    /// Sequence number of the next message.
    pub sequence: u64,
}

impl From<&PublisherConfig> for Publisher {
    fn from(config: &PublisherConfig) -> Self {
        Self {
            server: config.server.clone(),
            topic: config.topic.clone(),
            interval_ms: config.interval_ms,
            retry_interval_ms: config.retry_interval_ms,
            max_retries: config.max_retries,
            retry: 0,
            sequence: 0,
        }
    }
}

impl Publisher {
    /// Write the persisted settings.
    pub fn write_settings(&self, doc: &mut EdgeDocument) {
        doc.set("server", self.server.as_str());
        doc.set("topic", self.topic.as_str());
        doc.set("interval_ms", self.interval_ms);
        doc.set("retry_interval_ms", self.retry_interval_ms);
        doc.set("max_retries", self.max_retries);
    }

    /// Read the persisted settings. Missing or out-of-range keys are kept.
    pub fn read_settings(&mut self, doc: &EdgeDocument) {
        if let Some(server) = doc.get_str("server") {
            self.server = server.to_string();
        }
        if let Some(topic) = doc.get_str("topic") {
            self.topic = topic.to_string();
        }
        if let Some(interval) = doc.get_u64("interval_ms").and_then(|v| u32::try_from(v).ok()) {
            self.interval_ms = interval;
        }
        if let Some(retry) = doc.get_u64("retry_interval_ms").and_then(|v| u32::try_from(v).ok()) {
            self.retry_interval_ms = retry;
        }
        if let Some(max) = doc.get_u64("max_retries").and_then(|v| u8::try_from(v).ok()) {
            self.max_retries = max;
        }
    }

    fn message(&self, now: Ticks) -> String {
        json!({ "seq": self.sequence, "uptime_ms": now }).to_string()
    }
}

/// Shared handle to a publisher driver.
pub type PublisherDriver = Rc<RefCell<Driver<Publisher>>>;

/// Build a publisher. With a store it restores on start and saves on end.
pub fn create(
    config: &PublisherConfig,
    clock: SharedClock,
    store: Option<SharedStore>,
    transport: SharedTransport,
) -> PublisherDriver {
    let mut driver = Driver::new(TYPE_TAG, Publisher::from(config))
        .with_clock(clock)
        .serializer(Publisher::write_settings, Publisher::read_settings)
        .on_start(|ctx| {
            ctx.retry = 0;
            let interval = ctx.interval_ms;
            ctx.set_interval(interval);
            info!("Publishing to {} every {} ms", ctx.topic, interval);
        })
        .on_process(move |ctx| {
            let message = ctx.message(ctx.now());
            let result = match transport.try_borrow_mut() {
                Ok(mut transport) => transport.publish(&ctx.server, &ctx.topic, &message),
                Err(_) => return,
            };
            match result {
                Ok(()) => {
                    debug!("Published #{} to {}", ctx.sequence, ctx.topic);
                    ctx.sequence += 1;
                    ctx.retry = 0;
                    let interval = ctx.interval_ms;
                    if ctx.interval() != interval {
                        ctx.set_interval(interval);
                    }
                }
                Err(e) if ctx.retry < ctx.max_retries => {
                    ctx.retry += 1;
                    warn!("Publish failed ({}), retry {}/{}", e, ctx.retry, ctx.max_retries);
                    let retry_interval = ctx.retry_interval_ms;
                    ctx.set_interval(retry_interval);
                }
                Err(e) => {
                    warn!("Publish failed ({}), giving up on #{}", e, ctx.sequence);
                    ctx.retry = 0;
                    let interval = ctx.interval_ms;
                    ctx.set_interval(interval);
                }
            }
        });
    if let Some(store) = store {
        driver = driver.with_store(store).auto_restore(true).auto_save(true);
    }
    driver.into_shared()
}

/// Settings and start pages served by `driver`.
pub fn bindings(driver: &PublisherDriver) -> Vec<UiBinding> {
    let settings = Rc::downgrade(driver);
    let start = Rc::downgrade(driver);
    vec![
        UiBinding::with_handler(SETTINGS_PAGE, move |_: &PageArgs| settings_body(&settings)),
        UiBinding::with_handler(START_PAGE, move |args: &PageArgs| apply_settings(&start, args)),
    ]
}

fn settings_body(driver: &Weak<RefCell<Driver<Publisher>>>) -> String {
    let Some(driver) = driver.upgrade() else {
        return String::new();
    };
    let Ok(driver) = driver.try_borrow() else {
        return String::new();
    };
    let mut doc = EdgeDocument::new();
    driver.data().write_settings(&mut doc);
    doc.to_vec(TYPE_TAG)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

fn apply_settings(driver: &Weak<RefCell<Driver<Publisher>>>, args: &PageArgs) -> String {
    let Some(driver) = driver.upgrade() else {
        return String::new();
    };
    let Ok(mut driver) = driver.try_borrow_mut() else {
        return String::new();
    };
    let data = driver.data_mut();
    if let Some(server) = args.get("server") {
        data.server = server.trim().to_string();
    }
    if let Some(topic) = args.get("topic").filter(|t| !t.trim().is_empty()) {
        data.topic = topic.trim().to_string();
    }
    if let Some(interval) = args
        .get("interval_ms")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
    {
        data.interval_ms = interval;
    }
    data.retry = 0;
    let interval = data.interval_ms;
    driver.set_interval(interval);
    let saved = driver.save_default();
    debug!("Publisher settings applied ({} bytes saved)", saved);
    format!("server={} topic={}", driver.data().server, driver.data().topic)
}
