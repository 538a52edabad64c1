//! Deferred UI binding queue.
//!
//! Drivers are usually attached before any UI host exists. Bindings joined
//! in that window wait in a FIFO queue; binding the host drains the queue in
//! join order. After that, joins go straight to the host.
//!
//! ```text
//!  join ──► [no host] ──► pending (FIFO) ──┐
//!    │                                      │ bind_host (once)
//!    └────► [host bound] ──────────────────►┴──► UiHost::bind
//! ```

use crate::driver::SharedStore;
use crate::persistence::read_stream;
use edge_common::binding::{PageSource, UiBinding, UiHost};
use edge_common::driver::EdgeError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Shared handle to the UI host.
pub type SharedHost = Rc<RefCell<dyn UiHost>>;

/// Pending bindings plus the one-shot host reference.
#[derive(Default)]
pub struct BindingQueue {
    pending: VecDeque<UiBinding>,
    host: Option<SharedHost>,
    store: Option<SharedStore>,
}

impl BindingQueue {
    /// Create an empty queue with no host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `file:` page sources through `store`.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the store used for `file:` page sources.
    pub fn set_store(&mut self, store: SharedStore) {
        self.store = Some(store);
    }

    /// Hand `binding` to the host, or queue it until one is bound.
    ///
    /// Bindings without a page source, or whose `file:` source cannot be
    /// loaded, are dropped and logged.
    pub fn join(&mut self, binding: UiBinding) {
        let binding = match self.resolve(binding) {
            Ok(binding) => binding,
            Err(e) => {
                warn!("Dropping UI binding: {}", e);
                return;
            }
        };
        match self.host.clone() {
            Some(host) => deliver(&host, binding),
            None => {
                self.pending.push_back(binding);
                debug!("UI binding queued ({} pending)", self.pending.len());
            }
        }
    }

    /// Join each binding in order. One bad binding does not stop the batch.
    pub fn join_many<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = UiBinding>,
    {
        for binding in bindings {
            self.join(binding);
        }
    }

    /// Record the host (first call only) and flush the pending queue to it.
    pub fn bind_host(&mut self, host: SharedHost) {
        let host = match &self.host {
            Some(bound) => {
                if !Rc::ptr_eq(bound, &host) {
                    debug!("UI host already bound, ignoring new host");
                }
                bound.clone()
            }
            None => {
                info!("UI host bound");
                self.host = Some(host.clone());
                host
            }
        };
        if self.pending.is_empty() {
            return;
        }
        debug!("Flushing {} pending UI bindings", self.pending.len());
        while let Some(binding) = self.pending.pop_front() {
            deliver(&host, binding);
        }
    }

    /// Ask the bound host to drop the page at `uri`.
    pub fn release(&mut self, uri: &str) -> bool {
        let Some(host) = &self.host else {
            return false;
        };
        match host.try_borrow_mut() {
            Ok(mut host) => host.release(uri),
            Err(_) => {
                warn!("UI host busy, cannot release {}", uri);
                false
            }
        }
    }

    /// Number of bindings waiting for a host.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether a host has been bound.
    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    fn resolve(&self, mut binding: UiBinding) -> Result<UiBinding, EdgeError> {
        let Some(source) = binding.source() else {
            return Err(EdgeError::MissingSource);
        };
        let Some(path) = source.file_path().map(str::to_string) else {
            return Ok(binding);
        };
        let store = self.store.as_ref().ok_or_else(|| {
            EdgeError::BindingRejected(format!("no store to load {path}"))
        })?;
        let mut store = store
            .try_borrow_mut()
            .map_err(|_| EdgeError::BindingRejected(format!("store busy loading {path}")))?;
        let bytes = read_stream(&mut *store, &path)?;
        if bytes.is_empty() {
            return Err(EdgeError::BindingRejected(format!("{path} is empty")));
        }
        let text = String::from_utf8(bytes)
            .map_err(|e| EdgeError::BindingRejected(format!("{path}: {e}")))?;
        binding.set_source(PageSource::Owned(text));
        Ok(binding)
    }
}

fn deliver(host: &SharedHost, binding: UiBinding) {
    let result = match host.try_borrow_mut() {
        Ok(mut host) => host.bind(binding),
        Err(_) => Err(EdgeError::BindingRejected("UI host busy".to_string())),
    };
    if let Err(e) = result {
        warn!("UI host rejected binding: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use edge_common::binding::PageArgs;

    #[derive(Default)]
    struct RecordingHost {
        bound: Vec<String>,
        released: Vec<String>,
    }

    impl UiHost for RecordingHost {
        fn bind(&mut self, binding: UiBinding) -> Result<(), EdgeError> {
            let source = binding.source().ok_or(EdgeError::MissingSource)?;
            if source.as_str() == "reject" {
                return Err(EdgeError::BindingRejected("reject".to_string()));
            }
            self.bound.push(source.as_str().to_string());
            Ok(())
        }

        fn release(&mut self, uri: &str) -> bool {
            self.released.push(uri.to_string());
            true
        }
    }

    #[test]
    fn queued_until_host_bound() {
        let mut queue = BindingQueue::new();
        queue.join(UiBinding::new("a"));
        queue.join(UiBinding::with_handler("b", |_: &PageArgs| String::new()));
        assert_eq!(queue.pending(), 2);

        let host = Rc::new(RefCell::new(RecordingHost::default()));
        queue.bind_host(host.clone());
        assert_eq!(queue.pending(), 0);
        assert_eq!(host.borrow().bound, vec!["a", "b"]);

        queue.join(UiBinding::new("c"));
        assert_eq!(queue.pending(), 0);
        assert_eq!(host.borrow().bound, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_binding_is_dropped() {
        let mut queue = BindingQueue::new();
        queue.join_many([UiBinding::empty(), UiBinding::new("a")]);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn second_host_is_ignored() {
        let mut queue = BindingQueue::new();
        let first = Rc::new(RefCell::new(RecordingHost::default()));
        let second = Rc::new(RefCell::new(RecordingHost::default()));
        queue.bind_host(first.clone());
        queue.bind_host(second.clone());
        queue.join(UiBinding::new("a"));
        assert_eq!(first.borrow().bound, vec!["a"]);
        assert!(second.borrow().bound.is_empty());
    }

    #[test]
    fn rejection_does_not_stop_flush() {
        let mut queue = BindingQueue::new();
        queue.join_many([UiBinding::new("reject"), UiBinding::new("ok")]);
        let host = Rc::new(RefCell::new(RecordingHost::default()));
        queue.bind_host(host.clone());
        assert_eq!(host.borrow().bound, vec!["ok"]);
    }

    #[test]
    fn file_source_loaded_from_store() {
        let mut store = MemoryStore::mounted();
        store.insert("/page.json", b"{\"uri\":\"/x\"}".to_vec());
        store.insert("/empty.json", Vec::new());
        let mut queue = BindingQueue::new().with_store(Rc::new(RefCell::new(store)));

        queue.join(UiBinding::new("file:/page.json"));
        queue.join(UiBinding::new("file:/empty.json"));
        queue.join(UiBinding::new("file:/missing.json"));
        assert_eq!(queue.pending(), 1);

        let host = Rc::new(RefCell::new(RecordingHost::default()));
        queue.bind_host(host.clone());
        assert_eq!(host.borrow().bound, vec!["{\"uri\":\"/x\"}"]);
    }

    #[test]
    fn file_source_without_store_is_dropped() {
        let mut queue = BindingQueue::new();
        queue.join(UiBinding::new("file:/page.json"));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn release_requires_host() {
        let mut queue = BindingQueue::new();
        assert!(!queue.release("/x"));
        let host = Rc::new(RefCell::new(RecordingHost::default()));
        queue.bind_host(host.clone());
        assert!(queue.release("/x"));
        assert_eq!(host.borrow().released, vec!["/x"]);
    }
}
