//! UI binding descriptors and the UI host capability.
//!
//! A binding pairs an opaque page description with an optional request
//! handler. The core only routes bindings; parsing the description and
//! deciding which page a binding replaces is the host's business.

use crate::consts::FILE_SOURCE_PREFIX;
use crate::driver::EdgeError;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Request arguments handed to a page handler (form field → value).
pub type PageArgs = BTreeMap<String, String>;

/// Page request handler. Returns the response body, empty for "no content".
pub type RequestHandler = Rc<dyn Fn(&PageArgs) -> String>;

/// Reference to a page description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Description compiled into the binary.
    Static(&'static str),
    /// Description built at runtime.
    Owned(String),
}

impl PageSource {
    /// Description text.
    pub fn as_str(&self) -> &str {
        match self {
            PageSource::Static(s) => s,
            PageSource::Owned(s) => s.as_str(),
        }
    }

    /// Store path when the description is a `file:` reference.
    pub fn file_path(&self) -> Option<&str> {
        let text = self.as_str();
        let prefix_len = FILE_SOURCE_PREFIX.len();
        match text.get(..prefix_len) {
            Some(head) if head.eq_ignore_ascii_case(FILE_SOURCE_PREFIX) => Some(&text[prefix_len..]),
            _ => None,
        }
    }
}

impl From<&'static str> for PageSource {
    fn from(s: &'static str) -> Self {
        PageSource::Static(s)
    }
}

impl From<String> for PageSource {
    fn from(s: String) -> Self {
        PageSource::Owned(s)
    }
}

/// Deferred pairing of a page description with its request handler.
#[derive(Clone)]
pub struct UiBinding {
    source: Option<PageSource>,
    handler: Option<RequestHandler>,
}

impl UiBinding {
    /// Binding for `source` without a handler.
    pub fn new(source: impl Into<PageSource>) -> Self {
        Self { source: Some(source.into()), handler: None }
    }

    /// Binding for `source` served by `handler`.
    pub fn with_handler<F>(source: impl Into<PageSource>, handler: F) -> Self
    where
        F: Fn(&PageArgs) -> String + 'static,
    {
        Self { source: Some(source.into()), handler: Some(Rc::new(handler)) }
    }

    /// Binding with no page description. Dropped by `join`.
    pub fn empty() -> Self {
        Self { source: None, handler: None }
    }

    /// Page description, if any.
    pub fn source(&self) -> Option<&PageSource> {
        self.source.as_ref()
    }

    /// Request handler, if any.
    pub fn handler(&self) -> Option<&RequestHandler> {
        self.handler.as_ref()
    }

    /// Replace the page description, keeping the handler.
    pub fn set_source(&mut self, source: PageSource) {
        self.source = Some(source);
    }

    /// Split into description and handler.
    pub fn into_parts(self) -> (Option<PageSource>, Option<RequestHandler>) {
        (self.source, self.handler)
    }
}

impl fmt::Debug for UiBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiBinding")
            .field("source", &self.source)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Externally owned UI host (a web portal, a display menu, ...).
pub trait UiHost {
    /// Accept a binding, replacing any page at the same logical location.
    ///
    /// # Errors
    /// `EdgeError::BindingRejected` if the description cannot be used.
    fn bind(&mut self, binding: UiBinding) -> Result<(), EdgeError>;

    /// Drop the page identified by `uri`. Returns false if none was bound.
    fn release(&mut self, uri: &str) -> bool;
}
