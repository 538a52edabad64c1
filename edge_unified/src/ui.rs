//! In-memory UI host.
//!
//! `PageTable` keys pages by the `"uri"` member of their JSON description.
//! Binding a page whose uri is already present replaces it. Requests are
//! routed with [`PageTable::dispatch`].

use edge_common::binding::{PageArgs, RequestHandler, UiBinding, UiHost};
use edge_common::driver::EdgeError;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

struct Page {
    title: Option<String>,
    source: String,
    handler: Option<RequestHandler>,
}

/// UI host holding page descriptions and handlers in memory.
#[derive(Default)]
pub struct PageTable {
    pages: BTreeMap<String, Page>,
}

impl PageTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the handler of the page at `uri`.
    ///
    /// `None` if no page is bound there; an empty body if it has no handler.
    pub fn dispatch(&self, uri: &str, args: &PageArgs) -> Option<String> {
        let page = self.pages.get(uri)?;
        Some(page.handler.as_ref().map(|handler| handler(args)).unwrap_or_default())
    }

    /// Whether a page is bound at `uri`.
    pub fn contains(&self, uri: &str) -> bool {
        self.pages.contains_key(uri)
    }

    /// Page description bound at `uri`.
    pub fn source(&self, uri: &str) -> Option<&str> {
        self.pages.get(uri).map(|page| page.source.as_str())
    }

    /// Page title bound at `uri`, if the description has one.
    pub fn title(&self, uri: &str) -> Option<&str> {
        self.pages.get(uri).and_then(|page| page.title.as_deref())
    }

    /// Bound uris, sorted.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// Number of bound pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no page is bound.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl UiHost for PageTable {
    fn bind(&mut self, binding: UiBinding) -> Result<(), EdgeError> {
        let (source, handler) = binding.into_parts();
        let source = source.ok_or(EdgeError::MissingSource)?;
        let description: Value = serde_json::from_str(source.as_str())
            .map_err(|e| EdgeError::BindingRejected(format!("invalid page description: {e}")))?;
        let uri = description
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| EdgeError::BindingRejected("page description has no uri".to_string()))?
            .to_string();
        let title = description.get("title").and_then(Value::as_str).map(str::to_string);

        let page = Page { title, source: source.as_str().to_string(), handler };
        if self.pages.insert(uri.clone(), page).is_some() {
            debug!("Replaced page {}", uri);
        } else {
            debug!("Bound page {}", uri);
        }
        Ok(())
    }

    fn release(&mut self, uri: &str) -> bool {
        self.pages.remove(uri).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_dispatch() {
        let mut table = PageTable::new();
        table
            .bind(UiBinding::with_handler(
                r#"{"uri": "/led", "title": "LED"}"#,
                |args: &PageArgs| format!("pin={}", args.get("pin").map_or("", String::as_str)),
            ))
            .unwrap();

        let mut args = PageArgs::new();
        args.insert("pin".to_string(), "2".to_string());
        assert_eq!(table.dispatch("/led", &args).as_deref(), Some("pin=2"));
        assert_eq!(table.title("/led"), Some("LED"));
        assert_eq!(table.dispatch("/other", &args), None);
    }

    #[test]
    fn same_uri_replaces_page() {
        let mut table = PageTable::new();
        table.bind(UiBinding::new(r#"{"uri": "/led", "title": "old"}"#)).unwrap();
        table.bind(UiBinding::new(r#"{"uri": "/led", "title": "new"}"#)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.title("/led"), Some("new"));
        assert_eq!(table.dispatch("/led", &PageArgs::new()).as_deref(), Some(""));
    }

    #[test]
    fn rejects_descriptions_without_uri() {
        let mut table = PageTable::new();
        assert!(matches!(
            table.bind(UiBinding::new(r#"{"title": "x"}"#)),
            Err(EdgeError::BindingRejected(_))
        ));
        assert!(matches!(
            table.bind(UiBinding::new("not json")),
            Err(EdgeError::BindingRejected(_))
        ));
        assert!(matches!(table.bind(UiBinding::empty()), Err(EdgeError::MissingSource)));
        assert!(table.is_empty());
    }

    #[test]
    fn release_removes_page() {
        let mut table = PageTable::new();
        table.bind(UiBinding::new(r#"{"uri": "/led"}"#)).unwrap();
        assert!(table.release("/led"));
        assert!(!table.release("/led"));
        assert_eq!(table.uris().count(), 0);
    }
}
