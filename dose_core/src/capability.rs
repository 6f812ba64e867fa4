//! # Capability Registry
//!
//! Optional collaborators - the clipboard and the document exporter - are
//! registered at startup and looked up through typed accessors. An absent
//! capability is a normal state (`DoseError::DependencyUnavailable`), not a
//! runtime existence check: the session disables the corresponding feature
//! instead of probing whether "the library is loaded".

use crate::errors::{DoseError, DoseResult};
use crate::report::DrawCommand;

/// Clipboard collaborator. Invoked only after all synchronous state
/// mutations have completed; a failure is reported, never retried.
pub trait Clipboard: std::fmt::Debug {
    fn write_text(&mut self, text: &str) -> DoseResult<()>;
}

/// Document-export collaborator: turns an ordered command stream into a
/// downloadable binary.
pub trait DocumentExporter: std::fmt::Debug {
    fn render(&self, commands: &[DrawCommand]) -> DoseResult<Vec<u8>>;
}

/// Registry of optional collaborators for one session.
#[derive(Default)]
pub struct CapabilityRegistry {
    clipboard: Option<Box<dyn Clipboard>>,
    document_exporter: Option<Box<dyn DocumentExporter>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        CapabilityRegistry::default()
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn with_document_exporter(mut self, exporter: Box<dyn DocumentExporter>) -> Self {
        self.document_exporter = Some(exporter);
        self
    }

    /// The clipboard, or a typed absence error.
    pub fn clipboard(&mut self) -> DoseResult<&mut (dyn Clipboard + 'static)> {
        self.clipboard
            .as_deref_mut()
            .ok_or_else(|| DoseError::unavailable("clipboard"))
    }

    /// The document exporter, or a typed absence error.
    pub fn document_exporter(&self) -> DoseResult<&dyn DocumentExporter> {
        self.document_exporter
            .as_deref()
            .ok_or_else(|| DoseError::unavailable("document-exporter"))
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    pub fn has_document_exporter(&self) -> bool {
        self.document_exporter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct FakeClipboard {
        written: Rc<RefCell<Vec<String>>>,
    }

    impl Clipboard for FakeClipboard {
        fn write_text(&mut self, text: &str) -> DoseResult<()> {
            self.written.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_absent_capability_is_typed() {
        let mut registry = CapabilityRegistry::new();
        assert!(!registry.has_clipboard());

        let err = registry.clipboard().unwrap_err();
        assert_eq!(err.error_code(), "DEPENDENCY_UNAVAILABLE");

        let err = registry.document_exporter().unwrap_err();
        assert_eq!(err, DoseError::unavailable("document-exporter"));
    }

    #[test]
    fn test_registered_capability_resolves() {
        let written = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CapabilityRegistry::new().with_clipboard(Box::new(FakeClipboard {
            written: written.clone(),
        }));

        registry.clipboard().unwrap().write_text("summary").unwrap();
        assert_eq!(written.borrow().as_slice(), ["summary".to_string()]);
    }
}
