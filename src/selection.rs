//! Selection Bridge: the reader's view of the PDF viewer's text selection.
//!
//! The viewer collaborator reports `(selected_text, is_active)` on every
//! selection or click; [`SelectionBridge`] normalises those events and
//! publishes the current [`Selection`] on a `watch` channel. Repeated
//! identical events are swallowed so downstream consumers only wake on real
//! changes.

use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub is_active: bool,
}

impl Selection {
    /// Build a selection from a raw viewer event. Whitespace-only text is
    /// treated as "nothing selected".
    pub fn from_event(text: &str, is_active: bool) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            text: text.to_string(),
            is_active,
        }
    }

    /// Text of an active selection, if any.
    pub fn active_text(&self) -> Option<&str> {
        (self.is_active && !self.text.is_empty()).then_some(self.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

/// Imperative commands understood by the PDF viewer collaborator.
pub trait Viewer: Send + Sync {
    /// Load `name` into the viewer.
    fn open_document(&self, name: &str);

    /// Scroll the loaded document to `page` (1-based).
    fn goto_page(&self, page: u32);
}

// ---------------------------------------------------------------------------
// SelectionBridge
// ---------------------------------------------------------------------------

pub struct SelectionBridge {
    tx: watch::Sender<Selection>,
}

impl SelectionBridge {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Selection::default());
        Self { tx }
    }

    /// Viewer callback: a selection was made, changed or collapsed.
    pub fn on_selection(&self, text: &str, is_active: bool) {
        let next = Selection::from_event(text, is_active);
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            log::debug!("selection: {:?}", self.tx.borrow().active_text());
        }
    }

    /// Explicit dismissal, or the active document changed.
    pub fn clear(&self) {
        self.on_selection("", false);
    }

    pub fn current(&self) -> Selection {
        self.tx.borrow().clone()
    }

    pub fn has_selection(&self) -> bool {
        self.tx.borrow().active_text().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.tx.subscribe()
    }
}

impl Default for SelectionBridge {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
