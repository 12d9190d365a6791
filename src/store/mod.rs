//! Document Store: registry of loaded documents and their outlines.
//!
//! [`DocumentStore`] is the single owner of [`Document`]s and
//! [`OutlineEntry`]s. Every change to the *set* of documents (add or remove)
//! bumps a revision number that is published on a `watch` channel; the
//! training coordinator keys its job on that revision. Outline updates do not
//! change the document set and therefore do not bump the revision.
//!
//! The store is shared as [`SharedStore`] (`Arc<Mutex<DocumentStore>>`);
//! locks are short and never held across `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::backend::OutlineItem;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A PDF known to the reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique key: the file name.
    pub name: String,
    /// Raw bytes for documents uploaded in this session; `None` for documents
    /// discovered through the server inventory.
    pub source: Option<Vec<u8>>,
    /// Server-relative location the viewer loads the PDF from.
    pub url: String,
}

impl Document {
    pub fn uploaded(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            url: Self::url_for(&name),
            name,
            source: Some(bytes),
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            url: Self::url_for(&name),
            name,
            source: None,
        }
    }

    fn url_for(name: &str) -> String {
        format!("/uploads/{name}")
    }
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// Heading depth of an outline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
    /// Anything the extractor reports beyond the three main levels
    /// (e.g. `"Title"`, `"H4"`).
    Other(String),
}

impl HeadingLevel {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "H1" => HeadingLevel::H1,
            "H2" => HeadingLevel::H2,
            "H3" => HeadingLevel::H3,
            _ => HeadingLevel::Other(label.trim().to_string()),
        }
    }

    /// Indentation depth used when rendering the outline tree.
    pub fn depth(&self) -> usize {
        match self {
            HeadingLevel::H1 | HeadingLevel::Other(_) => 0,
            HeadingLevel::H2 => 1,
            HeadingLevel::H3 => 2,
        }
    }
}

/// One heading of a document's outline.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    /// Owning document name.
    pub doc_id: String,
    pub level: HeadingLevel,
    pub text: String,
    pub page: u32,
}

impl OutlineEntry {
    pub fn from_item(doc_id: &str, item: OutlineItem) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            level: HeadingLevel::from_label(&item.level),
            text: item.text,
            page: item.page,
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

pub struct DocumentStore {
    documents: Vec<Document>,
    outlines: Vec<OutlineEntry>,
    revision: watch::Sender<u64>,
}

impl DocumentStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            documents: Vec::new(),
            outlines: Vec::new(),
            revision,
        }
    }

    /// Receiver notified every time the document set changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.iter().any(|d| d.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    /// Register `doc`, replacing any document with the same name.
    pub fn insert(&mut self, doc: Document) {
        match self.documents.iter_mut().find(|d| d.name == doc.name) {
            Some(existing) => *existing = doc,
            None => self.documents.push(doc),
        }
        self.bump();
    }

    /// Remove a document together with its outline.
    pub fn remove(&mut self, name: &str) -> Option<Document> {
        let idx = self.documents.iter().position(|d| d.name == name)?;
        let doc = self.documents.remove(idx);
        self.outlines.retain(|o| o.doc_id != name);
        self.bump();
        Some(doc)
    }

    /// Replace the outline of `name`. Ignored for unknown documents so a
    /// late extraction cannot resurrect a deleted one.
    pub fn set_outline(&mut self, name: &str, entries: Vec<OutlineEntry>) -> bool {
        if !self.contains(name) {
            return false;
        }
        self.outlines.retain(|o| o.doc_id != name);
        self.outlines.extend(entries);
        true
    }

    pub fn outline(&self, name: &str) -> Vec<&OutlineEntry> {
        self.outlines.iter().filter(|o| o.doc_id == name).collect()
    }

    pub fn outlines(&self) -> &[OutlineEntry] {
        &self.outlines
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
        log::debug!(
            "store: document set changed (revision {}, {} documents)",
            self.revision(),
            self.documents.len()
        );
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SharedStore
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`DocumentStore`]. Do not hold the lock across
/// `.await` points.
pub type SharedStore = Arc<Mutex<DocumentStore>>;

pub fn new_shared_store() -> SharedStore {
    Arc::new(Mutex::new(DocumentStore::new()))
}

/// Lock the store, recovering the data if a previous holder panicked.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, DocumentStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
