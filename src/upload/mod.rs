//! Upload/Duplicate Resolver module.
//!
//! # Overview
//!
//! Files chosen by the user reach the server one at a time:
//!
//! 1. **Resolve** a name collision with the [`DuplicatePrompt`]
//!    (overwrite, keep both, or cancel).
//! 2. **Upload** the bytes; the store is only touched once the server has
//!    accepted the file.
//! 3. **Register** the [`Document`](crate::store::Document) and fetch its
//!    outline (best-effort).
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo(resolver: documind::upload::UploadResolver) {
//! use documind::upload::{FixedChoice, DuplicateChoice, PendingFile};
//!
//! let file = PendingFile::new("report.pdf", b"%PDF-1.7".to_vec());
//! let doc = resolver
//!     .submit(file, &FixedChoice(DuplicateChoice::KeepBoth))
//!     .await
//!     .expect("upload failed");
//! println!("stored as {}", doc.name);
//! # }
//! ```

pub mod naming;
pub mod resolver;

pub use naming::keep_both_name;
pub use resolver::UploadResolver;

use async_trait::async_trait;
use thiserror::Error;

use crate::backend::BackendError;

// ---------------------------------------------------------------------------
// UploadError
// ---------------------------------------------------------------------------

/// Why a single file did not end up in the store.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The user chose "cancel" at the duplicate prompt.
    #[error("upload of {0} cancelled")]
    Cancelled(String),

    /// The server answered the upload with an `{ "error": … }` body.
    #[error("server rejected {name}: {reason}")]
    Rejected { name: String, reason: String },

    /// The existing document could not be removed before an overwrite.
    #[error("could not replace {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: BackendError,
    },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ---------------------------------------------------------------------------
// Duplicate handling
// ---------------------------------------------------------------------------

/// Answer to "a document with this name already exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateChoice {
    Overwrite,
    KeepBoth,
    Cancel,
}

/// Source of duplicate-name decisions (a dialog, a console prompt, a test).
#[async_trait]
pub trait DuplicatePrompt: Send + Sync {
    async fn choose(&self, name: &str) -> DuplicateChoice;
}

/// A prompt that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub DuplicateChoice);

#[async_trait]
impl DuplicatePrompt for FixedChoice {
    async fn choose(&self, _name: &str) -> DuplicateChoice {
        self.0
    }
}

// ---------------------------------------------------------------------------
// PendingFile
// ---------------------------------------------------------------------------

/// A local file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}
