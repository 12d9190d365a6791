//! Upload pipeline: duplicate resolution, upload, registration, outline.

use std::sync::Arc;

use crate::backend::{Backend, BackendError};
use crate::store::{self, Document, OutlineEntry, SharedStore};

use super::naming::keep_both_name;
use super::{DuplicateChoice, DuplicatePrompt, PendingFile, UploadError};

pub struct UploadResolver {
    backend: Arc<dyn Backend>,
    store: SharedStore,
}

impl UploadResolver {
    pub fn new(backend: Arc<dyn Backend>, store: SharedStore) -> Self {
        Self { backend, store }
    }

    /// Upload one file, resolving a name collision through `prompt` first.
    ///
    /// The store changes only after the server has accepted the upload. An
    /// overwrite swaps the entry in place with a single revision bump; if the
    /// upload fails after the old server copy was deleted, the entry is
    /// dropped instead.
    pub async fn submit(
        &self,
        file: PendingFile,
        prompt: &dyn DuplicatePrompt,
    ) -> Result<Document, UploadError> {
        let PendingFile { mut name, bytes } = file;
        let mut replacing = false;

        loop {
            let exists = store::lock(&self.store).contains(&name);
            if !exists {
                break;
            }
            match prompt.choose(&name).await {
                DuplicateChoice::Cancel => {
                    log::info!("upload: {name} cancelled at duplicate prompt");
                    return Err(UploadError::Cancelled(name));
                }
                DuplicateChoice::KeepBoth => {
                    let renamed = keep_both_name(&name);
                    log::debug!("upload: keeping both, {name} → {renamed}");
                    name = renamed;
                }
                DuplicateChoice::Overwrite => {
                    log::debug!("upload: overwriting {name}");
                    self.backend
                        .delete_document(&name)
                        .await
                        .map_err(|source| UploadError::Delete {
                            name: name.clone(),
                            source,
                        })?;
                    replacing = true;
                    break;
                }
            }
        }

        let stored = match self.backend.upload_document(&name, &bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                if replacing {
                    // The server copy is already gone.
                    store::lock(&self.store).remove(&name);
                }
                return Err(match e {
                    BackendError::Rejected(reason) => {
                        log::warn!("upload: server rejected {name}: {reason}");
                        UploadError::Rejected { name, reason }
                    }
                    e => {
                        log::warn!("upload: {name} failed: {e}");
                        e.into()
                    }
                });
            }
        };

        let doc = Document::uploaded(stored, bytes);
        {
            let mut store = store::lock(&self.store);
            if replacing {
                if doc.name == name {
                    store.set_outline(&name, Vec::new());
                } else {
                    store.remove(&name);
                }
            }
            store.insert(doc.clone());
        }
        log::info!(
            "upload: {} stored ({} bytes)",
            doc.name,
            doc.source.as_ref().map_or(0, Vec::len)
        );

        self.fetch_outline(&doc.name).await;
        Ok(doc)
    }

    /// Upload several files in order. A cancelled or failed file does not
    /// stop the rest of the batch.
    pub async fn submit_batch(
        &self,
        files: Vec<PendingFile>,
        prompt: &dyn DuplicatePrompt,
    ) -> Vec<(String, Result<Document, UploadError>)> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let original = file.name.clone();
            let outcome = self.submit(file, prompt).await;
            outcomes.push((original, outcome));
        }
        outcomes
    }

    /// Delete a document on the server, then drop it (and its outline) from
    /// the store. On failure the store is left as it was.
    pub async fn delete(&self, name: &str) -> Result<(), UploadError> {
        if let Err(e) = self.backend.delete_document(name).await {
            log::warn!("upload: delete of {name} failed: {e}");
            return Err(e.into());
        }
        store::lock(&self.store).remove(name);
        log::info!("upload: {name} deleted");
        Ok(())
    }

    /// Register every document already on the server, then fetch outlines.
    /// Returns the number of documents registered.
    pub async fn load_inventory(&self) -> Result<usize, UploadError> {
        let names = self.backend.list_documents().await?;
        {
            let mut store = store::lock(&self.store);
            for name in &names {
                if !store.contains(name) {
                    store.insert(Document::remote(name.as_str()));
                }
            }
        }
        log::info!("upload: {} document(s) on server", names.len());

        for name in &names {
            self.fetch_outline(name).await;
        }
        Ok(names.len())
    }

    async fn fetch_outline(&self, name: &str) {
        match self.backend.extract_outline(name).await {
            Ok(items) => {
                let entries: Vec<OutlineEntry> = items
                    .into_iter()
                    .map(|item| OutlineEntry::from_item(name, item))
                    .collect();
                let count = entries.len();
                if store::lock(&self.store).set_outline(name, entries) {
                    log::debug!("upload: outline of {name} has {count} heading(s)");
                }
            }
            Err(e) => log::warn!("upload: outline extraction for {name} failed: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
