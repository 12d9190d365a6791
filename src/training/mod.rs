//! Training Coordinator: asynchronous "train retrieval index" lifecycle.
//!
//! The coordinator watches the document-set revision, (re)starts the backend
//! indexing job, polls it, restarts once per failure and publishes a
//! [`TrainingState`] on a `watch` channel. `TrainingState::Ready` is the only
//! state that lets retrieval queries run.

pub mod coordinator;
pub mod state;

pub use coordinator::TrainingCoordinator;
pub use state::TrainingState;
