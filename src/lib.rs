//! DocuMind: client-side orchestration for a PDF reading assistant.
//!
//! The crate coordinates the reader UI with its remote collaborators:
//!
//! ```text
//! UploadResolver ──▶ DocumentStore ──revision──▶ TrainingCoordinator
//!                                                   │ ready
//! SelectionBridge ──selection──▶ InsightOrchestrator ◀┘
//!                                   │ InsightData
//!                                   ├──▶ display (InsightView)
//!                                   └──▶ PodcastOrchestrator ──▶ Transport
//! ```
//!
//! Outline extraction, semantic search, index training, LLM prompting and
//! speech synthesis all happen behind the [`backend::Backend`] trait.
//! [`session::Session`] owns every component and wires them together.

pub mod backend;
pub mod config;
pub mod insight;
pub mod podcast;
pub mod retry;
pub mod selection;
pub mod session;
pub mod store;
pub mod training;
pub mod upload;
