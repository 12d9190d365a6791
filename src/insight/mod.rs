//! Insight/Relevance module.
//!
//! This module provides:
//! * [`InsightOrchestrator`]: runs retrieval followed by LLM synthesis for
//!   the active selection, with stale-result suppression.
//! * [`InsightData`] / [`InsightState`]: the synthesised payload and what
//!   the panel shows.
//! * [`RelevantResult`] plus ranking/filtering helpers in [`relevance`].
//! * Prompt construction ([`prompt`]) and reply validation ([`parse`]).

pub mod data;
pub mod orchestrator;
pub mod parse;
pub mod prompt;
pub mod relevance;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use data::{InsightData, InsightState};
pub use orchestrator::{InsightOrchestrator, InsightView};
pub use relevance::{preview, rank, visible_relevant, RelevantResult};
