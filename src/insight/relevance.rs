//! Relevant-passage ranking and display filtering.

use serde::Serialize;

use crate::backend::SearchHit;

/// Words kept by [`preview`] before truncating.
pub const PREVIEW_WORDS: usize = 20;

/// A passage from another (or the same) document related to the selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantResult {
    pub doc_id: String,
    pub page: u32,
    #[serde(rename = "paragraph_with_context")]
    pub paragraph: String,
    pub score: f32,
}

impl From<SearchHit> for RelevantResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            doc_id: hit.doc_id,
            page: hit.page,
            paragraph: hit.paragraph_with_context,
            score: hit.score,
        }
    }
}

/// Convert search hits into results ordered by descending score. Ties keep
/// the backend's order.
pub fn rank(hits: Vec<SearchHit>) -> Vec<RelevantResult> {
    let mut results: Vec<RelevantResult> = hits.into_iter().map(RelevantResult::from).collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Results worth showing in the relevant-sections panel.
///
/// * passages scoring `<= min_score` are dropped;
/// * once the viewed document (`active_doc`) has `max_per_document` or more
///   matches, every *other* document is capped at `max_per_document`
///   passages, keeping its best-ranked ones.
pub fn visible_relevant<'a>(
    results: &'a [RelevantResult],
    active_doc: Option<&str>,
    min_score: f32,
    max_per_document: usize,
) -> Vec<&'a RelevantResult> {
    let scored: Vec<&RelevantResult> = results.iter().filter(|r| r.score > min_score).collect();

    let Some(active) = active_doc else {
        return scored;
    };
    let active_matches = scored.iter().filter(|r| r.doc_id == active).count();
    if active_matches < max_per_document {
        return scored;
    }

    let mut shown: Vec<(&str, usize)> = Vec::new();
    scored
        .into_iter()
        .filter(|r| {
            if r.doc_id == active {
                return true;
            }
            match shown.iter_mut().find(|(doc, _)| *doc == r.doc_id) {
                Some((_, count)) if *count >= max_per_document => false,
                Some((_, count)) => {
                    *count += 1;
                    true
                }
                None => {
                    shown.push((r.doc_id.as_str(), 1));
                    true
                }
            }
        })
        .collect()
}

/// First [`PREVIEW_WORDS`] words of `text`, with `...` when truncated.
pub fn preview(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= PREVIEW_WORDS {
        return words.join(" ");
    }
    format!("{}...", words[..PREVIEW_WORDS].join(" "))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
