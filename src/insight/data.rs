//! Insight payload and display state.

use serde::{Deserialize, Deserializer, Serialize};

/// Structured commentary synthesised for one selection.
///
/// Missing keys default to empty; `connecting_the_dots` is accepted either as
/// a single string or as a list of strings and always stored as a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightData {
    #[serde(default, deserialize_with = "nullable_text")]
    pub selected_text: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub key_insights: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub did_you_know: String,
    #[serde(default, deserialize_with = "nullable_text")]
    pub counterpoints: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub connecting_the_dots: Vec<String>,
}

impl InsightData {
    /// Keys of the JSON object the LLM is asked to produce.
    pub const FIELDS: [&'static str; 5] = [
        "selected_text",
        "key_insights",
        "did_you_know",
        "counterpoints",
        "connecting_the_dots",
    ];

    /// `true` when at least one section has something to show.
    pub fn is_displayable(&self) -> bool {
        [&self.key_insights, &self.did_you_know, &self.counterpoints]
            .iter()
            .any(|s| !s.trim().is_empty())
            || self.connecting_the_dots.iter().any(|s| !s.trim().is_empty())
    }
}

fn nullable_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

fn text_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<TextOrList>::deserialize(d)? {
        None => Vec::new(),
        Some(TextOrList::Text(s)) if s.trim().is_empty() => Vec::new(),
        Some(TextOrList::Text(s)) => vec![s],
        Some(TextOrList::List(items)) => items,
    })
}

// ---------------------------------------------------------------------------
// InsightState
// ---------------------------------------------------------------------------

/// What the insight panel shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InsightState {
    /// Nothing requested yet, or the last request gave up.
    #[default]
    Empty,
    /// A pipeline is running for the current selection.
    Pending,
    Ready(InsightData),
    /// The LLM answered, but not with a usable insight object.
    Unavailable,
}

impl InsightState {
    pub fn is_pending(&self) -> bool {
        matches!(self, InsightState::Pending)
    }

    pub fn data(&self) -> Option<&InsightData> {
        match self {
            InsightState::Ready(data) => Some(data),
            _ => None,
        }
    }
}
