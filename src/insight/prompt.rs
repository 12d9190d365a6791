//! Prompt builder for insight synthesis.
//!
//! The prompt embeds the selected text and the retrieved passages (as JSON)
//! and asks for a fixed-schema JSON object wrapped in a top-level `"text"`
//! key. [`super::parse`] accepts the reply with or without that wrapper.

use super::relevance::RelevantResult;

/// Behavioural rules given to the model.
const INSIGHT_RULES: &str = "\
Rules:
- Use only the relevant sections provided above; do not add outside knowledge.
- Do not copy passages verbatim; synthesise and simplify them for the reader.
- key_insights: what the selection means beyond its literal wording.
- did_you_know: a notable fact drawn from the relevant sections.
- counterpoints: viewpoints in the relevant sections that disagree with the selection.
- connecting_the_dots: how the sections relate to each other and to the selection, \
naming the documents involved (page numbers are not needed).
Respond with the JSON object only.";

/// Shape of the expected reply.
const RESPONSE_SCHEMA: &str = r#"{
  "text": {
    "selected_text": "...",
    "key_insights": "...",
    "did_you_know": "...",
    "counterpoints": "...",
    "connecting_the_dots": "..."
  }
}"#;

/// Build the synthesis prompt for `selected` given the ranked passages.
pub fn build_insight_prompt(selected: &str, results: &[RelevantResult]) -> String {
    let passages = serde_json::to_string(results).unwrap_or_else(|_| "[]".into());
    format!(
        "You are an assistant that analyses PDF documents uploaded by the user.\n\
         The user has selected the text: \"{selected}\".\n\
         Relevant sections from the user's library: {passages}.\n\
         Based exclusively on these relevant sections, produce a JSON object with the following keys:\n\
         {RESPONSE_SCHEMA}\n\
         {INSIGHT_RULES}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::hit;

    #[test]
    fn prompt_embeds_selection_and_passages() {
        let results = vec![RelevantResult::from(hit("paper.pdf", 7, 0.8))];
        let prompt = build_insight_prompt("gradient descent", &results);

        assert!(prompt.contains("selected the text: \"gradient descent\"."));
        assert!(prompt.contains("\"doc_id\":\"paper.pdf\""));
        assert!(prompt.contains("\"paragraph_with_context\""));
        assert!(prompt.contains("connecting_the_dots"));
    }

    #[test]
    fn prompt_with_no_passages_has_empty_list() {
        let prompt = build_insight_prompt("x", &[]);
        assert!(prompt.contains("library: []."));
    }
}
