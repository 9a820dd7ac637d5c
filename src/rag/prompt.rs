//! Prompt templates for the warehouse assistant.
//!
//! Four templates cover {context, no context} × {single-shot, structured}.
//! Placeholders: `{machine}` (a sentence naming the machine, or empty),
//! `{context}` (snippets joined by [`CONTEXT_SEPARATOR`]) and `{question}`.

use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const CONTEXT_SEPARATOR: &str = "\n---\n";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{(machine|context|question)\}").expect("static regex is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// One complete answer (`POST /query`).
    SingleShot,
    /// Sectioned answer streamed to the client (`POST /query/stream`).
    Structured,
}

const SINGLE_SHOT_WITH_CONTEXT: &str = "You are a warehouse assistant. Use the context below to answer the question.{machine}
Answer in plain sentences without symbols, markdown or emojis because the answer may be read aloud.

Context:
{context}

Question: {question}";

const SINGLE_SHOT_NO_CONTEXT: &str = "You are a warehouse assistant.{machine}
No documentation was retrieved for this question, so answer from general warehouse knowledge and say that no documentation was found.
If you are not sure, ask the user for more information instead of guessing.
Answer in plain sentences without symbols, markdown or emojis because the answer may be read aloud.

Question: {question}";

const STRUCTURED_WITH_CONTEXT: &str = "You are a warehouse assistant. Use the context below to answer the question.{machine}
When relevant, organise the answer into these sections: Summary, Steps, Safety, Next Actions.
Write section names as plain words followed by a colon. Do not use symbols, markdown or emojis because the answer may be read aloud.

Context:
{context}

Question: {question}";

const STRUCTURED_NO_CONTEXT: &str = "You are a warehouse assistant.{machine}
No documentation was retrieved for this question, so answer from general warehouse knowledge and say that no documentation was found.
If you are not sure, ask the user for more information instead of guessing.
When relevant, organise the answer into these sections: Summary, Steps, Safety, Next Actions.
Write section names as plain words followed by a colon. Do not use symbols, markdown or emojis because the answer may be read aloud.

Question: {question}";

/// Template for the given combination of retrieved context and output mode.
pub fn template_for(has_context: bool, mode: PromptMode) -> &'static str {
    match (has_context, mode) {
        (true, PromptMode::SingleShot) => SINGLE_SHOT_WITH_CONTEXT,
        (false, PromptMode::SingleShot) => SINGLE_SHOT_NO_CONTEXT,
        (true, PromptMode::Structured) => STRUCTURED_WITH_CONTEXT,
        (false, PromptMode::Structured) => STRUCTURED_NO_CONTEXT,
    }
}

/// Fills the template selected by `contexts` and `mode`.
pub fn build_prompt(
    question: &str,
    contexts: &[String],
    mode: PromptMode,
    machine: Option<&str>,
) -> String {
    let machine_line = machine
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!(" The user is asking about the machine named {}.", name))
        .unwrap_or_default();

    let context = contexts.join(CONTEXT_SEPARATOR);

    // Single pass, so placeholder-like text inside snippets is left alone.
    placeholder()
        .replace_all(template_for(!contexts.is_empty(), mode), |caps: &Captures| {
            match &caps[1] {
                "machine" => machine_line.clone(),
                "context" => context.clone(),
                _ => question.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_is_speech_friendly() {
        for has_context in [true, false] {
            for mode in [PromptMode::SingleShot, PromptMode::Structured] {
                let template = template_for(has_context, mode);
                assert!(template.starts_with("You are a warehouse assistant."));
                assert!(template.contains("emojis"));
                assert!(template.contains("{question}"));
                assert_eq!(template.contains("{context}"), has_context);
                assert_eq!(
                    template.contains("No documentation was retrieved"),
                    !has_context
                );
                assert_eq!(
                    template.contains("Summary, Steps, Safety, Next Actions"),
                    mode == PromptMode::Structured
                );
            }
        }
    }

    #[test]
    fn contexts_are_joined_with_separator() {
        let contexts = vec!["Jam: stop belt".to_string(), "Reset: hold button".to_string()];
        let prompt = build_prompt("How to clear a jam?", &contexts, PromptMode::SingleShot, None);

        assert!(prompt.contains("Context:\nJam: stop belt\n---\nReset: hold button\n"));
        assert!(prompt.ends_with("Question: How to clear a jam?"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn no_context_prompt_invites_clarifying_questions() {
        let prompt = build_prompt("Is it safe?", &[], PromptMode::Structured, Some("Packer B"));

        assert!(prompt.contains("No documentation was retrieved"));
        assert!(prompt.contains("ask the user for more information"));
        assert!(prompt.contains("the machine named Packer B."));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn placeholders_inside_snippets_are_not_expanded() {
        let contexts = vec!["literal {question} marker".to_string()];
        let prompt = build_prompt("Q?", &contexts, PromptMode::SingleShot, None);
        assert!(prompt.contains("literal {question} marker"));
    }

    #[test]
    fn blank_machine_name_is_omitted() {
        let prompt = build_prompt("Status?", &[], PromptMode::SingleShot, Some("   "));
        assert!(prompt.starts_with("You are a warehouse assistant.\n"));
    }
}
