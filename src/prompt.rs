//! Prompt templates and a small builder for `{{key}}` substitution.
//!
//! Templates live under `config/prompts/` and are compiled into the binary,
//! so a deployed bot cannot drift from the prompts it was tested with.

use std::collections::HashMap;

/// System prompt for schema-constrained extraction.
pub const EXTRACT_TEMPLATE: &str = include_str!("../config/prompts/extract.txt");

/// Classifier system prompt. Variables: `labels`, `command_prefix`,
/// `sentinel`, `examples`.
pub const CLASSIFY_TEMPLATE: &str = include_str!("../config/prompts/classify.txt");

/// First line of the capability summary. Variables: `model`.
pub const FALLBACK_TEMPLATE: &str = include_str!("../config/prompts/fallback.txt");

const SEPARATOR: &str = "\n\n";

/// Joins trimmed fragments with blank lines, then substitutes variables.
#[derive(Debug, Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a template; equivalent to `new().append(template)`.
    pub fn template(template: &str) -> Self {
        Self::new().append(template)
    }

    /// Append a fragment. Empty fragments are skipped.
    pub fn append(mut self, text: impl Into<String>) -> Self {
        let s = text.into();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register a single `{{key}}` → `value` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Assemble all fragments and substitute every known `{{key}}` in a
    /// single left-to-right pass. Substituted values are never rescanned.
    pub fn build(self) -> String {
        let text = self.parts.join(SEPARATOR);
        let mut prompt = String::with_capacity(text.len());
        let mut rest = text.as_str();

        while let Some(start) = rest.find("{{") {
            prompt.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}").and_then(|end| self.vars.get(&after[..end]).map(|v| (end, v))) {
                Some((end, value)) => {
                    prompt.push_str(value);
                    rest = &after[end + 2..];
                }
                None => {
                    prompt.push_str("{{");
                    rest = after;
                }
            }
        }
        prompt.push_str(rest);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_variables() {
        let p = PromptBuilder::template("Hello {{name}}, {{name}}!").var("name", "bot").build();
        assert_eq!(p, "Hello bot, bot!");
    }

    #[test]
    fn joins_fragments_with_blank_line_and_skips_empty() {
        let p = PromptBuilder::new().append("a").append("   ").append("b\n").build();
        assert_eq!(p, "a\n\nb");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let p = PromptBuilder::template("{{missing}}").build();
        assert_eq!(p, "{{missing}}");
    }

    #[test]
    fn values_are_not_substituted_again() {
        let p = PromptBuilder::template("{{a}} / {{b}}")
            .var("a", "{{b}}")
            .var("b", "{{a}}")
            .build();
        assert_eq!(p, "{{b}} / {{a}}");
    }

    #[test]
    fn unmatched_braces_are_kept() {
        let p = PromptBuilder::template("{{ {{x}} }} {{open").var("x", "1").build();
        assert_eq!(p, "{{ 1 }} {{open");
    }

    #[test]
    fn bundled_templates_carry_their_variables() {
        for key in ["{{labels}}", "{{command_prefix}}", "{{sentinel}}", "{{examples}}"] {
            assert!(CLASSIFY_TEMPLATE.contains(key), "classify template lacks {key}");
        }
        assert!(FALLBACK_TEMPLATE.contains("{{model}}"));
        assert!(EXTRACT_TEMPLATE.contains("null"));
    }
}
