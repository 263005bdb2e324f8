//! Intent classifier.
//!
//! The classification prompt is assembled once from the registry: handler
//! names, every handler's examples and the sentinel instruction. Classifying
//! is then a single completion whose trimmed answer is the label.

use tracing::debug;

use crate::handlers::HandlerRegistry;
use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::{CLASSIFY_TEMPLATE, PromptBuilder};

/// Label meaning "no handler applies".
pub const OFFTOP_SENTINEL: &str = "offtop";

/// Messages starting with this are bot commands, always classified offtop.
pub const COMMAND_PREFIX: char = '/';

#[derive(Debug, Clone)]
pub struct Supervisor {
    prompt: String,
}

impl Supervisor {
    pub fn new(registry: &HandlerRegistry) -> Self {
        let labels = registry.names().collect::<Vec<_>>().join(", ");
        let examples = registry
            .iter()
            .map(|h| h.describe())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = PromptBuilder::template(CLASSIFY_TEMPLATE)
            .var("labels", labels)
            .var("command_prefix", COMMAND_PREFIX.to_string())
            .var("sentinel", OFFTOP_SENTINEL)
            .var("examples", examples)
            .build();

        Self { prompt }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Ask the model for a label. The answer is trimmed and otherwise
    /// returned as-is; callers treat unknown labels as offtop.
    pub async fn classify(&self, llm: &LlmProvider, text: &str) -> Result<String, ProviderError> {
        let label = llm.complete(&self.prompt, text).await?.trim().to_string();
        debug!(%label, "message classified");
        Ok(label)
    }
}
