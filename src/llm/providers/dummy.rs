//! Dummy LLM provider. Echoes input back prefixed with `[echo]`.
//!
//! Keyless and offline. An echoed classification is never a handler name,
//! so the bot answers every message with its capability summary; extraction
//! yields an empty object, which conforms to all-null optionals.

use serde_json::{Map, Value};

use crate::llm::{ModelIdentity, ProviderError};
use crate::schema::ExtractionSchema;

#[derive(Debug, Clone)]
pub struct DummyProvider {
    identity: ModelIdentity,
}

impl DummyProvider {
    pub fn new(identity: ModelIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    pub async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        Ok(format!("[echo] {user}"))
    }

    pub async fn extract(
        &self,
        _system: &str,
        _user: &str,
        _schema: &ExtractionSchema,
    ) -> Result<Value, ProviderError> {
        Ok(Value::Object(Map::new()))
    }
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new(ModelIdentity::new("dummy", None))
    }
}
