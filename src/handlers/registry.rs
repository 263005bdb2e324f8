//! Name → handler table, built once at startup and immutable afterwards.

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use super::{ApiHandler, HandlerDescriptor, TargetHandler};
use crate::supervisor::OFFTOP_SENTINEL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate handler name: {0}")]
    Duplicate(String),
    #[error("handler name must not be empty")]
    EmptyName,
    #[error("handler name `{0}` is reserved")]
    ReservedName(String),
    #[error("handler `{0}` has no examples")]
    NoExamples(String),
}

/// Registered handlers in declaration order.
#[derive(Debug)]
pub struct HandlerRegistry {
    handlers: Vec<TargetHandler>,
    index: HashMap<String, usize>,
}

impl HandlerRegistry {
    /// Validate every descriptor and build the table. The first invalid
    /// descriptor aborts construction.
    pub fn new(descriptors: Vec<HandlerDescriptor>) -> Result<Self, RegistryError> {
        let mut handlers = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let name = descriptor.name.as_str();
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if name == OFFTOP_SENTINEL {
                return Err(RegistryError::ReservedName(name.to_string()));
            }
            if descriptor.examples.is_empty() {
                return Err(RegistryError::NoExamples(name.to_string()));
            }
            if index.contains_key(name) {
                return Err(RegistryError::Duplicate(name.to_string()));
            }

            index.insert(name.to_string(), handlers.len());
            handlers.push(TargetHandler::Api(ApiHandler::from_descriptor(descriptor)));
        }

        let names: Vec<&str> = handlers.iter().map(TargetHandler::name).collect();
        info!(count = handlers.len(), ?names, "handler registry built");
        Ok(Self { handlers, index })
    }

    pub fn get(&self, name: &str) -> Option<&TargetHandler> {
        self.index.get(name).map(|&i| &self.handlers[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(TargetHandler::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetHandler> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
