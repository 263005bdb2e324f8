//! Application-wide error types.
//!
//! [`AppError`] covers startup and transport failures. Per-message pipeline
//! failures live next to the code that produces them
//! ([`crate::llm::ProviderError`], [`crate::schema::SchemaError`],
//! [`crate::handlers::HandlerError`], [`crate::dispatch::DispatchError`]).

use thiserror::Error;

use crate::handlers::RegistryError;
use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("handler registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("comms error: {0}")]
    Comms(String),
}
