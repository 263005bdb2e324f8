//! Intent-routing chat bot.
//!
//! A message arrives on the webhook ([`comms`]), the [`supervisor`] labels
//! it with an LLM, the [`dispatch`] pipeline routes the label to a target
//! handler from the [`handlers`] registry, which extracts a typed payload
//! ([`schema`]) and calls its HTTP API. The response is rendered back to the
//! chat by content type.

pub mod comms;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod logger;
pub mod prompt;
pub mod schema;
pub mod supervisor;
