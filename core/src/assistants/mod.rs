//! OpenAI Assistants API: threads, messages and runs

pub mod client;
pub mod types;

pub use client::AssistantsClient;
pub use types::{ContentBlock, MessageObject, RunObject};
