//! External provider clients.
//!
//! The two outward collaborators sit behind narrow traits so the core logic
//! can be exercised with fakes in tests: a completion provider that answers
//! prompts and hands back continuation tokens, and a messenger that delivers
//! text or multiple-choice messages to a WhatsApp identity.

/// Completion-provider trait and OpenAI Responses API client
pub mod completion;
/// Messenger trait, WhatsApp Graph API client, and webhook payload parsing
pub mod whatsapp;

pub use completion::{Completion, CompletionProvider, CompletionRequest, OpenAiClient};
pub use whatsapp::{InboundMessage, Messenger, WhatsAppClient, parse_webhook_payload};
