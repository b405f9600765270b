pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A message received from the chat platform
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Display name of the author
    pub author_display_name: String,
    /// Platform channel id of the author, used to skip the bot's own messages
    pub author_channel_id: String,
    /// The message text
    pub text: String,
    /// When the platform recorded the message
    pub published_at: Option<DateTime<Utc>>,
}

/// One page of chat messages plus the platform's continuation token.
#[derive(Debug, Clone, Default)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    /// Opaque cursor defined by the platform; pass it back to get only
    /// messages newer than this page.
    pub next_page_token: Option<String>,
}

/// Live chat read/write seam. The poll loop only talks to this trait, so
/// tests can drive it with a mock instead of the real API.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn list_messages(&self, live_chat_id: &str, page_token: Option<&str>)
        -> Result<ChatPage>;

    async fn send_message(&self, live_chat_id: &str, text: &str) -> Result<()>;
}
