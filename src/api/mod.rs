pub mod http;

pub use http::HttpChatApi;

use crate::errors::PalaverResult;
use crate::model::{Message, MessageKind};
use crate::staging::StagedFile;
use async_trait::async_trait;

/// A message about to be submitted: composer text, the kind classified from
/// the staged set at send time, and the staged files themselves.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub kind: MessageKind,
    pub files: Vec<StagedFile>,
}

/// REST backend surface the engine consumes. Fetch and send are awaited;
/// read receipts and typing signals are best-effort.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Ordered history batch for a conversation.
    async fn fetch_messages(&self, conversation_id: &str) -> PalaverResult<Vec<Message>>;

    /// Mark a conversation read. Best-effort; callers never roll anything
    /// back on failure.
    async fn mark_read(&self, conversation_id: &str) -> PalaverResult<()>;

    /// Submit a message; returns the committed message the server minted.
    async fn send_message(
        &self,
        conversation_id: &str,
        draft: OutgoingMessage,
    ) -> PalaverResult<Message>;

    /// Broadcast the local user's typing state. Best-effort, fire-and-forget.
    async fn send_typing(&self, conversation_id: &str, is_typing: bool) -> PalaverResult<()>;
}
