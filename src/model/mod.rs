pub mod event;

pub use event::ChannelEvent;

use crate::errors::{PalaverError, PalaverResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media types the client will stage with an inline image preview.
pub const IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/jpg",
];

/// Whether a declared media type is one of the displayable image kinds.
pub fn is_image_type(media_type: &str) -> bool {
    IMAGE_TYPES.contains(&media_type)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A server-confirmed attachment owned by a committed message.
///
/// Staged (not-yet-uploaded) files live in `staging` and never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    /// Declared media type, e.g. `image/png` or `application/pdf`.
    #[serde(rename = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Aggregate kind of a message, computed once at send time from the staged
/// set: `image` only when every staged file is an image kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }
}

fn default_kind() -> MessageKind {
    MessageKind::Text
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub user: User,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: MessageKind,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Reject units missing required identity fields before they can reach
    /// the store. A message that fails here is dropped whole, never
    /// partially applied.
    pub fn validate(&self) -> PalaverResult<()> {
        if self.id.is_empty() {
            return Err(PalaverError::MalformedPayload("message missing id".into()));
        }
        if self.conversation_id.is_empty() {
            return Err(PalaverError::MalformedPayload(format!(
                "message {} missing conversation id",
                self.id
            )));
        }
        if self.user.id.is_empty() {
            return Err(PalaverError::MalformedPayload(format!(
                "message {} missing author id",
                self.id
            )));
        }
        Ok(())
    }
}

/// Identity + membership + display metadata of a conversation. Owned by the
/// selection layer; the session only reads it to key its internal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHandle {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub users: Vec<User>,
}
