use crate::errors::{PalaverError, PalaverResult};
use crate::model::{Message, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire names of the two push events a conversation channel delivers.
/// Broadcast names arrive dot-prefixed (".MessageSent") from the backend;
/// `parse` accepts both forms.
pub const EVENT_MESSAGE_SENT: &str = "MessageSent";
pub const EVENT_USER_TYPING: &str = "UserTyping";

/// A push event delivered on a conversation's live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelEvent {
    MessageSent { message: Message },
    UserTyping { user: User, is_typing: bool },
}

impl ChannelEvent {
    /// Decode a raw event-name + JSON payload pair as received from a
    /// transport. Malformed payloads reject the single unit with a
    /// `MalformedPayload` error; they never produce a partial event.
    pub fn parse(event: &str, payload: &Value) -> PalaverResult<ChannelEvent> {
        match event.trim_start_matches('.') {
            EVENT_MESSAGE_SENT => {
                let raw = payload.get("message").ok_or_else(|| {
                    PalaverError::MalformedPayload("MessageSent without message".into())
                })?;
                let message: Message = serde_json::from_value(raw.clone()).map_err(|e| {
                    PalaverError::MalformedPayload(format!("undecodable message: {e}"))
                })?;
                message.validate()?;
                Ok(ChannelEvent::MessageSent { message })
            }
            EVENT_USER_TYPING => {
                let raw = payload.get("user").ok_or_else(|| {
                    PalaverError::MalformedPayload("UserTyping without user".into())
                })?;
                let user: User = serde_json::from_value(raw.clone())
                    .map_err(|e| PalaverError::MalformedPayload(format!("undecodable user: {e}")))?;
                if user.id.is_empty() {
                    return Err(PalaverError::MalformedPayload(
                        "UserTyping with empty user id".into(),
                    ));
                }
                let is_typing = payload
                    .get("is_typing")
                    .and_then(Value::as_bool)
                    .ok_or_else(|| {
                        PalaverError::MalformedPayload("UserTyping without is_typing".into())
                    })?;
                Ok(ChannelEvent::UserTyping { user, is_typing })
            }
            other => Err(PalaverError::MalformedPayload(format!(
                "unknown channel event '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_message_sent() {
        let payload = json!({
            "message": {
                "id": "m1",
                "conversation_id": "7",
                "user": {"id": "u2", "name": "Bo"},
                "content": "hi",
                "created_at": "2026-01-05T10:00:00Z"
            }
        });
        let event = ChannelEvent::parse("MessageSent", &payload).unwrap();
        match event {
            ChannelEvent::MessageSent { message } => assert_eq!(message.id, "m1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parse_accepts_dot_prefixed_names() {
        let payload = json!({"user": {"id": "u2", "name": "Bo"}, "is_typing": true});
        let event = ChannelEvent::parse(".UserTyping", &payload).unwrap();
        assert!(matches!(
            event,
            ChannelEvent::UserTyping { is_typing: true, .. }
        ));
    }

    #[test]
    fn parse_rejects_unknown_event() {
        let err = ChannelEvent::parse("MessageDeleted", &json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown channel event"));
    }

    #[test]
    fn parse_rejects_message_without_payload() {
        let err = ChannelEvent::parse("MessageSent", &json!({})).unwrap_err();
        assert!(matches!(err, PalaverError::MalformedPayload(_)));
    }

    #[test]
    fn parse_rejects_message_missing_required_fields() {
        // id present but author missing: validate() must reject the unit
        let payload = json!({
            "message": {"id": "m1", "conversation_id": "7", "user": {"id": ""}}
        });
        assert!(ChannelEvent::parse("MessageSent", &payload).is_err());
    }

    #[test]
    fn parse_rejects_typing_without_flag() {
        let payload = json!({"user": {"id": "u2"}});
        let err = ChannelEvent::parse("UserTyping", &payload).unwrap_err();
        assert!(err.to_string().contains("is_typing"));
    }
}
