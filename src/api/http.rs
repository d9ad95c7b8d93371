use crate::api::{ChatApi, OutgoingMessage};
use crate::config::ApiConfig;
use crate::errors::{PalaverError, PalaverResult};
use crate::model::Message;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

/// `ChatApi` over the conversation REST backend, bearer-authenticated.
///
/// Token acquisition/refresh stays with the auth layer; this client only
/// attaches whatever it was constructed with.
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpChatApi {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(context: &str, err: &reqwest::Error) -> PalaverError {
    PalaverError::Transport {
        message: format!("{context}: {err}"),
        retryable: true,
    }
}

fn check_status(context: &str, response: reqwest::Response) -> PalaverResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PalaverError::Transport {
            message: format!("{context} returned {status}"),
            retryable: status.is_server_error(),
        })
    }
}

async fn json_body(context: &str, response: reqwest::Response) -> PalaverResult<Value> {
    response
        .json()
        .await
        .map_err(|e| PalaverError::MalformedPayload(format!("{context}: undecodable body: {e}")))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_messages(&self, conversation_id: &str) -> PalaverResult<Vec<Message>> {
        let context = format!("fetch messages for conversation {conversation_id}");
        let response = self
            .client
            .get(self.url(&format!("/api/conversations/{conversation_id}/messages")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport(&context, &e))?;
        let body = json_body(&context, check_status(&context, response)?).await?;
        // The backend wraps the batch as either {"data": [...]} or
        // {"messages": [...]}; an absent batch means empty history.
        let raw = body
            .get("data")
            .or_else(|| body.get("messages"))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let batch: Vec<Message> = serde_json::from_value(raw)
            .map_err(|e| PalaverError::MalformedPayload(format!("{context}: {e}")))?;
        debug!("fetched {} messages for conversation {}", batch.len(), conversation_id);
        Ok(batch)
    }

    async fn mark_read(&self, conversation_id: &str) -> PalaverResult<()> {
        let context = format!("mark conversation {conversation_id} read");
        let response = self
            .client
            .post(self.url(&format!("/api/conversations/{conversation_id}/read")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport(&context, &e))?;
        check_status(&context, response)?;
        Ok(())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        draft: OutgoingMessage,
    ) -> PalaverResult<Message> {
        let context = format!("send message to conversation {conversation_id}");
        let mut form = reqwest::multipart::Form::new().text("type", draft.kind.as_str());
        if let Some(content) = draft.content {
            form = form.text("content", content);
        }
        for file in draft.files {
            let part = reqwest::multipart::Part::bytes(file.data)
                .file_name(file.name.clone())
                .mime_str(&file.media_type)
                .map_err(|e| {
                    PalaverError::Internal(anyhow::anyhow!(
                        "invalid media type {} on staged file {}: {e}",
                        file.media_type,
                        file.name
                    ))
                })?;
            form = form.part("attachments[]", part);
        }
        let response = self
            .client
            .post(self.url(&format!("/api/conversations/{conversation_id}/messages")))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(&context, &e))?;
        let body = json_body(&context, check_status(&context, response)?).await?;
        // Committed message arrives as {"data": ...}, {"message": ...}, or bare
        let raw = body
            .get("data")
            .or_else(|| body.get("message"))
            .cloned()
            .unwrap_or(body);
        let message: Message = serde_json::from_value(raw)
            .map_err(|e| PalaverError::MalformedPayload(format!("{context}: {e}")))?;
        message.validate()?;
        Ok(message)
    }

    async fn send_typing(&self, conversation_id: &str, is_typing: bool) -> PalaverResult<()> {
        let context = format!("typing signal for conversation {conversation_id}");
        let response = self
            .client
            .post(self.url(&format!("/api/conversations/{conversation_id}/typing")))
            .bearer_auth(&self.token)
            .json(&json!({ "is_typing": is_typing }))
            .send()
            .await
            .map_err(|e| transport(&context, &e))?;
        check_status(&context, response)?;
        Ok(())
    }
}
