use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_typing_expiry_secs() -> u64 {
    6
}

fn default_typing_debounce_ms() -> u64 {
    300
}

fn default_topic_prefix() -> String {
    "conversation.".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url", rename = "baseUrl")]
    pub base_url: String,
    /// Bearer token for the REST backend. Acquisition and persistence stay
    /// with the auth layer; this is only carried through to requests.
    #[serde(default)]
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "token",
                &if self.token.is_empty() {
                    "[empty]"
                } else {
                    "[REDACTED]"
                },
            )
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long a remote user stays in the typing set without a refresh.
    #[serde(default = "default_typing_expiry_secs", rename = "typingExpirySecs")]
    pub typing_expiry_secs: u64,
    /// Settle delay before an outbound typing signal actually goes out.
    #[serde(default = "default_typing_debounce_ms", rename = "typingDebounceMs")]
    pub typing_debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_expiry_secs: default_typing_expiry_secs(),
            typing_debounce_ms: default_typing_debounce_ms(),
        }
    }
}

impl TimingConfig {
    pub fn typing_expiry(&self) -> Duration {
        Duration::from_secs(self.typing_expiry_secs)
    }

    pub fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Per-conversation topics are `{prefix}{conversation_id}`.
    #[serde(default = "default_topic_prefix", rename = "topicPrefix")]
    pub topic_prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Load config from a JSON file, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: ClientConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;
    Ok(config)
}
