// src/ingest/types.rs
use anyhow::Result;

/// One live-chat message as collected from the broadcast.
///
/// Field names follow the stored CSV columns so existing datasets load as-is.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Seconds relative to broadcast start (negative = sent before start).
    #[serde(rename = "time_in_seconds")]
    pub timestamp_seconds: f64,
    #[serde(rename = "message")]
    pub text: String,
}

impl ChatMessage {
    pub fn new(timestamp_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            timestamp_seconds,
            text: text.into(),
        }
    }
}

/// Anything that can hand over a complete, time-ordered chat dataset.
#[async_trait::async_trait]
pub trait ChatSource: Send + Sync {
    async fn load(&self, dataset: &str) -> Result<Vec<ChatMessage>>;
    fn name(&self) -> &'static str;
}
