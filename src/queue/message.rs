use serde::{Deserialize, Serialize};

pub const ERROR_CLASS_TERMINAL: &str = "terminal";
pub const ERROR_CLASS_TRANSIENT: &str = "transient";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub channel: String,
    pub sender: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    pub message_id: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default)]
    pub first_seen_at: Option<i64>,
    #[serde(default)]
    pub error_class: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub channel: String,
    pub sender: String,
    pub message_id: String,
    pub message: String,
    pub original_message: String,
    pub timestamp: i64,
    pub agent: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Durable record of a message that failed terminally or exhausted its
/// retries. Never deleted automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub failed_at: String,
    pub error_class: String,
    pub error_message: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub payload: IncomingMessage,
}
