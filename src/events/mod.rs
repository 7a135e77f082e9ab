use crate::shared::redact::redact_secrets;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProcessorStart,
    MessageReceived,
    AgentRouted,
    TeamChainStart,
    ChainStepStart,
    ChainStepDone,
    ChainHandoff,
    TeamChainEnd,
    SandboxInvocationStart,
    SandboxInvocationEnd,
    SandboxInvocationError,
    ResponseReady,
}

pub type EventFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: i64,
    pub kind: EventKind,
    #[serde(default)]
    pub fields: EventFields,
}

/// Append-only observability sink. Emission must never fail the
/// pipeline, so implementations swallow their own I/O errors.
pub trait EventSink: Send + Sync {
    fn emit(&self, kind: EventKind, fields: EventFields);
}

/// One JSONL file per UTC day under `events/`, one record per line.
#[derive(Debug, Clone)]
pub struct FileEventSink {
    events_dir: PathBuf,
}

impl FileEventSink {
    pub fn new(events_dir: impl Into<PathBuf>) -> Self {
        Self {
            events_dir: events_dir.into(),
        }
    }
}

impl EventSink for FileEventSink {
    fn emit(&self, kind: EventKind, fields: EventFields) {
        let record = EventRecord {
            at: chrono::Utc::now().timestamp_millis(),
            kind,
            fields: sanitize_fields(fields),
        };
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let file_name = format!("{}.jsonl", chrono::Utc::now().format("%Y-%m-%d"));
        let path = self.events_dir.join(file_name);
        let _ = fs::create_dir_all(&self.events_dir);
        if let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) {
            let _ = writeln!(file, "{line}");
        }
    }
}

fn sanitize_fields(fields: EventFields) -> EventFields {
    fields
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => Value::String(redact_secrets(&text)),
                other => other,
            };
            (key, value)
        })
        .collect()
}

pub fn field(key: &str, value: impl Into<Value>) -> (String, Value) {
    (key.to_string(), value.into())
}
