use std::path::{Path, PathBuf};

pub const HEARTBEAT_CHANNEL: &str = "heartbeat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePaths {
    pub incoming: PathBuf,
    pub processing: PathBuf,
    pub outgoing: PathBuf,
    pub dead_letter: PathBuf,
}

impl QueuePaths {
    pub fn from_state_root(state_root: &Path) -> Self {
        Self {
            incoming: state_root.join("queue/incoming"),
            processing: state_root.join("queue/processing"),
            outgoing: state_root.join("queue/outgoing"),
            dead_letter: state_root.join("queue/dead-letter"),
        }
    }

    pub fn state_root(&self) -> Option<&Path> {
        self.incoming.parent().and_then(Path::parent)
    }
}

pub fn outgoing_filename(channel: &str, message_id: &str, timestamp: i64) -> String {
    if channel == HEARTBEAT_CHANNEL {
        format!("{}.json", sanitize_filename_component(message_id))
    } else {
        format!(
            "{}_{}_{}.json",
            sanitize_filename_component(channel),
            sanitize_filename_component(message_id),
            timestamp
        )
    }
}

pub fn dead_letter_filename(processing_name: &str, timestamp: i64) -> String {
    let base = Path::new(processing_name)
        .file_stem()
        .and_then(|v| v.to_str())
        .unwrap_or("message");
    format!("{}_{}.json", sanitize_filename_component(base), timestamp)
}

pub fn is_valid_queue_json_filename(filename: &str) -> bool {
    let path = Path::new(filename);
    if path.extension().and_then(|v| v.to_str()) != Some("json") {
        return false;
    }

    if let Some(stem) = path.file_stem().and_then(|v| v.to_str()) {
        return !stem.trim().is_empty();
    }

    false
}

fn sanitize_filename_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
