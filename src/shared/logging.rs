use crate::shared::redact::redact_secrets;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn queue_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/queue.log")
}

/// Appends one redacted, timestamped line to `logs/queue.log`. Logging
/// must never fail the pipeline, so errors are swallowed by callers.
pub fn append_queue_log_line(state_root: &Path, level: &str, line: &str) -> std::io::Result<()> {
    let path = queue_log_path(state_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    let at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    writeln!(file, "{at} [{level}] {}", redact_secrets(line))
}
