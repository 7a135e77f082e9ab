use super::{
    dead_letter_filename, file_tags, is_valid_queue_json_filename, outgoing_filename,
    DeadLetterRecord, IncomingMessage, OutgoingMessage, QueueError, QueuePaths,
};
use crate::shared::{append_queue_log_line, atomic_write_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct ClaimedMessage {
    pub name: String,
    pub processing_path: PathBuf,
    pub payload: IncomingMessage,
}

/// Filenames of valid queue entries in `incoming`, oldest mtime first.
pub fn list_incoming(paths: &QueuePaths) -> Result<Vec<String>, QueueError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(&paths.incoming).map_err(|e| io_err(&paths.incoming, e))? {
        let entry = entry.map_err(|e| io_err(&paths.incoming, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !is_valid_queue_json_filename(&name) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| io_err(&path, e))?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((modified, name));
    }

    entries.sort_by(|(a_time, a_name), (b_time, b_name)| {
        a_time.cmp(b_time).then_with(|| a_name.cmp(b_name))
    });

    Ok(entries.into_iter().map(|(_, name)| name).collect())
}

/// Reads an incoming payload without claiming it. `None` when the file is
/// already gone (claimed by the worker, or consumed elsewhere).
pub fn peek_incoming(
    paths: &QueuePaths,
    name: &str,
) -> Result<Option<IncomingMessage>, QueueError> {
    let path = paths.incoming.join(name);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&path, err)),
    };
    let payload = serde_json::from_str(&raw).map_err(|e| parse_err(&path, e))?;
    Ok(Some(payload))
}

/// Atomically moves `incoming/name` to `processing/name` and parses the
/// payload. `None` when the file is no longer in `incoming`. An unreadable
/// payload is moved back before the error is returned, so the entry is
/// retried on a later tick.
pub fn claim(paths: &QueuePaths, name: &str) -> Result<Option<ClaimedMessage>, QueueError> {
    let incoming_path = paths.incoming.join(name);
    let processing_path = paths.processing.join(name);

    match fs::rename(&incoming_path, &processing_path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(&incoming_path, err)),
    }

    let raw = match fs::read_to_string(&processing_path) {
        Ok(raw) => raw,
        Err(err) => {
            let _ = fs::rename(&processing_path, &incoming_path);
            return Err(io_err(&processing_path, err));
        }
    };
    let mut payload: IncomingMessage = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(err) => {
            let _ = fs::rename(&processing_path, &incoming_path);
            return Err(parse_err(&processing_path, err));
        }
    };

    file_tags::normalize_inbound_payload(&mut payload);
    if payload.first_seen_at.is_none() {
        payload.first_seen_at = Some(chrono::Utc::now().timestamp_millis());
    }

    log_transition(paths, &format!("claimed {name}"));
    Ok(Some(ClaimedMessage {
        name: name.to_string(),
        processing_path,
        payload,
    }))
}

pub fn complete(paths: &QueuePaths, claimed: &ClaimedMessage) -> Result<(), QueueError> {
    fs::remove_file(&claimed.processing_path)
        .map_err(|e| io_err(&claimed.processing_path, e))?;
    log_transition(paths, &format!("completed {}", claimed.name));
    Ok(())
}

/// Rewrites the processing file with the updated payload (incremented
/// attempt, error class) and moves it back to `incoming` under the same
/// name.
pub fn requeue(
    paths: &QueuePaths,
    claimed: &ClaimedMessage,
    updated: &IncomingMessage,
) -> Result<PathBuf, QueueError> {
    let body = serde_json::to_vec_pretty(updated)
        .map_err(|e| parse_err(&claimed.processing_path, e))?;
    atomic_write_file(&claimed.processing_path, &body)
        .map_err(|e| io_err(&claimed.processing_path, e))?;

    let incoming_path = paths.incoming.join(&claimed.name);
    fs::rename(&claimed.processing_path, &incoming_path)
        .map_err(|e| io_err(&claimed.processing_path, e))?;
    log_transition(
        paths,
        &format!("requeued {} attempt={}", claimed.name, updated.attempt),
    );
    Ok(incoming_path)
}

pub fn dead_letter(
    paths: &QueuePaths,
    claimed: &ClaimedMessage,
    record: &DeadLetterRecord,
) -> Result<PathBuf, QueueError> {
    fs::create_dir_all(&paths.dead_letter).map_err(|e| io_err(&paths.dead_letter, e))?;
    let file_name = dead_letter_filename(&claimed.name, chrono::Utc::now().timestamp_millis());
    let dead_path = paths.dead_letter.join(file_name);
    let body = serde_json::to_vec_pretty(record).map_err(|e| parse_err(&dead_path, e))?;
    atomic_write_file(&dead_path, &body).map_err(|e| io_err(&dead_path, e))?;
    fs::remove_file(&claimed.processing_path)
        .map_err(|e| io_err(&claimed.processing_path, e))?;
    log_transition(
        paths,
        &format!(
            "dead-lettered {} class={} attempt={}",
            claimed.name, record.error_class, record.attempt
        ),
    );
    Ok(dead_path)
}

/// Writes a response into `outgoing`. Attachment paths are filtered to
/// absolute files that exist at write time, deduplicated.
pub fn write_outgoing(
    paths: &QueuePaths,
    outgoing: &OutgoingMessage,
) -> Result<PathBuf, QueueError> {
    let mut normalized = outgoing.clone();
    normalized.files = file_tags::existing_absolute_files(&outgoing.files);

    let filename = outgoing_filename(
        &normalized.channel,
        &normalized.message_id,
        normalized.timestamp,
    );
    let out_path = paths.outgoing.join(filename);
    let body = serde_json::to_vec_pretty(&normalized).map_err(|e| parse_err(&out_path, e))?;
    atomic_write_file(&out_path, &body).map_err(|e| io_err(&out_path, e))?;
    log_transition(
        paths,
        &format!("wrote outgoing response for {}", normalized.message_id),
    );
    Ok(out_path)
}

fn log_transition(paths: &QueuePaths, line: &str) {
    if let Some(root) = paths.state_root() {
        let _ = append_queue_log_line(root, "info", line);
    }
}

fn io_err(path: &Path, source: std::io::Error) -> QueueError {
    QueueError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn parse_err(path: &Path, source: serde_json::Error) -> QueueError {
    QueueError::Parse {
        path: path.display().to_string(),
        source,
    }
}
