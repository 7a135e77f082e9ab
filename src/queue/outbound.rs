use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const OUTBOUND_MAX_CHARS: usize = 4000;
pub const OUTBOUND_TRUNCATE_KEEP_CHARS: usize = 3900;
pub const OUTBOUND_TRUNCATION_SUFFIX: &str = "\n\n[Response truncated...]";

/// Container-prefix → host-prefix pair reported by the sandbox runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub container_prefix: String,
    pub host_prefix: String,
}

impl PathMapping {
    pub fn same(dir: &str) -> Self {
        Self {
            container_prefix: dir.to_string(),
            host_prefix: dir.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundContent {
    pub message: String,
    pub files: Vec<String>,
    pub missing: Vec<String>,
}

/// Strips `[send_file: <path>]` tags, resolving each path through the
/// supplied mappings to an existing host file. Unresolved paths are
/// reported in a single trailing warning (first three shown). The result
/// is trimmed and capped at the outbound length limit.
pub fn prepare_outbound_content(raw_message: &str, mappings: &[PathMapping]) -> OutboundContent {
    let (stripped, files, missing) = strip_send_file_tags(raw_message, mappings);

    let mut message = stripped.trim().to_string();
    if !missing.is_empty() {
        let shown: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();
        message.push_str(&format!(
            "\n\n[Warning: file(s) not found: {}]",
            shown.join(", ")
        ));
    }

    OutboundContent {
        message: truncate_outbound_text(message.trim()),
        files,
        missing,
    }
}

fn strip_send_file_tags(
    message: &str,
    mappings: &[PathMapping],
) -> (String, Vec<String>, Vec<String>) {
    let mut output = String::with_capacity(message.len());
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel_start) = message[cursor..].find("[send_file:") {
        let tag_start = cursor + rel_start;
        output.push_str(&message[cursor..tag_start]);

        let content_start = tag_start + "[send_file:".len();
        if let Some(rel_end) = message[content_start..].find(']') {
            let tag_end = content_start + rel_end;
            let candidate = message[content_start..tag_end].trim();
            if !candidate.is_empty() {
                match resolve_host_path(candidate, mappings) {
                    Some(host_path) => {
                        if seen.insert(host_path.clone()) {
                            files.push(host_path);
                        }
                    }
                    None => missing.push(candidate.to_string()),
                }
            }
            cursor = tag_end + 1;
            continue;
        }

        output.push_str(&message[tag_start..]);
        cursor = message.len();
        break;
    }

    if cursor < message.len() {
        output.push_str(&message[cursor..]);
    }

    (output, files, missing)
}

/// A tag path resolves to the first existing host file among: the path
/// itself, then each mapping whose container prefix matches on a path
/// separator boundary.
fn resolve_host_path(path: &str, mappings: &[PathMapping]) -> Option<String> {
    if is_existing_file(path) {
        return Some(path.to_string());
    }

    for mapping in mappings {
        let prefix = mapping.container_prefix.trim_end_matches('/');
        let rest = if path == prefix {
            ""
        } else if let Some(rest) = path.strip_prefix(prefix) {
            if !rest.starts_with('/') {
                continue;
            }
            rest
        } else {
            continue;
        };

        let host_path = format!("{}{}", mapping.host_prefix.trim_end_matches('/'), rest);
        if is_existing_file(&host_path) {
            return Some(host_path);
        }
    }

    None
}

fn truncate_outbound_text(message: &str) -> String {
    if message.chars().count() <= OUTBOUND_MAX_CHARS {
        return message.to_string();
    }

    let mut truncated = String::new();
    truncated.extend(message.chars().take(OUTBOUND_TRUNCATE_KEEP_CHARS));
    truncated.push_str(OUTBOUND_TRUNCATION_SUFFIX);
    truncated
}

fn is_existing_file(path: &str) -> bool {
    if !Path::new(path).is_absolute() {
        return false;
    }
    fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
