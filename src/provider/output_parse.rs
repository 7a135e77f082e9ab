use serde_json::Value;

pub const NO_RESPONSE_FALLBACK: &str = "No response received from the agent.";

pub fn parse_anthropic_output(stdout: &str) -> String {
    stdout.trim().to_string()
}

/// Codex emits NDJSON; the answer is the last `item.completed` event
/// whose item is an `agent_message`. Unparseable lines are skipped.
pub fn parse_openai_output(stdout: &str) -> String {
    let mut last_message = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) != Some("item.completed") {
            continue;
        }
        let Some(item) = value.get("item") else {
            continue;
        };
        if item.get("type").and_then(Value::as_str) != Some("agent_message") {
            continue;
        }
        if let Some(message) = extract_agent_message(item) {
            last_message = Some(message);
        }
    }

    last_message.unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string())
}

fn extract_agent_message(item: &Value) -> Option<String> {
    if let Some(text) = item.get("text").and_then(Value::as_str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(message) = item.get("message").and_then(Value::as_str) {
        let trimmed = message.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(content) = item.get("content") {
        if let Some(content_string) = content.as_str() {
            let trimmed = content_string.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }

        if let Some(arr) = content.as_array() {
            let mut lines = Vec::new();
            for entry in arr {
                if let Some(text) = entry.get("text").and_then(Value::as_str) {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        lines.push(trimmed.to_string());
                    }
                }
            }
            if !lines.is_empty() {
                return Some(lines.join("\n"));
            }
        }
    }

    None
}
