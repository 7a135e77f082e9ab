const SECRET_ENV_KEYS: [&str; 2] = ["ANTHROPIC_API_KEY", "OPENAI_API_KEY"];

/// Rewrites `KEY=value` occurrences of known secret keys to `KEY=[REDACTED]`.
/// Applied to every string before it reaches a log line, event record,
/// dead-letter envelope, or outgoing response.
pub fn redact_secrets(text: &str) -> String {
    let mut redacted = text.to_string();
    for key in SECRET_ENV_KEYS {
        let marker = format!("{key}=");
        let mut cursor = 0usize;
        let mut output = String::with_capacity(redacted.len());
        while let Some(rel_start) = redacted[cursor..].find(&marker) {
            let value_start = cursor + rel_start + marker.len();
            output.push_str(&redacted[cursor..value_start]);
            output.push_str("[REDACTED]");
            let value_end = redacted[value_start..]
                .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
                .map(|rel| value_start + rel)
                .unwrap_or(redacted.len());
            cursor = value_end;
        }
        output.push_str(&redacted[cursor..]);
        redacted = output;
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::redact_secrets;

    #[test]
    fn redacts_known_key_values() {
        let line = "spawn failed: ANTHROPIC_API_KEY=sk-ant-123 OPENAI_API_KEY=sk-oai-9";
        assert_eq!(
            redact_secrets(line),
            "spawn failed: ANTHROPIC_API_KEY=[REDACTED] OPENAI_API_KEY=[REDACTED]"
        );
    }

    #[test]
    fn leaves_other_text_alone() {
        let line = "docker exited with code 125";
        assert_eq!(redact_secrets(line), line);
    }

    #[test]
    fn stops_value_at_quotes_and_separators() {
        let line = "env \"OPENAI_API_KEY=abc\",next";
        assert_eq!(redact_secrets(line), "env \"OPENAI_API_KEY=[REDACTED]\",next");
    }
}
