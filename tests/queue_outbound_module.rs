use std::fs;
use tempfile::tempdir;
use tinyclaw::queue::{
    prepare_outbound_content, PathMapping, OUTBOUND_TRUNCATE_KEEP_CHARS,
    OUTBOUND_TRUNCATION_SUFFIX,
};

#[test]
fn host_paths_resolve_as_is() {
    let tmp = tempdir().expect("tempdir");
    let artifact = tmp.path().join("out.png");
    fs::write(&artifact, "x").expect("write artifact");

    let raw = format!("result: [send_file: {}]", artifact.display());
    let content = prepare_outbound_content(&raw, &[]);
    assert_eq!(content.message, "result:");
    assert_eq!(content.files, vec![artifact.display().to_string()]);
    assert!(content.missing.is_empty());
}

#[test]
fn container_paths_rewrite_through_mappings() {
    let tmp = tempdir().expect("tempdir");
    let artifact = tmp.path().join("out.png");
    fs::write(&artifact, "x").expect("write artifact");

    let mappings = vec![PathMapping {
        container_prefix: "/workspace".to_string(),
        host_prefix: tmp.path().display().to_string(),
    }];
    let content = prepare_outbound_content("result: [send_file: /workspace/out.png]", &mappings);
    assert_eq!(content.message, "result:");
    assert_eq!(content.files, vec![artifact.display().to_string()]);
    assert!(content.missing.is_empty());
}

#[test]
fn mapping_requires_separator_boundary() {
    let tmp = tempdir().expect("tempdir");
    let artifact = tmp.path().join("out.png");
    fs::write(&artifact, "x").expect("write artifact");

    // `/workspaces` must not match the `/workspace` prefix.
    let mappings = vec![PathMapping {
        container_prefix: "/workspace".to_string(),
        host_prefix: tmp.path().display().to_string(),
    }];
    let content = prepare_outbound_content("[send_file: /workspaces/out.png]", &mappings);
    assert!(content.files.is_empty());
    assert_eq!(content.missing, vec!["/workspaces/out.png".to_string()]);
}

#[test]
fn missing_paths_are_stripped_and_warned_up_to_three() {
    let content = prepare_outbound_content(
        "done [send_file: /gone/a] [send_file: /gone/b] [send_file: /gone/c] [send_file: /gone/d]",
        &[],
    );
    assert!(content.files.is_empty());
    assert_eq!(content.missing.len(), 4);
    assert!(!content.message.contains("[send_file:"));
    assert!(content
        .message
        .ends_with("[Warning: file(s) not found: /gone/a, /gone/b, /gone/c]"));
    assert!(!content.message.contains("/gone/d"));
}

#[test]
fn duplicate_tags_resolve_once() {
    let tmp = tempdir().expect("tempdir");
    let artifact = tmp.path().join("out.png");
    fs::write(&artifact, "x").expect("write artifact");

    let mappings = vec![PathMapping {
        container_prefix: "/workspace".to_string(),
        host_prefix: tmp.path().display().to_string(),
    }];
    let raw = format!(
        "[send_file: {}] and [send_file: /workspace/out.png]",
        artifact.display()
    );
    let content = prepare_outbound_content(&raw, &mappings);
    assert_eq!(content.files, vec![artifact.display().to_string()]);
}

#[test]
fn long_responses_truncate_after_tag_stripping() {
    let long = "a".repeat(4100);
    let content = prepare_outbound_content(&long, &[]);
    assert_eq!(
        content.message.chars().count(),
        OUTBOUND_TRUNCATE_KEEP_CHARS + OUTBOUND_TRUNCATION_SUFFIX.chars().count()
    );
    assert!(content.message.ends_with(OUTBOUND_TRUNCATION_SUFFIX));

    let short = prepare_outbound_content("short reply", &[]);
    assert_eq!(short.message, "short reply");
}

#[test]
fn unterminated_tag_is_left_verbatim() {
    let content = prepare_outbound_content("oops [send_file: /tmp/never-closed", &[]);
    assert_eq!(content.message, "oops [send_file: /tmp/never-closed");
    assert!(content.files.is_empty());
    assert!(content.missing.is_empty());
}
