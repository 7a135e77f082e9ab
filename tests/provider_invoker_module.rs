use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::tempdir;
use tinyclaw::config::SandboxConfig;
use tinyclaw::events::{EventKind, EventRecord, FileEventSink};
use tinyclaw::provider::{
    InvocationRequest, Invoker, ProviderKind, RunnerBinaries, TeamContext, TeammateInfo,
    NO_RESPONSE_FALLBACK,
};

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

fn read_events(events_dir: &Path) -> Vec<EventRecord> {
    let mut records = Vec::new();
    let Ok(entries) = fs::read_dir(events_dir) else {
        return records;
    };
    for entry in entries {
        let raw = fs::read_to_string(entry.expect("entry").path()).expect("read events");
        for line in raw.lines() {
            records.push(serde_json::from_str(line).expect("parse event"));
        }
    }
    records
}

fn request(agent_id: &str, provider: ProviderKind, workdir: &Path) -> InvocationRequest {
    InvocationRequest {
        agent_id: agent_id.to_string(),
        provider,
        model: "sonnet".to_string(),
        message: "hello".to_string(),
        working_dir: workdir.to_path_buf(),
        sandbox: SandboxConfig::default(),
        reset: false,
        team: None,
    }
}

#[test]
fn invoke_parses_claude_stdout_and_emits_events() {
    let tmp = tempdir().expect("tempdir");
    let script = tmp.path().join("claude.sh");
    write_script(&script, "#!/bin/sh\necho \"  Hi there!  \"\n");

    let binaries = RunnerBinaries {
        anthropic: script.display().to_string(),
        openai: "codex".to_string(),
    };
    let invoker = Invoker::new(binaries, 0);
    let events = FileEventSink::new(tmp.path().join("events"));
    let workdir = tmp.path().join("agent");

    let outcome = invoker
        .invoke(&request("default", ProviderKind::Anthropic, &workdir), &events)
        .expect("invoke");
    assert_eq!(outcome.response, "Hi there!");
    assert!(workdir.is_dir());

    let kinds: Vec<EventKind> = read_events(&tmp.path().join("events"))
        .into_iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SandboxInvocationStart,
            EventKind::SandboxInvocationEnd
        ]
    );
}

#[test]
fn invoke_parses_codex_ndjson_with_fallback() {
    let tmp = tempdir().expect("tempdir");
    let script = tmp.path().join("codex.sh");
    write_script(
        &script,
        concat!(
            "#!/bin/sh\n",
            "echo '{\"type\":\"item.completed\",\"item\":{\"type\":\"reasoning\",\"text\":\"hmm\"}}'\n",
            "echo '{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\",\"text\":\"the answer\"}}'\n",
        ),
    );

    let binaries = RunnerBinaries {
        anthropic: "claude".to_string(),
        openai: script.display().to_string(),
    };
    let invoker = Invoker::new(binaries, 0);
    let events = FileEventSink::new(tmp.path().join("events"));
    let workdir = tmp.path().join("agent");

    let outcome = invoker
        .invoke(&request("coder", ProviderKind::OpenAi, &workdir), &events)
        .expect("invoke");
    assert_eq!(outcome.response, "the answer");

    // Without an agent_message, the fixed fallback is the response.
    let silent = tmp.path().join("silent.sh");
    write_script(&silent, "#!/bin/sh\necho '{\"type\":\"turn.completed\"}'\n");
    let binaries = RunnerBinaries {
        anthropic: "claude".to_string(),
        openai: silent.display().to_string(),
    };
    let invoker = Invoker::new(binaries, 0);
    let outcome = invoker
        .invoke(&request("coder", ProviderKind::OpenAi, &workdir), &events)
        .expect("invoke");
    assert_eq!(outcome.response, NO_RESPONSE_FALLBACK);
}

#[test]
fn invoke_refreshes_teammates_metadata() {
    let tmp = tempdir().expect("tempdir");
    let script = tmp.path().join("claude.sh");
    write_script(&script, "#!/bin/sh\necho ok\n");

    let binaries = RunnerBinaries {
        anthropic: script.display().to_string(),
        openai: "codex".to_string(),
    };
    let invoker = Invoker::new(binaries, 0);
    let events = FileEventSink::new(tmp.path().join("events"));
    let workdir = tmp.path().join("lead");

    let mut req = request("lead", ProviderKind::Anthropic, &workdir);
    req.team = Some(TeamContext {
        team_id: "dev".to_string(),
        team_name: "Dev".to_string(),
        teammates: vec![TeammateInfo {
            id: "coder".to_string(),
            name: "Coder".to_string(),
        }],
    });
    invoker.invoke(&req, &events).expect("invoke");

    let raw = fs::read_to_string(workdir.join("teammates.json")).expect("teammates file");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("parse teammates");
    assert_eq!(value["team"], "dev");
    assert_eq!(value["teammates"][0]["id"], "coder");
}

#[test]
fn invocation_error_emits_error_event() {
    let tmp = tempdir().expect("tempdir");
    let binaries = RunnerBinaries {
        anthropic: "/nonexistent/claude-binary".to_string(),
        openai: "codex".to_string(),
    };
    let invoker = Invoker::new(binaries, 0);
    let events_dir = tmp.path().join("events");
    let events = FileEventSink::new(&events_dir);
    let workdir = tmp.path().join("agent");

    let err = invoker
        .invoke(&request("default", ProviderKind::Anthropic, &workdir), &events)
        .expect_err("must fail");
    assert_eq!(err.classification().as_str(), "transient");

    let kinds: Vec<EventKind> = read_events(&events_dir)
        .into_iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SandboxInvocationStart,
            EventKind::SandboxInvocationError
        ]
    );
}
