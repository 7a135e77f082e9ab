use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use tinyclaw::config::{PathMappingMode, SandboxMode, Settings};
use tinyclaw::provider::ProviderKind;

fn full_settings_json(workspace: &str) -> String {
    format!(
        r#"{{
  "workspace": {{ "path": "{workspace}" }},
  "channels": {{ "enabled": ["telegram", "whatsapp"] }},
  "models": {{
    "provider": "anthropic",
    "anthropic": {{ "model": "sonnet" }},
    "openai": {{ "model": "gpt-5-codex" }}
  }},
  "agents": {{
    "default": {{
      "name": "Default",
      "provider": "anthropic",
      "working_directory": "default"
    }},
    "coder": {{
      "name": "Coder",
      "provider": "openai",
      "model": "gpt-5-codex",
      "working_directory": "/abs/coder",
      "sandbox_mode": "docker"
    }}
  }},
  "teams": {{
    "dev": {{
      "name": "Dev",
      "agents": ["default", "coder"],
      "leader_agent": "default"
    }}
  }},
  "sandbox": {{
    "mode": "host",
    "timeout_seconds": 120,
    "max_concurrency": 2,
    "path_mapping_mode": "same-path",
    "docker": {{ "image": "agents:latest" }}
  }}
}}"#
    )
}

#[test]
fn settings_round_trip_with_defaults_merged() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, full_settings_json("/abs/workspace")).expect("write settings");

    let settings = Settings::from_path(&path).expect("load settings");
    assert_eq!(settings.channels.enabled, vec!["telegram", "whatsapp"]);
    assert_eq!(settings.sandbox.timeout_seconds, 120);
    assert_eq!(settings.sandbox.max_concurrency, 2);
    assert_eq!(settings.sandbox.path_mapping_mode, PathMappingMode::SamePath);

    // Omitted sandbox keys fall back to merged defaults.
    assert_eq!(settings.sandbox.max_attempts, 3);
    assert_eq!(
        settings.sandbox.env_allowlist,
        vec!["ANTHROPIC_API_KEY", "OPENAI_API_KEY"]
    );
    assert_eq!(settings.sandbox.docker.image, "agents:latest");
    assert_eq!(settings.sandbox.docker.network, "default");
    assert_eq!(settings.sandbox.apple.runtime_command, "container");
}

#[test]
fn empty_document_gets_full_defaults() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, "{}").expect("write settings");

    let settings = Settings::from_path(&path).expect("load settings");
    assert_eq!(settings.sandbox.mode, SandboxMode::Host);
    assert_eq!(settings.sandbox.timeout_seconds, 600);
    assert_eq!(settings.sandbox.max_concurrency, 0);
    assert_eq!(settings.sandbox.path_mapping_mode, PathMappingMode::Mapped);
    assert_eq!(settings.models.provider, ProviderKind::Anthropic);
    assert!(settings.agents.is_empty());
}

#[test]
fn working_directory_resolves_workspace_relative() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, full_settings_json("/abs/workspace")).expect("write settings");
    let settings = Settings::from_path(&path).expect("load settings");

    let default_agent = settings.agent("default").expect("default agent");
    assert_eq!(
        settings.resolve_working_directory(default_agent),
        PathBuf::from("/abs/workspace/default")
    );

    let coder = settings.agent("coder").expect("coder agent");
    assert_eq!(
        settings.resolve_working_directory(coder),
        PathBuf::from("/abs/coder")
    );
}

#[test]
fn agent_model_falls_back_to_provider_default() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, full_settings_json("/abs/workspace")).expect("write settings");
    let settings = Settings::from_path(&path).expect("load settings");

    let default_agent = settings.agent("default").expect("default agent");
    assert_eq!(settings.resolve_model(default_agent), "sonnet");

    let coder = settings.agent("coder").expect("coder agent");
    assert_eq!(settings.resolve_model(coder), "gpt-5-codex");
}

#[test]
fn per_agent_sandbox_mode_overrides_global() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("settings.json");
    fs::write(&path, full_settings_json("/abs/workspace")).expect("write settings");
    let settings = Settings::from_path(&path).expect("load settings");

    let default_agent = settings.agent("default").expect("default agent");
    assert_eq!(settings.sandbox_for_agent(default_agent).mode, SandboxMode::Host);

    let coder = settings.agent("coder").expect("coder agent");
    let sandbox = settings.sandbox_for_agent(coder);
    assert_eq!(sandbox.mode, SandboxMode::Docker);
    // Everything else keeps the global values.
    assert_eq!(sandbox.timeout_seconds, 120);
}

#[test]
fn validation_rejects_bad_team_references() {
    let base = serde_json::json!({
        "workspace": { "path": "/abs/workspace" },
        "agents": {
            "solo": {
                "name": "Solo",
                "provider": "anthropic",
                "working_directory": "solo"
            }
        },
        "teams": {
            "broken": {
                "name": "Broken",
                "agents": ["solo", "ghost"],
                "leader_agent": "solo"
            }
        }
    });
    let settings: Settings = serde_json::from_value(base).expect("parse settings");
    let err = settings.validate().expect_err("unknown member should fail");
    assert!(err.to_string().contains("unknown agent `ghost`"));

    let base = serde_json::json!({
        "agents": {
            "solo": {
                "name": "Solo",
                "provider": "anthropic",
                "working_directory": "/abs/solo"
            },
            "other": {
                "name": "Other",
                "provider": "anthropic",
                "working_directory": "/abs/other"
            }
        },
        "teams": {
            "broken": {
                "name": "Broken",
                "agents": ["solo"],
                "leader_agent": "other"
            }
        }
    });
    let settings: Settings = serde_json::from_value(base).expect("parse settings");
    let err = settings.validate().expect_err("outside leader should fail");
    assert!(err.to_string().contains("leader"));
}

#[test]
fn validation_rejects_relative_workspace_and_zero_limits() {
    let settings: Settings = serde_json::from_value(serde_json::json!({
        "workspace": { "path": "relative/workspace" }
    }))
    .expect("parse settings");
    assert!(settings.validate().is_err());

    let settings: Settings = serde_json::from_value(serde_json::json!({
        "sandbox": { "timeout_seconds": 0 }
    }))
    .expect("parse settings");
    assert!(settings.validate().is_err());

    let settings: Settings = serde_json::from_value(serde_json::json!({
        "sandbox": { "max_attempts": 0 }
    }))
    .expect("parse settings");
    assert!(settings.validate().is_err());
}

#[test]
fn unknown_provider_fails_at_parse() {
    let err = serde_json::from_value::<Settings>(serde_json::json!({
        "agents": {
            "x": {
                "name": "X",
                "provider": "mystery",
                "working_directory": "/abs/x"
            }
        }
    }))
    .expect_err("unknown provider should fail");
    assert!(err.to_string().contains("mystery") || err.to_string().contains("variant"));
}
