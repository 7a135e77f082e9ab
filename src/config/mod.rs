pub mod paths;
pub mod settings;

pub use paths::{default_state_root_path, settings_file_path, DEFAULT_STATE_DIR, SETTINGS_FILE_NAME};
pub use settings::{
    AgentConfig, AppleSandboxConfig, ChannelsConfig, DockerSandboxConfig, ModelDefault,
    ModelsConfig, PathMappingMode, SandboxConfig, SandboxMode, Settings, TeamConfig,
    WorkspaceConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("unknown agent `{agent_id}`")]
    MissingAgent { agent_id: String },
}
