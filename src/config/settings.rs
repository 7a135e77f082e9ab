use super::ConfigError;
use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    Host,
    Docker,
    Apple,
}

impl SandboxMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Docker => "docker",
            Self::Apple => "apple",
        }
    }

    pub fn is_container(self) -> bool {
        !matches!(self, Self::Host)
    }
}

impl std::fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathMappingMode {
    Mapped,
    SamePath,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    #[serde(default)]
    pub teams: BTreeMap<String, TeamConfig>,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_anthropic_model")]
    pub anthropic: ModelDefault,
    #[serde(default = "default_openai_model")]
    pub openai: ModelDefault,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            anthropic: default_anthropic_model(),
            openai: default_openai_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelDefault {
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub name: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    pub working_directory: PathBuf,
    #[serde(default)]
    pub sandbox_mode: Option<SandboxMode>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamConfig {
    pub name: String,
    pub agents: Vec<String>,
    pub leader_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_mode")]
    pub mode: SandboxMode,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub max_concurrency: usize,
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
    #[serde(default = "default_path_mapping_mode")]
    pub path_mapping_mode: PathMappingMode,
    #[serde(default)]
    pub docker: DockerSandboxConfig,
    #[serde(default)]
    pub apple: AppleSandboxConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: default_sandbox_mode(),
            timeout_seconds: default_timeout_seconds(),
            max_attempts: default_max_attempts(),
            max_concurrency: 0,
            env_allowlist: default_env_allowlist(),
            path_mapping_mode: default_path_mapping_mode(),
            docker: DockerSandboxConfig::default(),
            apple: AppleSandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DockerSandboxConfig {
    #[serde(default = "default_sandbox_image")]
    pub image: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_cpus")]
    pub cpus: String,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: u32,
}

impl Default for DockerSandboxConfig {
    fn default() -> Self {
        Self {
            image: default_sandbox_image(),
            network: default_network(),
            memory: default_memory(),
            cpus: default_cpus(),
            pids_limit: default_pids_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppleSandboxConfig {
    #[serde(default = "default_sandbox_image")]
    pub image: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_cpus")]
    pub cpus: String,
    #[serde(default = "default_apple_runtime")]
    pub runtime_command: String,
}

impl Default for AppleSandboxConfig {
    fn default() -> Self {
        Self {
            image: default_sandbox_image(),
            network: default_network(),
            memory: default_memory(),
            cpus: default_cpus(),
            runtime_command: default_apple_runtime(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Anthropic
}

fn default_anthropic_model() -> ModelDefault {
    ModelDefault {
        model: "sonnet".to_string(),
    }
}

fn default_openai_model() -> ModelDefault {
    ModelDefault {
        model: "gpt-5-codex".to_string(),
    }
}

fn default_sandbox_mode() -> SandboxMode {
    SandboxMode::Host
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_env_allowlist() -> Vec<String> {
    vec![
        "ANTHROPIC_API_KEY".to_string(),
        "OPENAI_API_KEY".to_string(),
    ]
}

fn default_path_mapping_mode() -> PathMappingMode {
    PathMappingMode::Mapped
}

fn default_sandbox_image() -> String {
    "tinyclaw-sandbox:latest".to_string()
}

fn default_network() -> String {
    "default".to_string()
}

fn default_memory() -> String {
    "2g".to_string()
}

fn default_cpus() -> String {
    "2".to_string()
}

fn default_pids_limit() -> u32 {
    256
}

fn default_apple_runtime() -> String {
    "container".to_string()
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.workspace.path.as_os_str().is_empty() && !self.workspace.path.is_absolute() {
            return Err(ConfigError::Settings(
                "`workspace.path` must be an absolute path".to_string(),
            ));
        }

        if self.sandbox.timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "`sandbox.timeout_seconds` must be > 0".to_string(),
            ));
        }
        if self.sandbox.max_attempts == 0 {
            return Err(ConfigError::Settings(
                "`sandbox.max_attempts` must be >= 1".to_string(),
            ));
        }

        for (agent_id, agent) in &self.agents {
            validate_identifier("agent id", agent_id).map_err(ConfigError::Settings)?;
            if agent.name.trim().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "agent `{agent_id}` requires a non-empty `name`"
                )));
            }
            if agent.working_directory.as_os_str().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "agent `{agent_id}` requires a `working_directory`"
                )));
            }
        }

        for (team_id, team) in &self.teams {
            validate_identifier("team id", team_id).map_err(ConfigError::Settings)?;
            if team.agents.is_empty() {
                return Err(ConfigError::Settings(format!(
                    "team `{team_id}` must list at least one agent"
                )));
            }
            for member in &team.agents {
                if !self.agents.contains_key(member) {
                    return Err(ConfigError::Settings(format!(
                        "team `{team_id}` references unknown agent `{member}`"
                    )));
                }
            }
            if !team.agents.contains(&team.leader_agent) {
                return Err(ConfigError::Settings(format!(
                    "team `{team_id}` leader `{}` must be one of its agents",
                    team.leader_agent
                )));
            }
        }

        Ok(())
    }

    /// Agent working directories may be absolute or workspace-relative.
    pub fn resolve_working_directory(&self, agent: &AgentConfig) -> PathBuf {
        if agent.working_directory.is_absolute() {
            agent.working_directory.clone()
        } else {
            self.workspace.path.join(&agent.working_directory)
        }
    }

    pub fn resolve_model(&self, agent: &AgentConfig) -> String {
        if let Some(model) = agent.model.as_ref().filter(|m| !m.trim().is_empty()) {
            return model.trim().to_string();
        }
        match agent.provider {
            ProviderKind::Anthropic => self.models.anthropic.model.clone(),
            ProviderKind::OpenAi => self.models.openai.model.clone(),
        }
    }

    /// Normalized sandbox view for one agent: the global config with the
    /// per-agent mode override applied.
    pub fn sandbox_for_agent(&self, agent: &AgentConfig) -> SandboxConfig {
        let mut sandbox = self.sandbox.clone();
        if let Some(mode) = agent.sandbox_mode {
            sandbox.mode = mode;
        }
        sandbox
    }

    pub fn agent(&self, agent_id: &str) -> Result<&AgentConfig, ConfigError> {
        self.agents.get(agent_id).ok_or_else(|| ConfigError::MissingAgent {
            agent_id: agent_id.to_string(),
        })
    }
}

fn validate_identifier(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}
