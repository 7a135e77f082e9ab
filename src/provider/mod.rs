pub mod invocation;
pub mod invoke;
pub mod model_map;
pub mod output_parse;

pub use invocation::{build_invocation, InvocationSpec};
pub use invoke::{
    InvocationOutcome, InvocationRequest, Invoker, TeamContext, TeammateInfo,
};
pub use model_map::resolve_model_id;
pub use output_parse::{parse_anthropic_output, parse_openai_output, NO_RESPONSE_FALLBACK};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn required_env_key(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl TryFrom<&str> for ProviderKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerBinaries {
    pub anthropic: String,
    pub openai: String,
}

impl Default for RunnerBinaries {
    fn default() -> Self {
        Self {
            anthropic: "claude".to_string(),
            openai: "codex".to_string(),
        }
    }
}

impl RunnerBinaries {
    /// Binary overrides let tests substitute stub executables.
    pub fn from_env() -> Self {
        Self {
            anthropic: std::env::var("TINYCLAW_PROVIDER_BIN_ANTHROPIC")
                .unwrap_or_else(|_| "claude".to_string()),
            openai: std::env::var("TINYCLAW_PROVIDER_BIN_OPENAI")
                .unwrap_or_else(|_| "codex".to_string()),
        }
    }

    pub fn for_provider(&self, provider: ProviderKind) -> &str {
        match provider {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::OpenAi => &self.openai,
        }
    }
}
