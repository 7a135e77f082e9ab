use crate::provider::{resolve_model_id, ProviderKind, RunnerBinaries};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    pub binary: String,
    pub args: Vec<String>,
    pub resolved_model: String,
}

/// Builds the provider argv. `reset` drops the continue/resume flag so
/// the provider starts a fresh conversation.
pub fn build_invocation(
    provider: ProviderKind,
    binaries: &RunnerBinaries,
    model: &str,
    message: &str,
    reset: bool,
) -> InvocationSpec {
    let resolved_model = resolve_model_id(provider, model);
    match provider {
        ProviderKind::Anthropic => {
            let mut args = vec!["--dangerously-skip-permissions".to_string()];
            if !resolved_model.is_empty() {
                args.push("--model".to_string());
                args.push(resolved_model.clone());
            }
            if !reset {
                args.push("-c".to_string());
            }
            args.push("-p".to_string());
            args.push(message.to_string());
            InvocationSpec {
                binary: binaries.anthropic.clone(),
                args,
                resolved_model,
            }
        }
        ProviderKind::OpenAi => {
            let mut args = vec!["exec".to_string()];
            if !reset {
                args.push("resume".to_string());
                args.push("--last".to_string());
            }
            if !resolved_model.is_empty() {
                args.push("--model".to_string());
                args.push(resolved_model.clone());
            }
            args.push("--skip-git-repo-check".to_string());
            args.push("--dangerously-bypass-approvals-and-sandbox".to_string());
            args.push("--json".to_string());
            args.push(message.to_string());
            InvocationSpec {
                binary: binaries.openai.clone(),
                args,
                resolved_model,
            }
        }
    }
}
