use crate::provider::ProviderKind;

/// Maps friendly model names to canonical ids. Unknown names pass
/// through unchanged so new models work without a code change.
pub fn resolve_model_id(provider: ProviderKind, model: &str) -> String {
    let trimmed = model.trim();
    if provider != ProviderKind::Anthropic {
        return trimmed.to_string();
    }
    match trimmed {
        "sonnet" => "claude-sonnet-4-5".to_string(),
        "opus" => "claude-opus-4-6".to_string(),
        "haiku" => "claude-haiku-4-5".to_string(),
        other => other.to_string(),
    }
}
