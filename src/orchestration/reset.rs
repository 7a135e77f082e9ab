use std::fs;
use std::path::Path;

pub const GLOBAL_RESET_FLAG: &str = "reset_flag";
pub const AGENT_RESET_FILE: &str = ".tinyclaw-reset";

/// Resolves whether the next invocation should start a fresh provider
/// conversation, consuming any flag files that were present. Only the
/// first step of a chain honors the global flag; later steps pass
/// `honor_global = false` and see just their own per-agent flag.
pub fn resolve_reset(state_root: &Path, agent_working_dir: &Path, honor_global: bool) -> bool {
    let mut reset = false;

    if honor_global {
        let global = state_root.join(GLOBAL_RESET_FLAG);
        if global.exists() {
            let _ = fs::remove_file(&global);
            reset = true;
        }
    }

    let per_agent = agent_working_dir.join(AGENT_RESET_FILE);
    if per_agent.exists() {
        let _ = fs::remove_file(&per_agent);
        reset = true;
    }

    reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn consumes_global_and_per_agent_flags() {
        let root = tempdir().expect("root");
        let workdir = tempdir().expect("workdir");

        assert!(!resolve_reset(root.path(), workdir.path(), true));

        fs::write(root.path().join(GLOBAL_RESET_FLAG), "").expect("global flag");
        assert!(resolve_reset(root.path(), workdir.path(), true));
        assert!(!root.path().join(GLOBAL_RESET_FLAG).exists());
        assert!(!resolve_reset(root.path(), workdir.path(), true));

        fs::write(workdir.path().join(AGENT_RESET_FILE), "").expect("agent flag");
        assert!(resolve_reset(root.path(), workdir.path(), false));
        assert!(!workdir.path().join(AGENT_RESET_FILE).exists());
    }

    #[test]
    fn later_chain_steps_ignore_the_global_flag() {
        let root = tempdir().expect("root");
        let workdir = tempdir().expect("workdir");

        fs::write(root.path().join(GLOBAL_RESET_FLAG), "").expect("global flag");
        assert!(!resolve_reset(root.path(), workdir.path(), false));
        assert!(root.path().join(GLOBAL_RESET_FLAG).exists());
    }
}
