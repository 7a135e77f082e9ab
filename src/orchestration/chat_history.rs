use super::chain::ChainStep;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends a team chain transcript under `chats/<team_id>/`, one
/// timestamped markdown file per run.
pub fn append_chain_transcript(
    state_root: &Path,
    team_id: &str,
    original_message: &str,
    steps: &[ChainStep],
) -> std::io::Result<PathBuf> {
    let dir = state_root.join("chats").join(team_id);
    fs::create_dir_all(&dir)?;

    let file_name = format!("{}.md", chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ"));
    let path = dir.join(file_name);

    let mut body = String::new();
    body.push_str(&format!("# Team chat: {team_id}\n\n"));
    body.push_str("**Original message:**\n\n");
    body.push_str(original_message.trim());
    body.push('\n');
    for step in steps {
        body.push_str(&format!("\n## @{}\n\n", step.agent_id));
        body.push_str(step.response.trim());
        body.push('\n');
    }

    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(body.as_bytes())?;
    Ok(path)
}
