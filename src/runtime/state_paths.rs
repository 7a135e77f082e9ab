use super::RuntimeError;
use crate::config::{default_state_root_path, SETTINGS_FILE_NAME};
use crate::orchestration::GLOBAL_RESET_FLAG;
use crate::queue::QueuePaths;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve_default() -> Result<Self, RuntimeError> {
        default_state_root_path()
            .map(Self::new)
            .ok_or(RuntimeError::HomeDirectoryUnavailable)
    }

    pub fn queue(&self) -> QueuePaths {
        QueuePaths::from_state_root(&self.root)
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.root.join("chats")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn reset_flag_path(&self) -> PathBuf {
        self.root.join(GLOBAL_RESET_FLAG)
    }

    pub fn daemon_dir(&self) -> PathBuf {
        self.root.join("daemon")
    }

    pub fn stop_signal_path(&self) -> PathBuf {
        self.daemon_dir().join("stop")
    }

    pub fn queue_log_path(&self) -> PathBuf {
        self.root.join("logs/queue.log")
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        let queue = self.queue();
        vec![
            queue.incoming,
            queue.processing,
            queue.outgoing,
            queue.dead_letter,
            self.events_dir(),
            self.chats_dir(),
            self.root.join("logs"),
            self.daemon_dir(),
        ]
    }
}

pub fn bootstrap_state_root(paths: &StatePaths) -> Result<(), RuntimeError> {
    for path in paths.required_directories() {
        fs::create_dir_all(&path).map_err(|source| RuntimeError::CreateDir {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}
