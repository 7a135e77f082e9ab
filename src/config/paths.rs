use std::path::PathBuf;

pub const DEFAULT_STATE_DIR: &str = ".tinyclaw";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub fn default_state_root_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(DEFAULT_STATE_DIR))
}

pub fn settings_file_path(state_root: &std::path::Path) -> PathBuf {
    state_root.join(SETTINGS_FILE_NAME)
}
