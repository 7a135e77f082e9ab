use crate::queue::QueuePaths;
use std::fs;
use std::path::{Path, PathBuf};

/// Moves every file left in `processing` back to `incoming` so a crashed
/// or stopped run is retried. Called before the poll loop starts, which
/// keeps the at-least-once contract.
pub fn recover_processing_queue_entries(state_root: &Path) -> Result<Vec<PathBuf>, String> {
    let queue_paths = QueuePaths::from_state_root(state_root);
    let mut entries = Vec::new();

    for entry in fs::read_dir(&queue_paths.processing).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_file() {
            entries.push(path);
        }
    }
    entries.sort();

    let mut recovered = Vec::new();
    for processing_path in entries {
        let Some(name) = processing_path.file_name() else {
            continue;
        };
        let target = queue_paths.incoming.join(name);
        fs::rename(&processing_path, &target).map_err(|e| {
            format!(
                "failed to recover processing file {}: {}",
                processing_path.display(),
                e
            )
        })?;
        recovered.push(target);
    }

    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn moves_processing_files_back_to_incoming() {
        let tmp = tempdir().expect("tempdir");
        let queue = QueuePaths::from_state_root(tmp.path());
        fs::create_dir_all(&queue.incoming).expect("incoming");
        fs::create_dir_all(&queue.processing).expect("processing");

        fs::write(queue.processing.join("a.json"), "{}").expect("write a");
        fs::write(queue.processing.join("b.json"), "{}").expect("write b");

        let recovered = recover_processing_queue_entries(tmp.path()).expect("recover");
        assert_eq!(recovered.len(), 2);
        assert!(queue.incoming.join("a.json").exists());
        assert!(queue.incoming.join("b.json").exists());
        assert_eq!(
            fs::read_dir(&queue.processing).expect("read dir").count(),
            0
        );
    }
}
