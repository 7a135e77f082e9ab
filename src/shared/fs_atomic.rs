use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Durably replaces `path`: content lands in a hidden temp sibling, is
/// fsynced, then renamed over the target. Queue state transitions rely
/// on the rename being atomic within one filesystem, so the temp file
/// always lives next to its target. A failed write removes the temp
/// file instead of leaving it behind in a queue directory.
pub fn atomic_write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let tmp_path = temp_sibling(path)?;
    let result = write_then_rename(&tmp_path, path, content);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Temp names are dot-prefixed so `is_valid_queue_json_filename` and the
/// directory scans never pick a half-written file up; pid plus a
/// process-wide serial keeps concurrent writers from colliding.
fn temp_sibling(path: &Path) -> std::io::Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent"))?;
    let target_name = path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("queue-item");
    let serial = TMP_SERIAL.fetch_add(1, Ordering::Relaxed);
    Ok(parent.join(format!(
        ".{target_name}.tinyclaw-{}-{serial}.tmp",
        std::process::id()
    )))
}

fn write_then_rename(tmp_path: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(tmp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path)?;
    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::atomic_write_file;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn writes_and_replaces_without_leftover_temp_files() {
        let tmp = tempdir().expect("tempdir");
        let target = tmp.path().join("message.json");

        atomic_write_file(&target, b"{\"attempt\":0}").expect("first write");
        atomic_write_file(&target, b"{\"attempt\":1}").expect("overwrite");
        assert_eq!(
            fs::read_to_string(&target).expect("read target"),
            "{\"attempt\":1}"
        );

        let names: Vec<String> = fs::read_dir(tmp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["message.json".to_string()]);
    }

    #[test]
    fn rejects_paths_without_a_parent() {
        assert!(atomic_write_file(std::path::Path::new("/"), b"x").is_err());
    }
}
