use std::fs;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tinyclaw::config::Settings;
use tinyclaw::runtime::{bootstrap_state_root, run_queue_processor, StatePaths};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tinyclaw: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let paths = match std::env::var_os("TINYCLAW_STATE_ROOT") {
        Some(root) => StatePaths::new(root),
        None => StatePaths::resolve_default().map_err(|e| e.to_string())?,
    };
    bootstrap_state_root(&paths).map_err(|e| e.to_string())?;

    let settings_file = paths.settings_file();
    let settings = Settings::from_path(&settings_file).map_err(|e| e.to_string())?;

    let stop = Arc::new(AtomicBool::new(false));
    watch_stop_signal(&paths, stop.clone());

    run_queue_processor(&paths.root, settings, stop).map_err(|e| e.to_string())
}

/// The operator CLI stops the daemon by touching `daemon/stop`; the
/// watcher flips the shared flag and the processor exits cleanly,
/// leaving in-flight files for the next start's recovery sweep.
fn watch_stop_signal(paths: &StatePaths, stop: Arc<AtomicBool>) {
    let stop_path = paths.stop_signal_path();
    if stop_path.exists() {
        let _ = fs::remove_file(&stop_path);
    }
    thread::spawn(move || loop {
        if stop_path.exists() {
            let _ = fs::remove_file(&stop_path);
            stop.store(true, Ordering::Relaxed);
            return;
        }
        thread::sleep(Duration::from_millis(500));
    });
}
