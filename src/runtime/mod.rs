pub mod processor;
pub mod recovery;
pub mod state_paths;

pub use processor::{drain_incoming_once, run_queue_processor, POLL_INTERVAL_MS};
pub use recovery::recover_processing_queue_entries;
pub use state_paths::{bootstrap_state_root, StatePaths};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to create runtime path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to resolve home directory for the state root")]
    HomeDirectoryUnavailable,
    #[error("queue recovery failed: {0}")]
    Recovery(String),
    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),
}
