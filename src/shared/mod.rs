pub mod fs_atomic;
pub mod logging;
pub mod redact;

pub use fs_atomic::atomic_write_file;
pub use logging::{append_queue_log_line, queue_log_path};
pub use redact::redact_secrets;
