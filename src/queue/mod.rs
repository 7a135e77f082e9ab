pub mod file_tags;
pub mod lifecycle;
pub mod message;
pub mod outbound;
pub mod paths;

pub use file_tags::{append_inbound_file_tags, extract_inbound_file_tags};
pub use lifecycle::{
    claim, complete, dead_letter, list_incoming, peek_incoming, requeue, write_outgoing,
    ClaimedMessage,
};
pub use message::{
    DeadLetterRecord, IncomingMessage, OutgoingMessage, ERROR_CLASS_TERMINAL,
    ERROR_CLASS_TRANSIENT,
};
pub use outbound::{
    prepare_outbound_content, OutboundContent, PathMapping, OUTBOUND_MAX_CHARS,
    OUTBOUND_TRUNCATE_KEEP_CHARS, OUTBOUND_TRUNCATION_SUFFIX,
};
pub use paths::{
    dead_letter_filename, is_valid_queue_json_filename, outgoing_filename, QueuePaths,
    HEARTBEAT_CHANNEL,
};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid queue payload in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
