pub mod chain;
pub mod chat_history;
pub mod reset;
pub mod routing;

pub use chain::{ChainOutcome, ChainRunner, ChainStep};
pub use chat_history::append_chain_transcript;
pub use reset::{resolve_reset, AGENT_RESET_FILE, GLOBAL_RESET_FLAG};
pub use routing::{
    extract_teammate_mentions, find_team_for_agent, parse_routing, RoutedMessage,
    TeammateMention, DEFAULT_AGENT_ID, MULTI_TARGET_AGENT_ID, MULTI_TARGET_RESPONSE,
};
