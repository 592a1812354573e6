// Gateway module for the remote document store - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod connection;
mod conversations;

// Public re-exports - the ONLY way to access store functionality
pub use connection::{
    build_http_client, cache_path, conversations_path, report_path, StoreConnection,
};
pub(crate) use connection::check_status;
pub use conversations::{ConversationStore, HttpConversationStore};

#[cfg(test)]
pub use conversations::MockConversationStore;
