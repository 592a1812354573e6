// Gateway module for the differential analysis cache - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod diff;
mod fingerprint;
mod gateway;
mod types;

// Public re-exports - the ONLY way to access cache functionality
pub use diff::{
    estimated_savings, partition, CachedConversation, ChangeKind, Partition, PendingConversation,
};
pub use fingerprint::fingerprint;
pub use gateway::{read_or_empty, CacheStore, HttpCacheGateway};
pub use types::{AnalysisStats, CacheDocument, CacheEntry, CacheSnapshot};

#[cfg(test)]
pub use gateway::MockCacheStore;
