use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{AnalysisResult, ConversationRecord};

/// Cached analysis of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub conversation_id: String,
    pub last_analysis: DateTime<Utc>,
    pub content_hash: String,
    pub cached_results: AnalysisResult,
    pub conversation_length: usize,
}

impl CacheEntry {
    /// Record a fresh analysis of `conversation`
    pub fn new(
        conversation: &ConversationRecord,
        content_hash: String,
        results: AnalysisResult,
        analyzed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id: conversation.id.clone(),
            last_analysis: analyzed_at,
            content_hash,
            cached_results: results,
            conversation_length: conversation.message_count(),
        }
    }

    /// An entry is reusable only if both the fingerprint and the message count still match
    pub fn is_valid_for(&self, content_hash: &str, conversation_length: usize) -> bool {
        self.content_hash == content_hash && self.conversation_length == conversation_length
    }
}

/// All cache entries of one (tenant, module) pair, keyed by conversation id.
///
/// Persisted as a single JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheDocument {
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, conversation_id: &str) -> Option<&CacheEntry> {
        self.entries.get(conversation_id)
    }

    /// Insert or overwrite the entry for its conversation id
    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(entry.conversation_id.clone(), entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn oldest_analysis(&self) -> Option<DateTime<Utc>> {
        self.iter().map(|e| e.last_analysis).min()
    }

    pub fn newest_analysis(&self) -> Option<DateTime<Utc>> {
        self.iter().map(|e| e.last_analysis).max()
    }
}

impl FromIterator<CacheEntry> for CacheDocument {
    fn from_iter<I: IntoIterator<Item = CacheEntry>>(iter: I) -> Self {
        let mut document = CacheDocument::new();
        for entry in iter {
            document.insert(entry);
        }
        document
    }
}

/// Cache document as read from the store, with the version token used for
/// conditional writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub document: CacheDocument,
    pub version: Option<String>,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Summary of one partition; derived, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_conversations: usize,
    pub cached_conversations: usize,
    pub new_conversations: usize,
    pub modified_conversations: usize,
    /// Percentage of conversations served from cache.
    /// Reported as 0 when nothing needs analysis.
    pub estimated_savings: u32,
}

impl AnalysisStats {
    /// Conversations that go through the analyzer
    pub fn analyzed_conversations(&self) -> usize {
        self.new_conversations + self.modified_conversations
    }
}
