use std::collections::HashMap;
use tracing::warn;

use super::fingerprint::fingerprint;
use super::types::{AnalysisStats, CacheDocument};
use crate::models::{AnalysisResult, ConversationRecord};

/// Why a conversation needs analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// No cache entry exists
    New,
    /// An entry exists but the content or message count changed
    Modified,
}

/// Conversation that must go through the analyzer
#[derive(Debug, Clone)]
pub struct PendingConversation {
    pub conversation: ConversationRecord,
    pub kind: ChangeKind,
    /// Fingerprint computed during partitioning, reused for the cache update
    pub fingerprint: String,
}

/// Unchanged conversation served from cache
#[derive(Debug, Clone)]
pub struct CachedConversation {
    pub conversation: ConversationRecord,
    pub cached_results: AnalysisResult,
}

/// Output of the differencing engine
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub to_analyze: Vec<PendingConversation>,
    pub cached: Vec<CachedConversation>,
    pub stats: AnalysisStats,
}

/// Split conversations into those needing analysis and those reusable from cache.
///
/// Stable: input order is kept inside each bucket. Every conversation id lands in
/// exactly one bucket; when an id repeats, only its last record is kept.
pub fn partition(conversations: Vec<ConversationRecord>, cache: &CacheDocument) -> Partition {
    let conversations = dedup_by_id(conversations);
    let total = conversations.len();
    let mut result = Partition::default();
    let mut new_conversations = 0;
    let mut modified_conversations = 0;

    for conversation in conversations {
        let current_hash = fingerprint(&conversation);
        let current_length = conversation.message_count();

        match cache.get(&conversation.id) {
            None => {
                new_conversations += 1;
                result.to_analyze.push(PendingConversation {
                    conversation,
                    kind: ChangeKind::New,
                    fingerprint: current_hash,
                });
            }
            Some(entry) if !entry.is_valid_for(&current_hash, current_length) => {
                modified_conversations += 1;
                result.to_analyze.push(PendingConversation {
                    conversation,
                    kind: ChangeKind::Modified,
                    fingerprint: current_hash,
                });
            }
            Some(entry) => {
                result.cached.push(CachedConversation {
                    conversation,
                    cached_results: entry.cached_results.clone(),
                });
            }
        }
    }

    result.stats = AnalysisStats {
        total_conversations: total,
        cached_conversations: result.cached.len(),
        new_conversations,
        modified_conversations,
        estimated_savings: estimated_savings(result.cached.len(), total, result.to_analyze.len()),
    };
    result
}

// Last record wins, at the position of that last record
fn dedup_by_id(conversations: Vec<ConversationRecord>) -> Vec<ConversationRecord> {
    let last_index: HashMap<String, usize> = conversations
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();
    if last_index.len() == conversations.len() {
        return conversations;
    }

    conversations
        .into_iter()
        .enumerate()
        .filter_map(|(i, conversation)| {
            if last_index.get(&conversation.id) == Some(&i) {
                Some(conversation)
            } else {
                warn!("Duplicate conversation id {}, keeping its last record", conversation.id);
                None
            }
        })
        .collect()
}

/// Percentage of the batch served from cache, rounded.
///
/// Returns 0 when nothing needs analysis, matching what dashboards already display.
pub fn estimated_savings(cached: usize, total: usize, pending: usize) -> u32 {
    if pending == 0 || total == 0 {
        return 0;
    }
    (cached as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::models::ConversationMessage;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn conversation(id: &str, messages: usize) -> ConversationRecord {
        ConversationRecord::new(id).with_contact(format!("contact {}", id)).with_messages(
            (0..messages)
                .map(|i| ConversationMessage::new("client", format!("message {}", i)))
                .collect(),
        )
    }

    fn cache_of(conversations: &[ConversationRecord]) -> CacheDocument {
        conversations
            .iter()
            .map(|c| CacheEntry::new(c, fingerprint(c), AnalysisResult::default(), Utc::now()))
            .collect()
    }

    fn ids(partition: &Partition) -> (Vec<String>, Vec<String>) {
        (
            partition.to_analyze.iter().map(|p| p.conversation.id.clone()).collect(),
            partition.cached.iter().map(|c| c.conversation.id.clone()).collect(),
        )
    }

    #[test]
    fn test_empty_cache_analyzes_everything() {
        let batch = vec![conversation("a", 5), conversation("b", 3), conversation("c", 8)];
        let result = partition(batch, &CacheDocument::new());

        assert_eq!(result.to_analyze.len(), 3);
        assert!(result.cached.is_empty());
        assert!(result.to_analyze.iter().all(|p| p.kind == ChangeKind::New));
        assert_eq!(
            result.stats,
            AnalysisStats {
                total_conversations: 3,
                cached_conversations: 0,
                new_conversations: 3,
                modified_conversations: 0,
                estimated_savings: 0,
            }
        );
    }

    #[test]
    fn test_unchanged_batch_is_fully_cached() {
        let batch = vec![conversation("a", 5), conversation("b", 3), conversation("c", 8)];
        let cache = cache_of(&batch);
        let result = partition(batch, &cache);

        assert!(result.to_analyze.is_empty());
        assert_eq!(ids(&result).1, vec!["a", "b", "c"]);
        assert_eq!(result.stats.cached_conversations, 3);
        // All-cached batches report zero savings
        assert_eq!(result.stats.estimated_savings, 0);
    }

    #[test]
    fn test_appended_message_marks_modified() {
        let batch = vec![conversation("a", 5), conversation("b", 3), conversation("c", 8)];
        let cache = cache_of(&batch);

        let changed = vec![conversation("a", 5), conversation("b", 4), conversation("c", 8)];
        let result = partition(changed, &cache);

        assert_eq!(ids(&result), (vec!["b".to_string()], vec!["a".to_string(), "c".to_string()]));
        assert_eq!(result.to_analyze[0].kind, ChangeKind::Modified);
        assert_eq!(result.stats.modified_conversations, 1);
        assert_eq!(result.stats.new_conversations, 0);
        assert_eq!(result.stats.estimated_savings, 67);
    }

    #[test]
    fn test_length_mismatch_alone_invalidates() {
        let original = conversation("a", 2);
        let mut cache = cache_of(std::slice::from_ref(&original));
        let mut entry = cache.get("a").unwrap().clone();
        entry.conversation_length = 7;
        cache.insert(entry);

        let result = partition(vec![original], &cache);
        assert_eq!(result.to_analyze.len(), 1);
        assert_eq!(result.to_analyze[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_cached_results_are_carried() {
        let original = conversation("a", 2);
        let results = AnalysisResult {
            category: Some("pricing".to_string()),
            ..Default::default()
        };
        let cache: CacheDocument =
            vec![CacheEntry::new(&original, fingerprint(&original), results.clone(), Utc::now())]
                .into_iter()
                .collect();

        let result = partition(vec![original], &cache);
        assert_eq!(result.cached[0].cached_results, results);
    }

    #[test]
    fn test_partition_is_complete_disjoint_and_stable() {
        let cached_part = vec![conversation("k1", 1), conversation("k2", 2)];
        let cache = cache_of(&cached_part);
        let batch = vec![
            conversation("n1", 1),
            conversation("k1", 1),
            conversation("n2", 4),
            conversation("k2", 2),
            conversation("n3", 2),
        ];

        let result = partition(batch, &cache);
        let (pending, cached) = ids(&result);

        assert_eq!(pending.len() + cached.len(), 5);
        assert!(pending.iter().all(|id| !cached.contains(id)));
        assert_eq!(pending, vec!["n1", "n2", "n3"]);
        assert_eq!(cached, vec!["k1", "k2"]);
    }

    #[test]
    fn test_repeated_id_lands_in_one_bucket() {
        let original = conversation("x", 2);
        let cache = cache_of(&[original.clone()]);
        let mut edited = original.clone();
        edited.messages[0].text = "changed".to_string();

        let result = partition(vec![original, conversation("y", 1), edited], &cache);
        let (pending, cached) = ids(&result);

        assert_eq!(pending, vec!["y", "x"]);
        assert!(cached.is_empty());
        assert_eq!(result.stats.total_conversations, 2);
        assert_eq!(result.stats.modified_conversations, 1);
        assert_eq!(result.to_analyze[1].conversation.messages[0].text, "changed");
    }

    #[test]
    fn test_pending_carries_current_fingerprint() {
        let c = conversation("a", 3);
        let expected = fingerprint(&c);
        let result = partition(vec![c], &CacheDocument::new());
        assert_eq!(result.to_analyze[0].fingerprint, expected);
    }

    #[test]
    fn test_savings_monotonic_in_cached_conversations() {
        let mut previous = 0;
        for cached in 0..20 {
            let savings = estimated_savings(cached, cached + 2, 2);
            assert!(savings >= previous);
            previous = savings;
        }
        assert_eq!(estimated_savings(0, 0, 0), 0);
        assert_eq!(estimated_savings(1, 4, 3), 25);
    }
}
