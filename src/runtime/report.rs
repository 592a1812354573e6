use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::AnalysisStats;
use crate::constants::REPORT_TOP_TAGS;
use crate::models::{AnalysisModule, AnalysisResult};

/// Tag frequency in a consolidated report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Module-wide report over fresh and cached results, saved after every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub module: AnalysisModule,
    pub generated_at: DateTime<Utc>,
    pub analyzer: String,
    pub total_analyzed: usize,
    pub from_cache: usize,
    pub newly_analyzed: usize,
    pub reanalyzed: usize,
    /// Share of the batch served from cache; unlike `AnalysisStats::estimated_savings`
    /// this is 100 when everything was cached
    pub cache_efficiency: u32,
    pub categories: BTreeMap<String, usize>,
    pub sentiments: BTreeMap<String, usize>,
    pub average_score: Option<f64>,
    pub top_tags: Vec<TagCount>,
}

impl ConsolidatedReport {
    pub fn build(
        module: AnalysisModule,
        analyzer: &str,
        stats: &AnalysisStats,
        results: &[AnalysisResult],
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut categories = BTreeMap::new();
        let mut sentiments = BTreeMap::new();
        let mut tags: BTreeMap<&str, usize> = BTreeMap::new();
        let mut score_sum = 0.0;
        let mut score_count = 0usize;

        for result in results {
            if let Some(category) = &result.category {
                *categories.entry(category.clone()).or_insert(0) += 1;
            }
            if let Some(sentiment) = &result.sentiment {
                *sentiments.entry(sentiment.clone()).or_insert(0) += 1;
            }
            if let Some(score) = result.score.filter(|s| s.is_finite()) {
                score_sum += score;
                score_count += 1;
            }
            for tag in &result.tags {
                *tags.entry(tag.as_str()).or_insert(0) += 1;
            }
        }

        let mut top_tags: Vec<TagCount> = tags
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        // Most frequent first; alphabetical among equals (stable sort over BTreeMap order)
        top_tags.sort_by(|a, b| b.count.cmp(&a.count));
        top_tags.truncate(REPORT_TOP_TAGS);

        let total = results.len();
        let cache_efficiency = if total == 0 {
            0
        } else {
            (stats.cached_conversations as f64 / total as f64 * 100.0).round() as u32
        };

        Self {
            module,
            generated_at,
            analyzer: analyzer.to_string(),
            total_analyzed: total,
            from_cache: stats.cached_conversations,
            newly_analyzed: stats.new_conversations,
            reanalyzed: stats.modified_conversations,
            cache_efficiency,
            categories,
            sentiments,
            average_score: (score_count > 0).then(|| score_sum / score_count as f64),
            top_tags,
        }
    }
}
