use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use super::traits::Analyzer;
use super::types::{AnalysisModule, AnalysisResult, ConversationRecord};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid word regex"));

const POSITIVE_WORDS: &[&str] = &[
    "gracias", "thanks", "thank", "excelente", "excellent", "great", "genial", "perfecto",
    "perfect", "bueno", "good", "encanta", "love", "feliz", "happy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "problema", "problem", "queja", "complaint", "malo", "bad", "terrible", "error", "roto",
    "broken", "tarde", "late", "cancelar", "cancel", "reembolso", "refund", "molesto", "angry",
];

const OBSERVATORY_CATEGORIES: &[(&str, &[&str])] = &[
    ("complaint", &["queja", "complaint", "reclamo", "problema", "problem", "roto", "broken", "reembolso", "refund"]),
    ("support", &["ayuda", "help", "soporte", "support", "como", "how", "funciona", "works"]),
    ("praise", &["gracias", "thanks", "excelente", "excellent", "genial", "great", "encanta", "love"]),
];

const COMMERCIAL_CATEGORIES: &[(&str, &[&str])] = &[
    ("purchase_intent", &["comprar", "buy", "pedido", "order", "quiero", "want", "reservar", "book"]),
    ("pricing", &["precio", "price", "cuanto", "cost", "costo", "descuento", "discount", "oferta", "offer"]),
    ("churn_risk", &["cancelar", "cancel", "baja", "unsubscribe", "competencia", "competitor"]),
];

/// Rule-based analyzer matching module-specific keyword tables.
///
/// Cheap and deterministic; used when no remote model is configured.
#[derive(Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn categories(module: AnalysisModule) -> &'static [(&'static str, &'static [&'static str])] {
        match module {
            AnalysisModule::Observatory => OBSERVATORY_CATEGORIES,
            AnalysisModule::Commercial => COMMERCIAL_CATEGORIES,
        }
    }

    /// Score words for a single conversation
    pub fn classify(conversation: &ConversationRecord, module: AnalysisModule) -> AnalysisResult {
        let transcript = conversation
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let words: Vec<&str> = WORD.find_iter(&transcript).map(|m| m.as_str()).collect();

        let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
        let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();

        let mut hits: BTreeMap<&str, usize> = BTreeMap::new();
        let mut tags = BTreeSet::new();
        for (category, keywords) in Self::categories(module) {
            for word in &words {
                if keywords.contains(word) {
                    *hits.entry(*category).or_default() += 1;
                    tags.insert(word.to_string());
                }
            }
        }

        // Highest hit count wins; BTreeMap order breaks ties alphabetically
        let category = hits
            .iter()
            .fold(None::<(&str, usize)>, |best, (cat, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*cat, *count)),
            })
            .map(|(cat, _)| cat.to_string())
            .unwrap_or_else(|| "general".to_string());

        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => "positive",
            std::cmp::Ordering::Less => "negative",
            std::cmp::Ordering::Equal => "neutral",
        };

        let score = if positive + negative == 0 {
            0.5
        } else {
            positive as f64 / (positive + negative) as f64
        };

        AnalysisResult {
            category: Some(category),
            sentiment: Some(sentiment.to_string()),
            score: Some(score),
            tags: tags.into_iter().collect(),
            summary: Some(format!(
                "{} messages from {}",
                conversation.message_count(),
                conversation.contact_name.as_deref().unwrap_or("unknown contact")
            )),
            extra: Default::default(),
        }
    }
}

#[async_trait]
impl Analyzer for KeywordAnalyzer {
    async fn analyze(
        &self,
        conversation: &ConversationRecord,
        module: AnalysisModule,
    ) -> Result<AnalysisResult> {
        Ok(Self::classify(conversation, module))
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
