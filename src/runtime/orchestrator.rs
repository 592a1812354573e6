use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::lock::RunLocks;
use super::report::ConsolidatedReport;
use crate::{
    app::TenantDirectory,
    cache::{partition, AnalysisStats, CacheEntry, CacheSnapshot, CacheStore, PendingConversation},
    constants::{CACHE_WRITE_MAX_ATTEMPTS, CONSOLIDATED_REPORT_KEY, DEFAULT_ANALYSIS_CONCURRENCY},
    models::{AnalysisModule, AnalysisResult, Analyzer, TenantId},
    store::{ConversationStore, StoreConnection},
    utils::{log_error, log_info, log_progress, AnalysisError, StoreError},
};

/// Phase of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    LoadingConversations,
    Diffing,
    Analyzing,
    Merging,
    PersistingReport,
    UpdatingCache,
    Failed,
}

impl RunPhase {
    /// Position in the happy path, for progress display
    fn step(&self) -> Option<usize> {
        match self {
            RunPhase::LoadingConversations => Some(1),
            RunPhase::Diffing => Some(2),
            RunPhase::Analyzing => Some(3),
            RunPhase::Merging => Some(4),
            RunPhase::PersistingReport => Some(5),
            RunPhase::UpdatingCache => Some(6),
            RunPhase::Idle | RunPhase::Failed => None,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunPhase::Idle => "idle",
            RunPhase::LoadingConversations => "loading conversations",
            RunPhase::Diffing => "diffing against cache",
            RunPhase::Analyzing => "analyzing",
            RunPhase::Merging => "merging results",
            RunPhase::PersistingReport => "persisting report",
            RunPhase::UpdatingCache => "updating cache",
            RunPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress callback for the UI layer
pub type ProgressCallback = Arc<dyn Fn(RunPhase) + Send + Sync>;

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tenant: TenantId,
    pub module: AnalysisModule,
    pub stats: AnalysisStats,
    pub report: ConsolidatedReport,
    /// Ids sent through the analyzer, in analysis order
    pub analyzed_ids: Vec<String>,
    pub cache_written: bool,
    pub duration_ms: u64,
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The module has no conversations; nothing was read or written
    NothingToAnalyze,
    Completed(RunSummary),
}

/// Drives incremental analysis runs
pub struct AnalysisOrchestrator {
    tenants: TenantDirectory,
    conversations: Arc<dyn ConversationStore>,
    cache: Arc<dyn CacheStore>,
    analyzer: Arc<dyn Analyzer>,
    locks: RunLocks,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl AnalysisOrchestrator {
    pub fn new(
        tenants: TenantDirectory,
        conversations: Arc<dyn ConversationStore>,
        cache: Arc<dyn CacheStore>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            tenants,
            conversations,
            cache,
            analyzer,
            locks: RunLocks::new(),
            concurrency: DEFAULT_ANALYSIS_CONCURRENCY,
            progress: None,
        }
    }

    /// Analyze up to `concurrency` conversations at once (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Share a lock registry with other orchestrators in the process
    pub fn with_locks(mut self, locks: RunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run one incremental analysis for an authenticated tenant
    pub async fn run(
        &self,
        tenant: Option<&TenantId>,
        module: AnalysisModule,
    ) -> Result<RunOutcome, AnalysisError> {
        let tenant = tenant.ok_or(AnalysisError::Unauthenticated)?;

        let connection = self.tenants.resolve(tenant).await.ok_or_else(|| {
            AnalysisError::Config(format!(
                "no store connection configured for tenant '{}'",
                tenant
            ))
        })?;

        let _guard = self
            .locks
            .try_acquire(tenant, module)
            .ok_or_else(|| AnalysisError::RunInProgress {
                tenant: tenant.clone(),
                module,
            })?;

        log_info("🔍", format!("Starting {} analysis for tenant {}", module, tenant));
        let started = Instant::now();

        match self.execute(tenant, module, &connection, started).await {
            Ok(outcome) => {
                self.enter(RunPhase::Idle);
                Ok(outcome)
            }
            Err(e) => {
                self.enter(RunPhase::Failed);
                log_error("❌", format!("{} analysis for {} failed: {}", module, tenant, e));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        tenant: &TenantId,
        module: AnalysisModule,
        connection: &StoreConnection,
        started: Instant,
    ) -> Result<RunOutcome, AnalysisError> {
        self.enter(RunPhase::LoadingConversations);
        let conversations = self.conversations.load(connection, module).await?;
        if conversations.is_empty() {
            info!("No {} conversations for tenant {}; nothing to analyze", module, tenant);
            return Ok(RunOutcome::NothingToAnalyze);
        }

        self.enter(RunPhase::Diffing);
        let snapshot = self.cache.read(connection, module).await;
        let batch = partition(conversations, &snapshot.document);
        info!(
            "{} conversations: {} cached, {} new, {} modified",
            batch.stats.total_conversations,
            batch.stats.cached_conversations,
            batch.stats.new_conversations,
            batch.stats.modified_conversations
        );

        self.enter(RunPhase::Analyzing);
        let fresh = self.analyze_all(&batch.to_analyze, module).await?;

        self.enter(RunPhase::Merging);
        let merged: Vec<AnalysisResult> = fresh
            .iter()
            .cloned()
            .chain(batch.cached.iter().map(|c| c.cached_results.clone()))
            .collect();
        let report = ConsolidatedReport::build(
            module,
            self.analyzer.name(),
            &batch.stats,
            &merged,
            Utc::now(),
        );

        // The report must land before the cache changes
        self.enter(RunPhase::PersistingReport);
        let report_json = serde_json::to_value(&report).map_err(StoreError::from)?;
        self.conversations
            .save_report(connection, module, CONSOLIDATED_REPORT_KEY, &report_json)
            .await?;

        let mut cache_written = false;
        if !batch.to_analyze.is_empty() {
            self.enter(RunPhase::UpdatingCache);
            let analyzed_at = Utc::now();
            let entries: Vec<CacheEntry> = batch
                .to_analyze
                .iter()
                .zip(fresh)
                .map(|(pending, result)| {
                    CacheEntry::new(
                        &pending.conversation,
                        pending.fingerprint.clone(),
                        result,
                        analyzed_at,
                    )
                })
                .collect();
            self.update_cache(connection, module, snapshot, &entries).await?;
            cache_written = true;
        }

        Ok(RunOutcome::Completed(RunSummary {
            tenant: tenant.clone(),
            module,
            stats: batch.stats,
            report,
            analyzed_ids: batch
                .to_analyze
                .iter()
                .map(|p| p.conversation.id.clone())
                .collect(),
            cache_written,
            duration_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Analyze each pending conversation once; results keep the input order.
    /// The first failure aborts the batch.
    async fn analyze_all(
        &self,
        pending: &[PendingConversation],
        module: AnalysisModule,
    ) -> Result<Vec<AnalysisResult>, AnalysisError> {
        let analyzer = &self.analyzer;
        stream::iter(pending.iter().map(|p| async move {
            debug!("Analyzing conversation {} ({:?})", p.conversation.id, p.kind);
            analyzer
                .analyze(&p.conversation, module)
                .await
                .map_err(|source| AnalysisError::Analysis {
                    conversation_id: p.conversation.id.clone(),
                    source,
                })
        }))
        .buffered(self.concurrency)
        .try_collect()
        .await
    }

    /// Merge fresh entries into the snapshot and write it back.
    ///
    /// Writes are conditional on the snapshot version when the store provides one;
    /// on conflict the latest document is re-read and the entries re-applied.
    /// A re-read after a conflict must succeed and carry a version, otherwise the
    /// run fails rather than overwrite entries it never saw.
    async fn update_cache(
        &self,
        connection: &StoreConnection,
        module: AnalysisModule,
        snapshot: CacheSnapshot,
        entries: &[CacheEntry],
    ) -> Result<(), AnalysisError> {
        let mut snapshot = snapshot;

        for attempt in 1..=CACHE_WRITE_MAX_ATTEMPTS {
            let mut document = snapshot.document;
            for entry in entries {
                document.insert(entry.clone());
            }

            let result = match snapshot.version.as_deref() {
                Some(version) => {
                    self.cache
                        .write_if_match(connection, module, &document, version)
                        .await
                }
                None => self.cache.write(connection, module, &document).await,
            };

            match result {
                Ok(()) => {
                    debug!("Cache for {} now holds {} entries", module, document.len());
                    return Ok(());
                }
                Err(StoreError::Conflict) if attempt < CACHE_WRITE_MAX_ATTEMPTS => {
                    warn!(
                        "Cache for {} changed during the run (attempt {}/{}), re-merging",
                        module, attempt, CACHE_WRITE_MAX_ATTEMPTS
                    );
                    snapshot = self.cache.try_read(connection, module).await?;
                    if snapshot.version.is_none() {
                        return Err(StoreError::Conflict.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict.into())
    }

    fn enter(&self, phase: RunPhase) {
        if let Some(step) = phase.step() {
            log_progress(step, 6, phase);
        }
        if let Some(progress) = &self.progress {
            progress(phase);
        }
    }
}
