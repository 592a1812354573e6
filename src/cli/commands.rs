use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use crate::{
    app::{init_config, Config, TenantDirectory},
    cache::{read_or_empty, AnalysisStats, CacheStore, HttpCacheGateway},
    models::{AnalyzerFactory, TenantId},
    runtime::{AnalysisOrchestrator, RunOutcome, RunSummary},
    store::{build_http_client, HttpConversationStore, StoreConnection},
};

use super::{Commands, OutputFormat, Target};

/// Handle CLI subcommands
pub async fn handle_command(command: &Commands, config: Config) -> Result<()> {
    match command {
        Commands::Run {
            target,
            output_format,
        } => run_analysis(target, *output_format, config).await,
        Commands::Clear { target } => clear_cache(target, config).await,
        Commands::Inspect { target } => inspect_cache(target, config).await,
        Commands::Init => {
            println!("Initializing Convolens configuration...");
            let path = init_config()?;
            println!("Configuration written to {}", path.display().to_string().green());
            Ok(())
        }
        Commands::Status => {
            show_status(&config).await;
            Ok(())
        }
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

/// Show version information
pub fn show_version() {
    println!("Convolens v{}", env!("CARGO_PKG_VERSION"));
    println!("   Incremental analysis of customer conversations");
}

fn tenant_of(target: &Target) -> Option<TenantId> {
    target.tenant.as_deref().and_then(TenantId::new)
}

async fn connection_for(tenants: &TenantDirectory, target: &Target) -> Result<StoreConnection> {
    let tenant = tenant_of(target).context("No tenant given (use --tenant or CONVOLENS_TENANT)")?;
    tenants
        .resolve(&tenant)
        .await
        .with_context(|| format!("No store connection configured for tenant '{}'", tenant))
}

async fn run_analysis(target: &Target, format: OutputFormat, config: Config) -> Result<()> {
    let client = build_http_client(config.http.timeout_secs)
        .context("Failed to build store HTTP client")?;
    let analyzer = AnalyzerFactory::create(&config.analyzer)?;
    let concurrency = config.analysis.concurrency;

    let orchestrator = AnalysisOrchestrator::new(
        TenantDirectory::new(config),
        Arc::new(HttpConversationStore::new(client.clone())),
        Arc::new(HttpCacheGateway::new(client)),
        analyzer,
    )
    .with_concurrency(concurrency);

    let tenant = tenant_of(target);
    let outcome = orchestrator.run(tenant.as_ref(), target.module).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => match &outcome {
            RunOutcome::NothingToAnalyze => {
                println!("{} No {} conversations to analyze", "ℹ".blue(), target.module);
            }
            RunOutcome::Completed(summary) => print_summary(summary),
        },
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} {} analysis for {} finished in {} ms",
        "✓".green(),
        summary.module,
        summary.tenant,
        summary.duration_ms
    );
    print_stats(&summary.stats);

    let report = &summary.report;
    println!();
    println!("  Report ({}):", report.analyzer.cyan());
    println!("    Cache efficiency: {}%", report.cache_efficiency);
    if let Some(score) = report.average_score {
        println!("    Average score:    {:.2}", score);
    }
    for (category, count) in &report.categories {
        println!("    • {}: {}", category, count);
    }
    if !report.top_tags.is_empty() {
        let tags: Vec<String> = report
            .top_tags
            .iter()
            .map(|t| format!("{} ({})", t.tag, t.count))
            .collect();
        println!("    Top tags: {}", tags.join(", "));
    }
    if !summary.cache_written {
        println!("  {}", "Cache unchanged".dimmed());
    }
}

fn print_stats(stats: &AnalysisStats) {
    println!("  Conversations: {}", stats.total_conversations);
    println!("    From cache:  {}", stats.cached_conversations.to_string().green());
    println!("    New:         {}", stats.new_conversations.to_string().yellow());
    println!("    Modified:    {}", stats.modified_conversations.to_string().yellow());
    println!("    Analyzed:    {}", stats.analyzed_conversations());
    println!("    Savings:     {}%", stats.estimated_savings);
}

async fn clear_cache(target: &Target, config: Config) -> Result<()> {
    let client = build_http_client(config.http.timeout_secs)?;
    let connection = connection_for(&TenantDirectory::new(config), target).await?;

    HttpCacheGateway::new(client)
        .clear(&connection, target.module)
        .await
        .with_context(|| format!("Failed to clear {} cache", target.module))?;

    println!("{} Cleared {} cache", "✓".green(), target.module);
    Ok(())
}

async fn inspect_cache(target: &Target, config: Config) -> Result<()> {
    let client = build_http_client(config.http.timeout_secs)?;
    let tenants = TenantDirectory::new(config);
    let connection = match tenant_of(target) {
        Some(tenant) => tenants.resolve(&tenant).await,
        None => None,
    };

    let gateway = HttpCacheGateway::new(client);
    let snapshot = read_or_empty(&gateway, connection.as_ref(), target.module).await;
    let document = &snapshot.document;

    println!("{} cache:", target.module.to_string().cyan());
    println!("  Entries: {}", document.len());
    match (document.oldest_analysis(), document.newest_analysis()) {
        (Some(oldest), Some(newest)) => {
            println!("  Oldest analysis: {}", oldest.to_rfc3339());
            println!("  Newest analysis: {}", newest.to_rfc3339());
        }
        _ => println!("  {}", "No cached analyses".dimmed()),
    }
    if let Some(version) = &snapshot.version {
        println!("  Version: {}", version.dimmed());
    }
    Ok(())
}

/// Show configured tenants and analyzer settings
async fn show_status(config: &Config) {
    println!("Convolens Status:");
    println!();

    let tenants = TenantDirectory::new(config.clone());
    let ids = tenants.tenant_ids().await;
    if ids.is_empty() {
        println!("  [WARNING] Tenants: none configured (run `convolens init`)");
    } else {
        println!("  Tenants:");
        for id in ids {
            match config.tenants.get(&id).and_then(|t| t.connection()) {
                Some(connection) if connection.credential().is_some() => {
                    println!("    [OK] {}: {}", id, connection.base_url());
                }
                Some(connection) => {
                    println!("    [WARNING] {}: {} (no credential)", id, connection.base_url());
                }
                None => println!("    [ERROR] {}: no base_url", id),
            }
        }
    }

    println!();
    println!(
        "  Analyzer: {:?} ({} at {})",
        config.analyzer.kind, config.analyzer.model, config.analyzer.endpoint
    );
    println!("  Concurrency: {}", config.analysis.concurrency);
    println!();
}
