use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::constants::TENANT_ENV;
use crate::models::AnalysisModule;

#[derive(Parser, Debug)]
#[command(name = "convolens")]
#[command(version = "0.1.0")]
#[command(about = "Incremental, cache-aware analysis of customer WhatsApp conversations", long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the global and local config files)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Tenant and module a command applies to
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Analysis module (observatory or commercial)
    pub module: AnalysisModule,

    /// Tenant whose store is used
    #[arg(short, long, env = TENANT_ENV)]
    pub tenant: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one incremental analysis
    Run {
        #[command(flatten)]
        target: Target,

        /// Output format for the run summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output_format: OutputFormat,
    },
    /// Drop every cached result for a module
    Clear {
        #[command(flatten)]
        target: Target,
    },
    /// Show what the cache currently holds for a module
    Inspect {
        #[command(flatten)]
        target: Target,
    },
    /// Initialize configuration
    Init,
    /// Show configured tenants and analyzer
    Status,
    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}
