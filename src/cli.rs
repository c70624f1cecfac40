//! Command-line interface module for aitidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (`clap`)
//! - Organization runs with preview and confirmation
//! - Undo of the most recent run
//! - Artifact migration and API connectivity checks

use crate::artifacts::ArtifactStore;
use crate::config::{AppConfig, load_exclusion_file};
use crate::error::{OrganizeError, OrganizeResult};
use crate::indexer::Indexer;
use crate::oracle::OpenAiClient;
use crate::output::OutputFormatter;
use crate::undo::{OperationLogger, UndoManager};
use crate::workflow::{OrganizeOptions, Workflow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "aitidy", version)]
#[command(about = "Organize a directory into an LLM-suggested folder hierarchy", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./.aitidy.toml, then ~/.config/aitidy/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyse, preview, and organize a directory
    Organize(OrganizeArgs),
    /// Undo the most recent organization
    Undo {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Move artifacts of older runs into the hidden data folder
    Migrate {
        /// Directory containing the artifacts
        directory: PathBuf,
    },
    /// Check that the language-model API is reachable
    TestApi,
}

#[derive(Debug, clap::Args)]
pub struct OrganizeArgs {
    /// Directory to organize
    pub directory: PathBuf,

    /// Use each file's own folder suggestion instead of one holistic schema
    #[arg(long)]
    pub per_file: bool,

    /// Show the plan without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Only look at files directly inside the directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Glob pattern to exclude (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// TOML file with an `exclusions = [...]` list of glob patterns
    #[arg(long, value_name = "FILE")]
    pub exclude_file: Option<PathBuf>,

    /// Skip writing the HTML plan report
    #[arg(long)]
    pub no_report: bool,
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use aitidy::cli::{Cli, run_cli};
/// use clap::Parser;
///
/// let cli = Cli::parse_from(["aitidy", "organize", "/path/to/inbox", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> OrganizeResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Organize(args) => organize_directory(&config, &args),
        Commands::Undo { yes } => undo_organization(&config, yes),
        Commands::Migrate { directory } => migrate_artifacts(&directory),
        Commands::TestApi => test_api(&config),
    }
}

/// Scans, analyses, and previews a directory, then (unless this is a dry
/// run or the user declines) executes the plan and records it for undo.
pub fn organize_directory(config: &AppConfig, args: &OrganizeArgs) -> OrganizeResult<()> {
    let client = OpenAiClient::from_config(&config.llm)?;
    let workflow = Workflow::new(config, &client);

    let mut options = OrganizeOptions::from_config(config);
    options.recursive = !args.no_recursive;
    options.intelligent = options.intelligent && !args.per_file;
    options.write_report = !args.no_report;
    options.show_progress = true;
    options.extra_exclusions = args.excludes.clone();
    if let Some(path) = &args.exclude_file {
        options.extra_exclusions.extend(load_exclusion_file(path)?);
    }

    OutputFormatter::info(&format!("Organizing contents of: {}", args.directory.display()));
    let prepared = workflow.prepare(&args.directory, &options)?;

    if !prepared.migration.migrated.is_empty() {
        OutputFormatter::migration_summary(&prepared.migration);
    }
    if prepared.scanned_files == 0 {
        OutputFormatter::warning("No files found to organize.");
        return Ok(());
    }

    OutputFormatter::plan_preview(&prepared.plan);
    if let Some(report) = &prepared.report_path {
        OutputFormatter::info(&format!("Plan report: {}", report.display()));
    }

    if args.dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
        return Ok(());
    }
    if prepared.plan.is_empty() {
        OutputFormatter::success("Everything is already organized.");
        return Ok(());
    }
    if !args.yes && !OutputFormatter::confirm("Proceed with this organization?")? {
        OutputFormatter::warning("Organization cancelled.");
        return Ok(());
    }

    let outcome = workflow.execute(&prepared)?;
    OutputFormatter::execution_summary(&outcome.execution);

    if let Some(toc) = &outcome.toc_path {
        OutputFormatter::info(&format!("Table of contents: {}", toc.display()));
    }
    if outcome.log_path.is_some() {
        OutputFormatter::success("Organization complete! Run 'aitidy undo' to revert.");
    }
    if !outcome.execution.is_complete_success() {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }

    Ok(())
}

/// Reverses the most recent logged run.
fn undo_organization(config: &AppConfig, yes: bool) -> OrganizeResult<()> {
    let logger = OperationLogger::new(config.organizer.resolved_log_dir());
    let Some(batch) = logger.last_batch()? else {
        return Err(OrganizeError::NoHistory {
            dir: logger.log_dir().to_path_buf(),
        });
    };

    OutputFormatter::info(&format!(
        "Last organization ({}) recorded {} operations.",
        batch.timestamp,
        batch.operations.len()
    ));
    if !yes && !OutputFormatter::confirm("Undo it?")? {
        OutputFormatter::warning("Undo cancelled.");
        return Ok(());
    }

    let report = UndoManager::undo_last(&logger)?;
    OutputFormatter::undo_summary(&report);
    if report.is_complete_success() {
        OutputFormatter::success("Undo complete!");
    }
    Ok(())
}

fn migrate_artifacts(directory: &Path) -> OrganizeResult<()> {
    if !directory.is_dir() {
        return Err(OrganizeError::InvalidBasePath {
            path: directory.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    let summary = ArtifactStore::new(directory).migrate();
    OutputFormatter::migration_summary(&summary);
    Ok(())
}

fn test_api(config: &AppConfig) -> OrganizeResult<()> {
    let client = OpenAiClient::from_config(&config.llm)?;
    let indexer = Indexer::new(&client, &config.llm, &config.organizer);

    OutputFormatter::info(&format!("Testing connection to {}...", config.llm.api_base));
    let response = indexer.check_connection()?;
    OutputFormatter::success("API connection successful!");
    OutputFormatter::plain(&format!("Response: {}", response.trim()));
    Ok(())
}
