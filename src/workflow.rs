//! End-to-end organization runs.
//!
//! A run is split in two so the caller can show a preview and ask for
//! confirmation in between: [`Workflow::prepare`] scans, analyses, and plans
//! without touching the user's files; [`Workflow::execute`] applies the plan,
//! logs the operations for undo, and writes the table of contents.

use crate::artifacts::{ArtifactStore, MigrationSummary};
use crate::config::AppConfig;
use crate::error::{OrganizeError, OrganizeResult};
use crate::executor::{ExecutionReport, Operation, PlanExecutor};
use crate::indexer::Indexer;
use crate::oracle::Oracle;
use crate::output::OutputFormatter;
use crate::plan::{OrganizationPlan, PlanBuilder, PlanMode, TocEntry};
use crate::project::ProjectDetector;
use crate::scanner::Scanner;
use crate::schema::SchemaSynthesizer;
use crate::undo::OperationLogger;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-run switches, usually from the command line.
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub recursive: bool,
    /// Synthesize one schema for all files instead of using per-file suggestions.
    pub intelligent: bool,
    /// Glob exclusions on top of the configured ones.
    pub extra_exclusions: Vec<String>,
    pub write_report: bool,
    pub show_progress: bool,
}

impl OrganizeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            recursive: true,
            intelligent: config.organizer.intelligent,
            extra_exclusions: Vec::new(),
            write_report: true,
            show_progress: false,
        }
    }
}

/// A plan ready for preview.
#[derive(Debug)]
pub struct PreparedRun {
    pub plan: OrganizationPlan,
    pub scanned_files: usize,
    pub migration: MigrationSummary,
    pub report_path: Option<PathBuf>,
}

/// What [`Workflow::execute`] did.
#[derive(Debug)]
pub struct RunOutcome {
    pub execution: ExecutionReport,
    /// Operation log written for undo; `None` when nothing changed.
    pub log_path: Option<PathBuf>,
    pub toc_path: Option<PathBuf>,
}

/// Drives organization runs against one configuration and oracle.
pub struct Workflow<'a> {
    config: &'a AppConfig,
    oracle: &'a dyn Oracle,
}

impl<'a> Workflow<'a> {
    pub fn new(config: &'a AppConfig, oracle: &'a dyn Oracle) -> Self {
        Self { config, oracle }
    }

    /// Scans, analyses, and plans `base_dir`. Leaves the user's files alone;
    /// only the application data folder is written.
    pub fn prepare(&self, base_dir: &Path, options: &OrganizeOptions) -> OrganizeResult<PreparedRun> {
        let base_dir = base_dir
            .canonicalize()
            .map_err(|e| OrganizeError::InvalidBasePath {
                path: base_dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        // Configuration errors must surface before anything is renamed.
        let mut scanner = Scanner::new(&self.config.scanner, &options.extra_exclusions)?;
        if !options.recursive {
            scanner = scanner.non_recursive();
        }

        let artifacts = ArtifactStore::new(&base_dir);
        let migration = artifacts.migrate();
        if !migration.migrated.is_empty() {
            info!(count = migration.migrated.len(), "migrated artifacts from earlier runs");
        }

        let files = scanner.scan(&base_dir)?;
        info!(base_dir = %base_dir.display(), files = files.len(), "scan complete");

        let progress = if options.show_progress {
            OutputFormatter::create_progress_bar(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        let indexer = Indexer::new(self.oracle, &self.config.llm, &self.config.organizer);
        let analyses = indexer.analyze_all(&files, &progress);
        progress.finish_and_clear();

        let organizer = &self.config.organizer;
        let detector = ProjectDetector::new(
            &base_dir,
            organizer.project_markers.clone(),
            organizer.readme_names.clone(),
            organizer.tags_naming_scheme,
        );
        let mut builder = PlanBuilder::new(&base_dir, organizer.naming_scheme);
        if organizer.preserve_projects {
            builder = builder.with_projects(&detector);
        }

        let plan = if options.intelligent {
            let synthesizer = SchemaSynthesizer::new(
                self.oracle,
                &self.config.llm.organization_model,
                &base_dir,
                organizer.max_folder_depth,
                organizer.naming_scheme,
            )
            .with_max_tokens(self.config.llm.max_tokens)
            .with_artifacts(&artifacts);
            builder.build_plan(&analyses, PlanMode::Intelligent(&synthesizer))
        } else {
            builder.build_plan(&analyses, PlanMode::PerFile)
        };
        info!(
            moves = plan.moves.len(),
            folders = plan.folders.len(),
            skipped = plan.skipped_files.len(),
            "plan built"
        );

        let report_path = if options.write_report {
            match artifacts.write_report(&plan) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(error = %e, "could not write plan report");
                    None
                }
            }
        } else {
            None
        };

        Ok(PreparedRun {
            plan,
            scanned_files: files.len(),
            migration,
            report_path,
        })
    }

    /// Applies a prepared plan and records it for undo.
    ///
    /// Fails only if the operation log cannot be written; that is the one
    /// artifact undo depends on.
    pub fn execute(&self, prepared: &PreparedRun) -> OrganizeResult<RunOutcome> {
        let plan = &prepared.plan;
        let execution = PlanExecutor::execute(plan);
        info!(
            moved = execution.moved_count(),
            created = execution.created_folder_count(),
            failed = execution.failed.len(),
            "plan executed"
        );

        let log_path = if execution.operations.is_empty() {
            None
        } else {
            let logger = OperationLogger::new(self.config.organizer.resolved_log_dir());
            Some(logger.log(&execution.operations)?)
        };

        let entries = performed_entries(plan, &execution);
        let toc_path = match ArtifactStore::new(&plan.base_dir).write_toc(&entries) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not write table of contents");
                None
            }
        };

        Ok(RunOutcome {
            execution,
            log_path,
            toc_path,
        })
    }
}

/// Table-of-contents entries for the moves the executor actually made.
fn performed_entries(plan: &OrganizationPlan, execution: &ExecutionReport) -> Vec<TocEntry> {
    let moved: HashSet<(&Path, &Path)> = execution
        .operations
        .iter()
        .filter_map(|op| match op {
            Operation::Move { source, destination } => Some((source.as_path(), destination.as_path())),
            Operation::CreateFolder { .. } => None,
        })
        .collect();

    plan.toc_entries
        .iter()
        .filter(|entry| moved.contains(&(entry.original_path.as_path(), entry.new_path.as_path())))
        .cloned()
        .collect()
}
