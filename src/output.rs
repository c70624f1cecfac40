//! Output formatting and styling module.
//!
//! Everything the user is meant to read goes through [`OutputFormatter`]:
//! status lines, the plan preview, run summaries, and confirmation prompts.
//! Diagnostics are logged through `tracing` instead (see [`crate::logging`]).

use crate::artifacts::MigrationSummary;
use crate::error::{OrganizeError, OrganizeResult};
use crate::executor::ExecutionReport;
use crate::plan::OrganizationPlan;
use crate::undo::UndoReport;
use colored::*;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for file analysis
/// - Plan previews and run summaries
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use aitidy::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for per-file analysis.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use aitidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} Analyzing [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// Prints the folders, moves, and skipped files of a plan.
    pub fn plan_preview(plan: &OrganizationPlan) {
        Self::header("PROPOSED ORGANIZATION");

        if plan.moves.is_empty() {
            Self::plain("Nothing to move.");
        }

        let counts = plan.folder_file_counts();
        for folder in &plan.folders {
            let count = counts.get(folder).copied().unwrap_or(0);
            println!(
                "  {} {} {}",
                "📁".blue(),
                display(plan, folder).bold(),
                format!("({} {})", count, plural(count, "file", "files")).dimmed()
            );
        }

        if !plan.moves.is_empty() {
            Self::header("MOVES");
            for planned in &plan.moves {
                println!(
                    "  {} {} {}",
                    display(plan, &planned.source),
                    "→".cyan(),
                    display(plan, &planned.destination).green()
                );
            }
        }

        if !plan.skipped_files.is_empty() {
            Self::header("SKIPPED");
            for skipped in &plan.skipped_files {
                println!(
                    "  {} {}",
                    display(plan, &skipped.path).dimmed(),
                    format!("({})", skipped.reason).yellow()
                );
            }
        }

        if !plan.project_entries.is_empty() {
            Self::header("PROJECTS");
            for project in &plan.project_entries {
                println!(
                    "  {} {}",
                    project.project_name.bold(),
                    display(plan, &project.project_root).dimmed()
                );
            }
        }

        println!(
            "\n{} {}, {} {}, {} skipped",
            plan.moves.len().to_string().green().bold(),
            plural(plan.moves.len(), "move", "moves"),
            plan.folders.len().to_string().green().bold(),
            plural(plan.folders.len(), "folder", "folders"),
            plan.skipped_files.len()
        );
    }

    /// Prints the outcome of executing a plan.
    pub fn execution_summary(report: &ExecutionReport) {
        Self::header("SUMMARY");
        println!(
            "  Moved:           {}",
            report.moved_count().to_string().green()
        );
        println!(
            "  Folders created: {}",
            report.created_folder_count().to_string().green()
        );
        Self::path_list("Skipped", &report.skipped, false);
        Self::path_list("Failed", &report.failed, true);
    }

    /// Prints the outcome of an undo.
    pub fn undo_summary(report: &UndoReport) {
        Self::header("UNDO SUMMARY");
        println!("  Restored:        {}", report.restored_files.to_string().green());
        println!("  Folders removed: {}", report.removed_folders.to_string().green());
        Self::path_list("Skipped", &report.skipped, false);
        Self::path_list("Failed", &report.failed, true);
        if !report.is_complete_success() {
            Self::warning("The operation log was kept so the undo can be retried.");
        }
    }

    pub fn migration_summary(summary: &MigrationSummary) {
        for (from, to) in &summary.migrated {
            println!("  {} {} {}", from.display(), "→".cyan(), to.display());
        }
        Self::path_list("Errors", &summary.errors, true);
        if summary.is_success() {
            Self::success(&summary.message());
        } else {
            Self::warning(&summary.message());
        }
    }

    fn path_list(label: &str, entries: &[(std::path::PathBuf, String)], is_error: bool) {
        if entries.is_empty() {
            return;
        }
        let count = entries.len().to_string();
        let count = if is_error { count.red() } else { count.yellow() };
        println!("  {:<17}{}", format!("{label}:"), count);
        for (path, reason) in entries {
            println!("    - {}: {}", path.display(), reason);
        }
    }

    /// Asks a yes/no question on the terminal. Anything but `y`/`yes` is no.
    pub fn confirm(question: &str) -> OrganizeResult<bool> {
        let term = Term::stdout();
        term.write_str(&format!("{} [y/N] ", question.bold()))
            .map_err(OrganizeError::Prompt)?;
        let answer = term.read_line().map_err(OrganizeError::Prompt)?;
        Ok(is_yes(&answer))
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn display(plan: &OrganizationPlan, path: &Path) -> String {
    if path == plan.base_dir {
        ".".to_string()
    } else {
        plan.display_path(path)
    }
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
