//! Applies an [`OrganizationPlan`] to the filesystem.

use crate::plan::OrganizationPlan;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A reversible filesystem action that was actually performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Move { source: PathBuf, destination: PathBuf },
    CreateFolder { path: PathBuf },
}

/// Outcome of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Performed operations, in execution order. This is what gets logged.
    pub operations: Vec<Operation>,
    /// Moves not attempted, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Folders or moves that failed, with the error.
    pub failed: Vec<(PathBuf, String)>,
}

impl ExecutionReport {
    pub fn moved_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Move { .. }))
            .count()
    }

    pub fn created_folder_count(&self) -> usize {
        self.operations.len() - self.moved_count()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Executes plans.
pub struct PlanExecutor;

impl PlanExecutor {
    /// Creates the plan's folders, then performs its moves.
    ///
    /// Existing folders are not recorded. A move whose source has vanished,
    /// or whose destination is already occupied, is skipped. Individual
    /// failures are recorded and never stop the run.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aitidy::executor::PlanExecutor;
    /// use aitidy::plan::OrganizationPlan;
    ///
    /// let plan = OrganizationPlan::new("/path/to/inbox");
    /// let report = PlanExecutor::execute(&plan);
    /// println!("{} operations", report.operations.len());
    /// ```
    pub fn execute(plan: &OrganizationPlan) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        // BTreeSet order puts parents before their children.
        for folder in &plan.folders {
            if let Err(e) = Self::ensure_dir(folder, &mut report.operations) {
                warn!(path = %folder.display(), error = %e, "could not create folder");
                report.failed.push((folder.clone(), format!("Failed to create folder: {e}")));
            }
        }

        for planned in &plan.moves {
            let source = &planned.source;
            let destination = &planned.destination;

            if !source.exists() {
                debug!(path = %source.display(), "source vanished before execution");
                report
                    .skipped
                    .push((source.clone(), "Source no longer exists".to_string()));
                continue;
            }
            if destination.exists() {
                report
                    .skipped
                    .push((source.clone(), "Destination already exists".to_string()));
                continue;
            }

            if let Some(parent) = destination.parent()
                && let Err(e) = Self::ensure_dir(parent, &mut report.operations)
            {
                report
                    .failed
                    .push((source.clone(), format!("Failed to create folder: {e}")));
                continue;
            }

            match fs::rename(source, destination) {
                Ok(()) => {
                    debug!(
                        operation = "move",
                        source = %source.display(),
                        destination = %destination.display()
                    );
                    report.operations.push(Operation::Move {
                        source: source.clone(),
                        destination: destination.clone(),
                    });
                }
                Err(e) => {
                    warn!(path = %source.display(), error = %e, "move failed");
                    report.failed.push((source.clone(), format!("Failed to move file: {e}")));
                }
            }
        }

        report
    }

    /// Creates `dir` and any missing ancestors, recording one
    /// `create_folder` per directory created, outermost first.
    fn ensure_dir(dir: &Path, operations: &mut Vec<Operation>) -> std::io::Result<()> {
        if dir.is_dir() {
            return Ok(());
        }

        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path.exists() {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }

        fs::create_dir_all(dir)?;
        for path in missing.into_iter().rev() {
            debug!(operation = "create_folder", path = %path.display());
            operations.push(Operation::CreateFolder { path });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlannedMove;
    use tempfile::TempDir;

    fn planned(source: PathBuf, destination: PathBuf) -> PlannedMove {
        PlannedMove {
            source,
            destination,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_operation_json_shape() {
        let op = Operation::CreateFolder {
            path: PathBuf::from("/a/b"),
        };
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["type"], "create_folder");
        assert_eq!(value["path"], "/a/b");

        let parsed: Operation =
            serde_json::from_str(r#"{"type": "move", "source": "/a", "destination": "/b/a"}"#).unwrap();
        assert_eq!(
            parsed,
            Operation::Move {
                source: PathBuf::from("/a"),
                destination: PathBuf::from("/b/a"),
            }
        );
    }

    #[test]
    fn test_execute_creates_folders_before_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").expect("Failed to write file");

        let mut plan = OrganizationPlan::new(base);
        plan.folders.insert(base.join("finance"));
        plan.folders.insert(base.join("finance").join("invoices"));
        plan.moves.push(planned(
            base.join("a.txt"),
            base.join("finance").join("invoices").join("a.txt"),
        ));

        let report = PlanExecutor::execute(&plan);

        assert!(report.is_complete_success());
        assert_eq!(
            report.operations,
            vec![
                Operation::CreateFolder {
                    path: base.join("finance")
                },
                Operation::CreateFolder {
                    path: base.join("finance").join("invoices")
                },
                Operation::Move {
                    source: base.join("a.txt"),
                    destination: base.join("finance").join("invoices").join("a.txt"),
                },
            ]
        );
        assert!(base.join("finance").join("invoices").join("a.txt").exists());
        assert!(!base.join("a.txt").exists());
    }

    #[test]
    fn test_missing_ancestors_are_recorded() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").expect("Failed to write file");

        let mut plan = OrganizationPlan::new(base);
        plan.moves
            .push(planned(base.join("a.txt"), base.join("x").join("y").join("a.txt")));

        let report = PlanExecutor::execute(&plan);
        assert_eq!(report.created_folder_count(), 2);
        assert_eq!(report.moved_count(), 1);
        assert_eq!(
            report.operations[0],
            Operation::CreateFolder {
                path: base.join("x")
            }
        );
    }

    #[test]
    fn test_missing_source_and_occupied_destination_are_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir_all(base.join("docs")).expect("Failed to create dir");
        fs::write(base.join("b.txt"), "new").expect("Failed to write file");
        fs::write(base.join("docs").join("b.txt"), "old").expect("Failed to write file");

        let mut plan = OrganizationPlan::new(base);
        plan.folders.insert(base.join("docs"));
        plan.moves.push(planned(base.join("gone.txt"), base.join("docs").join("gone.txt")));
        plan.moves.push(planned(base.join("b.txt"), base.join("docs").join("b.txt")));

        let report = PlanExecutor::execute(&plan);

        assert!(report.operations.is_empty());
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            fs::read_to_string(base.join("docs").join("b.txt")).unwrap(),
            "old"
        );
    }

    #[test]
    fn test_second_execution_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").expect("Failed to write file");

        let mut plan = OrganizationPlan::new(base);
        plan.folders.insert(base.join("notes"));
        plan.moves.push(planned(base.join("a.txt"), base.join("notes").join("a.txt")));

        let first = PlanExecutor::execute(&plan);
        assert_eq!(first.operations.len(), 2);

        let second = PlanExecutor::execute(&plan);
        assert!(second.operations.is_empty());
        assert_eq!(second.skipped.len(), 1);
    }

    #[test]
    fn test_directories_move_whole() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let proj = base.join("proj");
        fs::create_dir_all(proj.join("src")).expect("Failed to create dir");
        fs::write(proj.join("src").join("main.rs"), "").expect("Failed to write file");

        let mut plan = OrganizationPlan::new(base);
        plan.folders.insert(base.join("projects"));
        plan.moves.push(planned(proj.clone(), base.join("projects").join("proj")));

        let report = PlanExecutor::execute(&plan);
        assert!(report.is_complete_success());
        assert!(base.join("projects").join("proj").join("src").join("main.rs").exists());
        assert!(!proj.exists());
    }
}
