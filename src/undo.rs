/// Operation history and undo.
///
/// Every executed run is persisted as one immutable batch file,
/// `operations_<timestamp>.json`, in a process-wide log directory. Undo
/// replays the most recent batch in reverse.
use crate::artifacts;
use crate::error::{OrganizeError, OrganizeResult};
use crate::executor::Operation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BATCH_PREFIX: &str = "operations_";
const BATCH_SUFFIX: &str = ".json";
const RETIRED_SUFFIX: &str = ".undone.json";

/// One persisted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationBatch {
    /// ISO 8601 time the batch was written.
    pub timestamp: String,
    pub operations: Vec<Operation>,
    /// File the batch was read from.
    #[serde(skip)]
    pub file: PathBuf,
}

/// Reads and writes operation batches in one directory.
#[derive(Debug, Clone)]
pub struct OperationLogger {
    log_dir: PathBuf,
}

impl OperationLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Writes `operations` as a new batch and returns its path.
    ///
    /// File names sort lexically in write order.
    pub fn log(&self, operations: &[Operation]) -> OrganizeResult<PathBuf> {
        fs::create_dir_all(&self.log_dir).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: self.log_dir.clone(),
            source: e,
        })?;

        let stamp = artifacts::timestamp();
        let mut path = self.log_dir.join(format!("{BATCH_PREFIX}{stamp}{BATCH_SUFFIX}"));
        let mut counter = 1;
        while path.exists() {
            path = self
                .log_dir
                .join(format!("{BATCH_PREFIX}{stamp}_{counter}{BATCH_SUFFIX}"));
            counter += 1;
        }

        let batch = OperationBatch {
            timestamp: chrono::Local::now().to_rfc3339(),
            operations: operations.to_vec(),
            file: path.clone(),
        };
        let json = serde_json::to_string_pretty(&batch)?;
        fs::write(&path, json).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), operations = operations.len(), "logged operations");
        Ok(path)
    }

    /// The most recently written batch that has not been undone.
    pub fn last_batch(&self) -> OrganizeResult<Option<OperationBatch>> {
        if !self.log_dir.exists() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.log_dir).map_err(|e| OrganizeError::HistoryReadFailed {
            path: self.log_dir.clone(),
            source: e,
        })?;

        let latest = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| {
                name.starts_with(BATCH_PREFIX)
                    && name.ends_with(BATCH_SUFFIX)
                    && !name.ends_with(RETIRED_SUFFIX)
            })
            .max();

        let Some(name) = latest else {
            return Ok(None);
        };
        Self::load(&self.log_dir.join(name)).map(Some)
    }

    fn load(path: &Path) -> OrganizeResult<OperationBatch> {
        let json = fs::read_to_string(path).map_err(|e| OrganizeError::HistoryReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut batch: OperationBatch =
            serde_json::from_str(&json).map_err(|e| OrganizeError::InvalidHistoryFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        batch.file = path.to_path_buf();
        Ok(batch)
    }

    /// Marks a batch as undone so it is no longer returned by
    /// [`last_batch`](Self::last_batch). The content is left untouched.
    pub fn retire(&self, batch: &OperationBatch) -> OrganizeResult<PathBuf> {
        let name = batch
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = name.strip_suffix(BATCH_SUFFIX).unwrap_or(&name);
        let retired = self.log_dir.join(format!("{stem}{RETIRED_SUFFIX}"));

        fs::rename(&batch.file, &retired).map_err(|e| OrganizeError::HistoryWriteFailed {
            path: batch.file.clone(),
            source: e,
        })?;
        Ok(retired)
    }
}

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back.
    pub restored_files: usize,
    /// Number of created folders removed again.
    pub removed_folders: usize,
    /// Operations left alone (file gone, folder no longer empty).
    pub skipped: Vec<(PathBuf, String)>,
    /// Operations that failed, with the error.
    pub failed: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.removed_folders + self.skipped.len() + self.failed.len()
    }

    /// Returns true if no operation failed. Skips are expected after
    /// later manual changes and do not count as failures.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-operation result.
enum Outcome {
    Restored,
    RemovedFolder,
    Skipped(PathBuf, String),
    Failed(PathBuf, String),
}

/// Manages undo operations for file organization.
pub struct UndoManager;

impl UndoManager {
    /// Reverses `operations`, last first.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: skipped; it was moved again or deleted since
    /// * **File name conflict**: the file now at the original location is
    ///   backed up with a timestamp suffix
    /// * **Folder not empty**: left in place, never force-deleted
    /// * **Permission denied**: recorded as a failure; later operations
    ///   still run
    pub fn undo(operations: &[Operation]) -> UndoReport {
        let mut report = UndoReport::default();

        for operation in operations.iter().rev() {
            let outcome = match operation {
                Operation::Move {
                    source,
                    destination,
                } => Self::restore_file(source, destination),
                Operation::CreateFolder { path } => Self::remove_folder(path),
            };

            match outcome {
                Outcome::Restored => report.restored_files += 1,
                Outcome::RemovedFolder => report.removed_folders += 1,
                Outcome::Skipped(path, reason) => {
                    debug!(path = %path.display(), reason = %reason, "undo skipped");
                    report.skipped.push((path, reason));
                }
                Outcome::Failed(path, reason) => {
                    warn!(path = %path.display(), reason = %reason, "undo failed");
                    report.failed.push((path, reason));
                }
            }
        }

        report
    }

    /// Undoes the logger's most recent batch.
    ///
    /// The batch is retired only if nothing failed, so a partial undo can be
    /// retried.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aitidy::undo::{OperationLogger, UndoManager};
    ///
    /// let logger = OperationLogger::new("/home/me/.aitidy/logs");
    /// match UndoManager::undo_last(&logger) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo_last(logger: &OperationLogger) -> OrganizeResult<UndoReport> {
        let batch = logger.last_batch()?.ok_or_else(|| OrganizeError::NoHistory {
            dir: logger.log_dir().to_path_buf(),
        })?;

        let report = Self::undo(&batch.operations);

        if report.is_complete_success()
            && let Err(e) = logger.retire(&batch)
        {
            warn!(error = %e, "could not retire undone batch");
        }

        Ok(report)
    }

    fn restore_file(source: &Path, destination: &Path) -> Outcome {
        if !destination.exists() {
            return Outcome::Skipped(
                destination.to_path_buf(),
                "File not found at expected location".to_string(),
            );
        }

        if source.exists() {
            let backup_path = Self::generate_backup_path(source);
            if let Err(e) = fs::rename(source, &backup_path) {
                return Outcome::Failed(
                    source.to_path_buf(),
                    format!("Could not backup conflicting file: {e}"),
                );
            }
        }

        if let Some(parent) = source.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            return Outcome::Failed(
                source.to_path_buf(),
                format!("Could not recreate original folder: {e}"),
            );
        }

        match fs::rename(destination, source) {
            Ok(()) => Outcome::Restored,
            Err(e) => Outcome::Failed(
                destination.to_path_buf(),
                format!("Failed to restore file: {e}"),
            ),
        }
    }

    fn remove_folder(path: &Path) -> Outcome {
        if !path.is_dir() {
            return Outcome::Skipped(path.to_path_buf(), "Folder no longer exists".to_string());
        }

        let is_empty = match fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => return Outcome::Failed(path.to_path_buf(), format!("Could not read folder: {e}")),
        };
        if !is_empty {
            return Outcome::Skipped(path.to_path_buf(), "Folder not empty".to_string());
        }

        match fs::remove_dir(path) {
            Ok(()) => Outcome::RemovedFolder,
            Err(e) => Outcome::Failed(path.to_path_buf(), format!("Failed to remove folder: {e}")),
        }
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        let backup_name = format!("{}.bak.{}", filename, timestamp);

        if let Some(parent) = original_path.parent() {
            parent.join(backup_name)
        } else {
            PathBuf::from(backup_name)
        }
    }
}
