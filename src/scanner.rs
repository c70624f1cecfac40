//! Directory traversal producing [`FileMetadata`].

use crate::artifacts::APP_DIR_NAME;
use crate::config::{CompiledFilters, ScannerConfig};
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::{Category, FileMapper};
use crate::models::FileMetadata;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Tool and build directories never worth organizing.
const COMMON_EXCLUDES: &[&str] = &["venv", "node_modules", ".git", "__pycache__", "dist", "build"];

/// Walks a directory and describes each file.
pub struct Scanner {
    filters: CompiledFilters,
    mapper: FileMapper,
    text_extensions: Vec<String>,
    max_file_size: u64,
    recursive: bool,
}

impl Scanner {
    /// Compiles the configured filters plus `extra_exclusions` (globs from
    /// the command line or an exclusion file).
    pub fn new(config: &ScannerConfig, extra_exclusions: &[String]) -> OrganizeResult<Self> {
        let mut exclusions = config.exclude_patterns.clone();
        exclusions.extend(extra_exclusions.iter().cloned());
        let filters = CompiledFilters::new(&config.filters, &exclusions)?;

        Ok(Self {
            filters,
            mapper: FileMapper::default(),
            text_extensions: config
                .text_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size: (config.max_file_size_mb.max(0.0) * 1024.0 * 1024.0) as u64,
            recursive: true,
        })
    }

    /// Only look at the top level of the base directory.
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Scans `base_dir`, returning files in path order.
    ///
    /// Unreadable entries are logged and skipped; only an unusable base
    /// directory is an error.
    pub fn scan(&self, base_dir: &Path) -> OrganizeResult<Vec<FileMetadata>> {
        if !base_dir.is_dir() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(base_dir)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.should_visit(base_dir, entry));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(base_dir) else {
                continue;
            };
            if !self.filters.should_include(relative) {
                debug!(path = %relative.display(), "excluded by filters");
                continue;
            }

            match self.describe(entry.path()) {
                Ok(metadata) => files.push(metadata),
                Err(e) => warn!(path = %entry.path().display(), error = %e, "could not read metadata"),
            }
        }

        Ok(files)
    }

    fn should_visit(&self, base_dir: &Path, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if name == APP_DIR_NAME || COMMON_EXCLUDES.contains(&&*name) {
            return false;
        }
        entry
            .path()
            .strip_prefix(base_dir)
            .map(|relative| self.filters.should_descend(relative))
            .unwrap_or(false)
    }

    fn describe(&self, path: &Path) -> std::io::Result<FileMetadata> {
        let meta = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let sniffed = infer::get_from_path(path).ok().flatten();
        let mime_type = sniffed
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| mime_from_extension(&ext).to_string());
        let category = self
            .mapper
            .categorize(Some(mime_type.as_str()), (!ext.is_empty()).then_some(ext.as_str()));

        let modified = meta.modified().ok();
        let created = meta.created().ok().or(modified);

        let content = if self.text_extensions.contains(&ext) && meta.len() <= self.max_file_size {
            fs::read_to_string(path).ok()
        } else {
            None
        };

        let mut additional_metadata = BTreeMap::new();
        if category == Category::Images {
            let format = sniffed
                .map(|kind| kind.extension().to_string())
                .unwrap_or_else(|| ext.clone());
            additional_metadata.insert("ImageFormat".to_string(), Value::String(format.to_uppercase()));
        }

        Ok(FileMetadata {
            path: path.to_path_buf(),
            name,
            extension: if ext.is_empty() { String::new() } else { format!(".{ext}") },
            size: meta.len(),
            created: iso8601(created),
            modified: iso8601(modified),
            mime_type,
            content,
            category: category.label().to_string(),
            additional_metadata,
        })
    }
}

fn iso8601(time: Option<SystemTime>) -> String {
    time.map(|t| DateTime::<Local>::from(t).to_rfc3339())
        .unwrap_or_default()
}

/// MIME type for files whose content `infer` does not recognize.
fn mime_from_extension(ext: &str) -> &'static str {
    match ext {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
