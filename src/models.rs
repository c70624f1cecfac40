//! Records passed between the scanner, the indexer, and the planner.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata collected for one file by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub name: String,
    /// Lowercase extension including the leading dot, or empty.
    pub extension: String,
    pub size: u64,
    /// ISO 8601 creation time (falls back to the modification time).
    pub created: String,
    /// ISO 8601 modification time.
    pub modified: String,
    pub mime_type: String,
    /// Text content for small text files.
    pub content: Option<String>,
    pub category: String,
    #[serde(default)]
    pub additional_metadata: BTreeMap<String, Value>,
}

/// Semantic description of a file (or of a whole project directory).
///
/// `path` is the absolute, unique key; it always lies under the run's base
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_suggested_folder")]
    pub suggested_folder: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_suggested_folder() -> String {
    "Other".to_string()
}

fn default_category() -> String {
    "Other".to_string()
}

impl FileAnalysis {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: Vec::new(),
            suggested_folder: default_suggested_folder(),
            description: String::new(),
            category: default_category(),
        }
    }

    /// File name component of `path`, or an empty string.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Renders `path` relative to `base_dir` as a `/`-joined key.
pub fn relative_key(path: &Path, base_dir: &Path) -> Option<String> {
    let relative = path.strip_prefix(base_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_key() {
        let base = Path::new("/data/inbox");
        assert_eq!(
            relative_key(Path::new("/data/inbox/a/b.txt"), base),
            Some("a/b.txt".to_string())
        );
        assert_eq!(relative_key(Path::new("/data/inbox"), base), None);
        assert_eq!(relative_key(Path::new("/elsewhere/b.txt"), base), None);
    }

    #[test]
    fn test_analysis_defaults_from_json() {
        let analysis: FileAnalysis = serde_json::from_str(r#"{"path": "/x/y.txt"}"#).unwrap();
        assert_eq!(analysis.category, "Other");
        assert_eq!(analysis.suggested_folder, "Other");
        assert!(analysis.tags.is_empty());
        assert_eq!(analysis.file_name(), "y.txt");
    }
}
