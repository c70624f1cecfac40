//! Detection of project directories that must be kept intact.
//!
//! A directory is a project root when one of the configured marker names
//! (`.git`, `Cargo.toml`, ...) exists directly inside it. Files below a
//! project root are never reorganized individually; the project itself can
//! be summarized into a single [`FileAnalysis`] from its README.

use crate::models::FileAnalysis;
use crate::naming::{self, NamingScheme};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Category given to synthesized project analyses.
pub const PROJECTS_CATEGORY: &str = "Projects";

const MAX_DESCRIPTION_CHARS: usize = 200;
const MAX_PROJECT_TAGS: usize = 8;
const GENERIC_TAGS: [&str; 2] = ["project", "source code"];

/// Technology keywords recognized in README text.
const TECH_KEYWORDS: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "rust",
    "golang",
    "java",
    "kotlin",
    "swift",
    "ruby",
    "php",
    "react",
    "vue",
    "angular",
    "svelte",
    "django",
    "flask",
    "fastapi",
    "rails",
    "spring",
    "node",
    "express",
    "docker",
    "kubernetes",
    "terraform",
    "postgres",
    "mysql",
    "sqlite",
    "mongodb",
    "redis",
    "graphql",
    "tensorflow",
    "pytorch",
    "pandas",
    "numpy",
    "jupyter",
    "machine learning",
    "deep learning",
    "data science",
    "api",
    "cli",
    "web",
    "android",
    "ios",
];

/// Finds project roots between a file and the base directory.
#[derive(Debug, Clone)]
pub struct ProjectDetector {
    base_dir: PathBuf,
    markers: Vec<String>,
    readme_names: Vec<String>,
    tags_scheme: NamingScheme,
    keyword_patterns: Vec<(String, Regex)>,
}

impl ProjectDetector {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        markers: Vec<String>,
        readme_names: Vec<String>,
        tags_scheme: NamingScheme,
    ) -> Self {
        let keyword_patterns = TECH_KEYWORDS
            .iter()
            .filter_map(|keyword| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword)))
                    .ok()
                    .map(|re| (keyword.to_string(), re))
            })
            .collect();

        Self {
            base_dir: base_dir.into(),
            markers,
            readme_names,
            tags_scheme,
            keyword_patterns,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn has_marker(&self, dir: &Path) -> bool {
        self.markers.iter().any(|marker| dir.join(marker).exists())
    }

    /// Returns the nearest ancestor of `file_path` that holds a marker.
    ///
    /// The walk starts at the file's parent, stops below the base directory,
    /// and finally tests the base directory itself.
    pub fn project_root(&self, file_path: &Path) -> Option<PathBuf> {
        let mut current = file_path.parent();

        while let Some(dir) = current {
            if dir == self.base_dir || !dir.starts_with(&self.base_dir) {
                break;
            }
            if self.has_marker(dir) {
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }

        if file_path.starts_with(&self.base_dir) && self.has_marker(&self.base_dir) {
            return Some(self.base_dir.clone());
        }

        None
    }

    pub fn is_in_project(&self, file_path: &Path) -> bool {
        self.project_root(file_path).is_some()
    }

    /// Project a directory belongs to, counting `dir` itself as a root when
    /// it holds a marker. Directories that do not exist yet resolve through
    /// their existing ancestors.
    pub fn enclosing_project(&self, dir: &Path) -> Option<PathBuf> {
        if dir != self.base_dir && dir.starts_with(&self.base_dir) && self.has_marker(dir) {
            return Some(dir.to_path_buf());
        }
        self.project_root(dir)
    }

    /// Summarizes a project directory as one analysis.
    ///
    /// Never fails: an unreadable or missing README yields the generic
    /// analysis.
    pub fn analyze_project(&self, project_root: &Path) -> FileAnalysis {
        let name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| project_root.display().to_string());

        let readme = self
            .readme_names
            .iter()
            .map(|candidate| project_root.join(candidate))
            .find(|path| path.is_file());

        let Some(readme) = readme else {
            return self.generic_analysis(project_root, &name);
        };

        match fs::read_to_string(&readme) {
            Ok(text) => self.analysis_from_readme(project_root, &name, &text),
            Err(e) => {
                debug!(path = %readme.display(), error = %e, "unreadable README");
                self.generic_analysis(project_root, &name)
            }
        }
    }

    fn generic_analysis(&self, project_root: &Path, name: &str) -> FileAnalysis {
        FileAnalysis {
            path: project_root.to_path_buf(),
            tags: self.generic_tags(),
            suggested_folder: PROJECTS_CATEGORY.to_string(),
            description: format!("Project directory: {name}"),
            category: PROJECTS_CATEGORY.to_string(),
        }
    }

    fn generic_tags(&self) -> Vec<String> {
        GENERIC_TAGS
            .iter()
            .map(|tag| naming::format(tag, self.tags_scheme))
            .collect()
    }

    fn analysis_from_readme(&self, project_root: &Path, name: &str, text: &str) -> FileAnalysis {
        let mut lines = text.lines().map(str::trim);

        let title = lines
            .by_ref()
            .find(|line| !line.is_empty())
            .map(|line| line.trim_start_matches(['#', ' ']).trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| name.to_string());

        // First paragraph after the title that is not a heading.
        let mut paragraph: Vec<&str> = Vec::new();
        for line in lines {
            if line.is_empty() {
                if paragraph.is_empty() {
                    continue;
                }
                break;
            }
            if line.starts_with('#') {
                if paragraph.is_empty() {
                    continue;
                }
                break;
            }
            paragraph.push(line);
        }

        let description = if paragraph.is_empty() {
            format!("Project directory: {title}")
        } else {
            truncate_description(&paragraph.join(" "))
        };

        let mut tags = self.generic_tags();
        for (keyword, pattern) in &self.keyword_patterns {
            if tags.len() >= MAX_PROJECT_TAGS {
                break;
            }
            if pattern.is_match(text) {
                let tag = naming::format(keyword, self.tags_scheme);
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }

        FileAnalysis {
            path: project_root.to_path_buf(),
            tags,
            suggested_folder: PROJECTS_CATEGORY.to_string(),
            description,
            category: PROJECTS_CATEGORY.to_string(),
        }
    }
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detector(base: &Path) -> ProjectDetector {
        ProjectDetector::new(
            base,
            vec![".git".to_string(), "Cargo.toml".to_string()],
            vec!["README.md".to_string(), "README".to_string()],
            NamingScheme::SnakeCase,
        )
    }

    #[test]
    fn test_file_next_to_marker_is_in_project() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let proj = base.join("proj");
        fs::create_dir_all(proj.join("src")).unwrap();
        fs::write(proj.join("Cargo.toml"), "[package]").unwrap();
        fs::write(proj.join("src").join("main.rs"), "fn main() {}").unwrap();

        let d = detector(base);
        assert_eq!(d.project_root(&proj.join("src").join("main.rs")), Some(proj.clone()));
        assert_eq!(d.project_root(&proj.join("Cargo.toml")), Some(proj));
    }

    #[test]
    fn test_marker_directory_counts() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let repo = base.join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join("notes.txt"), "x").unwrap();

        assert!(detector(base).is_in_project(&repo.join("notes.txt")));
    }

    #[test]
    fn test_no_marker_means_no_project() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("docs")).unwrap();
        fs::write(base.join("docs").join("a.txt"), "x").unwrap();

        let d = detector(base);
        assert_eq!(d.project_root(&base.join("docs").join("a.txt")), None);
        assert!(!d.is_in_project(&base.join("a.txt")));
    }

    #[test]
    fn test_marker_above_base_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let outer = temp_dir.path();
        fs::write(outer.join("Cargo.toml"), "[workspace]").unwrap();
        let base = outer.join("inbox");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("a.txt"), "x").unwrap();

        assert_eq!(detector(&base).project_root(&base.join("a.txt")), None);
    }

    #[test]
    fn test_marker_in_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join(".git")).unwrap();
        fs::write(base.join("a.txt"), "x").unwrap();

        assert_eq!(
            detector(base).project_root(&base.join("a.txt")),
            Some(base.to_path_buf())
        );
    }

    #[test]
    fn test_enclosing_project_of_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let photos = base.join("photos");
        fs::create_dir_all(photos.join(".git")).unwrap();

        let d = detector(base);
        assert_eq!(d.enclosing_project(&photos), Some(photos.clone()));
        assert_eq!(d.enclosing_project(&photos.join("2024").join("trips")), Some(photos));
        assert_eq!(d.enclosing_project(&base.join("documents")), None);
        assert_eq!(d.enclosing_project(base), None);
    }

    #[test]
    fn test_analyze_project_without_readme() {
        let temp_dir = TempDir::new().unwrap();
        let proj = temp_dir.path().join("widget");
        fs::create_dir_all(&proj).unwrap();

        let analysis = detector(temp_dir.path()).analyze_project(&proj);
        assert_eq!(analysis.path, proj);
        assert_eq!(analysis.category, "Projects");
        assert_eq!(analysis.description, "Project directory: widget");
        assert_eq!(analysis.tags, vec!["project", "source_code"]);
    }

    #[test]
    fn test_analyze_project_with_readme() {
        let temp_dir = TempDir::new().unwrap();
        let proj = temp_dir.path().join("widget");
        fs::create_dir_all(&proj).unwrap();
        fs::write(
            proj.join("README.md"),
            "# Widget Tracker\n\n## Overview\n\nA small Rust CLI that tracks\nwidgets in a SQLite database.\n\nBuilt with Docker in mind. Not a golang tool.\n",
        )
        .unwrap();

        let analysis = detector(temp_dir.path()).analyze_project(&proj);
        assert_eq!(
            analysis.description,
            "A small Rust CLI that tracks widgets in a SQLite database."
        );
        assert_eq!(&analysis.tags[..2], &["project", "source_code"]);
        for tag in ["rust", "sqlite", "docker", "golang", "cli"] {
            assert!(analysis.tags.contains(&tag.to_string()), "missing {tag}");
        }
        assert!(!analysis.tags.contains(&"java".to_string()));
        assert!(analysis.tags.len() <= 8);
    }

    #[test]
    fn test_long_description_is_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let proj = temp_dir.path().join("long");
        fs::create_dir_all(&proj).unwrap();
        let body = "word ".repeat(100);
        fs::write(proj.join("README"), format!("Long\n\n{body}\n")).unwrap();

        let analysis = detector(temp_dir.path()).analyze_project(&proj);
        assert!(analysis.description.ends_with("..."));
        assert!(analysis.description.chars().count() <= 200);
    }

    #[test]
    fn test_tags_capped() {
        let temp_dir = TempDir::new().unwrap();
        let proj = temp_dir.path().join("kitchen_sink");
        fs::create_dir_all(&proj).unwrap();
        fs::write(
            proj.join("README.md"),
            "Everything\n\npython javascript typescript rust java kotlin swift ruby php react\n",
        )
        .unwrap();

        let analysis = detector(temp_dir.path()).analyze_project(&proj);
        assert_eq!(analysis.tags.len(), 8);
    }
}
