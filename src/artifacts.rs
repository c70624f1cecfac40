//! Files written next to the organized data.
//!
//! Everything lives in a hidden `.aitidy/` directory inside the base
//! directory: the synthesized schema, the table of contents of each executed
//! run and the HTML preview report. Names carry a `%Y%m%d_%H%M%S_%3f`
//! timestamp so they sort chronologically.

use crate::error::{OrganizeError, OrganizeResult};
use crate::plan::{OrganizationPlan, TocEntry};
use crate::schema::OrganizationSchema;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the per-directory application data folder.
pub const APP_DIR_NAME: &str = ".aitidy";

const SCHEMA_PREFIX: &str = "organization_schema_";
const TOC_PREFIX: &str = "file_organization_toc_";
const REPORT_PREFIX: &str = "organization_plan_";

/// Artifacts from older runs that may be lying loose in the base directory.
const MIGRATION_PATTERNS: &[&str] = &[
    "organization_plan_*.html",
    "organization_schema_*.json",
    "file_organization_toc_*.json",
];

/// Current local time as a sortable file-name stamp.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Table of contents written after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOfContents {
    pub organization_date: String,
    pub base_directory: PathBuf,
    pub files: Vec<TocEntry>,
}

/// Result of [`ArtifactStore::migrate`].
#[derive(Debug, Default)]
pub struct MigrationSummary {
    /// (old path, new path)
    pub migrated: Vec<(PathBuf, PathBuf)>,
    pub errors: Vec<(PathBuf, String)>,
}

impl MigrationSummary {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn message(&self) -> String {
        if self.migrated.is_empty() && self.errors.is_empty() {
            "No files found to migrate".to_string()
        } else if !self.errors.is_empty() {
            format!("Migration completed with {} errors", self.errors.len())
        } else {
            "Migration completed successfully".to_string()
        }
    }
}

/// Reads and writes the application data folder of one base directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let dir = base_dir.join(APP_DIR_NAME);
        Self { base_dir, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> OrganizeResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: self.dir.clone(),
            source: e,
        })
    }

    fn write(&self, prefix: &str, extension: &str, content: &str) -> OrganizeResult<PathBuf> {
        self.ensure_dir()?;
        let stamp = timestamp();
        let mut path = self.dir.join(format!("{prefix}{stamp}.{extension}"));
        let mut counter = 1;
        while path.exists() {
            path = self.dir.join(format!("{prefix}{stamp}_{counter}.{extension}"));
            counter += 1;
        }
        fs::write(&path, content).map_err(|e| OrganizeError::ArtifactWriteFailed {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }

    pub fn write_schema(&self, schema: &OrganizationSchema) -> OrganizeResult<PathBuf> {
        let json = serde_json::to_string_pretty(schema)?;
        self.write(SCHEMA_PREFIX, "json", &json)
    }

    /// Records `entries` (the moves that were carried out) as a table of
    /// contents.
    pub fn write_toc(&self, entries: &[TocEntry]) -> OrganizeResult<PathBuf> {
        let toc = TableOfContents {
            organization_date: chrono::Local::now().to_rfc3339(),
            base_directory: self.base_dir.clone(),
            files: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&toc)?;
        self.write(TOC_PREFIX, "json", &json)
    }

    pub fn write_report(&self, plan: &OrganizationPlan) -> OrganizeResult<PathBuf> {
        self.write(REPORT_PREFIX, "html", &render_html_report(plan))
    }

    /// Moves artifacts left in the base directory by older runs into the
    /// application data folder, renamed `<stem>_<timestamp><ext>`.
    pub fn migrate(&self) -> MigrationSummary {
        let mut summary = MigrationSummary::default();

        let patterns: Vec<Pattern> = MIGRATION_PATTERNS
            .iter()
            .filter_map(|pattern| Pattern::new(pattern).ok())
            .collect();

        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) => {
                summary.errors.push((self.base_dir.clone(), e.to_string()));
                return summary;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .is_some_and(|name| patterns.iter().any(|p| p.matches(&name)))
            })
            .collect();
        candidates.sort();

        if candidates.is_empty() {
            return summary;
        }
        if let Err(e) = self.ensure_dir() {
            summary.errors.push((self.dir.clone(), e.to_string()));
            return summary;
        }

        let stamp = timestamp();
        for path in candidates {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let target = self.dir.join(format!("{stem}_{stamp}{extension}"));

            match fs::rename(&path, &target) {
                Ok(()) => {
                    debug!(from = %path.display(), to = %target.display(), "migrated artifact");
                    summary.migrated.push((path, target));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not migrate artifact");
                    summary.errors.push((path, e.to_string()));
                }
            }
        }

        summary
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

const REPORT_STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
           line-height: 1.6; color: #333; max-width: 1200px; margin: 0 auto; padding: 20px; }
    h1, h2, h3 { color: #2c3e50; }
    .folder { background-color: #f8f9fa; border-left: 4px solid #4CAF50; padding: 10px 15px;
              margin-bottom: 10px; border-radius: 4px; }
    .file { background-color: #fff; border: 1px solid #ddd; padding: 10px 15px; margin-bottom: 5px;
            border-radius: 4px; display: flex; justify-content: space-between; }
    .file:hover { background-color: #f5f5f5; }
    .file-description { flex: 1; margin-right: 15px; }
    .file-tags { display: flex; flex-wrap: wrap; gap: 5px; align-items: center; }
    .tag { background-color: #e1f5fe; border-radius: 12px; padding: 3px 10px; font-size: 0.8em; white-space: nowrap; }
    .section { margin-bottom: 30px; }
    .move { display: flex; gap: 10px; align-items: center; }
    .arrow { color: #2196F3; font-weight: bold; }
    .stats { background-color: #e8f5e9; padding: 10px 15px; border-radius: 4px; margin-bottom: 20px; }
    .skipped, .project { background-color: #fff3e0; border-left: 4px solid #ff9800; padding: 10px 15px;
                         margin-bottom: 10px; border-radius: 4px; }
    .reason { color: #e65100; font-style: italic; }
"#;

/// Renders a static HTML preview of `plan`.
pub fn render_html_report(plan: &OrganizationPlan) -> String {
    let counts = plan.folder_file_counts();
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<title>File Organization Plan</title>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <style>{REPORT_STYLE}</style>\n</head>\n<body>\n\
         <h1>File Organization Plan</h1>\n<p>Generated on: {}</p>\n<p>Base directory: {}</p>\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        escape_html(&plan.base_dir.display().to_string()),
    );

    let _ = write!(
        html,
        "<div class=\"stats\">\n<h3>Statistics</h3>\n\
         <p>Total files to move: {}</p>\n<p>Total folders to create: {}</p>\n",
        plan.moves.len(),
        plan.folders.len(),
    );
    if !plan.skipped_files.is_empty() {
        let _ = writeln!(html, "<p>Total files skipped: {}</p>", plan.skipped_files.len());
    }
    if !plan.project_entries.is_empty() {
        let _ = writeln!(html, "<p>Projects preserved: {}</p>", plan.project_entries.len());
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"section\">\n<h2>Folder Structure</h2>\n");
    for folder in &plan.folders {
        let count = counts.get(folder).copied().unwrap_or(0);
        let _ = writeln!(
            html,
            "<div class=\"folder\"><b>{}</b> ({} {})</div>",
            escape_html(&plan.display_path(folder)),
            count,
            plural(count)
        );
    }
    html.push_str("</div>\n");

    html.push_str("<div class=\"section\">\n<h2>File Moves</h2>\n");
    for planned in &plan.moves {
        let tags: String = planned
            .tags
            .iter()
            .map(|tag| format!("<span class=\"tag\">{}</span>", escape_html(tag)))
            .collect();
        let _ = writeln!(
            html,
            "<div class=\"file\"><div class=\"file-description\"><div class=\"move\">\
             <div>{}</div><div class=\"arrow\">&rarr;</div><div>{}</div></div>\
             <div>{}</div></div><div class=\"file-tags\">{}</div></div>",
            escape_html(&plan.display_path(&planned.source)),
            escape_html(&plan.display_path(&planned.destination)),
            escape_html(&planned.description),
            tags
        );
    }
    html.push_str("</div>\n");

    if !plan.skipped_files.is_empty() {
        html.push_str("<div class=\"section\">\n<h2>Skipped Files</h2>\n");
        for skipped in &plan.skipped_files {
            let _ = writeln!(
                html,
                "<div class=\"skipped\"><div>{}</div><div class=\"reason\">Reason: {}</div></div>",
                escape_html(&plan.display_path(&skipped.path)),
                escape_html(&skipped.reason)
            );
        }
        html.push_str("</div>\n");
    }

    if !plan.project_entries.is_empty() {
        html.push_str("<div class=\"section\">\n<h2>Projects</h2>\n");
        for project in &plan.project_entries {
            let _ = writeln!(
                html,
                "<div class=\"project\"><b>{}</b> <span>({})</span><div>{}</div></div>",
                escape_html(&project.project_name),
                escape_html(&plan.display_path(&project.project_root)),
                escape_html(&project.description)
            );
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}
