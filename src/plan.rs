//! Organization plans and the builder that produces them.
//!
//! A plan is a pure description of the moves a run intends to make. Nothing
//! here touches the filesystem except read-only existence checks; execution
//! lives in [`crate::executor`].

use crate::file_category;
use crate::models::{FileAnalysis, relative_key};
use crate::naming::{self, NamingScheme};
use crate::project::ProjectDetector;
use crate::schema::{OTHER_FOLDER, OrganizationSchema, SchemaSynthesizer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REASON_IN_PROJECT: &str = "In project directory";
pub const REASON_OUTSIDE_BASE: &str = "Outside base directory";
pub const REASON_ALREADY_IN_PLACE: &str = "Already in place";
pub const REASON_TARGET_IN_PROJECT: &str = "Target folder is inside a project directory";

/// One file (or project directory) to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub description: String,
    pub tags: Vec<String>,
}

/// Audit record written to the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub description: String,
    pub tags: Vec<String>,
}

/// A file the plan leaves where it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
}

/// A preserved project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub project_root: PathBuf,
    pub project_name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Everything a run intends to do below `base_dir`.
///
/// Every move source is unique and every destination's parent is listed in
/// `folders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPlan {
    pub base_dir: PathBuf,
    pub folders: BTreeSet<PathBuf>,
    pub moves: Vec<PlannedMove>,
    pub toc_entries: Vec<TocEntry>,
    pub skipped_files: Vec<SkippedFile>,
    pub project_entries: Vec<ProjectEntry>,
}

impl OrganizationPlan {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// True when executing the plan would change nothing.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.folders.iter().all(|folder| folder.exists())
    }

    /// Number of planned moves landing directly in each folder.
    pub fn folder_file_counts(&self) -> BTreeMap<PathBuf, usize> {
        let mut counts = BTreeMap::new();
        for planned in &self.moves {
            if let Some(parent) = planned.destination.parent() {
                *counts.entry(parent.to_path_buf()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// `path` relative to the base directory, for display.
    pub fn display_path(&self, path: &Path) -> String {
        relative_key(path, &self.base_dir).unwrap_or_else(|| path.display().to_string())
    }
}

/// How folders are chosen.
#[derive(Clone, Copy)]
pub enum PlanMode<'a> {
    /// Each file goes to its own sanitized `suggested_folder`.
    PerFile,
    /// Files are placed by a synthesized schema.
    Intelligent(&'a SchemaSynthesizer<'a>),
}

/// Schema with every folder path rewritten by the folder naming scheme.
///
/// Built from, and never modifying, an [`OrganizationSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedSchema {
    /// Formatted folder paths in hierarchy order, without duplicates.
    pub folders: Vec<String>,
    /// Relative file path -> formatted folder path.
    pub file_mappings: BTreeMap<String, String>,
}

impl FormattedSchema {
    pub fn new(schema: &OrganizationSchema, scheme: NamingScheme) -> Self {
        let mut formatted_paths: HashMap<&str, String> = HashMap::new();
        let mut folders = Vec::new();
        for path in schema.folder_paths() {
            let formatted = naming::format_folder_path(path, scheme);
            if !folders.contains(&formatted) {
                folders.push(formatted.clone());
            }
            formatted_paths.insert(path, formatted);
        }

        let file_mappings = schema
            .file_mappings
            .iter()
            .map(|(file, folder)| {
                let formatted = formatted_paths
                    .get(folder.as_str())
                    .cloned()
                    .unwrap_or_else(|| naming::format_folder_path(folder, scheme));
                (file.clone(), formatted)
            })
            .collect();

        Self {
            folders,
            file_mappings,
        }
    }
}

/// Turns analyses into an [`OrganizationPlan`].
pub struct PlanBuilder<'a> {
    base_dir: PathBuf,
    folder_scheme: NamingScheme,
    projects: Option<&'a ProjectDetector>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(base_dir: impl Into<PathBuf>, folder_scheme: NamingScheme) -> Self {
        Self {
            base_dir: base_dir.into(),
            folder_scheme,
            projects: None,
        }
    }

    /// Keep files inside detected projects in place.
    pub fn with_projects(mut self, detector: &'a ProjectDetector) -> Self {
        self.projects = Some(detector);
        self
    }

    /// Builds the plan. Never fails; oracle trouble inside synthesis is
    /// absorbed by the synthesizer's fallbacks.
    pub fn build_plan(&self, analyses: &[FileAnalysis], mode: PlanMode<'_>) -> OrganizationPlan {
        let mut plan = OrganizationPlan::new(&self.base_dir);
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut project_roots: Vec<PathBuf> = Vec::new();
        let mut filtered: Vec<&FileAnalysis> = Vec::new();

        for analysis in analyses {
            if !seen.insert(analysis.path.as_path()) {
                debug!(path = %analysis.path.display(), "duplicate analysis ignored");
                continue;
            }
            if relative_key(&analysis.path, &self.base_dir).is_none() {
                plan.skipped_files.push(SkippedFile {
                    path: analysis.path.clone(),
                    reason: REASON_OUTSIDE_BASE.to_string(),
                    project_root: None,
                });
                continue;
            }
            if let Some(detector) = self.projects
                && let Some(root) = detector.project_root(&analysis.path)
            {
                plan.skipped_files.push(SkippedFile {
                    path: analysis.path.clone(),
                    reason: REASON_IN_PROJECT.to_string(),
                    project_root: Some(root.clone()),
                });
                if !project_roots.contains(&root) {
                    project_roots.push(root);
                }
                continue;
            }
            filtered.push(analysis);
        }

        let project_units = self.project_units(&project_roots, &mut plan);
        let mut taken: HashSet<PathBuf> = HashSet::new();

        match mode {
            PlanMode::PerFile => {
                for analysis in filtered {
                    let folder = naming::sanitize_folder_name(&analysis.suggested_folder, self.folder_scheme);
                    self.push_move(&mut plan, analysis, &folder, &mut taken);
                }
            }
            PlanMode::Intelligent(synthesizer) => {
                let units: Vec<FileAnalysis> = filtered
                    .into_iter()
                    .cloned()
                    .chain(project_units)
                    .collect();
                if units.is_empty() {
                    info!("nothing outside project directories to organize");
                    return plan;
                }

                let schema = synthesizer.synthesize(&units);
                let formatted = FormattedSchema::new(&schema, self.folder_scheme);
                for folder in &formatted.folders {
                    let folder = join_folder(&self.base_dir, folder);
                    if self.enclosing_project(&folder).is_none() {
                        plan.folders.insert(folder);
                    }
                }

                let other = naming::sanitize_folder_name(OTHER_FOLDER, self.folder_scheme);
                let images = naming::sanitize_folder_name(file_category::IMAGES_CATEGORY, self.folder_scheme);

                for unit in &units {
                    let mut folder = relative_key(&unit.path, &self.base_dir)
                        .and_then(|key| formatted.file_mappings.get(&key).cloned())
                        .unwrap_or_else(|| other.clone());

                    if folder.eq_ignore_ascii_case(&other)
                        && file_category::is_image_path(&unit.path)
                        && file_category::is_image_category(&unit.category)
                    {
                        folder = images.clone();
                    }

                    self.push_move(&mut plan, unit, &folder, &mut taken);
                }
            }
        }

        plan
    }

    /// Records one project entry per root and returns the analyses of the
    /// projects that may be moved as a whole.
    fn project_units(&self, roots: &[PathBuf], plan: &mut OrganizationPlan) -> Vec<FileAnalysis> {
        let Some(detector) = self.projects else {
            return Vec::new();
        };

        let mut units = Vec::new();
        for root in roots {
            let analysis = detector.analyze_project(root);
            plan.project_entries.push(ProjectEntry {
                project_root: root.clone(),
                project_name: analysis.file_name(),
                description: analysis.description.clone(),
                tags: analysis.tags.clone(),
            });

            // Roots at the base directory or inside another project stay put.
            if detector.project_root(root).is_none() {
                units.push(analysis);
            }
        }
        units
    }

    fn push_move(
        &self,
        plan: &mut OrganizationPlan,
        analysis: &FileAnalysis,
        folder: &str,
        taken: &mut HashSet<PathBuf>,
    ) {
        let Some(file_name) = analysis.path.file_name() else {
            return;
        };
        let target_dir = join_folder(&self.base_dir, folder);
        let destination = target_dir.join(file_name);

        if destination == analysis.path || target_dir.starts_with(&analysis.path) {
            plan.skipped_files.push(SkippedFile {
                path: analysis.path.clone(),
                reason: REASON_ALREADY_IN_PLACE.to_string(),
                project_root: None,
            });
            return;
        }

        if let Some(root) = self.enclosing_project(&target_dir) {
            debug!(
                path = %analysis.path.display(),
                project = %root.display(),
                "target folder lies inside a project"
            );
            plan.skipped_files.push(SkippedFile {
                path: analysis.path.clone(),
                reason: REASON_TARGET_IN_PROJECT.to_string(),
                project_root: Some(root),
            });
            return;
        }

        let destination = unique_destination(destination, taken);
        taken.insert(destination.clone());
        plan.folders.insert(target_dir);

        plan.moves.push(PlannedMove {
            source: analysis.path.clone(),
            destination: destination.clone(),
            description: analysis.description.clone(),
            tags: analysis.tags.clone(),
        });
        plan.toc_entries.push(TocEntry {
            original_path: analysis.path.clone(),
            new_path: destination,
            description: analysis.description.clone(),
            tags: analysis.tags.clone(),
        });
    }

    fn enclosing_project(&self, dir: &Path) -> Option<PathBuf> {
        self.projects.and_then(|detector| detector.enclosing_project(dir))
    }
}

fn join_folder(base_dir: &Path, folder: &str) -> PathBuf {
    folder
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base_dir.to_path_buf(), |path, segment| path.join(segment))
}

/// Appends `_1`, `_2`, ... to the file stem until the path is neither
/// planned already nor present on disk.
fn unique_destination(destination: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(&destination) && !destination.exists() {
        return destination;
    }

    let parent = destination.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{stem}_{counter}{extension}"));
        if !taken.contains(&candidate) && !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{CompletionRequest, Oracle, OracleError};
    use crate::schema::FolderNode;
    use std::fs;
    use tempfile::TempDir;

    struct FixedOracle(Result<&'static str, ()>);

    impl Oracle for FixedOracle {
        fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
            self.0.map(str::to_string).map_err(|_| OracleError::EmptyResponse {
                model: request.model.clone(),
            })
        }
    }

    fn analysis(path: PathBuf, folder: &str, tags: &[&str], category: &str) -> FileAnalysis {
        FileAnalysis {
            path,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            suggested_folder: folder.to_string(),
            description: format!("{folder} file"),
            category: category.to_string(),
        }
    }

    fn detector(base: &Path) -> ProjectDetector {
        ProjectDetector::new(
            base,
            vec![".git".to_string(), "Cargo.toml".to_string()],
            vec!["README.md".to_string()],
            NamingScheme::SnakeCase,
        )
    }

    fn assert_invariants(plan: &OrganizationPlan) {
        let sources: HashSet<_> = plan.moves.iter().map(|m| &m.source).collect();
        assert_eq!(sources.len(), plan.moves.len());
        for planned in &plan.moves {
            assert_ne!(planned.source, planned.destination);
            let parent = planned.destination.parent().unwrap();
            assert!(plan.folders.contains(parent), "missing folder {}", parent.display());
        }
    }

    #[test]
    fn test_per_file_plan() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let analyses = vec![
            analysis(base.join("a.txt"), "Invoices", &["invoice"], "Documents"),
            analysis(base.join("b.txt"), "Tax: Returns?", &[], "Documents"),
            analysis(base.join("c.txt"), "...", &[], "Documents"),
        ];

        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase).build_plan(&analyses, PlanMode::PerFile);

        assert_invariants(&plan);
        assert_eq!(plan.moves[0].destination, base.join("invoices").join("a.txt"));
        assert_eq!(plan.moves[1].destination, base.join("tax_returns").join("b.txt"));
        assert_eq!(plan.moves[2].destination, base.join("other").join("c.txt"));
        assert_eq!(plan.toc_entries.len(), 3);
        assert_eq!(plan.toc_entries[0].new_path, plan.moves[0].destination);
    }

    #[test]
    fn test_project_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let proj = base.join("proj");
        fs::create_dir_all(&proj).unwrap();
        fs::write(proj.join("Cargo.toml"), "").unwrap();
        fs::write(proj.join("code.py"), "").unwrap();

        let analyses = vec![
            analysis(base.join("a.txt"), "Invoices", &["invoice"], "Documents"),
            analysis(proj.join("code.py"), "Code", &["python"], "Code"),
            analysis(proj.join("Cargo.toml"), "Code", &["rust"], "Code"),
        ];
        let detector = detector(base);
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase)
            .with_projects(&detector)
            .build_plan(&analyses, PlanMode::PerFile);

        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.skipped_files.len(), 2);
        assert_eq!(plan.skipped_files[0].reason, REASON_IN_PROJECT);
        assert_eq!(plan.skipped_files[0].project_root.as_deref(), Some(proj.as_path()));
        assert_eq!(plan.project_entries.len(), 1);
        assert_eq!(plan.project_entries[0].project_name, "proj");
        assert!(plan.moves.iter().all(|m| !m.source.starts_with(&proj)));
    }

    #[test]
    fn test_duplicates_and_outside_paths() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("base");
        let analyses = vec![
            analysis(base.join("a.txt"), "One", &[], "Documents"),
            analysis(base.join("a.txt"), "Two", &[], "Documents"),
            analysis(temp_dir.path().join("elsewhere.txt"), "One", &[], "Documents"),
        ];

        let plan = PlanBuilder::new(&base, NamingScheme::SnakeCase).build_plan(&analyses, PlanMode::PerFile);

        assert_invariants(&plan);
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].destination, base.join("one").join("a.txt"));
        assert_eq!(plan.skipped_files[0].reason, REASON_OUTSIDE_BASE);
    }

    #[test]
    fn test_already_in_place_and_collisions() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("notes")).unwrap();
        fs::write(base.join("notes").join("todo.txt"), "").unwrap();

        let analyses = vec![
            analysis(base.join("notes").join("todo.txt"), "Notes", &[], "Documents"),
            analysis(base.join("x").join("todo.txt"), "Notes", &[], "Documents"),
            analysis(base.join("y").join("todo.txt"), "Notes", &[], "Documents"),
        ];
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase).build_plan(&analyses, PlanMode::PerFile);

        assert_invariants(&plan);
        assert_eq!(plan.skipped_files[0].reason, REASON_ALREADY_IN_PLACE);
        assert_eq!(plan.moves[0].destination, base.join("notes").join("todo_1.txt"));
        assert_eq!(plan.moves[1].destination, base.join("notes").join("todo_2.txt"));
    }

    #[test]
    fn test_intelligent_plan_formats_and_promotes_images() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let oracle = FixedOracle(Ok(r#"{"folder_hierarchy": [
            {"name": "Personal Finance", "path": "Personal Finance", "parent": null, "children": [
                {"name": "Tax Returns", "path": "Personal Finance/Tax Returns", "parent": "Personal Finance", "children": []}
            ]}],
            "file_mappings": {"a.txt": "Personal Finance/Tax Returns", "cat.png": "Other"}}"#));
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase);

        let analyses = vec![
            analysis(base.join("a.txt"), "", &["tax"], "Documents"),
            analysis(base.join("cat.png"), "", &["cat"], "Images"),
        ];
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase)
            .build_plan(&analyses, PlanMode::Intelligent(&synthesizer));

        assert_invariants(&plan);
        assert!(plan.folders.contains(&base.join("personal_finance")));
        assert!(plan.folders.contains(&base.join("personal_finance").join("tax_returns")));
        assert_eq!(
            plan.moves[0].destination,
            base.join("personal_finance").join("tax_returns").join("a.txt")
        );
        assert_eq!(plan.moves[1].destination, base.join("images").join("cat.png"));
    }

    #[test]
    fn test_intelligent_plan_moves_projects_as_units() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let proj = base.join("proj");
        fs::create_dir_all(proj.join(".git")).unwrap();
        fs::write(proj.join("main.rs"), "").unwrap();

        let oracle = FixedOracle(Err(()));
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase);
        let detector = detector(base);

        let analyses = vec![
            analysis(base.join("a.txt"), "", &["notes"], "Documents"),
            analysis(proj.join("main.rs"), "", &["rust"], "Code"),
        ];
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase)
            .with_projects(&detector)
            .build_plan(&analyses, PlanMode::Intelligent(&synthesizer));

        assert_invariants(&plan);
        assert_eq!(plan.skipped_files[0].path, proj.join("main.rs"));
        // Fallback clusters by first tag: "project" for the synthesized unit.
        let project_move = plan.moves.iter().find(|m| m.source == proj).unwrap();
        assert_eq!(project_move.destination, base.join("project").join("proj"));
        let notes_move = plan.moves.iter().find(|m| m.source == base.join("a.txt")).unwrap();
        assert_eq!(notes_move.destination, base.join("notes").join("a.txt"));
    }

    #[test]
    fn test_per_file_target_inside_project_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let photos = base.join("photos");
        fs::create_dir_all(photos.join(".git")).unwrap();

        let analyses = vec![
            analysis(base.join("cat.png"), "Photos", &["cat"], "Images"),
            analysis(base.join("dog.png"), "PHOTOS", &["dog"], "Images"),
            analysis(base.join("a.txt"), "Invoices", &["invoice"], "Documents"),
        ];
        let detector = detector(base);
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase)
            .with_projects(&detector)
            .build_plan(&analyses, PlanMode::PerFile);

        assert_invariants(&plan);
        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].destination, base.join("invoices").join("a.txt"));
        assert!(plan.folders.iter().all(|f| !f.starts_with(&photos)));
        let skipped: Vec<_> = plan
            .skipped_files
            .iter()
            .filter(|s| s.reason == REASON_TARGET_IN_PROJECT)
            .collect();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].project_root.as_deref(), Some(photos.as_path()));
    }

    #[test]
    fn test_schema_folder_inside_project_is_not_used() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let photos = base.join("photos");
        fs::create_dir_all(photos.join(".git")).unwrap();
        fs::write(photos.join("index.md"), "").unwrap();

        let oracle = FixedOracle(Ok(r#"{"folder_hierarchy": [
            {"name": "Photos", "path": "Photos", "parent": null, "children": [
                {"name": "Cats", "path": "Photos/Cats", "parent": "Photos", "children": []}
            ]}],
            "file_mappings": {"cat.png": "Photos/Cats", "photos": "Photos"}}"#));
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase);
        let detector = detector(base);

        let analyses = vec![
            analysis(base.join("cat.png"), "", &["cat"], "Images"),
            analysis(photos.join("index.md"), "", &["docs"], "Documents"),
        ];
        let plan = PlanBuilder::new(base, NamingScheme::SnakeCase)
            .with_projects(&detector)
            .build_plan(&analyses, PlanMode::Intelligent(&synthesizer));

        assert_invariants(&plan);
        assert!(plan.moves.is_empty());
        assert!(plan.folders.iter().all(|f| !f.starts_with(&photos)));
        let cat = plan
            .skipped_files
            .iter()
            .find(|s| s.path == base.join("cat.png"))
            .unwrap();
        assert_eq!(cat.reason, REASON_TARGET_IN_PROJECT);
    }

    #[test]
    fn test_formatted_schema_is_a_copy() {
        let mut root = FolderNode {
            name: "Travel Plans".to_string(),
            path: "Travel Plans".to_string(),
            parent: None,
            children: Vec::new(),
        };
        root.children.push(FolderNode {
            name: "Japan".to_string(),
            path: "Travel Plans/Japan".to_string(),
            parent: Some("Travel Plans".to_string()),
            children: Vec::new(),
        });
        let schema = OrganizationSchema {
            folder_hierarchy: vec![root],
            file_mappings: [("a.txt".to_string(), "Travel Plans/Japan".to_string())].into(),
        };

        let formatted = FormattedSchema::new(&schema, NamingScheme::PascalCase);
        assert_eq!(formatted.folders, vec!["TravelPlans", "TravelPlans/Japan"]);
        assert_eq!(formatted.file_mappings["a.txt"], "TravelPlans/Japan");
        assert_eq!(schema.folder_hierarchy[0].path, "Travel Plans");
    }
}
