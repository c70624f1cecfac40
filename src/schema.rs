//! Holistic folder schema synthesis.
//!
//! The [`SchemaSynthesizer`] asks the oracle for a folder hierarchy covering
//! every analysed file at once. Whatever comes back is treated as untrusted:
//! it is parsed into loose `Raw*` types and rebuilt into an
//! [`OrganizationSchema`] that satisfies the hierarchy rules (unique sibling
//! names, bounded depth, no cycles, mappings only for known files and known
//! folders). Request or parse failures fall back to clustering files by their
//! first tag, and any file still unmapped is placed by [`FolderAssigner`].

use crate::artifacts::ArtifactStore;
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::{self, IMAGES_CATEGORY};
use crate::models::{FileAnalysis, relative_key};
use crate::naming::{self, NamingScheme};
use crate::oracle::{CompletionRequest, Oracle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Catch-all folder for files without a better home.
pub const OTHER_FOLDER: &str = "Other";

const SYSTEM_PROMPT: &str = "You are an expert file organizer that outputs valid JSON. \
Your goal is to create logical folder structures based on file content, tags, and categories.";

const SYNTHESIS_TEMPERATURE: f32 = 0.2;

/// One folder in a synthesized hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub name: String,
    /// `/`-joined names from the root down to this node.
    pub path: String,
    /// Name of the parent folder, `None` for roots.
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    fn new(name: String, parent: Option<&FolderNode>) -> Self {
        let path = match parent {
            Some(parent) => format!("{}/{}", parent.path, name),
            None => name.clone(),
        };
        Self {
            name,
            path,
            parent: parent.map(|p| p.name.clone()),
            children: Vec::new(),
        }
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.path);
        for child in &self.children {
            child.collect_paths(out);
        }
    }
}

/// Folder hierarchy plus the file-to-folder assignment for one run.
///
/// Mapping keys are file paths relative to the base directory; values are
/// node paths in `folder_hierarchy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSchema {
    #[serde(default)]
    pub folder_hierarchy: Vec<FolderNode>,
    #[serde(default)]
    pub file_mappings: BTreeMap<String, String>,
}

impl OrganizationSchema {
    /// Every node path in depth-first pre-order.
    pub fn folder_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        for node in &self.folder_hierarchy {
            node.collect_paths(&mut paths);
        }
        paths
    }

    /// Parses and repairs an oracle response.
    ///
    /// `known_files` are the relative paths that were sent to the oracle;
    /// `max_levels` is the number of folder levels allowed below the base
    /// directory.
    pub fn from_response(
        response: &str,
        known_files: &BTreeSet<String>,
        max_levels: usize,
    ) -> OrganizeResult<Self> {
        let json = extract_json_object(response).ok_or_else(|| OrganizeError::InvalidSchema {
            reason: "response contains no JSON object".to_string(),
        })?;
        let raw: RawSchema = serde_json::from_str(json)?;
        Ok(Self::repair(raw, known_files, max_levels))
    }

    fn repair(raw: RawSchema, known_files: &BTreeSet<String>, max_levels: usize) -> Self {
        let mut builder = HierarchyBuilder {
            max_levels: max_levels.max(1),
            aliases: HashMap::new(),
        };

        let mut folder_hierarchy = Vec::new();
        for node in reattach_roots(raw.folder_hierarchy) {
            builder.insert(&mut folder_hierarchy, node, None, 1);
        }

        let mut file_mappings = BTreeMap::new();
        for (file, folder) in raw.file_mappings {
            let file = file.trim().trim_matches('/').to_string();
            if !known_files.contains(&file) {
                debug!(file = %file, "dropping mapping for unknown file");
                continue;
            }
            let Some(folder) = folder.as_str() else {
                continue;
            };
            match builder.resolve(folder) {
                Some(canonical) => {
                    file_mappings.insert(file, canonical);
                }
                None => debug!(file = %file, folder = %folder, "dropping mapping to unknown folder"),
            }
        }

        Self {
            folder_hierarchy,
            file_mappings,
        }
    }

    /// Path of a node that formats like `name`, comparing with `scheme`.
    fn find_folder(&self, name: &str, scheme: NamingScheme) -> Option<String> {
        let wanted = naming::format(name, scheme);
        self.folder_paths()
            .into_iter()
            .find(|path| naming::format(path, scheme) == wanted)
            .map(str::to_string)
    }

    fn ensure_root(&mut self, name: &str, scheme: NamingScheme) -> String {
        if let Some(existing) = self.find_folder(name, scheme) {
            return existing;
        }
        let node = FolderNode::new(name.to_string(), None);
        let path = node.path.clone();
        self.folder_hierarchy.push(node);
        path
    }

    /// Maps every summarized file that has no mapping yet.
    ///
    /// Ensures an "Other" root exists and, when any file is in the image
    /// category, an "Images" root as well.
    pub fn assign_unmapped(&mut self, files: &[FileSummary], scheme: NamingScheme) {
        let unmapped: Vec<&FileSummary> = files
            .iter()
            .filter(|file| !self.file_mappings.contains_key(&file.current_path))
            .collect();
        if unmapped.is_empty() {
            return;
        }

        let other = self.ensure_root(OTHER_FOLDER, scheme);
        let images = files
            .iter()
            .any(|file| file_category::is_image_category(&file.category))
            .then(|| self.ensure_root(IMAGES_CATEGORY, scheme));

        let candidates: Vec<String> = self.folder_paths().into_iter().map(str::to_string).collect();
        let assigner = FolderAssigner::new(candidates, other, images);

        for file in unmapped {
            let folder = assigner.assign(file);
            debug!(file = %file.current_path, folder = %folder, "assigned by heuristic");
            self.file_mappings.insert(file.current_path.clone(), folder);
        }
    }
}

/// Loosely typed oracle output.
#[derive(Debug, Default, Deserialize)]
struct RawSchema {
    #[serde(default)]
    folder_hierarchy: Vec<RawNode>,
    #[serde(default)]
    file_mappings: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNode {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    children: Vec<RawNode>,
}

impl RawNode {
    fn leaf(name: String) -> Self {
        Self {
            path: Some(name.clone()),
            name: Some(name),
            ..Self::default()
        }
    }

    /// Display name, taken from `name` or the last segment of `path`.
    fn clean_name(&self) -> Option<String> {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.path.as_deref().and_then(|p| p.rsplit('/').next()))?;
        let cleaned = name.replace(['/', '\\'], " ").trim().to_string();
        (!cleaned.is_empty()).then_some(cleaned)
    }

    fn raw_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(path) = &self.path {
            out.push(path);
        }
        for child in &self.children {
            child.raw_paths(out);
        }
    }
}

/// Moves root-level nodes under the root their `parent` names.
///
/// Oracles sometimes return a flat list with parent references instead of
/// nesting. References that form a cycle are ignored and those nodes stay at
/// the root.
fn reattach_roots(roots: Vec<RawNode>) -> Vec<RawNode> {
    let parent_of: Vec<Option<usize>> = roots
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let parent = node.parent.as_deref()?.trim();
            roots.iter().enumerate().position(|(other, candidate)| {
                other != index
                    && (candidate.name.as_deref() == Some(parent)
                        || candidate.path.as_deref() == Some(parent))
            })
        })
        .collect();

    let in_cycle = |start: usize| {
        let mut current = parent_of[start];
        let mut steps = 0;
        while let Some(index) = current {
            if index == start {
                return true;
            }
            if steps > roots.len() {
                // Leads into a cycle that does not include `start`.
                return false;
            }
            current = parent_of[index];
            steps += 1;
        }
        false
    };

    let parent_of: Vec<Option<usize>> = (0..roots.len())
        .map(|index| if in_cycle(index) { None } else { parent_of[index] })
        .collect();

    let mut slots: Vec<Option<RawNode>> = roots.into_iter().map(Some).collect();

    fn take(index: usize, slots: &mut [Option<RawNode>], parent_of: &[Option<usize>]) -> Option<RawNode> {
        let mut node = slots[index].take()?;
        let children: Vec<usize> = (0..parent_of.len())
            .filter(|&child| parent_of[child] == Some(index))
            .collect();
        for child in children {
            if let Some(child) = take(child, slots, parent_of) {
                node.children.push(child);
            }
        }
        Some(node)
    }

    (0..slots.len())
        .filter(|&index| parent_of[index].is_none())
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|index| take(index, &mut slots, &parent_of))
        .collect()
}

/// Rebuilds a validated tree and records how oracle paths map onto it.
struct HierarchyBuilder {
    max_levels: usize,
    /// Lowercased oracle or canonical path -> canonical path.
    aliases: HashMap<String, String>,
}

impl HierarchyBuilder {
    fn alias(&mut self, from: &str, to: &str) {
        let key = normalize_key(from);
        if !key.is_empty() {
            self.aliases.entry(key).or_insert_with(|| to.to_string());
        }
    }

    fn resolve(&self, folder: &str) -> Option<String> {
        self.aliases.get(&normalize_key(folder)).cloned()
    }

    fn insert(&mut self, siblings: &mut Vec<FolderNode>, raw: RawNode, parent: Option<&FolderNode>, level: usize) {
        let Some(name) = raw.clean_name() else {
            if let Some(parent) = parent {
                self.alias_subtree(&raw, &parent.path);
            }
            return;
        };

        if level > self.max_levels {
            if let Some(parent) = parent {
                self.alias(&format!("{}/{}", parent.path, name), &parent.path);
                self.alias_subtree(&raw, &parent.path);
            }
            return;
        }

        let index = match siblings
            .iter()
            .position(|sibling| sibling.name.eq_ignore_ascii_case(&name))
        {
            Some(index) => index,
            None => {
                siblings.push(FolderNode::new(name, parent));
                siblings.len() - 1
            }
        };

        let canonical = siblings[index].path.clone();
        self.alias(&canonical, &canonical);
        if let Some(raw_path) = &raw.path {
            self.alias(raw_path, &canonical);
        }

        let mut node = std::mem::take(&mut siblings[index]);
        let mut children = std::mem::take(&mut node.children);
        for child in raw.children {
            self.insert(&mut children, child, Some(&node), level + 1);
        }
        node.children = children;
        siblings[index] = node;
    }

    fn alias_subtree(&mut self, raw: &RawNode, target: &str) {
        let mut paths = Vec::new();
        raw.raw_paths(&mut paths);
        for path in paths {
            self.alias(path, target);
        }
    }
}

fn normalize_key(path: &str) -> String {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Compact description of one file, as sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub filename: String,
    pub tags: Vec<String>,
    pub description: String,
    pub category: String,
    /// Path relative to the base directory.
    pub current_path: String,
}

impl FileSummary {
    /// `None` when `analysis.path` is not below `base_dir`.
    pub fn from_analysis(analysis: &FileAnalysis, base_dir: &std::path::Path) -> Option<Self> {
        Some(Self {
            filename: analysis.file_name(),
            tags: analysis.tags.clone(),
            description: analysis.description.clone(),
            category: analysis.category.clone(),
            current_path: relative_key(&analysis.path, base_dir)?,
        })
    }
}

/// Scores candidate folders for a file.
///
/// Per path segment: +5 when it equals the category, +2 when it contains or
/// is contained in a tag, +1 when it occurs in the description and +3 when it
/// occurs in the filename. Comparisons use lower-case word forms. Ties keep
/// the earlier candidate; a best score of zero means "Other".
#[derive(Debug, Clone)]
pub struct FolderAssigner {
    candidates: Vec<(String, Vec<String>)>,
    other: String,
    images: Option<String>,
}

impl FolderAssigner {
    pub fn new(candidates: Vec<String>, other: String, images: Option<String>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|path| {
                let segments = path
                    .split('/')
                    .map(normalize_text)
                    .filter(|segment| !segment.is_empty())
                    .collect();
                (path, segments)
            })
            .collect();
        Self {
            candidates,
            other,
            images,
        }
    }

    pub fn score(&self, segments: &[String], file: &FileSummary) -> u32 {
        let category = normalize_text(&file.category);
        let tags: Vec<String> = file
            .tags
            .iter()
            .map(|tag| normalize_text(tag))
            .filter(|tag| !tag.is_empty())
            .collect();
        let description = normalize_text(&file.description);
        let filename = normalize_text(&file.filename);

        let mut score = 0;
        if !category.is_empty() && segments.iter().any(|segment| *segment == category) {
            score += 5;
        }
        for segment in segments {
            if tags
                .iter()
                .any(|tag| tag.contains(segment.as_str()) || segment.contains(tag.as_str()))
            {
                score += 2;
            }
            if description.contains(segment.as_str()) {
                score += 1;
            }
            if filename.contains(segment.as_str()) {
                score += 3;
            }
        }
        score
    }

    pub fn assign(&self, file: &FileSummary) -> String {
        if let Some(images) = &self.images
            && file_category::is_image_category(&file.category)
            && file_category::is_image_path(std::path::Path::new(&file.filename))
        {
            return images.clone();
        }

        let mut best: Option<(&str, u32)> = None;
        for (path, segments) in &self.candidates {
            let score = self.score(segments, file);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((path, score));
            }
        }

        match best {
            Some((path, score)) if score > 0 => path.to_string(),
            _ => self.other.clone(),
        }
    }
}

fn normalize_text(text: &str) -> String {
    naming::format(text, NamingScheme::LowerCase)
}

/// Produces the [`OrganizationSchema`] for a run.
pub struct SchemaSynthesizer<'a> {
    oracle: &'a dyn Oracle,
    model: String,
    max_tokens: u32,
    base_dir: PathBuf,
    max_depth: usize,
    folder_scheme: NamingScheme,
    artifacts: Option<&'a ArtifactStore>,
}

impl<'a> SchemaSynthesizer<'a> {
    /// `max_depth` counts the base directory as the first level.
    pub fn new(
        oracle: &'a dyn Oracle,
        model: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        max_depth: usize,
        folder_scheme: NamingScheme,
    ) -> Self {
        Self {
            oracle,
            model: model.into(),
            max_tokens: 4096,
            base_dir: base_dir.into(),
            max_depth,
            folder_scheme,
            artifacts: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Persist each synthesized schema through `artifacts`.
    pub fn with_artifacts(mut self, artifacts: &'a ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn folder_scheme(&self) -> NamingScheme {
        self.folder_scheme
    }

    fn max_levels(&self) -> usize {
        self.max_depth.saturating_sub(1).max(1)
    }

    /// Builds a schema covering every analysis below the base directory.
    ///
    /// Never fails. Oracle problems degrade to tag clustering, and
    /// persistence problems are logged.
    pub fn synthesize(&self, analyses: &[FileAnalysis]) -> OrganizationSchema {
        let summaries: Vec<FileSummary> = analyses
            .iter()
            .filter_map(|analysis| FileSummary::from_analysis(analysis, &self.base_dir))
            .collect();
        if summaries.is_empty() {
            return OrganizationSchema::default();
        }

        let mut schema = match self.request_schema(&summaries) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(model = %self.model, error = %e, "schema synthesis failed, clustering by tag");
                self.fallback_schema(&summaries)
            }
        };
        schema.assign_unmapped(&summaries, self.folder_scheme);

        if let Some(artifacts) = self.artifacts {
            match artifacts.write_schema(&schema) {
                Ok(path) => info!(path = %path.display(), "saved organization schema"),
                Err(e) => warn!(error = %e, "could not save organization schema"),
            }
        }

        schema
    }

    fn request_schema(&self, summaries: &[FileSummary]) -> OrganizeResult<OrganizationSchema> {
        let prompt = build_prompt(summaries, self.max_depth)?;
        let request = CompletionRequest::new(&self.model, prompt)
            .with_system(SYSTEM_PROMPT)
            .json()
            .with_temperature(SYNTHESIS_TEMPERATURE)
            .with_max_tokens(self.max_tokens);

        info!(model = %self.model, files = summaries.len(), "requesting folder schema");
        let response = self.oracle.complete(&request)?;

        let known: BTreeSet<String> = summaries.iter().map(|s| s.current_path.clone()).collect();
        OrganizationSchema::from_response(&response, &known, self.max_levels())
    }

    /// Groups files under their title-cased first tag; untagged files go to
    /// "Other".
    pub fn fallback_schema(&self, summaries: &[FileSummary]) -> OrganizationSchema {
        let mut folders: Vec<String> = Vec::new();
        let mut mappings = BTreeMap::new();

        for summary in summaries {
            let folder = summary
                .tags
                .first()
                .map(|tag| naming::title(tag.trim()))
                .filter(|tag| !tag.is_empty())
                .unwrap_or_else(|| OTHER_FOLDER.to_string());
            if !folders.contains(&folder) {
                folders.push(folder.clone());
            }
            mappings.insert(summary.current_path.clone(), Value::String(folder));
        }

        let raw = RawSchema {
            folder_hierarchy: folders.into_iter().map(RawNode::leaf).collect(),
            file_mappings: mappings,
        };
        let known = summaries.iter().map(|s| s.current_path.clone()).collect();
        OrganizationSchema::repair(raw, &known, self.max_levels())
    }
}

fn build_prompt(summaries: &[FileSummary], max_depth: usize) -> OrganizeResult<String> {
    let files = serde_json::to_string_pretty(summaries)?;
    Ok(format!(
        r#"You are an expert file organizer. Given the following list of files with their tags, descriptions, and categories,
create a logical folder structure that groups related files together.

Consider the following guidelines:
1. Create main categories based on file types, topics, or project areas
2. Create appropriate subcategories where relevant
3. Use descriptive, clear folder names (don't worry about formatting - just use spaces and readable names)
4. Consider hierarchical relationships between files
5. Maximum folder depth should be {max_depth} levels (including the base directory)
6. Group files by interest areas and themes, not just file types
7. Create general purpose folders that can accommodate multiple related files
8. Use the category field as a starting point, but feel free to create more appropriate organization
9. Pay special attention to media files like images, videos, and audio - try to keep them organized by content rather than just file type
10. Avoid using "Other" as a folder name unless absolutely necessary - try to find meaningful groupings
11. For images, consider grouping them by theme, subject matter, or purpose rather than putting all in a generic "Images" folder
12. Entries in the "Projects" category are whole project directories; map them as a single unit

Here are the files to organize:
{files}

Return your answer as a JSON object with the following structure:
{{
  "folder_hierarchy": [
    {{
      "name": "Folder Name",
      "path": "Folder Name",
      "parent": null,
      "children": [
        {{
          "name": "Subfolder Name",
          "path": "Folder Name/Subfolder Name",
          "parent": "Folder Name",
          "children": []
        }}
      ]
    }}
  ],
  "file_mappings": {{
    "original/path/to/file.txt": "Folder Name/Subfolder Name"
  }}
}}

Note: Don't worry about the formatting style of folder names (like camelCase or snake_case) - just use clear, descriptive names.
The formatting will be handled automatically by the system based on user preferences.
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use std::cell::RefCell;
    use std::path::Path;

    struct ScriptedOracle {
        response: Result<String, String>,
        requests: RefCell<Vec<CompletionRequest>>,
    }

    impl ScriptedOracle {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: Err("connection refused".to_string()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Oracle for ScriptedOracle {
        fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
            self.requests.borrow_mut().push(request.clone());
            self.response.clone().map_err(|reason| OracleError::Request {
                model: request.model.clone(),
                reason,
            })
        }
    }

    fn summary(path: &str, tags: &[&str], category: &str) -> FileSummary {
        FileSummary {
            filename: path.rsplit('/').next().unwrap_or(path).to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: String::new(),
            category: category.to_string(),
            current_path: path.to_string(),
        }
    }

    fn analysis(base: &Path, rel: &str, tags: &[&str], category: &str) -> FileAnalysis {
        FileAnalysis {
            path: base.join(rel),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            suggested_folder: "Other".to_string(),
            description: String::new(),
            category: category.to_string(),
        }
    }

    fn known(files: &[&str]) -> BTreeSet<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_photo_tag_beats_other() {
        let assigner = FolderAssigner::new(
            vec!["Photos".to_string(), "Other".to_string()],
            "Other".to_string(),
            None,
        );
        let file = summary("img1.jpg", &["photo"], "Images");
        assert_eq!(assigner.assign(&file), "Photos");
    }

    #[test]
    fn test_no_signal_routes_to_other() {
        let assigner = FolderAssigner::new(
            vec!["Finance".to_string(), "Travel".to_string()],
            "Other".to_string(),
            None,
        );
        let file = summary("notes.txt", &["recipes"], "Documents");
        assert_eq!(assigner.assign(&file), "Other");
    }

    #[test]
    fn test_category_match_outweighs_tags() {
        let assigner = FolderAssigner::new(
            vec!["Work/Invoices".to_string(), "Documents".to_string()],
            "Other".to_string(),
            None,
        );
        let file = summary("scan.pdf", &["invoice"], "Documents");
        // Documents: +5 category; Work/Invoices: +2 tag
        assert_eq!(assigner.assign(&file), "Documents");
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let assigner = FolderAssigner::new(
            vec!["Taxes".to_string(), "Tax".to_string()],
            "Other".to_string(),
            None,
        );
        let file = summary("a.txt", &["tax"], "Documents");
        assert_eq!(assigner.assign(&file), "Taxes");
    }

    #[test]
    fn test_images_short_circuit() {
        let assigner = FolderAssigner::new(
            vec!["Beach".to_string(), "Images".to_string()],
            "Other".to_string(),
            Some("Images".to_string()),
        );
        let file = summary("beach.png", &["beach"], "Images");
        assert_eq!(assigner.assign(&file), "Images");

        let not_image = summary("beach.txt", &["beach"], "Images");
        assert_eq!(assigner.assign(&not_image), "Beach");
    }

    #[test]
    fn test_parse_nested_response() {
        let response = r#"Sure! {"folder_hierarchy": [
            {"name": "Finance", "path": "Finance", "parent": null, "children": [
                {"name": "Invoices", "path": "Finance/Invoices", "parent": "Finance", "children": []}
            ]}
        ], "file_mappings": {"a.txt": "Finance/Invoices", "ghost.txt": "Finance"}}"#;

        let schema = OrganizationSchema::from_response(response, &known(&["a.txt"]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["Finance", "Finance/Invoices"]);
        assert_eq!(schema.folder_hierarchy[0].children[0].parent.as_deref(), Some("Finance"));
        assert_eq!(schema.file_mappings.len(), 1);
        assert_eq!(schema.file_mappings["a.txt"], "Finance/Invoices");
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let schema = OrganizationSchema::from_response("{}", &known(&[]), 2).unwrap();
        assert!(schema.folder_hierarchy.is_empty());
        assert!(schema.file_mappings.is_empty());
    }

    #[test]
    fn test_unparseable_response_is_error() {
        assert!(OrganizationSchema::from_response("no json here", &known(&[]), 2).is_err());
        assert!(OrganizationSchema::from_response("{\"folder_hierarchy\": 3}", &known(&[]), 2).is_err());
    }

    #[test]
    fn test_depth_is_truncated_and_mappings_follow() {
        let response = r#"{"folder_hierarchy": [
            {"name": "A", "children": [
                {"name": "B", "children": [{"name": "C", "path": "A/B/C"}]}
            ]}
        ], "file_mappings": {"x.txt": "A/B/C"}}"#;

        let schema = OrganizationSchema::from_response(response, &known(&["x.txt"]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["A", "A/B"]);
        assert_eq!(schema.file_mappings["x.txt"], "A/B");
    }

    #[test]
    fn test_duplicate_siblings_are_merged() {
        let response = r#"{"folder_hierarchy": [
            {"name": "Travel", "children": [{"name": "Japan"}]},
            {"name": "travel", "path": "travel", "children": [{"name": "Peru"}]}
        ], "file_mappings": {"a.txt": "travel/Peru"}}"#;

        let schema = OrganizationSchema::from_response(response, &known(&["a.txt"]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["Travel", "Travel/Japan", "Travel/Peru"]);
        assert_eq!(schema.file_mappings["a.txt"], "Travel/Peru");
    }

    #[test]
    fn test_flat_parent_references_are_nested() {
        let response = r#"{"folder_hierarchy": [
            {"name": "Invoices", "parent": "Finance"},
            {"name": "Finance", "parent": null}
        ], "file_mappings": {"a.txt": "Finance/Invoices"}}"#;

        let schema = OrganizationSchema::from_response(response, &known(&["a.txt"]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["Finance", "Finance/Invoices"]);
        assert_eq!(schema.file_mappings["a.txt"], "Finance/Invoices");
    }

    #[test]
    fn test_cyclic_parents_stay_at_root() {
        let response = r#"{"folder_hierarchy": [
            {"name": "A", "parent": "B"},
            {"name": "B", "parent": "A"}
        ]}"#;

        let schema = OrganizationSchema::from_response(response, &known(&[]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["A", "B"]);
    }

    #[test]
    fn test_slashes_in_names_are_replaced() {
        let response = r#"{"folder_hierarchy": [{"name": "Work/Life"}, {"name": "   "}]}"#;
        let schema = OrganizationSchema::from_response(response, &known(&[]), 2).unwrap();
        assert_eq!(schema.folder_paths(), vec!["Work Life"]);
    }

    #[test]
    fn test_assign_unmapped_adds_other_and_images() {
        let mut schema = OrganizationSchema {
            folder_hierarchy: vec![FolderNode::new("Finance".to_string(), None)],
            file_mappings: BTreeMap::new(),
        };
        let files = vec![
            summary("a.txt", &["finance"], "Documents"),
            summary("b.png", &["cat"], "Images"),
            summary("c.bin", &[], "Other"),
        ];
        schema.assign_unmapped(&files, NamingScheme::SnakeCase);

        assert_eq!(schema.folder_paths(), vec!["Finance", "Other", "Images"]);
        assert_eq!(schema.file_mappings["a.txt"], "Finance");
        assert_eq!(schema.file_mappings["b.png"], "Images");
        assert_eq!(schema.file_mappings["c.bin"], "Other");
    }

    #[test]
    fn test_assign_unmapped_reuses_existing_other() {
        let mut schema = OrganizationSchema {
            folder_hierarchy: vec![FolderNode::new("other".to_string(), None)],
            file_mappings: BTreeMap::new(),
        };
        schema.assign_unmapped(&[summary("c.bin", &[], "Other")], NamingScheme::SnakeCase);
        assert_eq!(schema.folder_paths(), vec!["other"]);
        assert_eq!(schema.file_mappings["c.bin"], "other");
    }

    #[test]
    fn test_synthesize_uses_oracle_response() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path();
        let oracle = ScriptedOracle::replying(
            r#"{"folder_hierarchy": [{"name": "Finance", "path": "Finance", "parent": null, "children": []}],
                "file_mappings": {"a.txt": "Finance"}}"#,
        );
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase);

        let schema = synthesizer.synthesize(&[
            analysis(base, "a.txt", &["invoice"], "Documents"),
            analysis(base, "b.txt", &["finance"], "Documents"),
        ]);

        assert_eq!(schema.file_mappings["a.txt"], "Finance");
        assert_eq!(schema.file_mappings["b.txt"], "Finance");

        let requests = oracle.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o");
        assert!(requests[0].json_mode);
        assert!((requests[0].temperature - 0.2).abs() < f32::EPSILON);
        assert!(requests[0].prompt.contains("\"current_path\": \"a.txt\""));
    }

    #[test]
    fn test_synthesize_falls_back_to_tag_clusters() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path();
        let oracle = ScriptedOracle::failing();
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase);

        let schema = synthesizer.synthesize(&[
            analysis(base, "a.txt", &["machine_learning", "notes"], "Documents"),
            analysis(base, "b.txt", &["machine_learning"], "Documents"),
            analysis(base, "c.txt", &[], "Documents"),
        ]);

        assert_eq!(schema.folder_paths(), vec!["Machine_Learning", "Other"]);
        assert_eq!(schema.file_mappings["a.txt"], "Machine_Learning");
        assert_eq!(schema.file_mappings["b.txt"], "Machine_Learning");
        assert_eq!(schema.file_mappings["c.txt"], "Other");
    }

    #[test]
    fn test_synthesize_without_files_skips_oracle() {
        let oracle = ScriptedOracle::failing();
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", "/tmp/none", 3, NamingScheme::SnakeCase);
        assert_eq!(synthesizer.synthesize(&[]), OrganizationSchema::default());
        assert!(oracle.requests.borrow().is_empty());
    }

    #[test]
    fn test_synthesize_persists_schema() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path();
        let artifacts = ArtifactStore::new(base);
        let oracle = ScriptedOracle::failing();
        let synthesizer = SchemaSynthesizer::new(&oracle, "gpt-4o", base, 3, NamingScheme::SnakeCase)
            .with_artifacts(&artifacts);

        synthesizer.synthesize(&[analysis(base, "a.txt", &["notes"], "Documents")]);

        let saved: Vec<_> = std::fs::read_dir(artifacts.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("organization_schema_"))
            .collect();
        assert_eq!(saved.len(), 1);
    }
}
