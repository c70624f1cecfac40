//! Per-file analysis through the [`Oracle`].
//!
//! Each file is described to the model as a short document (name, type,
//! timestamps, a content preview) and three questions are asked about it:
//! tags, a folder suggestion, and a one or two sentence description.
//! Responses are free text and parsed defensively; any oracle failure
//! degrades to [`Indexer::fallback_analysis`] rather than aborting the run.

use crate::config::{LlmConfig, OrganizerConfig};
use crate::models::{FileAnalysis, FileMetadata};
use crate::naming::{self, NamingScheme};
use crate::oracle::{CompletionRequest, Oracle, OracleError};
use indicatif::ProgressBar;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

const TAGS_QUESTION: &str =
    "What are the most relevant tags or categories for this file? Return only a JSON array of strings.";
const FOLDER_QUESTION: &str = "Based on the file's content and metadata, suggest an appropriate folder name for organizing this file. Return only a single string.";
const DESCRIPTION_QUESTION: &str =
    "Provide a brief (max 2 sentences) description of this file. Return only the description text.";
const CONNECTION_DOCUMENT: &str = "This is a test document to verify API connectivity.";
const CONNECTION_QUESTION: &str = "What is this document about?";

/// Characters of file content included in the prompt.
const CONTENT_PREVIEW_CHARS: usize = 2000;

pub const UNCLASSIFIED_TAG: &str = "unclassified";

static JSON_ARRAY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(.*?)\]").ok());

/// Asks the oracle about individual files.
pub struct Indexer<'a> {
    oracle: &'a dyn Oracle,
    model: String,
    temperature: f32,
    max_tokens: u32,
    tags_scheme: NamingScheme,
    folder_scheme: NamingScheme,
    categories_scheme: NamingScheme,
}

impl<'a> Indexer<'a> {
    pub fn new(oracle: &'a dyn Oracle, llm: &LlmConfig, organizer: &OrganizerConfig) -> Self {
        Self {
            oracle,
            model: llm.model_name.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            tags_scheme: organizer.tags_naming_scheme,
            folder_scheme: organizer.naming_scheme,
            categories_scheme: organizer.categories_naming_scheme,
        }
    }

    /// Sends a trivial request and returns the reply.
    pub fn check_connection(&self) -> Result<String, OracleError> {
        self.ask(CONNECTION_DOCUMENT, CONNECTION_QUESTION)
    }

    /// Analyses every file in order, advancing `progress` once per file.
    pub fn analyze_all(&self, files: &[FileMetadata], progress: &ProgressBar) -> Vec<FileAnalysis> {
        files
            .iter()
            .map(|file| {
                progress.set_message(file.name.clone());
                let analysis = self.analyze(file);
                progress.inc(1);
                analysis
            })
            .collect()
    }

    /// Analyses one file. Never fails: oracle errors yield the fallback analysis.
    pub fn analyze(&self, file: &FileMetadata) -> FileAnalysis {
        match self.query(file) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "analysis failed, using fallback");
                Self::fallback_analysis(file)
            }
        }
    }

    /// Analysis used when the oracle cannot be reached or errors.
    pub fn fallback_analysis(file: &FileMetadata) -> FileAnalysis {
        FileAnalysis {
            path: file.path.clone(),
            tags: vec![UNCLASSIFIED_TAG.to_string()],
            suggested_folder: "other".to_string(),
            description: "Could not analyze file content".to_string(),
            category: file.category.clone(),
        }
    }

    fn query(&self, file: &FileMetadata) -> Result<FileAnalysis, OracleError> {
        let document = document_text(file);
        let tags_response = self.ask(&document, TAGS_QUESTION)?;
        let folder_response = self.ask(&document, FOLDER_QUESTION)?;
        let description_response = self.ask(&document, DESCRIPTION_QUESTION)?;

        let tags: Vec<String> = parse_tags(&tags_response)
            .iter()
            .map(|tag| naming::format(tag, self.tags_scheme))
            .filter(|tag| !tag.is_empty())
            .collect();
        let suggested_folder = naming::format(folder_response.trim(), self.folder_scheme);
        let category = naming::format(&file.category, self.categories_scheme);
        debug!(path = %file.path.display(), ?tags, folder = %suggested_folder, "analyzed");

        Ok(FileAnalysis {
            path: file.path.clone(),
            tags,
            suggested_folder,
            description: description_response.trim().to_string(),
            category,
        })
    }

    fn ask(&self, document: &str, question: &str) -> Result<String, OracleError> {
        let prompt = format!(
            "Context information is below.\n---------------------\n{document}\n---------------------\n\
             Given the context information, answer the query.\nQuery: {question}\nAnswer:"
        );
        let request = CompletionRequest::new(&self.model, prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        self.oracle.complete(&request)
    }
}

/// Renders the metadata the model sees for one file.
pub fn document_text(file: &FileMetadata) -> String {
    let mut parts = vec![
        format!("Filename: {}", file.name),
        format!("File type: {}", file.extension),
        format!("MIME type: {}", file.mime_type),
        format!("Size: {} bytes", file.size),
        format!("Created: {}", file.created),
        format!("Modified: {}", file.modified),
        format!("Category: {}", file.category),
    ];

    if !file.additional_metadata.is_empty() {
        parts.push("\nAdditional Metadata:".to_string());
        for (key, value) in &file.additional_metadata {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            match key.as_str() {
                "ImageFormat" => parts.push(format!("Image Format: {rendered}")),
                _ => parts.push(format!("{key}: {rendered}")),
            }
        }
    }

    if let Some(content) = file.content.as_deref().filter(|c| !c.is_empty()) {
        parts.push("\nContent preview:".to_string());
        parts.push(content.chars().take(CONTENT_PREVIEW_CHARS).collect());
    }

    parts.join("\n")
}

/// Extracts tags from a free-text response.
///
/// Tries, in order: the first bracketed JSON array, comma-separated values,
/// then whitespace-separated words longer than two characters. Returns
/// `["unclassified"]` when nothing usable remains.
pub fn parse_tags(response: &str) -> Vec<String> {
    let flattened = response.replace('\n', "");

    if let Some(captures) = JSON_ARRAY.as_ref().and_then(|re| re.captures(&flattened))
        && let Ok(values) = serde_json::from_str::<Vec<Value>>(&format!("[{}]", &captures[1]))
    {
        let tags: Vec<String> = values
            .iter()
            .filter_map(Value::as_str)
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        return non_empty_or_unclassified(tags);
    }

    let strip: &[char] = &['"', '\'', '[', ']'];
    let tags: Vec<String> = if response.contains(',') {
        response
            .split(',')
            .map(|tag| tag.trim().trim_matches(strip).trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    } else {
        response
            .trim_matches(|c: char| strip.contains(&c) || c.is_whitespace())
            .split_whitespace()
            .filter(|word| word.chars().count() > 2)
            .map(str::to_string)
            .collect()
    };
    non_empty_or_unclassified(tags)
}

fn non_empty_or_unclassified(tags: Vec<String>) -> Vec<String> {
    if tags.is_empty() {
        vec![UNCLASSIFIED_TAG.to_string()]
    } else {
        tags
    }
}
