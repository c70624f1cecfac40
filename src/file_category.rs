//! File categorization used by the scanner.
//!
//! Maps MIME types and file extensions to the closed set of categories that
//! the analyses carry (`Documents`, `Images`, ...).
//!
//! # Examples
//!
//! ```
//! use aitidy::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.categorize(Some("image/png"), None), Category::Images);
//! assert_eq!(mapper.categorize(None, Some("csv")), Category::Data);
//! assert_eq!(mapper.categorize(None, Some("xyz")), Category::Other);
//! ```

use std::collections::HashMap;
use std::path::Path;

/// Extensions treated as raster or vector images by the planner.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

/// Label of the image category, compared case-insensitively.
pub const IMAGES_CATEGORY: &str = "Images";

/// Broad file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Documents,
    Images,
    Videos,
    Audio,
    Code,
    Data,
    Archives,
    Executables,
    Other,
}

impl Category {
    /// Label stored on analyses and sent to the oracle.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => IMAGES_CATEGORY,
            Category::Videos => "Videos",
            Category::Audio => "Audio",
            Category::Code => "Code",
            Category::Data => "Data",
            Category::Archives => "Archives",
            Category::Executables => "Executables",
            Category::Other => "Other",
        }
    }
}

/// Returns true if `path` has one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Returns true if `category` names the image category.
pub fn is_image_category(category: &str) -> bool {
    category.eq_ignore_ascii_case(IMAGES_CATEGORY)
}

/// Maps MIME types and file extensions to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    mime_map: HashMap<String, Category>,
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with all standard mappings.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        let mimes: &[(&str, Category)] = &[
            ("application/pdf", Category::Documents),
            ("application/msword", Category::Documents),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                Category::Documents,
            ),
            ("application/rtf", Category::Documents),
            ("text/plain", Category::Documents),
            ("text/markdown", Category::Documents),
            ("image/png", Category::Images),
            ("image/jpeg", Category::Images),
            ("image/gif", Category::Images),
            ("image/bmp", Category::Images),
            ("image/webp", Category::Images),
            ("image/svg+xml", Category::Images),
            ("video/mp4", Category::Videos),
            ("video/quicktime", Category::Videos),
            ("video/x-msvideo", Category::Videos),
            ("video/x-matroska", Category::Videos),
            ("video/webm", Category::Videos),
            ("audio/mpeg", Category::Audio),
            ("audio/x-wav", Category::Audio),
            ("audio/ogg", Category::Audio),
            ("audio/x-flac", Category::Audio),
            ("audio/aac", Category::Audio),
            ("audio/m4a", Category::Audio),
            ("application/json", Category::Data),
            ("text/csv", Category::Data),
            ("application/xml", Category::Data),
            ("application/zip", Category::Archives),
            ("application/vnd.rar", Category::Archives),
            ("application/x-7z-compressed", Category::Archives),
            ("application/x-tar", Category::Archives),
            ("application/gzip", Category::Archives),
            ("application/x-msdownload", Category::Executables),
        ];
        for (mime, category) in mimes {
            self.add_mime_mapping(mime, *category);
        }

        let extensions: &[(Category, &[&str])] = &[
            (
                Category::Documents,
                &["txt", "md", "doc", "docx", "pdf", "rtf", "odt"],
            ),
            (Category::Images, IMAGE_EXTENSIONS),
            (
                Category::Videos,
                &["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm"],
            ),
            (Category::Audio, &["mp3", "wav", "ogg", "flac", "aac", "m4a"]),
            (
                Category::Code,
                &[
                    "py", "js", "html", "css", "java", "c", "cpp", "go", "rs", "php",
                ],
            ),
            (
                Category::Data,
                &["json", "csv", "xml", "yaml", "yml", "sql", "xlsx", "xls"],
            ),
            (Category::Archives, &["zip", "rar", "7z", "tar", "gz"]),
            (Category::Executables, &["exe", "app", "bat", "sh", "msi"]),
        ];
        for (category, exts) in extensions {
            for ext in *exts {
                self.add_extension_mapping(ext, *category);
            }
        }
    }

    /// Adds a MIME type to category mapping.
    pub fn add_mime_mapping(&mut self, mime: &str, category: Category) {
        self.mime_map.insert(mime.to_lowercase(), category);
    }

    /// Adds a file extension to category mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(ext.trim_start_matches('.').to_lowercase(), category);
    }

    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        self.mime_map.get(&mime_type.to_lowercase()).copied()
    }

    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map
            .get(&ext.trim_start_matches('.').to_lowercase())
            .copied()
    }

    /// Determines the category for a file given its MIME type and/or extension.
    ///
    /// The extension wins when both are known: content sniffing reports
    /// e.g. `.docx` files as `application/zip`.
    pub fn categorize(&self, mime_type: Option<&str>, ext: Option<&str>) -> Category {
        if let Some(extension) = ext
            && let Some(category) = self.extension_to_category(extension)
        {
            return category;
        }

        if let Some(mime) = mime_type
            && let Some(category) = self.mime_to_category(mime)
        {
            return category;
        }

        Category::Other
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}
