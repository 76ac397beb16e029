//! Document renderers and output paths
//!
//! The harvester makes no formatting decisions: it hands an assembled result
//! (messages oldest-first, plus channel metadata) to this boundary, which
//! serializes to Markdown or JSON and writes documents under the configured
//! capture directory.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub mod json;
pub mod markdown;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem failure while writing a document
    #[error("IO error writing {}: {message}", .path.display())]
    IoError {
        /// Document path that failed
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// JSON serialization failure
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Rendering switches carried over from the global settings.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit channel/video metadata headers
    pub include_metadata: bool,
    /// Emit attachment link lists
    pub include_attachments: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_attachments: false,
        }
    }
}

/// Builds document paths of the form
/// `{root}/{platform}/{slug}_{YYYYMMDD_HHMMSS}.{ext}`.
#[derive(Debug, Clone)]
pub struct DocumentPathBuilder {
    root: PathBuf,
}

impl DocumentPathBuilder {
    /// Root the builder at the configured capture directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for one captured document.
    pub fn document_path(
        &self,
        platform: &str,
        name: &str,
        captured_at: DateTime<Utc>,
        extension: &str,
    ) -> PathBuf {
        let filename = format!(
            "{}_{}.{}",
            slugify(name),
            captured_at.format("%Y%m%d_%H%M%S"),
            extension
        );
        self.root.join(platform).join(filename)
    }
}

/// Reduce a display name to a filesystem-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("untitled");
    }
    slug
}

/// Write a rendered document, creating parent directories on demand.
pub fn write_document(path: &Path, contents: &str) -> OutputResult<()> {
    let io_err = |e: std::io::Error| OutputError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, contents).map_err(io_err)
}
