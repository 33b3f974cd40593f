//! Upload validation and storage
//!
//! Every stored file goes through `validate` first; nothing else in the
//! service writes under the upload root.

use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wildlife_common::config::ServiceConfig;

/// Subdirectory (under the upload root) holding prediction images
pub const PREDICTIONS_SUBDIR: &str = "predictions";

/// URL prefix under which the upload root is served
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Upload rejection or storage failure
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("File is empty or missing")]
    EmptyInput,

    #[error("File size exceeds maximum allowed size of {}", format_size(.max))]
    SizeExceeded { size: u64, max: u64 },

    #[error("Filename is missing")]
    MissingFilename,

    #[error("Invalid file type: {extension}. Allowed types: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Invalid content type: {}. Must be an image file.", .0.as_deref().unwrap_or("none"))]
    UnsupportedContentType(Option<String>),

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded binary with the metadata the client declared for it
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            bytes,
        }
    }
}

/// Reference to a file written under the upload root
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Filename as supplied by the client
    pub original_filename: String,
    /// Generated `<timestamp>_<sanitized base>.<extension>` name
    pub stored_filename: String,
    pub subdirectory: String,
    /// Absolute path on disk
    pub path: PathBuf,
}

impl StoredFile {
    /// Public path the file is served under, e.g. `/uploads/predictions/<name>`
    pub fn public_path(&self) -> String {
        format!("{}/{}/{}", UPLOADS_URL_PREFIX, self.subdirectory, self.stored_filename)
    }
}

/// Validates and stores uploads under a configured root
#[derive(Debug, Clone)]
pub struct FileIngestService {
    upload_dir: PathBuf,
    max_upload_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl FileIngestService {
    /// Build from configuration; a relative upload root is made absolute
    pub fn new(config: &ServiceConfig) -> std::io::Result<Self> {
        Ok(Self {
            upload_dir: std::path::absolute(&config.upload_dir)?,
            max_upload_bytes: config.max_upload_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Create the upload root and the predictions subdirectory
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.upload_dir.join(PREDICTIONS_SUBDIR)).await
    }

    /// Check an upload, first failure wins
    ///
    /// Order: emptiness, size, filename presence, extension, content type.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), IngestError> {
        if file.bytes.is_empty() {
            return Err(IngestError::EmptyInput);
        }

        let size = file.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(IngestError::SizeExceeded {
                size,
                max: self.max_upload_bytes,
            });
        }

        let filename = file.filename.as_deref().ok_or(IngestError::MissingFilename)?;

        let extension = file_extension(filename);
        if !self.allowed_extensions.contains(&extension.to_lowercase()) {
            return Err(IngestError::UnsupportedExtension {
                extension: extension.to_string(),
                allowed: self.allowed_extensions.join(","),
            });
        }

        match file.content_type.as_deref() {
            Some(content_type) if content_type.starts_with("image/") => Ok(()),
            other => Err(IngestError::UnsupportedContentType(other.map(str::to_string))),
        }
    }

    /// Validate, then write the bytes under `subdirectory` with a generated name
    pub async fn store(&self, file: &UploadedFile, subdirectory: &str) -> Result<StoredFile, IngestError> {
        self.validate(file)?;

        let original_filename = file.filename.clone().ok_or(IngestError::MissingFilename)?;
        let stored_filename = generate_unique_filename(&original_filename);

        let target_dir = self.upload_dir.join(subdirectory);
        tokio::fs::create_dir_all(&target_dir).await?;

        let path = target_dir.join(&stored_filename);
        // Same-second upload of the same name overwrites
        tokio::fs::write(&path, &file.bytes).await?;

        tracing::debug!(
            original = %original_filename,
            stored = %path.display(),
            bytes = file.bytes.len(),
            "Stored uploaded file"
        );

        Ok(StoredFile {
            original_filename,
            stored_filename,
            subdirectory: subdirectory.to_string(),
            path,
        })
    }

    /// Remove a stored file; a file that is already gone is not an error
    pub async fn delete(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Whole megabytes when the limit is a MiB multiple, bytes otherwise
fn format_size(bytes: &u64) -> String {
    const MIB: u64 = 1024 * 1024;
    let bytes = *bytes;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// `<yyyyMMdd_HHmmss>_<sanitized base>.<extension>`, extension case preserved
pub fn generate_unique_filename(original_filename: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!(
        "{}_{}.{}",
        timestamp,
        sanitize_base_name(base_name(original_filename)),
        file_extension(original_filename)
    )
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_base_name(base: &str) -> String {
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Text after the last dot; empty for dotless names and leading-dot names
fn file_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[idx + 1..],
        _ => "",
    }
}

fn base_name(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}
