//! Admission policy for candidate page files.

use std::path::Path;

use crate::error::{LensError, ValidationError};

/// Media types accepted for translation.
pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Maximum payload size: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A file the user wants to add, before it is admitted into the store.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    // Size on disk; can exceed `bytes.len()` when the payload was not loaded.
    len: u64,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
            len,
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    ///
    /// The type and size are checked against the file metadata first. A file
    /// that would be rejected is never read; the candidate keeps its real
    /// size so [`CandidateFile::validate`] still reports why.
    pub fn from_path(path: &Path) -> Result<Self, LensError> {
        let len = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("page")
            .to_string();
        let mime_type = mime_from_path(path);
        let bytes = match validate(&name, mime_type, len) {
            Ok(()) => std::fs::read(path)?,
            Err(_) => Vec::new(),
        };
        Ok(Self {
            name,
            mime_type: mime_type.to_string(),
            bytes,
            len,
        })
    }

    pub fn size(&self) -> u64 {
        self.len
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate(&self.name, &self.mime_type, self.size())
    }
}

/// Check a declared media type and byte size against the fixed policy.
pub fn validate(name: &str, mime_type: &str, size: u64) -> Result<(), ValidationError> {
    if !ALLOWED_TYPES.contains(&mime_type) {
        return Err(ValidationError::InvalidType { name: name.into() });
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge { name: name.into() });
    }
    Ok(())
}

/// Media type for a path based on its extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
