// src/upload.rs

use crate::error::ExtractError;
use std::path::Path;

/// MIME types the backend knows how to extract from.
pub const DEFAULT_ALLOWED_TYPES: [&str; 4] = [
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/pdf",
    "image/jpeg",
    "image/png",
];

/// One user-selected file, alive for a single upload attempt.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        UploadedFile {
            name: name.into(),
            size_bytes: data.len() as u64,
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Validate a candidate batch against the MIME allow-list.
///
/// All-or-nothing: a single disallowed file rejects the whole batch, and
/// the error names every offender so the user can fix the selection in
/// one pass. The batch itself is never mutated.
pub fn validate_files(files: &[UploadedFile], allowed: &[String]) -> Result<(), ExtractError> {
    if files.is_empty() {
        return Err(ExtractError::NoFilesSelected);
    }

    let invalid: Vec<String> = files
        .iter()
        .filter(|f| !allowed.iter().any(|a| a == &f.mime_type))
        .map(|f| f.name.clone())
        .collect();

    if !invalid.is_empty() {
        return Err(ExtractError::UnsupportedFiles { names: invalid });
    }
    Ok(())
}

/// Map a file extension to the MIME type the gate expects. The browser
/// frontends get this from the File object; the CLI has to infer it.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("xlsx") => {
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        }
        Some("pdf") => Some("application/pdf"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        _ => None,
    }
}
