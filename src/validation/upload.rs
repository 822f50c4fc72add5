//! Upload checks. Files go straight to object storage; the API only decides
//! whether a declared file may be uploaded.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FieldErrors, Schema, required};

pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_size: u64,
    pub allowed_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            allowed_types: ["image/jpeg", "image/png", "image/gif", "application/pdf"]
                .map(String::from)
                .to_vec(),
            allowed_extensions: ["jpg", "jpeg", "png", "gif", "pdf"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl UploadPolicy {
    /// Defaults, with the size cap overridable through `UPLOAD_MAX_SIZE_BYTES`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_size = std::env::var("UPLOAD_MAX_SIZE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_size);
        Self { max_size, ..defaults }
    }
}

/// Lowercased text after the last dot. `None` for names without one.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Check a declared file against `policy`, reporting every failed rule.
pub fn validate_upload(
    size: u64,
    content_type: &str,
    filename: &str,
    policy: &UploadPolicy,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if size > policy.max_size {
        let limit = (policy.max_size as f64 / MB as f64).round();
        errors.insert(
            "size".into(),
            format!("File size exceeds limit of {limit}MB"),
        );
    }

    if !policy.allowed_types.iter().any(|t| t == content_type) {
        errors.insert(
            "content_type".into(),
            format!("File type {content_type} is not allowed"),
        );
    }

    match extension_of(filename) {
        Some(ext) if policy.allowed_extensions.contains(&ext) => {}
        Some(ext) => {
            errors.insert(
                "filename".into(),
                format!("File extension .{ext} is not allowed"),
            );
        }
        None => {
            errors.insert("filename".into(), "File must have an extension".into());
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UploadInput {
    #[validate(
        length(min = 1, message = "File name is required"),
        length(max = 255, message = "File name too long")
    )]
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Declared size in bytes.
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadMeta {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

impl UploadMeta {
    pub fn check(&self, policy: &UploadPolicy) -> Result<(), FieldErrors> {
        validate_upload(self.size, &self.content_type, &self.filename, policy)
    }
}

impl Schema for UploadInput {
    type Full = UploadMeta;

    fn into_full(self) -> Result<UploadMeta, FieldErrors> {
        let mut missing = FieldErrors::new();
        let filename = required(self.filename, "filename", &mut missing);
        let content_type = required(self.content_type, "content_type", &mut missing);
        let size = required(self.size, "size", &mut missing);

        match (filename, content_type, size) {
            (Some(filename), Some(content_type), Some(size)) => Ok(UploadMeta {
                filename,
                content_type,
                size,
            }),
            _ => Err(missing),
        }
    }
}
