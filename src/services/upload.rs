//! Image uploads
//!
//! Client-side validation of images before they are sent as multipart
//! uploads (profile pictures, blog banners).

use anyhow::{Context, Result};
use std::path::Path;

use crate::api::FilePart;
use crate::config::UploadConfig;

/// Multipart field the API expects image uploads in
pub const IMAGE_FIELD: &str = "image";

/// Image to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, deriving the MIME type from its extension
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(content_type_for_extension)
            .unwrap_or("application/octet-stream");
        Ok(Self::new(file_name, content_type, bytes))
    }

    /// Check type and size against the upload configuration
    ///
    /// Returns a message suitable for display on failure.
    pub fn validate(&self, config: &UploadConfig) -> Result<(), String> {
        if !config.is_type_allowed(&self.content_type) {
            return Err(format!(
                "Invalid image format. Please upload a {} file.",
                config.describe_allowed()
            ));
        }
        if self.bytes.is_empty() {
            return Err("The selected file is empty.".to_string());
        }
        if self.bytes.len() as u64 > config.max_file_size {
            return Err(format!(
                "File too large. Maximum size is {} MB.",
                config.max_file_size / 1024 / 1024
            ));
        }
        Ok(())
    }

    /// Multipart body carrying this image under `field`
    pub fn into_part(self, field: &str) -> FilePart {
        FilePart {
            field: field.to_string(),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }
}

/// MIME type for a common image extension
fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_types_pass() {
        let config = UploadConfig::default();
        for content_type in ["image/jpeg", "image/png", "image/gif", "image/webp", "IMAGE/PNG"] {
            let upload = ImageUpload::new("a", content_type, vec![1]);
            assert!(upload.validate(&config).is_ok(), "{}", content_type);
        }
    }

    #[test]
    fn test_disallowed_type_is_described() {
        let upload = ImageUpload::new("a.svg", "image/svg+xml", vec![1]);
        let message = upload.validate(&UploadConfig::default()).unwrap_err();
        assert_eq!(
            message,
            "Invalid image format. Please upload a JPG, PNG, GIF, or WEBP file."
        );
    }

    #[test]
    fn test_empty_and_oversized_rejected() {
        let config = UploadConfig {
            max_file_size: 4,
            ..UploadConfig::default()
        };
        assert!(ImageUpload::new("a", "image/png", vec![]).validate(&config).is_err());
        assert!(ImageUpload::new("a", "image/png", vec![0; 5]).validate(&config).is_err());
        assert!(ImageUpload::new("a", "image/png", vec![0; 4]).validate(&config).is_ok());
    }

    #[tokio::test]
    async fn test_from_path_derives_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.JPG");
        std::fs::write(&path, [0xff, 0xd8]).unwrap();

        let upload = ImageUpload::from_path(&path).await.unwrap();

        assert_eq!(upload.file_name, "avatar.JPG");
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.bytes, vec![0xff, 0xd8]);
    }

    #[test]
    fn test_into_part() {
        let part = ImageUpload::new("a.png", "image/png", vec![1]).into_part(IMAGE_FIELD);
        assert_eq!(part.field, "image");
        assert_eq!(part.file_name, "a.png");
    }
}
