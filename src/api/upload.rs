//! Photo files on their way to the backend.

use image::ImageFormat;
use reqwest::multipart::Part;
use std::path::{Path, PathBuf};

use super::ApiError;

/// An image read from disk and checked to be a recognised format.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Read and validate a photo. Nothing is sent if this fails.
    pub async fn load(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::Rejected(format!("{} is empty", path.display())));
        }

        // Trust the content over the extension, but accept an extension
        // match for formats whose magic bytes image cannot sniff.
        let format = image::guess_format(&bytes)
            .ok()
            .or_else(|| ImageFormat::from_path(path).ok())
            .ok_or_else(|| {
                ApiError::Rejected(format!("{} is not a supported image", path.display()))
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("photo.{}", format.extensions_str()[0]));

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime: format.to_mime_type(),
            bytes,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_part(self) -> Result<Part, ApiError> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(self.mime)
            .map_err(|e| ApiError::Rejected(format!("invalid content type: {}", e)))
    }
}
