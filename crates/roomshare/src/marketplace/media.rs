use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use tracing::debug;
use uuid::Uuid;

use super::domain::ListingId;
use super::error::MarketplaceError;

/// One file pulled out of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedImage {
    /// Checks the payload is a non-empty `image/*` part and returns the file extension to use.
    pub fn validate(&self) -> Result<&'static str, MediaError> {
        let raw = self.content_type.as_deref().unwrap_or_default();
        let mime: mime::Mime = raw.parse().map_err(|_| MediaError::Unsupported {
            content_type: raw.to_string(),
        })?;

        if mime.type_() != mime::IMAGE {
            return Err(MediaError::Unsupported {
                content_type: raw.to_string(),
            });
        }
        if self.bytes.is_empty() {
            return Err(MediaError::Empty {
                file_name: self.file_name.clone().unwrap_or_default(),
            });
        }

        Ok(match mime.subtype().as_str() {
            "jpeg" => "jpg",
            "png" => "png",
            "gif" => "gif",
            "webp" => "webp",
            "avif" => "avif",
            "bmp" => "bmp",
            _ => "img",
        })
    }
}

/// Where listing images end up. Returned paths are what clients later request.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, listing: ListingId, image: &UploadedImage) -> Result<String, MediaError>;
    async fn remove(&self, path: &str) -> Result<(), MediaError>;
}

/// Writes images under `<root>/listings/` and hands back `<public_prefix>/listings/<file>`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_prefix: "uploads".to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn file_for(&self, public_path: &str) -> Option<PathBuf> {
        let relative = public_path
            .strip_prefix(&self.public_prefix)?
            .trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, listing: ListingId, image: &UploadedImage) -> Result<String, MediaError> {
        let extension = image.validate()?;
        let directory = self.root.join("listings");
        tokio::fs::create_dir_all(&directory).await?;

        let file_name = format!("{listing}-{}.{extension}", Uuid::now_v7());
        tokio::fs::write(directory.join(&file_name), &image.bytes).await?;
        debug!(
            listing_id = listing.0,
            %file_name,
            bytes = image.bytes.len(),
            "stored listing image"
        );

        Ok(format!("{}/listings/{file_name}", self.public_prefix))
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        let file = self
            .file_for(path)
            .ok_or_else(|| MediaError::Foreign(path.to_string()))?;
        tokio::fs::remove_file(file).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported image content type '{content_type}'")]
    Unsupported { content_type: String },
    #[error("uploaded file '{file_name}' is empty")]
    Empty { file_name: String },
    #[error("path '{0}' is not managed by this image store")]
    Foreign(String),
    #[error("image storage failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for MarketplaceError {
    fn from(value: MediaError) -> Self {
        match value {
            MediaError::Unsupported { .. } | MediaError::Empty { .. } => {
                MarketplaceError::InvalidInput(value.to_string())
            }
            MediaError::Foreign(_) | MediaError::Io(_) => {
                MarketplaceError::Storage(value.to_string())
            }
        }
    }
}
