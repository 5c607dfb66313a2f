//! Mutations of the player's dex.
//!
//! Each mutation is followed by a full re-fetch of the catalog and ledger.
//! On failure nothing is re-fetched and the caller keeps its old snapshot.

use image::DynamicImage;
use std::path::{Path, PathBuf};

use super::CatalogSnapshot;
use crate::api::{ApiClient, ApiError};
use crate::models::{Photo, UnlockRecord};

/// Claim an entry by naming it and backing the claim with a photo.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlockRequest {
    pub common_name: String,
    pub photo: PathBuf,
    pub description: Option<String>,
}

impl UnlockRequest {
    pub fn new(common_name: &str, photo: impl Into<PathBuf>, description: &str) -> Self {
        Self {
            common_name: common_name.trim().to_string(),
            photo: photo.into(),
            description: non_blank(description),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.common_name.trim().is_empty() {
            return Err(ApiError::Rejected("the animal's common name is required".into()));
        }
        if self.photo.as_os_str().is_empty() {
            return Err(ApiError::Rejected("a photo is required to unlock".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub photo: PathBuf,
    pub description: Option<String>,
}

impl PhotoUpload {
    pub fn new(photo: impl Into<PathBuf>, description: &str) -> Self {
        Self {
            photo: photo.into(),
            description: non_blank(description),
        }
    }
}

/// The changed fields of a photo edit. Unchanged fields are `None` and are
/// not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoEdit {
    pub replacement: Option<PathBuf>,
    pub description: Option<String>,
}

impl PhotoEdit {
    pub fn diff(current: &Photo, replacement: Option<PathBuf>, description: &str) -> Self {
        let before = current.description.as_deref().unwrap_or("").trim();
        let after = description.trim();
        Self {
            replacement: replacement.filter(|p| !p.as_os_str().is_empty()),
            description: (before != after).then(|| after.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replacement.is_none() && self.description.is_none()
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// The UNLOCK record an entry must have before photos can be added to it.
pub fn require_unlocked(snapshot: &CatalogSnapshot, entry_id: i64) -> Result<&UnlockRecord, ApiError> {
    snapshot
        .unlock_for(entry_id)
        .ok_or(ApiError::NotUnlocked { entry_id })
}

pub async fn refresh(client: &ApiClient) -> Result<CatalogSnapshot, ApiError> {
    client.fetch_snapshot().await
}

pub async fn unlock(client: &ApiClient, request: &UnlockRequest) -> Result<CatalogSnapshot, ApiError> {
    client.unlock(request).await?;
    tracing::info!(name = %request.common_name, "Unlock submitted");
    refresh(client).await
}

/// Add a photo to an unlocked entry. A locked entry is refused before any
/// request goes out.
pub async fn add_photo(
    client: &ApiClient,
    snapshot: &CatalogSnapshot,
    entry_id: i64,
    upload: &PhotoUpload,
) -> Result<CatalogSnapshot, ApiError> {
    require_unlocked(snapshot, entry_id)?;
    client.add_photo(entry_id, upload).await?;
    tracing::info!(entry_id, "Photo added");
    refresh(client).await
}

pub async fn edit_photo(client: &ApiClient, photo_id: i64, edit: &PhotoEdit) -> Result<CatalogSnapshot, ApiError> {
    client.edit_photo(photo_id, edit).await?;
    tracing::info!(
        photo_id,
        file = edit.replacement.is_some(),
        description = edit.description.is_some(),
        "Photo edited"
    );
    refresh(client).await
}

/// Delete a photo. Callers confirm with the user first.
pub async fn delete_photo(client: &ApiClient, photo_id: i64) -> Result<CatalogSnapshot, ApiError> {
    client.delete_photo(photo_id).await?;
    tracing::info!(photo_id, "Photo deleted");
    refresh(client).await
}

/// Where a downloaded photo is saved: `animal-photo-<id>.<ext>`.
pub fn download_path(dir: &Path, photo: &Photo) -> PathBuf {
    dir.join(format!("animal-photo-{}.{}", photo.id, photo.extension()))
}

pub async fn download_photo(client: &ApiClient, photo: &Photo, dir: &Path) -> Result<PathBuf, ApiError> {
    let bytes = client.download_photo(photo.id).await?;
    let path = download_path(dir, photo);

    let io_err = |source| ApiError::File {
        path: path.clone(),
        source,
    };
    tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    tokio::fs::write(&path, &bytes).await.map_err(io_err)?;

    tracing::info!(photo_id = photo.id, path = %path.display(), size = bytes.len(), "Photo downloaded");
    Ok(path)
}

/// Longest side, in pixels, of a decoded preview.
pub const PREVIEW_SIZE: u32 = 1024;

/// Fetch a photo and decode it for display, scaled down to
/// [`PREVIEW_SIZE`].
pub async fn fetch_preview(client: &ApiClient, photo: &Photo) -> Result<DynamicImage, ApiError> {
    let bytes = client.download_photo(photo.id).await?;
    let image = image::load_from_memory(&bytes).map_err(|source| ApiError::Image {
        photo_id: photo.id,
        source,
    })?;
    tracing::debug!(photo_id = photo.id, width = image.width(), height = image.height(), "Decoded preview");
    Ok(image.thumbnail(PREVIEW_SIZE, PREVIEW_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::dex::tests::{entry, photo, record};
    use crate::models::UnlockStatus;

    fn unreachable_client() -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_unlock_request_validation() {
        assert!(UnlockRequest::new("Isard", "/tmp/isard.jpg", "").validate().is_ok());
        assert!(UnlockRequest::new("   ", "/tmp/isard.jpg", "").validate().is_err());
        assert!(UnlockRequest::new("Isard", "", "").validate().is_err());

        let request = UnlockRequest::new(" Isard ", "/tmp/isard.jpg", "  ");
        assert_eq!(request.common_name, "Isard");
        assert_eq!(request.description, None);
    }

    #[test]
    fn test_edit_only_sends_changes() {
        let mut current = photo(1, 10);
        current.description = Some("At dawn".into());

        let edit = PhotoEdit::diff(&current, None, "At dawn");
        assert!(edit.is_empty());

        let edit = PhotoEdit::diff(&current, None, "At dusk");
        assert_eq!(edit.description.as_deref(), Some("At dusk"));
        assert!(edit.replacement.is_none());

        let edit = PhotoEdit::diff(&current, Some("/tmp/new.png".into()), " At dawn ");
        assert!(edit.description.is_none());
        assert!(edit.replacement.is_some());

        // Clearing a description is a change
        let edit = PhotoEdit::diff(&current, None, "");
        assert_eq!(edit.description.as_deref(), Some(""));

        // No description before and none now
        let edit = PhotoEdit::diff(&photo(2, 10), None, "");
        assert!(edit.is_empty());
    }

    #[test]
    fn test_require_unlocked() {
        let snapshot = CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal"), entry(2, "Marmota", "Mammal")],
            vec![
                record(10, 1, UnlockStatus::Unlocked, 0),
                record(11, 2, UnlockStatus::Locked, 0),
            ],
        );
        assert_eq!(require_unlocked(&snapshot, 1).unwrap().id, 10);
        assert!(matches!(
            require_unlocked(&snapshot, 2),
            Err(ApiError::NotUnlocked { entry_id: 2 })
        ));
    }

    #[tokio::test]
    async fn test_add_photo_to_locked_entry_sends_nothing() {
        let snapshot = CatalogSnapshot::new(vec![entry(1, "Isard", "Mammal")], vec![]);
        let upload = PhotoUpload::new("/tmp/isard.jpg", "");

        // The client points nowhere; a transport error would mean a request
        // was attempted.
        let err = add_photo(&unreachable_client(), &snapshot, 1, &upload)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotUnlocked { entry_id: 1 }));
        assert!(err.is_local());
    }

    #[test]
    fn test_download_path() {
        let dir = Path::new("/tmp/dex");
        let mut p = photo(42, 1);
        assert_eq!(download_path(dir, &p), dir.join("animal-photo-42.jpg"));
        p.file_name = "abc.PNG".into();
        assert_eq!(download_path(dir, &p), dir.join("animal-photo-42.PNG"));
    }
}
