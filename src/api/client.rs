use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{ApiError, UploadFile};
use crate::config::ApiConfig;
use crate::admin::NewCatalogEntry;
use crate::dex::{self, CatalogSnapshot, PhotoEdit, PhotoUpload, UnlockRequest};
use crate::models::{AuthResponse, CatalogEntry, UnlockRecord, UserSummary};
use crate::session::Session;

/// Path under which the backend serves uploaded photo files.
pub const USER_IMAGE_PATH: &str = "/api/images/user-animals";

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    name: &'a str,
    password: &'a str,
}

/// Client for the dex REST backend.
///
/// Cheap to clone; clones share the connection pool. Requests carry the
/// bearer token of the session the client was given, if any.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ApiError::from_transport(&config.base_url, e))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Use the given session's token for subsequent requests; `None` sends
    /// requests unauthenticated.
    pub fn set_session(&mut self, session: Option<&Session>) {
        self.token = session.map(|s| s.token.clone());
    }

    pub fn with_session(mut self, session: Option<&Session>) -> Self {
        self.set_session(session);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Address of an uploaded photo's image file.
    pub fn image_url(&self, file_name: &str) -> String {
        self.url(&format!("{}/{}", USER_IMAGE_PATH, file_name))
    }

    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = self.url(path);
        let mut req = self.http.request(method, &url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        (url, req)
    }

    async fn send(&self, url: &str, req: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(url = %url, "Sending request");

        let response = req.send().await.map_err(|e| {
            let err = ApiError::from_transport(url, e);
            if err.is_transport() {
                tracing::error!(url = %url, error = %err, "Backend unreachable");
            } else {
                tracing::error!(url = %url, error = %err, "Request failed");
            }
            err
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status, &body);
        tracing::warn!(url = %url, status = status.as_u16(), error = %err, "Request rejected");
        Err(err)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let (url, req) = self.request(Method::GET, path);
        let response = self.send(&url, req).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::from_transport(&url, e))
    }

    async fn send_multipart(&self, method: Method, path: &str, form: Form) -> Result<(), ApiError> {
        let (url, req) = self.request(method, path);
        self.send(&url, req.multipart(form)).await?;
        Ok(())
    }

    async fn authenticate(&self, path: &str, name: &str, password: &str) -> Result<AuthResponse, ApiError> {
        // Login and register never carry a bearer token.
        let url = self.url(path);
        let req = self.http.post(&url).json(&Credentials { name, password });
        let response = self.send(&url, req).await?;
        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| ApiError::from_transport(&url, e))
    }

    pub async fn login(&self, name: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/api/users/login", name, password).await
    }

    pub async fn register(&self, name: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/api/users/register", name, password).await
    }

    pub async fn list_entries(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        self.get_json("/api/animals/get").await
    }

    pub async fn list_unlocks(&self) -> Result<Vec<UnlockRecord>, ApiError> {
        self.get_json("/api/user-animals/get").await
    }

    /// Fetch the catalog and the ledger concurrently. Both must succeed;
    /// a half-fetched pair is never returned.
    pub async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, ApiError> {
        let generation = dex::next_generation();
        let (entries, unlocks) = tokio::try_join!(self.list_entries(), self.list_unlocks())?;
        tracing::debug!(
            entries = entries.len(),
            records = unlocks.len(),
            generation,
            "Fetched catalog snapshot"
        );
        Ok(CatalogSnapshot::new(entries, unlocks).with_generation(generation))
    }

    pub async fn unlock(&self, request: &UnlockRequest) -> Result<(), ApiError> {
        request.validate()?;
        let file = UploadFile::load(&request.photo).await?;

        let mut form = Form::new()
            .text("commonName", request.common_name.trim().to_string())
            .part("file", file.into_part()?);
        if let Some(ref description) = request.description {
            form = form.text("description", description.clone());
        }

        self.send_multipart(Method::POST, "/api/user-animals/unlock", form)
            .await
    }

    /// Upload another photo for an entry. Callers check the entry is
    /// unlocked first; see [`crate::dex::add_photo`].
    pub async fn add_photo(&self, entry_id: i64, upload: &PhotoUpload) -> Result<(), ApiError> {
        let file = UploadFile::load(&upload.photo).await?;

        let mut form = Form::new().part("file", file.into_part()?);
        if let Some(ref description) = upload.description {
            form = form.text("description", description.clone());
        }

        self.send_multipart(
            Method::POST,
            &format!("/api/user-animals/{}/photos", entry_id),
            form,
        )
        .await
    }

    /// Send only the fields that changed.
    pub async fn edit_photo(&self, photo_id: i64, edit: &PhotoEdit) -> Result<(), ApiError> {
        if edit.is_empty() {
            return Err(ApiError::Rejected("nothing changed".to_string()));
        }

        let mut form = Form::new();
        if let Some(ref path) = edit.replacement {
            let file = UploadFile::load(path).await?;
            form = form.part("file", file.into_part()?);
        }
        if let Some(ref description) = edit.description {
            form = form.text("description", description.clone());
        }

        self.send_multipart(
            Method::PUT,
            &format!("/api/user-animals/photos/{}", photo_id),
            form,
        )
        .await
    }

    pub async fn delete_photo(&self, photo_id: i64) -> Result<(), ApiError> {
        let (url, req) = self.request(
            Method::DELETE,
            &format!("/api/user-animals/photos/{}", photo_id),
        );
        self.send(&url, req).await?;
        Ok(())
    }

    pub async fn download_photo(&self, photo_id: i64) -> Result<Vec<u8>, ApiError> {
        let (url, req) = self.request(
            Method::GET,
            &format!("/api/user-animals/{}/download", photo_id),
        );
        let response = self.send(&url, req).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&url, e))?;
        Ok(bytes.to_vec())
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ApiError> {
        self.get_json("/api/admin/users").await
    }

    pub async fn create_entry(&self, entry: &NewCatalogEntry) -> Result<(), ApiError> {
        entry.validate()?;

        let mut form = Form::new()
            .text("commonName", entry.common_name.trim().to_string())
            .text("scientificName", entry.scientific_name.trim().to_string())
            .text("category", entry.category.trim().to_string())
            .text("shortDescription", entry.short_description.clone())
            .text("locationDescription", entry.location_description.clone())
            .text("visibilityProbability", entry.visibility_or_default().to_string())
            .text("mapUrl", entry.map_url.clone())
            .text("photoLockFileName", entry.photo_lock_file_name.clone());

        for month in &entry.sighting_months {
            form = form.text("sightingMonths", month.clone());
        }
        if let Some(ref path) = entry.locked_image {
            form = form.part("lockedImage", UploadFile::load(path).await?.into_part()?);
        }
        if let Some(ref path) = entry.unlocked_image {
            form = form.part("unlockedImage", UploadFile::load(path).await?.into_part()?);
        }

        self.send_multipart(Method::POST, "/api/admin/animals", form)
            .await
    }
}
