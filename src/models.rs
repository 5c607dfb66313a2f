//! Wire types shared with the dex backend.
//!
//! The backend speaks camelCase JSON. Anything it may omit or send as `null`
//! is an `Option` (or an empty collection) here so read sites handle absence
//! explicitly.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Label used for catalog entries that carry no category.
pub const UNCATEGORISED: &str = "Uncategorised";

/// One species in the browsable catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    /// Blank when the backend has no name; one bad row must not sink the
    /// whole catalog.
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scientific_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub visibility_probability: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sighting_months: Vec<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub location_description: Option<String>,
    #[serde(default)]
    pub map_url: Option<String>,
    #[serde(default)]
    pub photo_lock_url: Option<String>,
    #[serde(default)]
    pub photo_unlock_url: Option<String>,
}

impl CatalogEntry {
    /// Category used for grouping and filtering; blank categories collapse
    /// into [`UNCATEGORISED`].
    pub fn category_label(&self) -> &str {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => UNCATEGORISED,
        }
    }
}

/// Lock state of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockStatus {
    #[serde(rename = "LOCK")]
    Locked,
    #[serde(rename = "UNLOCK")]
    Unlocked,
    /// Anything else the backend might send; never counts as unlocked.
    #[serde(other)]
    Unknown,
}

/// A player's ledger row for one catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRecord {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(rename = "animalId")]
    pub entry_id: i64,
    pub status: UnlockStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub unlocked_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub animal_common_name: Option<String>,
    #[serde(default)]
    pub animal_scientific_name: Option<String>,
    #[serde(default)]
    pub animal_category: Option<String>,
    #[serde(default)]
    pub total_photos: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub main_photo_url: Option<String>,
}

impl UnlockRecord {
    pub fn is_unlocked(&self) -> bool {
        self.status == UnlockStatus::Unlocked
    }

    /// Photo count reported by the backend, falling back to the embedded list.
    pub fn photo_count(&self) -> u32 {
        self.total_photos.unwrap_or(self.photos.len() as u32)
    }
}

/// A photo a player uploaded under an unlocked entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub file_name: String,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub uploaded_at: Option<NaiveDateTime>,
    #[serde(rename = "userAnimalId", default)]
    pub unlock_id: Option<i64>,
}

impl Photo {
    /// File extension of the stored file, used when saving downloads.
    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("jpg")
    }

    pub fn display_name(&self) -> &str {
        self.original_file_name.as_deref().unwrap_or(&self.file_name)
    }
}

/// Role claim carried in the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    #[serde(rename = "USER_ROLE")]
    User,
    #[serde(rename = "ADMIN_ROLE")]
    Admin,
}

impl Role {
    /// Parse a role claim; anything unrecognised is the unprivileged role.
    pub fn from_claim(claim: &str) -> Self {
        match claim {
            "ADMIN_ROLE" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "player"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Avatar picked at registration. Only ever stored client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Character {
    #[default]
    Explorer,
    Scientist,
    Photographer,
}

impl Character {
    pub const ALL: [Character; 3] = [
        Character::Explorer,
        Character::Scientist,
        Character::Photographer,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Character::Explorer => "Explorer",
            Character::Scientist => "Scientist",
            Character::Photographer => "Photographer",
        }
    }

    pub fn tagline(&self) -> &'static str {
        match self {
            Character::Explorer => "Fearless adventurer of the wild",
            Character::Scientist => "Curious observer of wildlife",
            Character::Photographer => "Catcher of natural moments",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Character::Explorer => Character::Scientist,
            Character::Scientist => Character::Photographer,
            Character::Photographer => Character::Explorer,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Character::Explorer => Character::Photographer,
            Character::Scientist => Character::Explorer,
            Character::Photographer => Character::Scientist,
        }
    }
}

/// Admin view of a registered player.
///
/// Older backends used `username` and `*Count` field names; they are accepted
/// as aliases but the canonical shape is the one below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, alias = "unlockedAnimalsCount")]
    pub unlocked_animals: u32,
    #[serde(default, alias = "uploadedPhotosCount")]
    pub uploaded_photos: u32,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_activity: Option<NaiveDateTime>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body returned by login and register.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 timestamps as well as the zone-less ISO form the backend
/// produces. Unparseable values are treated as absent rather than failing the
/// whole payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_minimal_payload() {
        let json = r#"{"id":1,"commonName":"Isard","scientificName":"Rupicapra pyrenaica","category":"Mammal","sightingMonths":null}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.category_label(), "Mammal");
        assert!(entry.sighting_months.is_empty());
        assert!(entry.map_url.is_none());
    }

    #[test]
    fn test_missing_names_do_not_fail_the_catalog() {
        let json = r#"[
            {"id":1,"commonName":"Isard","scientificName":null},
            {"id":2,"commonName":null},
            {"id":3,"commonName":"Guineu","scientificName":"Vulpes vulpes"}
        ]"#;
        let entries: Vec<CatalogEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].scientific_name, "");
        assert_eq!(entries[1].common_name, "");
        assert_eq!(entries[1].scientific_name, "");
        assert_eq!(entries[2].scientific_name, "Vulpes vulpes");
    }

    #[test]
    fn test_blank_category_is_uncategorised() {
        let json = r#"{"id":2,"commonName":"a","scientificName":"b","category":"  "}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.category_label(), UNCATEGORISED);
    }

    #[test]
    fn test_unlock_record_status_and_photo_count() {
        let json = r#"{
            "id": 10, "userId": 3, "animalId": 1, "status": "UNLOCK",
            "unlockedAt": "2024-05-01T10:15:30",
            "photos": [
                {"id": 1, "fileName": "a.jpg", "userAnimalId": 10},
                {"id": 2, "fileName": "b.png", "userAnimalId": 10}
            ]
        }"#;
        let record: UnlockRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_unlocked());
        assert_eq!(record.photo_count(), 2);
        assert!(record.unlocked_at.is_some());

        let json = r#"{"id": 11, "animalId": 2, "status": "LOCK", "totalPhotos": null, "photos": null}"#;
        let record: UnlockRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_unlocked());
        assert_eq!(record.photo_count(), 0);
    }

    #[test]
    fn test_unknown_status_is_not_unlocked() {
        let json = r#"{"id": 12, "animalId": 2, "status": "PENDING"}"#;
        let record: UnlockRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, UnlockStatus::Unknown);
        assert!(!record.is_unlocked());
    }

    #[test]
    fn test_user_summary_accepts_legacy_names() {
        let json = r#"{"id":5,"username":"marta","unlockedAnimalsCount":4,"uploadedPhotosCount":9,"createdAt":null}"#;
        let user: UserSummary = serde_json::from_str(json).unwrap();
        assert_eq!(user.name, "marta");
        assert_eq!(user.unlocked_animals, 4);
        assert_eq!(user.uploaded_photos, 9);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-05-01T10:15:30").is_some());
        assert!(parse_timestamp("2024-05-01T10:15:30.123456").is_some());
        assert!(parse_timestamp("2024-05-01T10:15:30Z").is_some());
        assert!(parse_timestamp("2024-05-01 10:15:30").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_photo_extension() {
        let photo: Photo = serde_json::from_str(r#"{"id":1,"fileName":"x/y.png"}"#).unwrap();
        assert_eq!(photo.extension(), "png");
        let photo: Photo = serde_json::from_str(r#"{"id":1,"fileName":"noext"}"#).unwrap();
        assert_eq!(photo.extension(), "jpg");
    }

    #[test]
    fn test_role_from_claim() {
        assert_eq!(Role::from_claim("ADMIN_ROLE"), Role::Admin);
        assert_eq!(Role::from_claim("USER_ROLE"), Role::User);
        assert_eq!(Role::from_claim("ROOT"), Role::User);
    }
}
