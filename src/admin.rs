//! Admin-only views: the player roster and catalog entry creation.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::api::ApiError;
use crate::models::UserSummary;

/// Visibility label sent when the admin leaves it blank.
pub const DEFAULT_VISIBILITY: &str = "Mitjana";

/// Engagement level derived from a player's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum UserLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl UserLevel {
    /// Score is two points per unlock plus one per photo.
    pub fn from_counts(unlocked: u32, photos: u32) -> Self {
        let score = unlocked.saturating_mul(2).saturating_add(photos);
        if score >= 20 {
            UserLevel::Expert
        } else if score >= 10 {
            UserLevel::Intermediate
        } else {
            UserLevel::Beginner
        }
    }

    pub fn of(user: &UserSummary) -> Self {
        Self::from_counts(user.unlocked_animals, user.uploaded_photos)
    }
}

impl fmt::Display for UserLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserLevel::Beginner => "Beginner",
            UserLevel::Intermediate => "Intermediate",
            UserLevel::Expert => "Expert",
        };
        write!(f, "{}", s)
    }
}

/// Case-insensitive substring search over name and email. An empty query
/// matches everyone.
pub fn search_users<'a>(users: &'a [UserSummary], query: &str) -> Vec<&'a UserSummary> {
    let needle = query.trim().to_lowercase();
    users
        .iter()
        .filter(|u| {
            needle.is_empty()
                || u.name.to_lowercase().contains(&needle)
                || u.email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserTotals {
    pub users: usize,
    pub unlocked_animals: u64,
    pub uploaded_photos: u64,
}

pub fn totals(users: &[UserSummary]) -> UserTotals {
    users.iter().fold(
        UserTotals {
            users: users.len(),
            ..Default::default()
        },
        |mut acc, u| {
            acc.unlocked_animals += u64::from(u.unlocked_animals);
            acc.uploaded_photos += u64::from(u.uploaded_photos);
            acc
        },
    )
}

/// A catalog entry as entered by an admin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCatalogEntry {
    pub common_name: String,
    pub scientific_name: String,
    pub category: String,
    pub short_description: String,
    pub location_description: String,
    pub visibility_probability: String,
    pub sighting_months: Vec<String>,
    pub map_url: String,
    pub photo_lock_file_name: String,
    pub locked_image: Option<PathBuf>,
    pub unlocked_image: Option<PathBuf>,
}

impl NewCatalogEntry {
    /// Names and category are mandatory; nothing is sent without them.
    pub fn validate(&self) -> Result<(), ApiError> {
        let missing: Vec<&str> = [
            ("common name", &self.common_name),
            ("scientific name", &self.scientific_name),
            ("category", &self.category),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| label)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Rejected(format!("missing {}", missing.join(", "))))
        }
    }

    pub fn visibility_or_default(&self) -> &str {
        match self.visibility_probability.trim() {
            "" => DEFAULT_VISIBILITY,
            v => v,
        }
    }

    pub fn set_months(&mut self, input: &str) {
        self.sighting_months = parse_months(input);
    }
}

/// Split a comma-separated month list, dropping blanks.
pub fn parse_months(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
