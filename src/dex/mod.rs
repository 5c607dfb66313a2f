//! The player's dex: the catalog joined with the unlock ledger.
//!
//! A [`CatalogSnapshot`] is one consistent fetch of both collections. It is
//! never patched in place; every mutation is followed by a fresh fetch and
//! the old snapshot is replaced whole. [`DexView`] is derived from a snapshot
//! and is cheap enough to rebuild on every change.

mod actions;
mod filter;
mod stats;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

use crate::models::{CatalogEntry, Photo, UnlockRecord};

pub use actions::{
    add_photo, delete_photo, download_photo, download_path, edit_photo, fetch_preview, refresh,
    require_unlocked, unlock, PhotoEdit, PhotoUpload, UnlockRequest, PREVIEW_SIZE,
};
pub use filter::{categories, CategoryFilter, DexFilter, StatusFilter};
pub use stats::{CategoryStats, Stats};

/// Take the next fetch generation. Call it before a fetch is sent, so a
/// snapshot's generation orders it by when its requests started.
pub fn next_generation() -> u64 {
    static GENERATION: AtomicU64 = AtomicU64::new(1);
    GENERATION.fetch_add(1, Ordering::SeqCst)
}

/// Catalog and ledger as fetched together.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
    unlocks: Vec<UnlockRecord>,
    fetched_at: DateTime<Local>,
    generation: u64,
}

impl CatalogSnapshot {
    pub fn new(entries: Vec<CatalogEntry>, unlocks: Vec<UnlockRecord>) -> Self {
        Self {
            entries,
            unlocks,
            fetched_at: Local::now(),
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if this snapshot's fetch started before `other`'s, so it may
    /// predate a mutation `other` already reflects.
    pub fn is_older_than(&self, other: &CatalogSnapshot) -> bool {
        self.generation < other.generation
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn unlocks(&self) -> &[UnlockRecord] {
        &self.unlocks
    }

    pub fn fetched_at(&self) -> DateTime<Local> {
        self.fetched_at
    }

    pub fn entry(&self, entry_id: i64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// The UNLOCK record for an entry, if the player has unlocked it.
    pub fn unlock_for(&self, entry_id: i64) -> Option<&UnlockRecord> {
        self.unlocks
            .iter()
            .find(|r| r.entry_id == entry_id && r.is_unlocked())
    }

    /// The record linked to an entry: the UNLOCK record when there is one,
    /// else any record for it.
    pub fn record_for(&self, entry_id: i64) -> Option<&UnlockRecord> {
        self.unlock_for(entry_id)
            .or_else(|| self.unlocks.iter().find(|r| r.entry_id == entry_id))
    }

    /// Photos of an unlocked entry; empty for locked ones.
    pub fn photos_for(&self, entry_id: i64) -> &[Photo] {
        self.unlock_for(entry_id)
            .map(|r| r.photos.as_slice())
            .unwrap_or(&[])
    }

    pub fn photo(&self, photo_id: i64) -> Option<&Photo> {
        self.unlocks
            .iter()
            .flat_map(|r| r.photos.iter())
            .find(|p| p.id == photo_id)
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A catalog entry with its derived lock state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledEntry {
    pub entry: CatalogEntry,
    pub locked: bool,
    pub unlock_id: Option<i64>,
    pub photo_count: u32,
}

/// Everything the dex screens show, derived from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct DexView {
    pub entries: Vec<ReconciledEntry>,
    pub stats: Stats,
}

impl DexView {
    pub fn build(snapshot: &CatalogSnapshot) -> Self {
        Self {
            entries: reconcile(snapshot),
            stats: Stats::compute(snapshot.entries(), snapshot.unlocks()),
        }
    }

    pub fn get(&self, entry_id: i64) -> Option<&ReconciledEntry> {
        self.entries.iter().find(|e| e.entry.id == entry_id)
    }
}

/// Mark each catalog entry locked unless an UNLOCK record references it.
pub fn reconcile(snapshot: &CatalogSnapshot) -> Vec<ReconciledEntry> {
    snapshot
        .entries()
        .iter()
        .map(|entry| {
            let unlocked = snapshot.unlock_for(entry.id);
            let linked = snapshot.record_for(entry.id);
            ReconciledEntry {
                entry: entry.clone(),
                locked: unlocked.is_none(),
                unlock_id: linked.map(|r| r.id),
                photo_count: unlocked.map(UnlockRecord::photo_count).unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::UnlockStatus;

    pub(crate) fn entry(id: i64, name: &str, category: &str) -> CatalogEntry {
        CatalogEntry {
            id,
            common_name: name.to_string(),
            scientific_name: format!("{} sp.", name),
            category: (!category.is_empty()).then(|| category.to_string()),
            visibility_probability: None,
            sighting_months: Vec::new(),
            short_description: None,
            location_description: None,
            map_url: None,
            photo_lock_url: None,
            photo_unlock_url: None,
        }
    }

    pub(crate) fn photo(id: i64, unlock_id: i64) -> Photo {
        Photo {
            id,
            file_name: format!("{}.jpg", id),
            original_file_name: None,
            content_type: Some("image/jpeg".into()),
            description: None,
            uploaded_at: None,
            unlock_id: Some(unlock_id),
        }
    }

    pub(crate) fn record(id: i64, entry_id: i64, status: UnlockStatus, photos: usize) -> UnlockRecord {
        UnlockRecord {
            id,
            user_id: Some(1),
            entry_id,
            status,
            unlocked_at: None,
            animal_common_name: None,
            animal_scientific_name: None,
            animal_category: None,
            total_photos: None,
            photos: (0..photos).map(|i| photo(id * 100 + i as i64, id)).collect(),
            main_photo_url: None,
        }
    }

    #[test]
    fn test_no_records_means_locked() {
        let snapshot = CatalogSnapshot::new(vec![entry(1, "Isard", "Mammal")], vec![]);
        let view = DexView::build(&snapshot);
        assert!(view.entries[0].locked);
        assert_eq!(view.entries[0].unlock_id, None);
        assert_eq!(view.stats.unlocked, 0);
        assert_eq!(view.stats.total_entries, 1);
    }

    #[test]
    fn test_unlock_record_unlocks() {
        let snapshot = CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal")],
            vec![record(10, 1, UnlockStatus::Unlocked, 2)],
        );
        let view = DexView::build(&snapshot);
        let isard = view.get(1).unwrap();
        assert!(!isard.locked);
        assert_eq!(isard.unlock_id, Some(10));
        assert_eq!(isard.photo_count, 2);
        assert_eq!(view.stats.total_photos, 2);
        assert_eq!(snapshot.photos_for(1).len(), 2);
    }

    #[test]
    fn test_lock_record_keeps_entry_locked() {
        let snapshot = CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal")],
            vec![record(10, 1, UnlockStatus::Locked, 0)],
        );
        let view = DexView::build(&snapshot);
        assert!(view.entries[0].locked);
        // The LOCK record is still linked
        assert_eq!(view.entries[0].unlock_id, Some(10));
        assert!(snapshot.photos_for(1).is_empty());
    }

    #[test]
    fn test_unlock_record_preferred_over_lock() {
        let snapshot = CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal")],
            vec![
                record(10, 1, UnlockStatus::Locked, 0),
                record(11, 1, UnlockStatus::Unlocked, 1),
            ],
        );
        let view = DexView::build(&snapshot);
        assert!(!view.entries[0].locked);
        assert_eq!(view.entries[0].unlock_id, Some(11));
    }

    #[test]
    fn test_locked_iff_no_unlock_record() {
        let entries: Vec<_> = (1..=6).map(|i| entry(i, "x", "Bird")).collect();
        let unlocks = vec![
            record(1, 2, UnlockStatus::Unlocked, 0),
            record(2, 3, UnlockStatus::Locked, 0),
            record(3, 5, UnlockStatus::Unknown, 0),
            record(4, 6, UnlockStatus::Unlocked, 0),
        ];
        let snapshot = CatalogSnapshot::new(entries, unlocks);
        for item in reconcile(&snapshot) {
            let has_unlock = snapshot
                .unlocks()
                .iter()
                .any(|r| r.entry_id == item.entry.id && r.status == UnlockStatus::Unlocked);
            assert_eq!(item.locked, !has_unlock, "entry {}", item.entry.id);
        }
    }

    #[test]
    fn test_photo_lookup() {
        let snapshot = CatalogSnapshot::new(
            vec![entry(1, "Isard", "Mammal")],
            vec![record(7, 1, UnlockStatus::Unlocked, 2)],
        );
        assert_eq!(snapshot.photo(701).unwrap().unlock_id, Some(7));
        assert!(snapshot.photo(9).is_none());
    }

    #[test]
    fn test_generation_orders_snapshots_by_fetch_start() {
        let first = next_generation();
        let second = next_generation();
        assert!(second > first);

        let before = CatalogSnapshot::empty().with_generation(first);
        let after = CatalogSnapshot::empty().with_generation(second);
        assert!(before.is_older_than(&after));
        assert!(!after.is_older_than(&before));
        assert!(!after.is_older_than(&after));

        // Unstamped snapshots never win over fetched ones
        assert!(CatalogSnapshot::empty().is_older_than(&before));
    }
}
