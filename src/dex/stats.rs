use serde::Serialize;

use super::filter::CategoryFilter;
use crate::models::{CatalogEntry, UnlockRecord};
use std::collections::HashMap;

/// Unlock progress for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub unlocked: usize,
    pub total: usize,
}

impl CategoryStats {
    pub fn percent(&self) -> f64 {
        percent(self.unlocked, self.total)
    }
}

/// Aggregate progress over the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_entries: usize,
    pub unlocked: usize,
    pub total_photos: u32,
    pub categories: Vec<CategoryStats>,
}

impl Stats {
    pub fn compute(entries: &[CatalogEntry], unlocks: &[UnlockRecord]) -> Self {
        let mut categories: Vec<CategoryStats> = Vec::new();
        let mut slot_by_entry: HashMap<i64, usize> = HashMap::new();

        for entry in entries {
            let label = entry.category_label();
            let slot = match categories
                .iter()
                .position(|c| c.category.to_lowercase() == label.to_lowercase())
            {
                Some(slot) => slot,
                None => {
                    categories.push(CategoryStats {
                        category: label.to_string(),
                        unlocked: 0,
                        total: 0,
                    });
                    categories.len() - 1
                }
            };
            categories[slot].total += 1;
            slot_by_entry.insert(entry.id, slot);
        }

        let mut unlocked = 0;
        let mut total_photos = 0;
        for record in unlocks {
            total_photos += record.photo_count();
            if record.is_unlocked() {
                unlocked += 1;
                if let Some(&slot) = slot_by_entry.get(&record.entry_id) {
                    categories[slot].unlocked += 1;
                }
            }
        }

        Self {
            total_entries: entries.len(),
            unlocked,
            total_photos,
            categories,
        }
    }

    /// Percentage complete, 0 when the catalog is empty.
    pub fn completion_percent(&self) -> f64 {
        percent(self.unlocked, self.total_entries)
    }

    pub fn category(&self, name: &str) -> Option<&CategoryStats> {
        let name = name.trim().to_lowercase();
        self.categories
            .iter()
            .find(|c| c.category.to_lowercase() == name)
    }

    /// Narrow to the filtered category. The photo total stays global; an
    /// unknown category leaves the stats unscoped.
    pub fn scoped(&self, filter: &CategoryFilter) -> Stats {
        let CategoryFilter::Only(name) = filter else {
            return self.clone();
        };
        match self.category(name) {
            Some(category) => Stats {
                total_entries: category.total,
                unlocked: category.unlocked,
                total_photos: self.total_photos,
                categories: vec![category.clone()],
            },
            None => self.clone(),
        }
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::tests::{entry, record};
    use crate::models::UnlockStatus;

    #[test]
    fn test_empty_catalog() {
        let stats = Stats::compute(&[], &[]);
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.completion_percent(), 0.0);
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn test_single_locked_entry() {
        let stats = Stats::compute(&[entry(1, "Isard", "Mammal")], &[]);
        assert_eq!(stats.unlocked, 0);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_photos, 0);
        assert_eq!(
            stats.categories,
            vec![CategoryStats {
                category: "Mammal".into(),
                unlocked: 0,
                total: 1
            }]
        );
    }

    #[test]
    fn test_category_sums() {
        let entries = vec![
            entry(1, "Isard", "Mammal"),
            entry(2, "Trencalòs", "Bird"),
            entry(3, "Marmota", "Mammal"),
            entry(4, "Tritó", ""),
        ];
        let unlocks = vec![
            record(10, 1, UnlockStatus::Unlocked, 2),
            record(11, 2, UnlockStatus::Locked, 0),
            record(12, 3, UnlockStatus::Unlocked, 1),
            record(13, 99, UnlockStatus::Unlocked, 4),
        ];
        let stats = Stats::compute(&entries, &unlocks);

        let order: Vec<&str> = stats.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["Mammal", "Bird", "Uncategorised"]);

        let total: usize = stats.categories.iter().map(|c| c.total).sum();
        assert_eq!(total, entries.len());

        // Records for entries outside the catalog count globally only
        let per_category: usize = stats.categories.iter().map(|c| c.unlocked).sum();
        assert_eq!(per_category, 2);
        assert_eq!(stats.unlocked, 3);
        assert_eq!(stats.total_photos, 7);
    }

    #[test]
    fn test_percent_is_clamped() {
        let stats = Stats {
            total_entries: 2,
            unlocked: 5,
            total_photos: 0,
            categories: Vec::new(),
        };
        assert_eq!(stats.completion_percent(), 100.0);

        let stats = Stats {
            total_entries: 4,
            unlocked: 1,
            ..stats
        };
        assert_eq!(stats.completion_percent(), 25.0);
    }

    #[test]
    fn test_scoped_to_category() {
        let entries = vec![entry(1, "Isard", "Mammal"), entry(2, "Àliga", "Bird")];
        let unlocks = vec![record(10, 2, UnlockStatus::Unlocked, 3)];
        let stats = Stats::compute(&entries, &unlocks);

        let birds = stats.scoped(&CategoryFilter::Only("bird".into()));
        assert_eq!(birds.total_entries, 1);
        assert_eq!(birds.unlocked, 1);
        assert_eq!(birds.total_photos, 3);
        assert_eq!(birds.completion_percent(), 100.0);

        assert_eq!(stats.scoped(&CategoryFilter::Only("Fish".into())), stats);
        assert_eq!(stats.scoped(&CategoryFilter::All), stats);
    }
}
