//! Narrowing the reconciled dex by name, category and lock status.

use super::ReconciledEntry;
use crate::models::CatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Locked,
    Unlocked,
}

impl StatusFilter {
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Locked,
            StatusFilter::Locked => StatusFilter::Unlocked,
            StatusFilter::Unlocked => StatusFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Locked => "locked",
            StatusFilter::Unlocked => "unlocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Some(StatusFilter::All),
            "locked" | "lock" => Some(StatusFilter::Locked),
            "unlocked" | "unlock" => Some(StatusFilter::Unlocked),
            _ => None,
        }
    }

    pub fn matches(&self, locked: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Locked => locked,
            StatusFilter::Unlocked => !locked,
        }
    }
}

/// Category predicate. `all` is a wildcard; anything else is compared
/// case-insensitively with the entry's category.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(s.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(name) => name,
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(name) => name.trim().to_lowercase() == category.trim().to_lowercase(),
        }
    }

    /// Step to the next choice: all, then each category in order, then back
    /// to all.
    pub fn cycle(&self, choices: &[String]) -> Self {
        let next = match self {
            CategoryFilter::All => choices.first(),
            CategoryFilter::Only(current) => choices
                .iter()
                .position(|c| CategoryFilter::Only(current.clone()).matches(c))
                .and_then(|i| choices.get(i + 1)),
        };
        match next {
            Some(name) => CategoryFilter::Only(name.clone()),
            None => CategoryFilter::All,
        }
    }
}

/// The conjunction of the three predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DexFilter {
    pub text: String,
    pub category: CategoryFilter,
    pub status: StatusFilter,
}

impl DexFilter {
    pub fn is_active(&self) -> bool {
        !self.text.trim().is_empty()
            || self.category != CategoryFilter::All
            || self.status != StatusFilter::All
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, item: &ReconciledEntry) -> bool {
        self.matches_text(&item.entry)
            && self.category.matches(item.entry.category_label())
            && self.status.matches(item.locked)
    }

    fn matches_text(&self, entry: &CatalogEntry) -> bool {
        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        entry.common_name.to_lowercase().contains(&needle)
            || entry.scientific_name.to_lowercase().contains(&needle)
    }

    pub fn apply<'a, I>(&self, items: I) -> Vec<&'a ReconciledEntry>
    where
        I: IntoIterator<Item = &'a ReconciledEntry>,
    {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }

    /// One-line summary for headers, e.g. `"isard" · Mammal · locked`.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.text.trim().is_empty() {
            parts.push(format!("\"{}\"", self.text.trim()));
        }
        if let CategoryFilter::Only(ref name) = self.category {
            parts.push(name.clone());
        }
        if self.status != StatusFilter::All {
            parts.push(self.status.label().to_string());
        }
        parts.join(" · ")
    }
}

/// Distinct non-empty categories in first-appearance order.
pub fn categories(entries: &[CatalogEntry]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for entry in entries {
        let Some(category) = entry.category.as_deref().map(str::trim) else {
            continue;
        };
        if category.is_empty() {
            continue;
        }
        if !seen.iter().any(|c| c.to_lowercase() == category.to_lowercase()) {
            seen.push(category.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::tests::{entry, record};
    use crate::dex::{CatalogSnapshot, DexView};
    use crate::models::UnlockStatus;

    fn view() -> DexView {
        let snapshot = CatalogSnapshot::new(
            vec![
                entry(1, "Isard", "Mammal"),
                entry(2, "Trencalòs", "Bird"),
                entry(3, "Marmota", "mammal"),
                entry(4, "Àliga daurada", "Bird"),
            ],
            vec![
                record(10, 1, UnlockStatus::Unlocked, 1),
                record(11, 4, UnlockStatus::Unlocked, 0),
            ],
        );
        DexView::build(&snapshot)
    }

    fn ids(items: &[&ReconciledEntry]) -> Vec<i64> {
        items.iter().map(|i| i.entry.id).collect()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let view = view();
        let filter = DexFilter::default();
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&view.entries).len(), 4);
    }

    #[test]
    fn test_text_matches_either_name() {
        let view = view();
        let mut filter = DexFilter {
            text: "MARM".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&view.entries)), vec![3]);

        // Scientific names are set to "<common> sp." by the fixture
        filter.text = " sp. ".into();
        assert_eq!(filter.apply(&view.entries).len(), 4);
    }

    #[test]
    fn test_category_is_case_insensitive() {
        let view = view();
        let filter = DexFilter {
            category: CategoryFilter::parse("MAMMAL"),
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&view.entries)), vec![1, 3]);

        let filter = DexFilter {
            category: CategoryFilter::parse("All"),
            ..Default::default()
        };
        assert_eq!(filter.category, CategoryFilter::All);
    }

    #[test]
    fn test_conjunction() {
        let view = view();
        let filter = DexFilter {
            text: "a".into(),
            category: CategoryFilter::Only("bird".into()),
            status: StatusFilter::Locked,
        };
        assert_eq!(ids(&filter.apply(&view.entries)), vec![2]);

        for item in filter.apply(&view.entries) {
            let alone = [
                DexFilter { text: filter.text.clone(), ..Default::default() },
                DexFilter { category: filter.category.clone(), ..Default::default() },
                DexFilter { status: filter.status, ..Default::default() },
            ];
            assert!(alone.iter().all(|f| f.matches(item)));
        }
    }

    #[test]
    fn test_idempotent() {
        let view = view();
        let filter = DexFilter {
            status: StatusFilter::Unlocked,
            ..Default::default()
        };
        let once = filter.apply(&view.entries);
        let twice = filter.apply(once.iter().copied());
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(ids(&once), vec![1, 4]);
    }

    #[test]
    fn test_status_cycle_and_parse() {
        assert_eq!(StatusFilter::All.next(), StatusFilter::Locked);
        assert_eq!(StatusFilter::Unlocked.next(), StatusFilter::All);
        assert_eq!(StatusFilter::parse("Unlocked"), Some(StatusFilter::Unlocked));
        assert_eq!(StatusFilter::parse("maybe"), None);
    }

    #[test]
    fn test_categories_first_appearance() {
        let entries = vec![
            entry(1, "a", "Mammal"),
            entry(2, "b", ""),
            entry(3, "c", "Bird"),
            entry(4, "d", "mammal"),
        ];
        let choices = categories(&entries);
        assert_eq!(choices, vec!["Mammal".to_string(), "Bird".to_string()]);

        let mut filter = CategoryFilter::All;
        filter = filter.cycle(&choices);
        assert_eq!(filter, CategoryFilter::Only("Mammal".into()));
        filter = filter.cycle(&choices);
        assert_eq!(filter, CategoryFilter::Only("Bird".into()));
        filter = filter.cycle(&choices);
        assert_eq!(filter, CategoryFilter::All);
    }

    #[test]
    fn test_describe() {
        let filter = DexFilter {
            text: "isard".into(),
            category: CategoryFilter::Only("Mammal".into()),
            status: StatusFilter::Locked,
        };
        assert_eq!(filter.describe(), "\"isard\" · Mammal · locked");
        assert_eq!(DexFilter::default().describe(), "");
    }
}
