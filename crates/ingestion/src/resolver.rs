//! Page to outline-entry resolution

use crate::structure::OutlineEntry;

/// Maps page numbers to the outline entry that contains them.
///
/// The entry owning page `p` is the one with the greatest `start_page <= p`.
/// Entries sharing a start page resolve to the one recovered last.
#[derive(Debug, Clone, Default)]
pub struct ChapterResolver {
    /// (start_page, index into the original outline), sorted by start page
    starts: Vec<(u32, usize)>,
}

impl ChapterResolver {
    pub fn new(outline: &[OutlineEntry]) -> Self {
        let mut starts: Vec<(u32, usize)> = outline
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.start_page, idx))
            .collect();

        // stable, keeps recovery order among equal start pages
        starts.sort_by_key(|(start, _)| *start);

        Self { starts }
    }

    /// Index into the outline of the entry containing `page`, if any
    pub fn resolve(&self, page: u32) -> Option<usize> {
        let upper = self.starts.partition_point(|(start, _)| *start <= page);
        upper.checked_sub(1).map(|pos| self.starts[pos].1)
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

/// Resolve a page against an outline
pub fn resolve<'a>(outline: &'a [OutlineEntry], page: u32) -> Option<&'a OutlineEntry> {
    ChapterResolver::new(outline)
        .resolve(page)
        .map(|idx| &outline[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, start_page: u32, level: u32) -> OutlineEntry {
        OutlineEntry {
            label: label.to_string(),
            title: format!("Entry {}", label),
            start_page,
            level,
            end_page: None,
        }
    }

    #[test]
    fn test_resolves_greatest_start_at_or_before_page() {
        let outline = vec![entry("1", 1, 1), entry("2", 50, 1), entry("3", 120, 1)];

        assert_eq!(resolve(&outline, 75).map(|e| e.start_page), Some(50));
        assert_eq!(resolve(&outline, 1).map(|e| e.start_page), Some(1));
        assert_eq!(resolve(&outline, 50).map(|e| e.start_page), Some(50));
        assert_eq!(resolve(&outline, 49).map(|e| e.start_page), Some(1));
        assert_eq!(resolve(&outline, 9999).map(|e| e.start_page), Some(120));
    }

    #[test]
    fn test_pages_before_first_entry() {
        let outline = vec![entry("1", 10, 1), entry("2", 30, 1)];
        assert!(resolve(&outline, 9).is_none());
        assert!(resolve(&outline, 0).is_none());
    }

    #[test]
    fn test_empty_outline() {
        let resolver = ChapterResolver::new(&[]);
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve(5), None);
    }

    #[test]
    fn test_unsorted_outline() {
        let outline = vec![entry("3", 120, 1), entry("1", 1, 1), entry("2", 50, 1)];
        let resolver = ChapterResolver::new(&outline);

        assert_eq!(resolver.resolve(75), Some(2));
        assert_eq!(resolver.resolve(130), Some(0));
        assert_eq!(resolver.resolve(2), Some(1));
    }

    #[test]
    fn test_shared_start_page_picks_last_recovered() {
        let outline = vec![entry("2", 47, 1), entry("2.1", 47, 2), entry("3", 60, 1)];
        let resolver = ChapterResolver::new(&outline);

        assert_eq!(resolver.resolve(47), Some(1));
        assert_eq!(resolver.resolve(59), Some(1));
        assert_eq!(resolver.resolve(60), Some(2));
    }

    #[test]
    fn test_resolution_is_monotonic() {
        let outline = vec![entry("1", 3, 1), entry("1.1", 7, 2), entry("2", 15, 1), entry("3", 40, 1)];
        let resolver = ChapterResolver::new(&outline);

        let mut last_start = 0;
        for page in 1..=60 {
            let start = resolver.resolve(page).map(|i| outline[i].start_page).unwrap_or(0);
            assert!(start >= last_start, "page {} went backwards", page);
            assert!(start <= page);
            last_start = start;
        }
    }
}
