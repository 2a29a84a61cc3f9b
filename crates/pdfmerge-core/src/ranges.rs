//! Page selection parsing
//!
//! Turns a human-readable selection like `"1-3, 5"` (1-based, inclusive)
//! into zero-based page indices.

use crate::error::PdfMergeError;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Which pages of a source document to keep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageSelection {
    /// Every page, in document order.
    #[default]
    All,
    /// Zero-based index ranges, sorted ascending, merged so that no two
    /// ranges overlap or touch. May be empty.
    Only(Vec<RangeInclusive<usize>>),
}

impl PageSelection {
    /// Whether the zero-based `index` is selected.
    pub fn contains(&self, index: usize) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Only(ranges) => ranges.iter().any(|r| r.contains(&index)),
        }
    }

    /// Ascending selected indices, or `None` for [`PageSelection::All`].
    pub fn indices(&self) -> Option<impl Iterator<Item = usize> + '_> {
        match self {
            PageSelection::All => None,
            PageSelection::Only(ranges) => Some(ranges.iter().flat_map(|r| r.clone())),
        }
    }

    /// Resolve against a document with `page_count` pages.
    ///
    /// Returns ascending zero-based indices; indices at or beyond
    /// `page_count` are dropped.
    pub fn resolve(&self, page_count: usize) -> Vec<usize> {
        match self {
            PageSelection::All => (0..page_count).collect(),
            PageSelection::Only(ranges) => {
                let mut pages = Vec::new();
                for range in ranges {
                    if *range.start() >= page_count {
                        break;
                    }
                    let end = (*range.end()).min(page_count - 1);
                    pages.extend(*range.start()..=end);
                }
                pages
            }
        }
    }
}

impl FromStr for PageSelection {
    type Err = PdfMergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ranges(s)
    }
}

/// Parse a page range string like "1-3, 5, 8-10".
///
/// - Empty (or all-whitespace) input selects every page.
/// - `N` selects page N; `A-B` selects A through B inclusive.
/// - `A-B` with `B < A` selects nothing and is not an error.
///
/// Any malformed term fails the whole parse.
pub fn parse_ranges(input: &str) -> Result<PageSelection, PdfMergeError> {
    if input.trim().is_empty() {
        return Ok(PageSelection::All);
    }

    let mut terms: Vec<(usize, usize)> = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(PdfMergeError::InvalidRangeFormat(format!(
                "Empty term in '{}'",
                input
            )));
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_page_number(start)?;
            let end = parse_page_number(end)?;
            if end >= start {
                terms.push((start - 1, end - 1));
            }
        } else {
            let page = parse_page_number(part)?;
            terms.push((page - 1, page - 1));
        }
    }

    Ok(PageSelection::Only(normalize(terms)))
}

/// Like [`parse_ranges`], with an absent value meaning "all pages".
pub fn parse_optional_ranges(input: Option<&str>) -> Result<PageSelection, PdfMergeError> {
    parse_ranges(input.unwrap_or_default())
}

fn parse_page_number(raw: &str) -> Result<usize, PdfMergeError> {
    let raw = raw.trim();
    let page: usize = raw
        .parse()
        .map_err(|_| PdfMergeError::InvalidRangeFormat(format!("Invalid page: '{}'", raw)))?;
    if page == 0 {
        return Err(PdfMergeError::InvalidRangeFormat(
            "Page numbers start at 1".into(),
        ));
    }
    Ok(page)
}

fn normalize(mut terms: Vec<(usize, usize)>) -> Vec<RangeInclusive<usize>> {
    terms.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(terms.len());
    for (start, end) in terms {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => {
                last.1 = last.1.max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    merged.into_iter().map(|(s, e)| s..=e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn indices(selection: &PageSelection) -> Vec<usize> {
        selection.indices().expect("explicit selection").collect()
    }

    #[test]
    fn test_empty_selects_all() {
        assert_eq!(parse_ranges("").unwrap(), PageSelection::All);
        assert_eq!(parse_ranges("   ").unwrap(), PageSelection::All);
        assert_eq!(parse_optional_ranges(None).unwrap(), PageSelection::All);
    }

    #[test]
    fn test_single_and_range() {
        let selection = parse_ranges("1-3,5").unwrap();
        assert_eq!(indices(&selection), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let selection = parse_ranges("5-2").unwrap();
        assert_eq!(selection, PageSelection::Only(vec![]));
        assert!(selection.resolve(10).is_empty());
    }

    #[test]
    fn test_reversed_range_does_not_affect_other_terms() {
        let selection = parse_ranges("5-2, 7").unwrap();
        assert_eq!(indices(&selection), vec![6]);
    }

    #[test]
    fn test_non_numeric_fails() {
        assert!(matches!(
            parse_ranges("abc"),
            Err(PdfMergeError::InvalidRangeFormat(_))
        ));
    }

    #[test]
    fn test_malformed_terms_fail() {
        for input in ["1-", "-3", "1-2-3", "1,,2", "2,", "0", "0-4", "1.5", "a-b"] {
            assert!(
                matches!(parse_ranges(input), Err(PdfMergeError::InvalidRangeFormat(_))),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let selection = parse_ranges(" 2 - 4 , 8 ").unwrap();
        assert_eq!(indices(&selection), vec![1, 2, 3, 7]);
    }

    #[test]
    fn test_out_of_order_terms_are_ascending() {
        let selection = parse_ranges("5,1-3").unwrap();
        assert_eq!(indices(&selection), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_overlapping_and_adjacent_terms_merge() {
        let selection = parse_ranges("1-3, 2-4, 5, 9").unwrap();
        assert_eq!(selection, PageSelection::Only(vec![0..=4, 8..=8]));
    }

    #[test]
    fn test_huge_range_is_cheap() {
        let selection = parse_ranges("1-4000000000").unwrap();
        assert_eq!(selection.resolve(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_resolve_drops_indices_past_page_count() {
        let selection = parse_ranges("2, 4-6, 20").unwrap();
        assert_eq!(selection.resolve(5), vec![1, 3, 4]);
        assert!(selection.resolve(0).is_empty());
    }

    #[test]
    fn test_resolve_all() {
        assert_eq!(PageSelection::All.resolve(3), vec![0, 1, 2]);
        assert!(PageSelection::All.resolve(0).is_empty());
    }

    #[test]
    fn test_from_str() {
        let selection: PageSelection = "3".parse().unwrap();
        assert!(selection.contains(2));
        assert!(!selection.contains(3));
    }

    fn term() -> impl Strategy<Value = (usize, usize)> {
        (1usize..60, 1usize..60)
    }

    proptest! {
        /// Parsing agrees with a brute-force expansion of every term.
        #[test]
        fn parse_matches_brute_force(terms in prop::collection::vec(term(), 1..8)) {
            let input = terms
                .iter()
                .map(|(a, b)| if a == b { a.to_string() } else { format!("{}-{}", a, b) })
                .collect::<Vec<_>>()
                .join(",");

            let mut expected = BTreeSet::new();
            for (a, b) in &terms {
                for page in *a..=*b {
                    expected.insert(page - 1);
                }
            }

            let selection = parse_ranges(&input).unwrap();
            let actual: Vec<usize> = selection.indices().unwrap().collect();
            prop_assert_eq!(actual, expected.into_iter().collect::<Vec<_>>());
        }

        /// Resolved pages are strictly ascending and within the document.
        #[test]
        fn resolve_is_ascending_and_bounded(
            terms in prop::collection::vec(term(), 1..8),
            page_count in 0usize..80,
        ) {
            let input = terms
                .iter()
                .map(|(a, b)| format!("{}-{}", a, b))
                .collect::<Vec<_>>()
                .join(",");
            let selection = parse_ranges(&input).unwrap();
            let resolved = selection.resolve(page_count);

            prop_assert!(resolved.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(resolved.iter().all(|&i| i < page_count && selection.contains(i)));
            let expected = (0..page_count).filter(|&i| selection.contains(i)).count();
            prop_assert_eq!(resolved.len(), expected);
        }
    }
}
