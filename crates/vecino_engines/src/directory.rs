#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use vecino_kernel_contracts::provider::{ComunaId, Coverage, ProviderCategoryId, RegionId};

pub const DEFAULT_DIRECTORY_PAGE_SIZE: usize = 12;
pub const MAX_DIRECTORY_PAGE_SIZE: usize = 100;

/// Lower-cases and strips diacritics so "Panadería" matches "panaderia".
pub fn fold_for_search(raw: &str) -> String {
    raw.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case- and accent-insensitive `contains` over any of `haystacks`.
/// A blank needle matches everything.
pub fn matches_text(needle: &str, haystacks: &[&str]) -> bool {
    let needle = fold_for_search(needle.trim());
    if needle.is_empty() {
        return true;
    }
    haystacks
        .iter()
        .any(|h| fold_for_search(h).contains(&needle))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryQuery {
    pub category: Option<ProviderCategoryId>,
    pub region: Option<RegionId>,
    pub comuna: Option<ComunaId>,
    pub coverage: Option<Coverage>,
    pub text: Option<String>,
}

/// The provider fields the directory filters on.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEntry<'a> {
    pub categories: &'a BTreeSet<ProviderCategoryId>,
    pub region: Option<RegionId>,
    pub comuna: Option<ComunaId>,
    pub coverage: Coverage,
    pub company_name: &'a str,
    pub description: &'a str,
}

impl DirectoryQuery {
    pub fn matches(&self, entry: &DirectoryEntry<'_>) -> bool {
        if let Some(c) = self.category {
            if !entry.categories.contains(&c) {
                return false;
            }
        }
        if self.region.is_some() && entry.region != self.region {
            return false;
        }
        if self.comuna.is_some() && entry.comuna != self.comuna {
            return false;
        }
        if self.coverage.is_some_and(|c| c != entry.coverage) {
            return false;
        }
        match &self.text {
            Some(t) => matches_text(t, &[entry.company_name, entry.description]),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub number: usize,
    pub num_pages: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Missing, non-numeric and < 1 all mean the first page.
pub fn parse_page_number(raw: Option<&str>) -> usize {
    raw.and_then(|r| r.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .unwrap_or(1)
}

/// Forgiving page lookup: past-the-end requests land on the last page and an
/// empty list still has one (empty) page.
pub fn paginate<T>(items: Vec<T>, page_size: usize, requested: usize) -> (Vec<T>, PageInfo) {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let num_pages = total_items.div_ceil(page_size).max(1);
    let number = requested.clamp(1, num_pages);
    let start = (number - 1) * page_size;
    let page: Vec<T> = items.into_iter().skip(start).take(page_size).collect();
    let info = PageInfo {
        number,
        num_pages,
        page_size,
        total_items,
        has_previous: number > 1,
        has_next: number < num_pages,
    };
    (page, info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_directory_01_text_match_ignores_case_and_accents() {
        assert!(matches_text("panaderia", &["Panadería La Espiga"]));
        assert!(matches_text("ÑUÑOA", &["", "Despacho en ñuñoa"]));
        assert!(matches_text("  ", &["cualquier cosa"]));
        assert!(!matches_text("botillería", &["Almacén Don Pepe"]));
    }

    #[test]
    fn at_directory_02_page_number_parsing() {
        assert_eq!(parse_page_number(None), 1);
        assert_eq!(parse_page_number(Some("abc")), 1);
        assert_eq!(parse_page_number(Some("0")), 1);
        assert_eq!(parse_page_number(Some("-4")), 1);
        assert_eq!(parse_page_number(Some(" 3 ")), 3);
    }

    #[test]
    fn at_directory_03_paginate_clamps_to_last_page() {
        let items: Vec<u32> = (1..=25).collect();
        let (page, info) = paginate(items.clone(), 12, 1);
        assert_eq!(page.len(), 12);
        assert_eq!(info.num_pages, 3);
        assert!(info.has_next && !info.has_previous);

        let (page, info) = paginate(items, 12, 99);
        assert_eq!(page, vec![25]);
        assert_eq!(info.number, 3);
        assert!(!info.has_next);
    }

    #[test]
    fn at_directory_04_empty_list_has_one_page() {
        let (page, info) = paginate(Vec::<u32>::new(), 12, 5);
        assert!(page.is_empty());
        assert_eq!(info.number, 1);
        assert_eq!(info.num_pages, 1);
    }

    #[test]
    fn at_directory_05_query_filters_compose() {
        let cats: BTreeSet<ProviderCategoryId> = [ProviderCategoryId(2)].into_iter().collect();
        let entry = DirectoryEntry {
            categories: &cats,
            region: Some(RegionId(13)),
            comuna: Some(ComunaId(131)),
            coverage: Coverage::Regional,
            company_name: "Distribuidora Andina",
            description: "Abarrotes al por mayor",
        };
        assert!(DirectoryQuery::default().matches(&entry));
        let q = DirectoryQuery {
            category: Some(ProviderCategoryId(2)),
            region: Some(RegionId(13)),
            coverage: Some(Coverage::Regional),
            text: Some("ABARROTES".to_string()),
            ..DirectoryQuery::default()
        };
        assert!(q.matches(&entry));
        let q = DirectoryQuery {
            comuna: Some(ComunaId(999)),
            ..DirectoryQuery::default()
        };
        assert!(!q.matches(&entry));
    }
}
