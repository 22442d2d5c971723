//! Page range syntax used by the split task.
//!
//! A range is a comma separated list of 1-based, inclusive items:
//! `3`, `1-3`, `5-` (page 5 to the end) or `-4` (first page to page 4).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

lazy_static! {
    static ref RANGE_ITEM: Regex = Regex::new(r"^\s*(\d*)\s*(-)?\s*(\d*)\s*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Span {
    Single(u32),
    Between(u32, u32),
    From(u32),
    UpTo(u32),
}

/// Validated page selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    spans: Vec<Span>,
    source: String,
}

impl PageRange {
    /// Parse and validate range text, `None` when the syntax is invalid
    pub fn parse(text: &str) -> Option<Self> {
        let mut spans = Vec::new();

        for item in text.split(',') {
            let caps = RANGE_ITEM.captures(item)?;
            let start = parse_page(caps.get(1).map_or("", |m| m.as_str()))?;
            let dash = caps.get(2).is_some();
            let end = parse_page(caps.get(3).map_or("", |m| m.as_str()))?;

            let span = match (start, dash, end) {
                (Some(page), false, None) => Span::Single(page),
                (Some(first), true, Some(last)) if first <= last => Span::Between(first, last),
                (Some(first), true, None) => Span::From(first),
                (None, true, Some(last)) => Span::UpTo(last),
                _ => return None,
            };
            spans.push(span);
        }

        Some(Self {
            spans,
            source: text.trim().to_string(),
        })
    }

    /// Whether `text` is a valid range
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    /// 1-based page numbers selected in a document of `page_count` pages,
    /// ascending and without duplicates
    pub fn select(&self, page_count: u32) -> Vec<u32> {
        let mut pages = BTreeSet::new();
        for span in &self.spans {
            let (first, last) = match *span {
                Span::Single(page) => (page, page),
                Span::Between(first, last) => (first, last),
                Span::From(first) => (first, page_count),
                Span::UpTo(last) => (1, last),
            };
            pages.extend(first.max(1)..=last.min(page_count));
        }
        pages.into_iter().collect()
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Empty input is "absent", zero or garbage is invalid
fn parse_page(text: &str) -> Option<Option<u32>> {
    if text.is_empty() {
        return Some(None);
    }
    match text.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(page) => Some(Some(page)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges() {
        for text in ["1", "1-3", "2-", "-4", "1, 3-5, 8-", " 7 "] {
            assert!(PageRange::is_valid(text), "expected {text:?} to be valid");
        }
    }

    #[test]
    fn test_invalid_ranges() {
        for text in ["", "-", "0", "3-1", "a-b", "1-2-3", "1,,2", "1.5", "abc"] {
            assert!(!PageRange::is_valid(text), "expected {text:?} to be invalid");
        }
    }

    #[test]
    fn test_select_pages() {
        let range = PageRange::parse("1-3").unwrap();
        assert_eq!(range.select(10), vec![1, 2, 3]);

        let range = PageRange::parse("8-, -2, 5").unwrap();
        assert_eq!(range.select(9), vec![1, 2, 5, 8, 9]);
    }

    #[test]
    fn test_select_clamps_to_document() {
        let range = PageRange::parse("4-10").unwrap();
        assert_eq!(range.select(5), vec![4, 5]);

        let range = PageRange::parse("7").unwrap();
        assert!(range.select(3).is_empty());
    }

    #[test]
    fn test_display_keeps_user_text() {
        let range = PageRange::parse(" 1-3 ").unwrap();
        assert_eq!(range.to_string(), "1-3");
    }
}
