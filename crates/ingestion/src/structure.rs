//! Structure recovery
//!
//! Builds a chapter outline for a textbook. The first pages are searched for
//! a table of contents; when none yields entries, chapter boundaries are
//! inferred from heading-like lines.

use crate::pdf::PageSource;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Pages searched for a table of contents
pub const TOC_SCAN_PAGES: u32 = 20;

/// Pages searched by heading inference
pub const HEADING_SCAN_PAGES: u32 = 50;

const TOC_INDICATORS: [&str; 4] = ["table of contents", "contents", "chapter", "section"];

/// "Chapter 2: Thermodynamics....45" / "2. Thermodynamics....45"
static TOC_TOP_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:chapter\s+)?(\d+)[.:)\-]?\s*([^.]+?)\.{2,}\s*(\d+)").unwrap()
});

/// "   2.1 Heat Engines.....47"
static TOC_SUB_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\d+\.\d+)\s+([^.]+?)\.{2,}\s*(\d+)").unwrap()
});

/// Which form of the line a heading rule is matched against
#[derive(Debug, Clone, Copy)]
enum LineCase {
    Lower,
    Original,
}

/// Heading rules in priority order; first match wins per line
static HEADING_RULES: LazyLock<Vec<(Regex, LineCase)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^\s*chapter\s+(\d+)").unwrap(), LineCase::Lower),
        (Regex::new(r"^\s*(\d+)\.\s+[A-Z][^.]*$").unwrap(), LineCase::Original),
        (Regex::new(r"^\s*unit\s+(\d+)").unwrap(), LineCase::Lower),
        (Regex::new(r"^\s*section\s+(\d+)").unwrap(), LineCase::Lower),
    ]
});

/// One entry of the recovered outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// Numeric or dotted label, e.g. "3" or "3.2"
    pub label: String,
    pub title: String,
    pub start_page: u32,
    /// 1 = chapter, 2 = subsection
    pub level: u32,
    /// Filled by [`bound_outline`]
    pub end_page: Option<u32>,
}

impl OutlineEntry {
    fn new(label: impl Into<String>, title: impl Into<String>, start_page: u32, level: u32) -> Self {
        Self {
            label: label.into(),
            title: title.into(),
            start_page,
            level,
            end_page: None,
        }
    }
}

/// Recover the outline of a document with `page_count` pages.
///
/// Pages that fail to yield text are skipped.
pub fn recover_outline(source: &dyn PageSource, page_count: u32) -> Vec<OutlineEntry> {
    let entries = scan_table_of_contents(source, page_count);
    if !entries.is_empty() {
        info!(entries = entries.len(), "Outline recovered from table of contents");
        return entries;
    }

    let entries = infer_from_headings(source, page_count);
    info!(entries = entries.len(), "Outline inferred from headings");
    entries
}

fn read_page(source: &dyn PageSource, page_number: u32) -> Option<String> {
    match source.page_text(page_number) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            debug!(page = page_number, error = %e, "Skipping unreadable page during structure recovery");
            None
        }
    }
}

fn scan_table_of_contents(source: &dyn PageSource, page_count: u32) -> Vec<OutlineEntry> {
    for page_number in 1..=page_count.min(TOC_SCAN_PAGES) {
        let Some(text) = read_page(source, page_number) else {
            continue;
        };

        if !has_toc_indicator(&text) {
            continue;
        }

        let entries = parse_toc_page(&text);
        if !entries.is_empty() {
            debug!(page = page_number, entries = entries.len(), "Table of contents page found");
            return entries;
        }
    }

    Vec::new()
}

/// Whether the page mentions any table-of-contents indicator
pub fn has_toc_indicator(text: &str) -> bool {
    let lower = text.to_lowercase();
    TOC_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

/// Parse the entry lines of a table-of-contents page.
///
/// Each line is tested against the top-level and the sub-level pattern
/// independently, so an indented dotted line can produce both entries.
pub fn parse_toc_page(text: &str) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = TOC_TOP_LEVEL.captures(&line.to_lowercase()) {
            if let Some(entry) = toc_entry(&caps[1], &caps[2], &caps[3], 1) {
                entries.push(entry);
            }
        }

        if let Some(caps) = TOC_SUB_LEVEL.captures(raw_line) {
            if let Some(entry) = toc_entry(&caps[1], &caps[2], &caps[3], 2) {
                entries.push(entry);
            }
        }
    }

    entries
}

fn toc_entry(label: &str, title: &str, page: &str, level: u32) -> Option<OutlineEntry> {
    let start_page = page.parse::<u32>().ok().filter(|p| *p >= 1)?;
    let title = title_case(title.trim());
    if title.is_empty() {
        return None;
    }

    Some(OutlineEntry::new(label, title, start_page, level))
}

fn infer_from_headings(source: &dyn PageSource, page_count: u32) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();
    let mut chapter_number = 0u32;

    for page_number in 1..=page_count.min(HEADING_SCAN_PAGES) {
        let Some(text) = read_page(source, page_number) else {
            continue;
        };

        for title in heading_lines(&text) {
            chapter_number += 1;
            entries.push(OutlineEntry::new(chapter_number.to_string(), title, page_number, 1));
        }
    }

    entries
}

/// Title-cased heading lines of a page, in page order.
///
/// The number printed in the heading is not used; callers number headings
/// by discovery order.
pub fn heading_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| (5..=100).contains(&line.chars().count()))
        .filter(|line| is_heading(line))
        .map(title_case)
        .collect()
}

fn is_heading(line: &str) -> bool {
    let lower = line.to_lowercase();

    HEADING_RULES.iter().any(|(pattern, case)| match case {
        LineCase::Lower => pattern.is_match(&lower),
        LineCase::Original => pattern.is_match(line),
    })
}

/// Fill `end_page` for every entry.
///
/// An entry ends one page before the next entry (in start-page order) at the
/// same or a shallower level; the last one runs to the end of the document.
pub fn bound_outline(entries: &mut [OutlineEntry], page_count: u32) {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| entries[i].start_page);

    for (pos, &idx) in order.iter().enumerate() {
        let start = entries[idx].start_page;
        let level = entries[idx].level;

        let next_start = order[pos + 1..]
            .iter()
            .map(|&j| &entries[j])
            .find(|e| e.level <= level)
            .map(|e| e.start_page);

        let end = match next_start {
            Some(next) => next.saturating_sub(1),
            None => page_count,
        };

        entries[idx].end_page = Some(end.max(start));
    }
}

/// Capitalize the first letter of every alphabetic run, lower-case the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;

    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }

    out
}
