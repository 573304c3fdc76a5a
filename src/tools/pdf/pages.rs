//! Page selection strings
//!
//! Selections are comma-separated page numbers and ranges, 1-based:
//! `1-3,5`, `7-` (to the end), `all` or empty for every page.

use crate::tools::error::{ToolError, ToolResult};
use std::ops::RangeInclusive;

/// Parse a selection into ranges, in the order written
pub fn parse_ranges(spec: &str, total: u32) -> ToolResult<Vec<RangeInclusive<u32>>> {
    if total == 0 {
        return Err(ToolError::invalid("The PDF has no pages"));
    }
    let spec = spec.trim();
    if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
        return Ok(vec![1..=total]);
    }

    let mut ranges = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let range = match part.split_once('-') {
            Some((start, end)) => {
                let start = if start.trim().is_empty() { 1 } else { parse_page(start, part)? };
                let end = if end.trim().is_empty() { total } else { parse_page(end, part)? };
                start..=end
            }
            None => {
                let page = parse_page(part, part)?;
                page..=page
            }
        };
        if range.start() > range.end() {
            return Err(ToolError::invalid(format!("Invalid page range '{}': start is after end", part)));
        }
        if *range.end() > total {
            return Err(ToolError::invalid(format!(
                "Page {} is out of range; the PDF has {} pages",
                range.end(),
                total
            )));
        }
        ranges.push(range);
    }

    if ranges.is_empty() {
        return Err(ToolError::invalid("No pages selected"));
    }
    Ok(ranges)
}

/// Parse a selection into distinct page numbers, first mention wins
pub fn parse_pages(spec: &str, total: u32) -> ToolResult<Vec<u32>> {
    let mut pages = Vec::new();
    let mut seen = vec![false; total as usize + 1];
    for range in parse_ranges(spec, total)? {
        for page in range {
            if !seen[page as usize] {
                seen[page as usize] = true;
                pages.push(page);
            }
        }
    }
    Ok(pages)
}

/// Every page not in the selection, ascending
pub fn complement(selected: &[u32], total: u32) -> Vec<u32> {
    (1..=total).filter(|p| !selected.contains(p)).collect()
}

fn parse_page(s: &str, part: &str) -> ToolResult<u32> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err(ToolError::invalid("Page numbers start at 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(ToolError::invalid(format!("Invalid page selection '{}'", part))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_pages() {
        assert_eq!(parse_ranges("", 4).unwrap(), vec![1..=4]);
        assert_eq!(parse_ranges(" ALL ", 4).unwrap(), vec![1..=4]);
    }

    #[test]
    fn test_ranges_in_order() {
        assert_eq!(parse_ranges("1-3,5", 6).unwrap(), vec![1..=3, 5..=5]);
        assert_eq!(parse_ranges("5, 2-", 6).unwrap(), vec![5..=5, 2..=6]);
        assert_eq!(parse_ranges("-2", 6).unwrap(), vec![1..=2]);
    }

    #[test]
    fn test_invalid_selections() {
        assert!(parse_ranges("0", 3).is_err());
        assert!(parse_ranges("4", 3).is_err());
        assert!(parse_ranges("3-1", 3).is_err());
        assert!(parse_ranges("a-b", 3).is_err());
        assert!(parse_ranges(",,", 3).is_err());
        assert!(parse_ranges("1", 0).is_err());
    }

    #[test]
    fn test_pages_dedup_and_complement() {
        assert_eq!(parse_pages("3,1-3", 5).unwrap(), vec![3, 1, 2]);
        assert_eq!(complement(&[3, 1], 5), vec![2, 4, 5]);
    }
}
