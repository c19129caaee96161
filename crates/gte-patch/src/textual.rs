//! Textual fuzzy substitution
//!
//! Fallback strategy working on raw lines: find blocks that start like the
//! proposed code, measure how close each block is, and replace the best one.

use crate::text::{
    indent_width, leading_whitespace, line_ending, normalize_fragment, reindent, similarity,
    strip_eol,
};

/// Trailing characters that mean a line continues on the next one
const OPEN_DELIMITERS: &[char] = &['(', '[', '{', ',', '\\'];

/// Leading characters of a line that closes the block it belongs to
const CLOSING_DELIMITERS: &[char] = &['}', ')', ']'];

/// Trailing characters of a closing line that reopen the block (`} else {`, `):`)
const REOPENING: &[char] = &['{', ':', '(', '['];

/// Best candidate region found in a file
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Region {
    /// First line index
    pub(crate) start: usize,
    /// Last line index, inclusive
    pub(crate) end: usize,
    /// Similarity against the proposed code
    pub(crate) score: f64,
}

/// Replace the best-matching block of `source` with `proposed`
///
/// `proposed` must already be normalised. Returns the new content, or the
/// best score seen when nothing beats `threshold`.
pub(crate) fn substitute(
    source: &str,
    proposed: &str,
    comment_markers: &[&str],
    threshold: f64,
) -> Result<(String, Region), f64> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let region = match best_region(&lines, proposed, comment_markers) {
        Some(region) if region.score > threshold => region,
        Some(region) => return Err(region.score),
        None => return Err(0.0),
    };

    let eol = line_ending(source);
    let indent = leading_whitespace(strip_eol(lines[region.start]));

    let mut out = String::with_capacity(source.len() + proposed.len());
    out.extend(lines[..region.start].iter().copied());
    out.push_str(&reindent(proposed, indent, false, eol));
    if lines[region.end].ends_with('\n') {
        out.push_str(eol);
    }
    out.extend(lines[region.end + 1..].iter().copied());

    Ok((out, region))
}

fn best_region(lines: &[&str], proposed: &str, comment_markers: &[&str]) -> Option<Region> {
    let header = proposed.lines().map(str::trim).find(|l| !l.is_empty())?;

    let mut best: Option<Region> = None;
    for start in (0..lines.len()).filter(|&i| is_candidate(strip_eol(lines[i]), header)) {
        let end = block_end(lines, start, comment_markers);
        let block = normalize_fragment(
            &lines[start..=end]
                .iter()
                .map(|l| strip_eol(l))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        let score = similarity(&block, proposed);
        tracing::trace!(start, end, score, "textual candidate");
        if best.map_or(true, |b| score > b.score) {
            best = Some(Region { start, end, score });
        }
    }
    best
}

fn is_candidate(line: &str, header: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    line.contains(header) || (line.ends_with(OPEN_DELIMITERS) && header.starts_with(line))
}

fn is_comment_only(trimmed: &str, comment_markers: &[&str]) -> bool {
    comment_markers.iter().any(|m| trimmed.starts_with(m))
}

/// Walk forward until indentation returns to the start line's level
///
/// Blank and comment-only lines never end a block. A closing-bracket line
/// at the base level is part of the block.
fn block_end(lines: &[&str], start: usize, comment_markers: &[&str]) -> usize {
    let base = indent_width(strip_eol(lines[start]));
    let mut end = start;

    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let text = strip_eol(line);
        let trimmed = text.trim();
        if trimmed.is_empty() || is_comment_only(trimmed, comment_markers) {
            continue;
        }
        if indent_width(text) > base {
            end = i;
            continue;
        }
        if trimmed.starts_with(CLOSING_DELIMITERS) {
            end = i;
            if trimmed.ends_with(REOPENING) {
                continue;
            }
        }
        break;
    }
    end
}
