//! Line, indentation and similarity helpers

use similar::TextDiff;
use std::time::Duration;

/// Upper bound for one character-level diff; the ratio degrades gracefully
const RATIO_TIMEOUT: Duration = Duration::from_millis(250);

/// Similarity ratio `2·M / T` over characters
///
/// `M` is the number of matched characters and `T` the combined length, the
/// same measure as the classic sequence matcher. Identical inputs score 1.0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let diff = TextDiff::configure()
        .timeout(RATIO_TIMEOUT)
        .diff_chars(a, b);
    f64::from(diff.ratio())
}

/// Leading spaces and tabs of a line
#[inline]
pub(crate) fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// Indentation width in columns, a tab counting as four
#[inline]
pub(crate) fn indent_width(line: &str) -> usize {
    leading_whitespace(line)
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Line content without its terminator
#[inline]
pub(crate) fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Normalise line endings, strip the common indentation and surrounding
/// blank lines
pub(crate) fn normalize_fragment(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).len())
        .min()
        .unwrap_or(0);

    let dedented: Vec<&str> = text
        .lines()
        .map(|l| if l.trim().is_empty() { "" } else { &l[common..] })
        .collect();

    dedented
        .join("\n")
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

/// Prefix every non-blank line with `indent`, joining with `eol`
///
/// The first line is left alone when `skip_first` is set, for splices that
/// start after existing indentation.
pub(crate) fn reindent(text: &str, indent: &str, skip_first: bool, eol: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            if line.is_empty() || (i == 0 && skip_first) {
                line.to_string()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join(eol)
}

/// Dominant line terminator of a file
#[inline]
pub(crate) fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
