//! Patch extraction from model output
//!
//! Model responses mix prose and fenced code. Only fenced content is ever
//! returned, so explanatory text can never end up in a source file.

use gte_syntax::Language;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced block: optional info string, body, closing fence on its own line
const FENCED_BLOCK_PATTERN: &str = r"(?s)```[ \t]*([\w+#.-]*)[^\n]*\n(.*?)\r?\n[ \t]*```";

/// Compiled once; a build failure is logged here and extraction yields nothing
static FENCED_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(FENCED_BLOCK_PATTERN) {
    Ok(re) => Some(re),
    Err(err) => {
        tracing::error!(error = %err, "fenced block pattern failed to compile");
        None
    }
});

/// Return the first fenced block tagged with `language`, else the first
/// fenced block of any (or no) language
///
/// Tags are compared through language aliases, so a `py` block satisfies a
/// `python` hint.
#[must_use]
pub fn extract_code_block(text: &str, language: Option<&str>) -> Option<String> {
    let re = FENCED_BLOCK.as_ref()?;
    let blocks: Vec<(&str, &str)> = re
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect();

    if let Some(hint) = language.map(str::trim).filter(|h| !h.is_empty()) {
        let wanted = Language::from_name(hint).map(|l| l.name());
        let tagged = blocks.iter().find(|(tag, _)| {
            tag.eq_ignore_ascii_case(hint)
                || (wanted.is_some() && Language::from_name(tag).map(|l| l.name()) == wanted)
        });
        if let Some((_, body)) = tagged {
            return Some((*body).to_string());
        }
    }

    blocks.first().map(|(_, body)| (*body).to_string())
}
