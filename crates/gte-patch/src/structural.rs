//! Structural substitution
//!
//! Resolves an anchor declaration in the parsed target and splices the
//! proposed declaration over its byte range. The tree is never mutated: the
//! substitution is an edit list applied in one pass over the source text.

use crate::engine::PatchContext;
use crate::text::{leading_whitespace, line_ending, reindent, similarity};
use gte_syntax::{check_syntax, contains_comment, declarations, parse, standalone_declaration};
use gte_syntax::{Declaration, Language};
use std::ops::Range;

/// Replacement of one byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextEdit {
    pub(crate) range: Range<usize>,
    pub(crate) replacement: String,
}

/// Apply non-overlapping edits to `source`
pub(crate) fn apply_edits(source: &str, mut edits: Vec<TextEdit>) -> Option<String> {
    edits.sort_by_key(|e| e.range.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in &edits {
        if edit.range.start < cursor {
            return None;
        }
        out.push_str(source.get(cursor..edit.range.start)?);
        out.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    out.push_str(source.get(cursor..)?);
    Some(out)
}

/// Why the structural stage handed over to the textual one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Skip {
    /// Target does not parse cleanly
    UnparsableTarget,
    /// Proposed code carries comments the tree would drop
    ProposedHasComments,
    /// No declaration selected
    NoAnchor,
    /// Proposed code is not exactly one declaration
    NotADeclaration,
    /// Spliced result failed to parse
    BrokenResult,
}

impl Skip {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Skip::UnparsableTarget => "target does not parse",
            Skip::ProposedHasComments => "proposed code contains comments",
            Skip::NoAnchor => "no anchor",
            Skip::NotADeclaration => "proposed code is not one declaration",
            Skip::BrokenResult => "substitution does not parse",
        }
    }
}

/// Attempt structural substitution; `proposed` must already be normalised
pub(crate) fn substitute(
    source: &str,
    proposed: &str,
    context: &PatchContext,
    language: Language,
    symbol_threshold: f64,
) -> Result<(String, String), Skip> {
    let tree = parse(source, language).map_err(|_| Skip::UnparsableTarget)?;
    if tree.root_node().has_error() {
        return Err(Skip::UnparsableTarget);
    }
    if contains_comment(proposed, language) {
        return Err(Skip::ProposedHasComments);
    }

    let decls = declarations(&tree, source, language);
    let anchor = resolve_anchor(&decls, source, context, symbol_threshold).ok_or(Skip::NoAnchor)?;
    let fragment = standalone_declaration(proposed, language).ok_or(Skip::NotADeclaration)?;

    let range = if fragment.wrapped {
        anchor.wrapped_range()
    } else {
        anchor.range.clone()
    };
    let line_start = source
        .get(..range.start)
        .and_then(|before| before.rfind('\n'))
        .map_or(0, |i| i + 1);
    let indent = leading_whitespace(source.get(line_start..range.start).unwrap_or_default());

    let edit = TextEdit {
        range,
        replacement: reindent(proposed, indent, true, line_ending(source)),
    };
    let out = apply_edits(source, vec![edit]).ok_or(Skip::BrokenResult)?;
    check_syntax(&out, language).map_err(|_| Skip::BrokenResult)?;

    Ok((out, anchor.name.clone()))
}

/// Pick the declaration a patch targets
///
/// An exact, unique name match wins. Otherwise the declaration most similar
/// to the reference snippet, if strictly above `threshold`.
pub(crate) fn resolve_anchor<'a>(
    decls: &'a [Declaration],
    source: &str,
    context: &PatchContext,
    threshold: f64,
) -> Option<&'a Declaration> {
    if let Some(symbol) = context.target_symbol.as_deref() {
        let mut named = decls.iter().filter(|d| d.name == symbol);
        if let (Some(only), None) = (named.next(), named.next()) {
            return Some(only);
        }
    }

    let snippet = context.reference_snippet.as_deref()?;
    decls
        .iter()
        .map(|d| (d, similarity(snippet, d.text(source))))
        .filter(|(_, score)| *score > threshold)
        .fold(None, |best: Option<(&Declaration, f64)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(d, _)| d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "def add(a, b):\n    return a + b\n\n\ndef sub(a, b):\n    return a - b\n";

    #[test]
    fn replaces_only_the_anchor() {
        let ctx = PatchContext::symbol("sub");
        let (out, anchor) = substitute(
            SOURCE,
            "def sub(a, b):\n    return b - a",
            &ctx,
            Language::Python,
            0.75,
        )
        .unwrap();
        assert_eq!(anchor, "sub");
        assert_eq!(
            out,
            "def add(a, b):\n    return a + b\n\n\ndef sub(a, b):\n    return b - a\n"
        );
    }

    #[test]
    fn reindents_nested_method() {
        let source = "class Calc:\n    def total(self):\n        return 0\n";
        let ctx = PatchContext::symbol("total");
        let (out, _) = substitute(
            source,
            "def total(self):\n    return 42",
            &ctx,
            Language::Python,
            0.75,
        )
        .unwrap();
        assert_eq!(out, "class Calc:\n    def total(self):\n        return 42\n");
    }

    #[test]
    fn comments_force_fallback() {
        let ctx = PatchContext::symbol("add");
        let err = substitute(
            SOURCE,
            "def add(a, b):\n    # keep me\n    return a + b",
            &ctx,
            Language::Python,
            0.75,
        )
        .unwrap_err();
        assert_eq!(err, Skip::ProposedHasComments);
    }

    #[test]
    fn ambiguous_name_without_snippet_has_no_anchor() {
        let source = "class A:\n    def run(self):\n        pass\n\nclass B:\n    def run(self):\n        pass\n";
        let ctx = PatchContext::symbol("run");
        let err = substitute(
            source,
            "def run(self):\n    return 1",
            &ctx,
            Language::Python,
            0.75,
        )
        .unwrap_err();
        assert_eq!(err, Skip::NoAnchor);
    }

    #[test]
    fn snippet_selects_similar_declaration() {
        let source = "def calculate_old():\n    x = 1\n    y = 2\n    return x + y\n\ndef other():\n    return None\n";
        let tree = parse(source, Language::Python).unwrap();
        let decls = declarations(&tree, source, Language::Python);
        let ctx = PatchContext::default()
            .with_snippet("def calculate_old():\n    x = 1\n    y = 2\n    return x + y");
        let anchor = resolve_anchor(&decls, source, &ctx, 0.75).unwrap();
        assert_eq!(anchor.name, "calculate_old");
    }

    #[test]
    fn rust_function_in_impl() {
        let source = "impl Counter {\n    pub fn get(&self) -> u32 {\n        self.value\n    }\n}\n";
        let ctx = PatchContext::symbol("get");
        let (out, _) = substitute(
            source,
            "pub fn get(&self) -> u32 {\n    self.value + 1\n}",
            &ctx,
            Language::Rust,
            0.75,
        )
        .unwrap();
        assert_eq!(
            out,
            "impl Counter {\n    pub fn get(&self) -> u32 {\n        self.value + 1\n    }\n}\n"
        );
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let edits = vec![
            TextEdit { range: 0..4, replacement: "x".into() },
            TextEdit { range: 2..6, replacement: "y".into() },
        ];
        assert_eq!(apply_edits("abcdefgh", edits), None);
    }
}
