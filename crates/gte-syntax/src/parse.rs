//! Tree-sitter parsing and structure queries
//!
//! Everything here is pure: callers hand in source text and get back owned
//! results, so a parsed [`Tree`] never has to outlive the call site.

use crate::error::SyntaxError;
use crate::language::Language;
use std::ops::Range;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds that wrap a declaration without changing what it declares
const WRAPPER_KINDS: &[&str] = &["decorated_definition", "export_statement"];

/// Longest snippet quoted in a syntax error message
const SNIPPET_LEN: usize = 24;

/// A named declaration found in a parsed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declared name (function, class, struct...)
    pub name: String,
    /// Tree-sitter node kind
    pub kind: &'static str,
    /// Byte range of the declaration node
    pub range: Range<usize>,
    /// Byte range of an enclosing decorator or export wrapper, if any
    pub outer_range: Option<Range<usize>>,
    /// 0-based row of the first byte
    pub start_row: usize,
}

impl Declaration {
    /// Source text of the declaration node
    #[inline]
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.range.clone()).unwrap_or_default()
    }

    /// Range to replace when the replacement carries its own wrapper
    #[inline]
    #[must_use]
    pub fn wrapped_range(&self) -> Range<usize> {
        self.outer_range.clone().unwrap_or_else(|| self.range.clone())
    }
}

/// Shape of a fragment that parsed as exactly one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneDeclaration {
    /// Declared name
    pub name: String,
    /// Tree-sitter node kind of the inner declaration
    pub kind: &'static str,
    /// Whether the fragment includes a decorator or export wrapper
    pub wrapped: bool,
}

/// Parse source text with the grammar for `language`
///
/// # Errors
/// Returns error if the grammar cannot be loaded or the parser gives up
pub fn parse(source: &str, language: Language) -> Result<Tree, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| SyntaxError::ParserInit {
            language,
            message: e.to_string(),
        })?;

    parser.parse(source, None).ok_or(SyntaxError::ParseFailed)
}

/// Check that `source` parses without error or missing nodes
///
/// # Errors
/// Returns [`SyntaxError::Invalid`] pointing at the first offending node
pub fn check_syntax(source: &str, language: Language) -> Result<(), SyntaxError> {
    let tree = parse(source, language)?;
    match first_error(tree.root_node(), source) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Check a file's content, picking the grammar from its path
///
/// Files without a known grammar pass unchecked.
///
/// # Errors
/// Returns [`SyntaxError::Invalid`] if a known grammar rejects the content
pub fn check_path_syntax(path: &std::path::Path, source: &str) -> Result<(), SyntaxError> {
    match Language::from_path(path) {
        Some(language) => check_syntax(source, language),
        None => Ok(()),
    }
}

fn first_error(node: Node<'_>, source: &str) -> Option<SyntaxError> {
    if !node.has_error() {
        return None;
    }
    if node.is_missing() {
        return Some(SyntaxError::invalid_at(
            node.start_position(),
            format!("missing `{}`", node.kind()),
        ));
    }
    if node.is_error() {
        let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
        let snippet: String = text
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(SNIPPET_LEN)
            .collect();
        return Some(SyntaxError::invalid_at(
            node.start_position(),
            format!("unexpected `{}`", snippet.trim()),
        ));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = first_error(child, source) {
            return Some(err);
        }
    }

    Some(SyntaxError::invalid_at(
        node.start_position(),
        format!("invalid {}", node.kind()),
    ))
}

/// Collect every named declaration in the tree, outermost first
#[must_use]
pub fn declarations(tree: &Tree, source: &str, language: Language) -> Vec<Declaration> {
    let mut out = Vec::new();
    collect_declarations(tree.root_node(), source, language.declaration_kinds(), &mut out);
    out
}

fn collect_declarations(
    node: Node<'_>,
    source: &str,
    kinds: &[&str],
    out: &mut Vec<Declaration>,
) {
    if kinds.contains(&node.kind()) {
        if let Some(name) = declared_name(node, source) {
            let outer_range = node
                .parent()
                .filter(|p| WRAPPER_KINDS.contains(&p.kind()))
                .map(|p| p.byte_range());
            out.push(Declaration {
                name,
                kind: node.kind(),
                range: node.byte_range(),
                outer_range,
                start_row: node.start_position().row,
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_declarations(child, source, kinds, out);
    }
}

fn declared_name(node: Node<'_>, source: &str) -> Option<String> {
    let name = node
        .child_by_field_name("name")?
        .utf8_text(source.as_bytes())
        .ok()?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Whether a code fragment contains any comment
///
/// Uses comment nodes from the grammar; falls back to a line-marker scan if
/// the fragment cannot be parsed at all.
#[must_use]
pub fn contains_comment(code: &str, language: Language) -> bool {
    match parse(code, language) {
        Ok(tree) => has_comment_node(tree.root_node()),
        Err(_) => {
            let marker = language.line_comment_marker();
            code.lines().any(|line| line.contains(marker))
                || (language != Language::Python && code.contains("/*"))
        }
    }
}

fn has_comment_node(node: Node<'_>) -> bool {
    if node.kind().contains("comment") {
        return true;
    }
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(has_comment_node);
    found
}

/// Parse a fragment and return its declaration if it is exactly one
///
/// Methods of TypeScript/JavaScript classes do not parse at top level, so
/// those are retried inside a synthetic class body.
#[must_use]
pub fn standalone_declaration(fragment: &str, language: Language) -> Option<StandaloneDeclaration> {
    if let Some(found) = single_top_level(fragment, language) {
        return Some(found);
    }

    if matches!(
        language,
        Language::TypeScript | Language::Tsx | Language::JavaScript
    ) {
        let wrapped = format!("class GteFragmentHost {{\n{fragment}\n}}\n");
        let tree = parse(&wrapped, language).ok()?;
        let root = tree.root_node();
        if root.has_error() {
            return None;
        }
        let class = only_named_child(root)?;
        let body = class.child_by_field_name("body")?;
        let method = only_named_child(body)?;
        if method.kind() != "method_definition" {
            return None;
        }
        return Some(StandaloneDeclaration {
            name: declared_name(method, &wrapped)?,
            kind: method.kind(),
            wrapped: false,
        });
    }

    None
}

fn single_top_level(fragment: &str, language: Language) -> Option<StandaloneDeclaration> {
    let tree = parse(fragment, language).ok()?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let node = only_named_child(root)?;
    let (inner, wrapped) = if WRAPPER_KINDS.contains(&node.kind()) {
        let inner = node
            .child_by_field_name("definition")
            .or_else(|| node.child_by_field_name("declaration"))?;
        (inner, true)
    } else {
        (node, false)
    };

    if !language.declaration_kinds().contains(&inner.kind()) {
        return None;
    }

    Some(StandaloneDeclaration {
        name: declared_name(inner, fragment)?,
        kind: inner.kind(),
        wrapped,
    })
}

fn only_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let mut children = node
        .named_children(&mut cursor)
        .filter(|c| !c.kind().contains("comment"));
    let first = children.next()?;
    if children.next().is_some() {
        return None;
    }
    Some(first)
}
