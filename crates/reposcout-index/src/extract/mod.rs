//! Per-language structural extractors.
//!
//! Each supported language has one unit type implementing [`Extractor`];
//! [`crate::languages::Lang::extractor`] is the dispatch table. Adding a
//! language means adding a variant there and a module here.

mod javascript;
mod python;

use tree_sitter::{Node, Parser, Tree};

pub use javascript::JavaScriptExtractor;
pub use python::PythonExtractor;

use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::metadata::MetadataRecord;

/// Extract a [`MetadataRecord`] from the full text of one source file.
///
/// Implementations are pure: no IO, no network, no index access.
pub trait Extractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IndexError::Parse`] when the source cannot be parsed and the
    /// language's policy is to report it.
    fn extract(&self, source: &str) -> Result<MetadataRecord>;
}

fn parse(source: &str, lang: Lang) -> Result<Tree> {
    let grammar = lang
        .grammar()
        .ok_or_else(|| IndexError::Parse(format!("no grammar for {}", lang.id())))?;

    let mut parser = Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| IndexError::Parse(format!("set_language failed: {e}")))?;

    parser
        .parse(source, None)
        .ok_or_else(|| IndexError::Parse(format!("{} parser returned no tree", lang.id())))
}

/// First syntax error in the tree as a 1-based `(line, column)`.
fn first_error(root: Node<'_>) -> Option<(usize, usize)> {
    if !root.has_error() {
        return None;
    }
    if root.is_error() || root.is_missing() {
        let pos = root.start_position();
        return Some((pos.row + 1, pos.column + 1));
    }
    named_and_anonymous_children(root).find_map(first_error)
}

fn named_and_anonymous_children(node: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    let count = u32::try_from(node.child_count()).unwrap_or(u32::MAX);
    (0..count).filter_map(move |i| node.child(i))
}

fn named_children(node: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    let count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
    (0..count).filter_map(move |i| node.named_child(i))
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn field_text<'s>(node: Node<'_>, field: &str, source: &'s str) -> Option<&'s str> {
    node.child_by_field_name(field).map(|n| text(n, source))
}

/// Drop a leading receiver binding (`self`, `cls`) from a parameter list.
fn strip_receiver(mut params: Vec<String>) -> Vec<String> {
    if params
        .first()
        .is_some_and(|p| p == "self" || p == "cls")
    {
        params.remove(0);
    }
    params
}

/// Parse an integer literal in decimal, hex, octal or binary notation.
fn parse_int_literal(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };
    i64::from_str_radix(digits, radix).ok()
}

/// Strip string prefix letters and matching quotes from a literal.
fn unquote(raw: &str) -> &str {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if body.len() >= 2 * quote.len()
            && let Some(inner) = body
                .strip_prefix(quote)
                .and_then(|b| b.strip_suffix(quote))
        {
            return inner;
        }
    }
    body
}
