//! Canonical text rendering of a [`MetadataRecord`].
//!
//! The layout is consumed by search clients and must stay stable:
//!
//! ```text
//! ##<file name>(<path key>)
//! ###func sigs:
//! name(a, b)
//! ###consts:
//! NAME=value
//! ###classes:
//! Class:
//! Class::method(a)
//! Class::field
//!
//! ```

use std::fmt::Write;

use crate::metadata::MetadataRecord;

pub const FUNCTIONS_MARKER: &str = "###func sigs:";
pub const CONSTANTS_MARKER: &str = "###consts:";
pub const CLASSES_MARKER: &str = "###classes:";
/// Written in place of an empty section.
pub const EMPTY_SECTION: &str = "<empty>";

/// Render the amalgamation of one file.
#[must_use]
pub fn render_amalgamation(file_name: &str, path_key: &str, record: &MetadataRecord) -> String {
    let mut out = format!("##{file_name}({path_key})\n");

    out.push_str(FUNCTIONS_MARKER);
    out.push('\n');
    if record.function_signatures.is_empty() {
        push_empty(&mut out);
    }
    for (name, params) in &record.function_signatures {
        let _ = writeln!(out, "{name}({})", params.join(", "));
    }

    out.push_str(CONSTANTS_MARKER);
    out.push('\n');
    if record.constants.is_empty() {
        push_empty(&mut out);
    }
    for (name, value) in &record.constants {
        let _ = writeln!(out, "{name}={value}");
    }

    out.push_str(CLASSES_MARKER);
    out.push('\n');
    if record.classes.is_empty() {
        push_empty(&mut out);
    }
    for (class, info) in &record.classes {
        let _ = writeln!(out, "{class}:");
        for (method, params) in &info.methods {
            let _ = writeln!(out, "{class}::{method}({})", params.join(", "));
        }
        for field in &info.fields {
            let _ = writeln!(out, "{class}::{field}");
        }
        out.push('\n');
    }

    out
}

fn push_empty(out: &mut String) {
    out.push_str(EMPTY_SECTION);
    out.push('\n');
}
