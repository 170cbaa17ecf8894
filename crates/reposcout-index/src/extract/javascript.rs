//! JavaScript metadata extraction.
//!
//! Failures never propagate: a file that does not parse is logged and
//! contributes an empty record.
//!
//! Function declarations are collected at any depth, nested ones included.
//! Constants are collected only from top-level (optionally exported)
//! declarations.

use indexmap::IndexMap;
use tree_sitter::Node;

use super::{
    Extractor, field_text, first_error, named_children, parse, parse_int_literal, text, unquote,
};
use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::metadata::{ClassInfo, ConstantValue, MetadataRecord, is_constant_name};

/// Name under which callback functions passed to calls are recorded.
const ANONYMOUS: &str = "anon";

#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptExtractor;

impl Extractor for JavaScriptExtractor {
    fn extract(&self, source: &str) -> Result<MetadataRecord> {
        match extract_record(source) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(error = %e, "javascript extraction failed, using empty metadata");
                Ok(MetadataRecord::default())
            }
        }
    }
}

fn extract_record(source: &str) -> Result<MetadataRecord> {
    let tree = parse(source, Lang::JavaScript)?;
    let root = tree.root_node();
    if let Some((line, column)) = first_error(root) {
        return Err(IndexError::Parse(format!(
            "javascript syntax error at line {line}, column {column}"
        )));
    }

    let mut record = MetadataRecord::default();
    walk(root, source, &mut record);
    Ok(record)
}

fn walk(node: Node<'_>, source: &str, record: &mut MetadataRecord) {
    for child in named_children(node) {
        match child.kind() {
            "class_declaration" | "class" => {
                record_class(child, source, &mut record.classes);
                continue;
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = field_text(child, "name", source) {
                    let params = function_params(child, source);
                    record.function_signatures.insert(name.to_string(), params);
                }
            }
            "variable_declarator" => record_declarator(child, source, record),
            "expression_statement" => {
                for expr in named_children(child) {
                    if expr.kind() == "call_expression" {
                        record_callbacks(expr, source, &mut record.function_signatures);
                    }
                }
            }
            _ => {}
        }
        walk(child, source, record);
    }
}

fn is_function_value(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

fn record_declarator(declarator: Node<'_>, source: &str, record: &mut MetadataRecord) {
    let Some(name_node) = declarator.child_by_field_name("name") else {
        return;
    };
    if name_node.kind() != "identifier" {
        return;
    }
    let name = text(name_node, source);
    let value = declarator.child_by_field_name("value");

    if let Some(value) = value
        && is_function_value(value)
    {
        record
            .function_signatures
            .insert(name.to_string(), function_params(value, source));
        return;
    }

    if is_constant_name(name) && at_module_scope(declarator) {
        let constant = value.map_or(ConstantValue::Unparsed, |v| constant_value(v, source));
        record.constants.insert(name.to_string(), constant);
    }
}

/// Whether a declarator belongs to a top-level `const`/`let`/`var`,
/// directly or through `export`.
fn at_module_scope(declarator: Node<'_>) -> bool {
    let Some(mut scope) = declarator.parent().and_then(|decl| decl.parent()) else {
        return false;
    };
    if scope.kind() == "export_statement" {
        let Some(parent) = scope.parent() else {
            return false;
        };
        scope = parent;
    }
    scope.kind() == "program"
}

fn record_callbacks(call: Node<'_>, source: &str, out: &mut IndexMap<String, Vec<String>>) {
    let Some(args) = call.child_by_field_name("arguments") else {
        return;
    };
    for arg in named_children(args).filter(|a| is_function_value(*a)) {
        out.insert(ANONYMOUS.to_string(), function_params(arg, source));
    }
}

/// Parameter names of a function-like node. A bare arrow parameter
/// (`x => x`) has no parameter list.
fn function_params(function: Node<'_>, source: &str) -> Vec<String> {
    if let Some(single) = function.child_by_field_name("parameter") {
        return vec![text(single, source).to_string()];
    }
    let Some(params) = function.child_by_field_name("parameters") else {
        return Vec::new();
    };

    named_children(params)
        .filter_map(|param| match param.kind() {
            "comment" => None,
            "assignment_pattern" => param
                .child_by_field_name("left")
                .map(|left| text(left, source).to_string()),
            // identifiers, `...rest` and destructuring patterns keep their source text
            _ => Some(text(param, source).to_string()),
        })
        .collect()
}

fn record_class(class: Node<'_>, source: &str, out: &mut IndexMap<String, ClassInfo>) {
    let Some(name) = field_text(class, "name", source) else {
        return;
    };
    let info = out.entry(name.to_string()).or_default();
    let Some(body) = class.child_by_field_name("body") else {
        return;
    };

    for member in named_children(body) {
        match member.kind() {
            "method_definition" => {
                if let Some(method) = field_text(member, "name", source) {
                    info.methods
                        .insert(method.to_string(), function_params(member, source));
                }
                if let Some(method_body) = member.child_by_field_name("body") {
                    collect_this_fields(method_body, source, info);
                }
            }
            "field_definition" => {
                if let Some(field) = field_text(member, "property", source) {
                    info.add_field(field);
                }
            }
            _ => {}
        }
    }
}

/// `this.<name> = ...` targets inside a method body, outside nested classes.
fn collect_this_fields(node: Node<'_>, source: &str, class: &mut ClassInfo) {
    for child in named_children(node) {
        match child.kind() {
            "class_declaration" | "class" => continue,
            "assignment_expression" => {
                if let Some(left) = child.child_by_field_name("left")
                    && left.kind() == "member_expression"
                    && left
                        .child_by_field_name("object")
                        .is_some_and(|o| o.kind() == "this")
                    && let Some(field) = field_text(left, "property", source)
                {
                    class.add_field(field);
                }
            }
            _ => {}
        }
        collect_this_fields(child, source, class);
    }
}

fn constant_value(node: Node<'_>, source: &str) -> ConstantValue {
    match node.kind() {
        "number" => number_value(text(node, source)),
        "string" => ConstantValue::String(unquote(text(node, source)).to_string()),
        "template_string" => {
            if named_children(node).any(|c| c.kind() == "template_substitution") {
                ConstantValue::Unparsed
            } else {
                ConstantValue::String(unquote(text(node, source)).to_string())
            }
        }
        "true" => ConstantValue::Boolean(true),
        "false" => ConstantValue::Boolean(false),
        "null" => ConstantValue::Null,
        "member_expression" if is_env_access(node, source) => {
            ConstantValue::EnvDefault("undefined".to_string())
        }
        "binary_expression" => env_default(node, source).unwrap_or(ConstantValue::Unparsed),
        "parenthesized_expression" => named_children(node)
            .next()
            .map_or(ConstantValue::Unparsed, |inner| constant_value(inner, source)),
        "unary_expression" if field_text(node, "operator", source) == Some("-") => {
            match node.child_by_field_name("argument").map(|a| constant_value(a, source)) {
                Some(ConstantValue::Integer(v)) => ConstantValue::Integer(-v),
                Some(ConstantValue::Float(v)) => ConstantValue::Float(-v),
                _ => ConstantValue::Unparsed,
            }
        }
        _ => ConstantValue::Unparsed,
    }
}

fn number_value(raw: &str) -> ConstantValue {
    if let Some(v) = parse_int_literal(raw) {
        return ConstantValue::Integer(v);
    }
    raw.replace('_', "")
        .parse::<f64>()
        .map_or(ConstantValue::Unparsed, ConstantValue::Float)
}

/// `process.env.NAME` or `process.env["NAME"]`.
fn is_env_access(node: Node<'_>, source: &str) -> bool {
    matches!(node.kind(), "member_expression" | "subscript_expression")
        && node
            .child_by_field_name("object")
            .is_some_and(|o| text(o, source) == "process.env")
}

/// `process.env.NAME || fallback` and `process.env.NAME ?? fallback`.
fn env_default(node: Node<'_>, source: &str) -> Option<ConstantValue> {
    let operator = field_text(node, "operator", source)?;
    if operator != "||" && operator != "??" {
        return None;
    }
    let left = node.child_by_field_name("left")?;
    if !is_env_access(left, source) {
        return None;
    }
    let rendered = match node.child_by_field_name("right").map(|r| constant_value(r, source)) {
        Some(ConstantValue::Unparsed | ConstantValue::EnvDefault(_)) | None => {
            "undefined".to_string()
        }
        Some(v) => v.to_string(),
    };
    Some(ConstantValue::EnvDefault(rendered))
}
