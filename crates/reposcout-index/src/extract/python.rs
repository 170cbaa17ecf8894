//! Python metadata extraction. Syntax errors are reported to the caller.

use indexmap::IndexMap;
use tree_sitter::Node;

use super::{
    Extractor, field_text, first_error, named_children, parse, parse_int_literal, strip_receiver,
    text, unquote,
};
use crate::error::{IndexError, Result};
use crate::languages::Lang;
use crate::metadata::{ClassInfo, ConstantValue, MetadataRecord, is_constant_name};

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn extract(&self, source: &str) -> Result<MetadataRecord> {
        let tree = parse(source, Lang::Python)?;
        let root = tree.root_node();

        if let Some((line, column)) = first_error(root) {
            return Err(IndexError::Parse(format!(
                "python syntax error at line {line}, column {column}"
            )));
        }

        let mut record = MetadataRecord::default();
        collect_functions(root, source, &mut record.function_signatures);
        collect_constants(root, source, &mut record.constants);
        collect_classes(root, source, &mut record.classes);
        Ok(record)
    }
}

/// Module-scope functions, including those under `if`/`try`/`with` blocks.
/// Function and class bodies are not entered.
fn collect_functions(node: Node<'_>, source: &str, out: &mut IndexMap<String, Vec<String>>) {
    for child in named_children(node) {
        match child.kind() {
            "function_definition" => record_function(child, source, out),
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition")
                    && def.kind() == "function_definition"
                {
                    record_function(def, source, out);
                }
            }
            "class_definition" => {}
            _ => collect_functions(child, source, out),
        }
    }
}

fn record_function(def: Node<'_>, source: &str, out: &mut IndexMap<String, Vec<String>>) {
    let Some(name) = field_text(def, "name", source) else {
        return;
    };
    let params = def
        .child_by_field_name("parameters")
        .map(|p| parameter_names(p, source))
        .unwrap_or_default();
    out.insert(name.to_string(), strip_receiver(params));
}

/// Positional parameter names in order. Everything after `*`/`*args` is
/// keyword-only and `**kwargs` is dropped.
fn parameter_names(params: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for param in named_children(params) {
        match param.kind() {
            "identifier" => names.push(text(param, source).to_string()),
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = field_text(param, "name", source) {
                    names.push(name.to_string());
                }
            }
            "typed_parameter" => match named_children(param).next() {
                Some(inner) if inner.kind() == "identifier" => {
                    names.push(text(inner, source).to_string());
                }
                Some(inner) if inner.kind() == "list_splat_pattern" => break,
                _ => {}
            },
            "list_splat_pattern" | "keyword_separator" => break,
            _ => {}
        }
    }
    names
}

fn collect_constants(node: Node<'_>, source: &str, out: &mut IndexMap<String, ConstantValue>) {
    for child in named_children(node) {
        match child.kind() {
            "function_definition" | "class_definition" | "decorated_definition" => {}
            "expression_statement" => {
                for expr in named_children(child) {
                    if expr.kind() == "assignment" {
                        record_assignment(expr, source, out);
                    }
                }
            }
            _ => collect_constants(child, source, out),
        }
    }
}

/// Handles chained targets: `A = B = 1` assigns both names.
fn record_assignment(assign: Node<'_>, source: &str, out: &mut IndexMap<String, ConstantValue>) {
    let mut targets = Vec::new();
    let mut current = assign;
    let value = loop {
        if let Some(left) = current.child_by_field_name("left")
            && left.kind() == "identifier"
        {
            targets.push(text(left, source));
        }
        match current.child_by_field_name("right") {
            Some(right) if right.kind() == "assignment" => current = right,
            other => break other,
        }
    };

    for name in targets.into_iter().filter(|n| is_constant_name(n)) {
        let constant = value.map_or(ConstantValue::Unparsed, |v| constant_value(v, source));
        out.insert(name.to_string(), constant);
    }
}

fn constant_value(node: Node<'_>, source: &str) -> ConstantValue {
    match node.kind() {
        "integer" => parse_int_literal(text(node, source)).map_or(ConstantValue::Unparsed, ConstantValue::Integer),
        "float" => text(node, source)
            .replace('_', "")
            .parse::<f64>()
            .map_or(ConstantValue::Unparsed, ConstantValue::Float),
        "string" => {
            if named_children(node).any(|c| c.kind() == "interpolation") {
                ConstantValue::Unparsed
            } else {
                ConstantValue::String(unquote(text(node, source)).to_string())
            }
        }
        "true" => ConstantValue::Boolean(true),
        "false" => ConstantValue::Boolean(false),
        "none" => ConstantValue::Null,
        "call" => env_default(node, source).unwrap_or(ConstantValue::Unparsed),
        "parenthesized_expression" => named_children(node)
            .next()
            .map_or(ConstantValue::Unparsed, |inner| constant_value(inner, source)),
        "unary_operator" if field_text(node, "operator", source) == Some("-") => {
            match node.child_by_field_name("argument").map(|a| constant_value(a, source)) {
                Some(ConstantValue::Integer(v)) => ConstantValue::Integer(-v),
                Some(ConstantValue::Float(v)) => ConstantValue::Float(-v),
                _ => ConstantValue::Unparsed,
            }
        }
        _ => ConstantValue::Unparsed,
    }
}

/// `os.environ.get(key, default)` or `os.getenv(key, default)`.
fn env_default(call: Node<'_>, source: &str) -> Option<ConstantValue> {
    let function = call.child_by_field_name("function")?;
    let callee = text(function, source);
    let is_env_lookup = callee == "getenv"
        || callee.ends_with(".getenv")
        || callee == "environ.get"
        || callee.ends_with(".environ.get");
    if !is_env_lookup {
        return None;
    }

    let args = call.child_by_field_name("arguments")?;
    let default = named_children(args)
        .filter(|a| a.kind() != "keyword_argument" && a.kind() != "comment")
        .nth(1)
        .map(|a| constant_value(a, source));

    let rendered = match default {
        Some(ConstantValue::Null | ConstantValue::Unparsed) | None => "None".to_string(),
        Some(ConstantValue::Boolean(true)) => "True".to_string(),
        Some(ConstantValue::Boolean(false)) => "False".to_string(),
        Some(v) => v.to_string(),
    };
    Some(ConstantValue::EnvDefault(rendered))
}

/// Every class in the file, nested ones under their own name.
fn collect_classes(node: Node<'_>, source: &str, out: &mut IndexMap<String, ClassInfo>) {
    for child in named_children(node) {
        if child.kind() == "class_definition"
            && let Some(name) = field_text(child, "name", source)
        {
            let info = out.entry(name.to_string()).or_default();
            if let Some(body) = child.child_by_field_name("body") {
                collect_members(body, source, info);
            }
        }
        collect_classes(child, source, out);
    }
}

fn collect_members(body: Node<'_>, source: &str, class: &mut ClassInfo) {
    for item in named_children(body) {
        let method = match item.kind() {
            "function_definition" => Some(item),
            "decorated_definition" => item
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition"),
            _ => None,
        };
        let Some(method) = method else {
            continue;
        };

        if let Some(name) = field_text(method, "name", source) {
            let params = method
                .child_by_field_name("parameters")
                .map(|p| parameter_names(p, source))
                .unwrap_or_default();
            class.methods.insert(name.to_string(), strip_receiver(params));
        }
        if let Some(method_body) = method.child_by_field_name("body") {
            collect_self_fields(method_body, source, class);
        }
    }
}

/// `self.<name> = ...` targets anywhere in a method body, outside nested classes.
fn collect_self_fields(node: Node<'_>, source: &str, class: &mut ClassInfo) {
    for child in named_children(node) {
        match child.kind() {
            "class_definition" => {}
            "assignment" => {
                if let Some(left) = child.child_by_field_name("left") {
                    for target in assignment_targets(left) {
                        if let Some(field) = self_attribute(target, source) {
                            class.add_field(field);
                        }
                    }
                }
                collect_self_fields(child, source, class);
            }
            _ => collect_self_fields(child, source, class),
        }
    }
}

fn assignment_targets(left: Node<'_>) -> Vec<Node<'_>> {
    match left.kind() {
        "pattern_list" | "tuple_pattern" => named_children(left).collect(),
        _ => vec![left],
    }
}

fn self_attribute<'s>(target: Node<'_>, source: &'s str) -> Option<&'s str> {
    if target.kind() != "attribute" {
        return None;
    }
    let object = target.child_by_field_name("object")?;
    if object.kind() != "identifier" || text(object, source) != "self" {
        return None;
    }
    field_text(target, "attribute", source)
}
