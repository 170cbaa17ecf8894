//! Structural metadata extracted from a single source file.
//!
//! All maps preserve insertion order: the rendered amalgamation lists
//! entries in the order they appear in the source.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Value recorded for a module-level constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    /// Environment lookup with a fallback; holds the rendered default.
    EnvDefault(String),
    /// The right-hand side is not a literal the extractor understands.
    Unparsed,
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::EnvDefault(d) => write!(f, "default: {d}"),
            Self::Unparsed => f.write_str("<unparsed expression>"),
        }
    }
}

/// Methods and attribute names of one class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassInfo {
    pub methods: IndexMap<String, Vec<String>>,
    pub fields: Vec<String>,
}

impl ClassInfo {
    /// Record a field name once, keeping first-seen order.
    pub fn add_field(&mut self, name: &str) {
        if !self.fields.iter().any(|f| f == name) {
            self.fields.push(name.to_string());
        }
    }
}

/// Canonical metadata of one file. Produced fresh per file, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub function_signatures: IndexMap<String, Vec<String>>,
    pub constants: IndexMap<String, ConstantValue>,
    pub classes: IndexMap<String, ClassInfo>,
}

impl MetadataRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.function_signatures.is_empty() && self.constants.is_empty() && self.classes.is_empty()
    }
}

/// Upper-case identifier test: at least one upper-case letter, no lower-case.
#[must_use]
pub fn is_constant_name(name: &str) -> bool {
    name.chars().any(char::is_uppercase) && !name.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_names() {
        assert!(is_constant_name("MAX"));
        assert!(is_constant_name("MAX_RETRIES_2"));
        assert!(is_constant_name("_PRIVATE"));
        assert!(!is_constant_name("Max"));
        assert!(!is_constant_name("max"));
        assert!(!is_constant_name("_"));
        assert!(!is_constant_name("__42"));
    }

    #[test]
    fn constant_value_display() {
        assert_eq!(ConstantValue::Integer(10).to_string(), "10");
        assert_eq!(ConstantValue::Float(2.5).to_string(), "2.5");
        assert_eq!(ConstantValue::Float(3.0).to_string(), "3.0");
        assert_eq!(ConstantValue::String("v1".into()).to_string(), "v1");
        assert_eq!(ConstantValue::Boolean(true).to_string(), "true");
        assert_eq!(ConstantValue::Null.to_string(), "null");
        assert_eq!(
            ConstantValue::EnvDefault("8080".into()).to_string(),
            "default: 8080"
        );
        assert_eq!(ConstantValue::Unparsed.to_string(), "<unparsed expression>");
    }

    #[test]
    fn fields_deduplicated_in_order() {
        let mut class = ClassInfo::default();
        class.add_field("name");
        class.add_field("age");
        class.add_field("name");
        assert_eq!(class.fields, vec!["name", "age"]);
    }

    #[test]
    fn default_record_is_empty() {
        assert!(MetadataRecord::default().is_empty());
    }
}
