//! A small schema-driven validator for the option maps accepted by program
//! instruction builders: each builder declares an ordered list of fields
//! (name, kind, required?, default?) and this crate checks a caller-supplied
//! map against it, returning a normalized map or a field-scoped error.

use keel_pubkey::Address;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i128),
    Bool(bool),
    Str(String),
    Key(Address),
    List(Vec<OptionValue>),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Integer(_) => "integer",
            OptionValue::Bool(_) => "bool",
            OptionValue::Str(_) => "string",
            OptionValue::Key(_) => "key",
            OptionValue::List(_) => "list",
        }
    }
}

/// The shape a field's value must take.
#[derive(Clone)]
pub enum OptionKind {
    /// Any integer in `min..=max`.
    IntegerRange { min: i128, max: i128 },
    NonNegativeInteger,
    PositiveInteger,
    /// Alias of `IntegerRange` kept distinct for schema readability.
    BoundedIntegerRange { min: i128, max: i128 },
    Str,
    Bool,
    ListOfKey,
    Key,
    /// Value must be one of a fixed set of strings.
    InSet(Vec<String>),
    Custom(fn(&OptionValue) -> bool),
}

#[derive(Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    pub kind: OptionKind,
    pub required: bool,
    pub default: Option<OptionValue>,
    pub doc: &'static str,
}

impl FieldSchema {
    pub fn new(name: &'static str, kind: OptionKind, doc: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            doc,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: OptionValue) -> Self {
        self.default = Some(default);
        self
    }
}

pub type Schema = &'static [FieldSchema];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    UnknownField(String),
    MissingRequired(String),
    InvalidSchema(String, String),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SchemaError::UnknownField(name) => write!(f, "unknown option field `{name}`"),
            SchemaError::MissingRequired(name) => {
                write!(f, "missing required option field `{name}`")
            }
            SchemaError::InvalidSchema(field, reason) => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
        }
    }
}
impl std::error::Error for SchemaError {}

fn kind_accepts(kind: &OptionKind, value: &OptionValue) -> Result<(), String> {
    match (kind, value) {
        (OptionKind::IntegerRange { min, max }, OptionValue::Integer(n))
        | (OptionKind::BoundedIntegerRange { min, max }, OptionValue::Integer(n)) => {
            if n < min || n > max {
                Err(format!("expected an integer in {min}..={max}, got {n}"))
            } else {
                Ok(())
            }
        }
        (OptionKind::NonNegativeInteger, OptionValue::Integer(n)) => {
            if *n < 0 {
                Err(format!("expected a non-negative integer, got {n}"))
            } else {
                Ok(())
            }
        }
        (OptionKind::PositiveInteger, OptionValue::Integer(n)) => {
            if *n <= 0 {
                Err(format!("expected a positive integer, got {n}"))
            } else {
                Ok(())
            }
        }
        (OptionKind::Str, OptionValue::Str(_)) => Ok(()),
        (OptionKind::Bool, OptionValue::Bool(_)) => Ok(()),
        (OptionKind::Key, OptionValue::Key(_)) => Ok(()),
        (OptionKind::ListOfKey, OptionValue::List(items)) => {
            if items.iter().all(|item| matches!(item, OptionValue::Key(_))) {
                Ok(())
            } else {
                Err("expected a list of keys".to_string())
            }
        }
        (OptionKind::InSet(set), OptionValue::Str(s)) => {
            if set.iter().any(|candidate| candidate == s) {
                Ok(())
            } else {
                Err(format!("expected one of {set:?}, got {s:?}"))
            }
        }
        (OptionKind::Custom(pred), value) => {
            if pred(value) {
                Ok(())
            } else {
                Err("value failed custom validation".to_string())
            }
        }
        (kind, value) => Err(format!(
            "expected a value matching {kind:?}, got a {}",
            value.type_name()
        )),
    }
}

impl std::fmt::Debug for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            OptionKind::IntegerRange { min, max } => write!(f, "IntegerRange({min}..={max})"),
            OptionKind::BoundedIntegerRange { min, max } => {
                write!(f, "BoundedIntegerRange({min}..={max})")
            }
            OptionKind::NonNegativeInteger => f.write_str("NonNegativeInteger"),
            OptionKind::PositiveInteger => f.write_str("PositiveInteger"),
            OptionKind::Str => f.write_str("Str"),
            OptionKind::Bool => f.write_str("Bool"),
            OptionKind::ListOfKey => f.write_str("ListOfKey"),
            OptionKind::Key => f.write_str("Key"),
            OptionKind::InSet(set) => write!(f, "InSet({set:?})"),
            OptionKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Validates `input` against `schema`: unknown fields and missing required
/// fields are rejected, defaults are applied for absent optional fields, and
/// every present value is checked against its declared kind.
pub fn validate(
    schema: Schema,
    mut input: BTreeMap<String, OptionValue>,
) -> Result<BTreeMap<String, OptionValue>, SchemaError> {
    for key in input.keys() {
        if !schema.iter().any(|field| field.name == key) {
            return Err(SchemaError::UnknownField(key.clone()));
        }
    }

    let mut normalized = BTreeMap::new();
    for field in schema {
        match input.remove(field.name) {
            Some(value) => {
                kind_accepts(&field.kind, &value)
                    .map_err(|reason| SchemaError::InvalidSchema(field.name.to_string(), reason))?;
                normalized.insert(field.name.to_string(), value);
            }
            None => {
                if field.required {
                    return Err(SchemaError::MissingRequired(field.name.to_string()));
                }
                if let Some(default) = field.default.clone() {
                    normalized.insert(field.name.to_string(), default);
                }
            }
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: Schema = &[
        FieldSchema {
            name: "decimals",
            kind: OptionKind::IntegerRange { min: 0, max: 255 },
            required: true,
            default: None,
            doc: "mint decimals",
        },
        FieldSchema {
            name: "freeze_authority",
            kind: OptionKind::Key,
            required: false,
            default: None,
            doc: "optional freeze authority",
        },
    ];

    #[test]
    fn rejects_unknown_field() {
        let mut input = BTreeMap::new();
        input.insert("decimals".to_string(), OptionValue::Integer(6));
        input.insert("bogus".to_string(), OptionValue::Bool(true));
        assert_eq!(
            validate(SCHEMA, input),
            Err(SchemaError::UnknownField("bogus".to_string()))
        );
    }

    #[test]
    fn rejects_missing_required() {
        assert_eq!(
            validate(SCHEMA, BTreeMap::new()),
            Err(SchemaError::MissingRequired("decimals".to_string()))
        );
    }

    #[test]
    fn rejects_out_of_range_integer() {
        let mut input = BTreeMap::new();
        input.insert("decimals".to_string(), OptionValue::Integer(-1));
        assert!(matches!(
            validate(SCHEMA, input),
            Err(SchemaError::InvalidSchema(field, _)) if field == "decimals"
        ));
    }

    #[test]
    fn accepts_minimal_valid_input() {
        let mut input = BTreeMap::new();
        input.insert("decimals".to_string(), OptionValue::Integer(9));
        let normalized = validate(SCHEMA, input).unwrap();
        assert_eq!(normalized.get("decimals"), Some(&OptionValue::Integer(9)));
        assert!(!normalized.contains_key("freeze_authority"));
    }
}
