//! Strict parameter literal conversion
//!
//! A raw scalar from the publish file is converted to its declared type or
//! rejected. Nothing is silently coerced: `"yes"` is not a bool, `3.0` is not
//! an int.

use crate::validation::document::{ParameterConstraints, ParameterType, ParameterValue};
use crate::validation::violation::{FieldPath, Violation, ViolationKind};
use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value;
use std::cmp::Ordering;

lazy_static! {
    static ref INT_LITERAL: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
    static ref FLOAT_LITERAL: Regex =
        Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$").unwrap();
    static ref DATE_LITERAL: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap();
}

/// Text of a raw value as it appears in messages
pub fn literal_of(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) => "<sequence>".to_string(),
        Value::Mapping(_) => "<mapping>".to_string(),
        Value::Tagged(tagged) => literal_of(&tagged.value),
    }
}

/// Convert `raw` to `declared`, or return the offending literal
pub fn coerce(declared: ParameterType, raw: &Value) -> Result<ParameterValue, String> {
    let mismatch = || literal_of(raw);

    match (declared, raw) {
        (ParameterType::String, Value::String(s)) => Ok(ParameterValue::String(s.clone())),
        (ParameterType::String, Value::Number(n)) if !n.is_f64() => {
            Ok(ParameterValue::String(n.to_string()))
        }
        (ParameterType::String, Value::Bool(b)) => Ok(ParameterValue::String(b.to_string())),

        (ParameterType::Bool, Value::Bool(b)) => Ok(ParameterValue::Bool(*b)),
        (ParameterType::Bool, Value::String(s)) => match s.as_str() {
            "true" => Ok(ParameterValue::Bool(true)),
            "false" => Ok(ParameterValue::Bool(false)),
            _ => Err(mismatch()),
        },

        (ParameterType::Int, Value::Number(n)) => {
            n.as_i64().map(ParameterValue::Int).ok_or_else(mismatch)
        }
        (ParameterType::Int, Value::String(s)) if INT_LITERAL.is_match(s) => {
            s.parse().map(ParameterValue::Int).map_err(|_| mismatch())
        }

        (ParameterType::Float, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(ParameterValue::Float)
            .ok_or_else(mismatch),
        (ParameterType::Float, Value::String(s)) if FLOAT_LITERAL.is_match(s) => s
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(ParameterValue::Float)
            .ok_or_else(mismatch),

        (ParameterType::Date, Value::String(s)) => parse_date(s).ok_or_else(mismatch),

        (_, Value::Tagged(tagged)) => coerce(declared, &tagged.value),
        _ => Err(mismatch()),
    }
}

/// ISO-8601 calendar date or RFC 3339 timestamp
fn parse_date(literal: &str) -> Option<ParameterValue> {
    if DATE_LITERAL.is_match(literal) {
        return NaiveDate::parse_from_str(literal, "%Y-%m-%d")
            .ok()
            .map(ParameterValue::Date);
    }
    DateTime::parse_from_rfc3339(literal)
        .ok()
        .map(ParameterValue::DateTime)
}

/// Check a parameter's constraints and its default against them
///
/// # Arguments
///
/// * `declared` - Declared parameter type
/// * `constraints` - Already converted constraints
/// * `default` - Converted default, if any
/// * `path` - Path of the parameter entry
pub fn check_constraints(
    declared: ParameterType,
    constraints: &ParameterConstraints,
    default: Option<&ParameterValue>,
    path: &FieldPath,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let constraints_path = path.key("constraints");

    if !declared.is_ordered() {
        for (key, bound) in [("min", &constraints.min), ("max", &constraints.max)] {
            if bound.is_some() {
                violations.push(Violation::new(
                    constraints_path.key(key),
                    ViolationKind::InvalidConstraint {
                        message: format!("{} is not supported for {} parameters", key, declared),
                    },
                ));
            }
        }
    }

    if let (Some(min), Some(max)) = (&constraints.min, &constraints.max) {
        if min.compare(max) == Some(Ordering::Greater) {
            violations.push(Violation::new(
                constraints_path.clone(),
                ViolationKind::InvalidConstraint {
                    message: format!("min {} is greater than max {}", min, max),
                },
            ));
        }
    }

    let Some(default) = default else {
        return violations;
    };
    let default_path = path.key("default");

    if let Some(min) = &constraints.min {
        if default.compare(min) == Some(Ordering::Less) {
            violations.push(Violation::new(
                default_path.clone(),
                ViolationKind::OutOfRange {
                    literal: default.to_string(),
                    bound: format!("min {}", min),
                },
            ));
        }
    }
    if let Some(max) = &constraints.max {
        if default.compare(max) == Some(Ordering::Greater) {
            violations.push(Violation::new(
                default_path.clone(),
                ViolationKind::OutOfRange {
                    literal: default.to_string(),
                    bound: format!("max {}", max),
                },
            ));
        }
    }

    let allowed = constraints.allowed.is_empty()
        || constraints
            .allowed
            .iter()
            .any(|candidate| candidate == default || candidate.compare(default) == Some(Ordering::Equal));
    if !allowed {
        violations.push(Violation::new(
            default_path,
            ViolationKind::NotAllowed {
                literal: default.to_string(),
            },
        ));
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_bool_accepts_only_true_false() {
        assert_eq!(coerce(ParameterType::Bool, &yaml("true")), Ok(ParameterValue::Bool(true)));
        assert_eq!(
            coerce(ParameterType::Bool, &yaml("\"false\"")),
            Ok(ParameterValue::Bool(false))
        );
        assert_eq!(coerce(ParameterType::Bool, &yaml("\"yes\"")), Err("yes".to_string()));
        assert_eq!(coerce(ParameterType::Bool, &yaml("1")), Err("1".to_string()));
    }

    #[test]
    fn test_int_requires_integer_literal() {
        assert_eq!(coerce(ParameterType::Int, &yaml("42")), Ok(ParameterValue::Int(42)));
        assert_eq!(coerce(ParameterType::Int, &yaml("\"-7\"")), Ok(ParameterValue::Int(-7)));
        assert_eq!(coerce(ParameterType::Int, &yaml("\"true\"")), Err("true".to_string()));
        assert_eq!(coerce(ParameterType::Int, &yaml("true")), Err("true".to_string()));
        assert!(coerce(ParameterType::Int, &yaml("3.5")).is_err());
        assert!(coerce(ParameterType::Int, &yaml("\"99999999999999999999\"")).is_err());
    }

    #[test]
    fn test_float_accepts_numbers() {
        assert_eq!(coerce(ParameterType::Float, &yaml("0.25")), Ok(ParameterValue::Float(0.25)));
        assert_eq!(coerce(ParameterType::Float, &yaml("3")), Ok(ParameterValue::Float(3.0)));
        assert_eq!(
            coerce(ParameterType::Float, &yaml("\"1e-3\"")),
            Ok(ParameterValue::Float(0.001))
        );
        assert!(coerce(ParameterType::Float, &yaml("\"abc\"")).is_err());
        assert!(coerce(ParameterType::Float, &yaml(".nan")).is_err());
    }

    #[test]
    fn test_date_literals() {
        assert_eq!(
            coerce(ParameterType::Date, &yaml("2024-02-29")),
            Ok(ParameterValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert!(matches!(
            coerce(ParameterType::Date, &yaml("\"2024-02-29T10:00:00Z\"")),
            Ok(ParameterValue::DateTime(_))
        ));
        assert!(coerce(ParameterType::Date, &yaml("2023-02-29")).is_err());
        assert!(coerce(ParameterType::Date, &yaml("\"29/02/2024\"")).is_err());
    }

    #[test]
    fn test_string_accepts_lossless_scalars() {
        assert_eq!(
            coerce(ParameterType::String, &yaml("12")),
            Ok(ParameterValue::String("12".to_string()))
        );
        assert_eq!(
            coerce(ParameterType::String, &yaml("\"1.10\"")),
            Ok(ParameterValue::String("1.10".to_string()))
        );
        assert!(coerce(ParameterType::String, &yaml("1.10")).is_err());
        assert!(coerce(ParameterType::String, &yaml("[a, b]")).is_err());
        assert!(coerce(ParameterType::String, &yaml("~")).is_err());
    }

    #[test]
    fn test_default_outside_range() {
        let constraints = ParameterConstraints {
            min: Some(ParameterValue::Int(1)),
            max: Some(ParameterValue::Int(10)),
            allowed: Vec::new(),
        };
        let path = FieldPath::root().key("components").index(0).key("parameters").index(1);

        let violations = check_constraints(
            ParameterType::Int,
            &constraints,
            Some(&ParameterValue::Int(11)),
            &path,
        );

        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].path.to_string(),
            "components[0].parameters[1].default"
        );
        assert!(matches!(violations[0].kind, ViolationKind::OutOfRange { .. }));
    }

    #[test]
    fn test_inverted_bounds_and_unordered_type() {
        let constraints = ParameterConstraints {
            min: Some(ParameterValue::Int(5)),
            max: Some(ParameterValue::Int(1)),
            allowed: Vec::new(),
        };
        let violations =
            check_constraints(ParameterType::Int, &constraints, None, &FieldPath::root().key("p"));
        assert_eq!(violations.len(), 1);

        let violations =
            check_constraints(ParameterType::Bool, &constraints, None, &FieldPath::root().key("p"));
        // min, max unsupported, plus inverted bounds
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_default_must_be_allowed() {
        let constraints = ParameterConstraints {
            min: None,
            max: None,
            allowed: vec![
                ParameterValue::String("nearest".to_string()),
                ParameterValue::String("bilinear".to_string()),
            ],
        };
        let path = FieldPath::root().key("p");

        assert!(
            check_constraints(
                ParameterType::String,
                &constraints,
                Some(&ParameterValue::String("bilinear".to_string())),
                &path
            )
            .is_empty()
        );

        let violations = check_constraints(
            ParameterType::String,
            &constraints,
            Some(&ParameterValue::String("cubic".to_string())),
            &path,
        );
        assert!(matches!(violations[0].kind, ViolationKind::NotAllowed { .. }));
    }
}
