//! Value conversion and expression evaluation collaborators
//!
//! The container converts configured literals to the declared type of the slot they
//! are bound to, and evaluates expression values from descriptors. Both services are
//! pluggable; the defaults here cover textual configuration.

use crate::error::{InvocationError, Result};
use crate::value::{TypeRef, Value};

/// Converts values to a required type
pub trait TypeConverter: Send + Sync {
    /// Convert `value` so that it matches `target`
    fn convert(&self, value: Value, target: &TypeRef) -> Result<Value>;
}

/// Parsing and widening conversions for textual configuration.
///
/// - strings parse to `int`, `float` and `bool`
/// - `int` widens to `float`
/// - scalars format to `string`
/// - lists and maps convert element-wise; a single value wraps into a list
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeConverter;

impl DefaultTypeConverter {
    pub fn new() -> Self {
        Self
    }
}

impl TypeConverter for DefaultTypeConverter {
    fn convert(&self, value: Value, target: &TypeRef) -> Result<Value> {
        if target.matches(&value) {
            return Ok(value);
        }
        match (target, value) {
            (TypeRef::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| mismatch(target, &Value::Str(s))),
            (TypeRef::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| mismatch(target, &Value::Str(s))),
            (TypeRef::Bool, Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch(target, &Value::Str(s))),
            },
            (TypeRef::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (TypeRef::Str, Value::Int(i)) => Ok(Value::Str(i.to_string())),
            (TypeRef::Str, Value::Float(x)) => Ok(Value::Str(x.to_string())),
            (TypeRef::Str, Value::Bool(b)) => Ok(Value::Str(b.to_string())),
            (TypeRef::List(element), Value::List(items)) => items
                .into_iter()
                .map(|item| self.convert(item, element))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            (TypeRef::Map(element), Value::Map(entries)) => entries
                .into_iter()
                .map(|(key, item)| Ok((key, self.convert(item, element)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
            (TypeRef::List(element), single) if !single.is_null() => {
                Ok(Value::List(vec![self.convert(single, element)?]))
            }
            (_, other) => Err(mismatch(target, &other)),
        }
    }
}

fn mismatch(target: &TypeRef, value: &Value) -> InvocationError {
    InvocationError::TypeMismatch {
        expected: target.to_string(),
        actual: value.type_name(),
    }
}

/// Evaluates expression text found in descriptors
pub trait ValueEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str) -> Result<Value>;
}

/// Evaluator yielding the expression body as a string.
///
/// A `#{...}` wrapper is stripped; anything else is returned verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralEvaluator;

impl ValueEvaluator for LiteralEvaluator {
    fn evaluate(&self, expression: &str) -> Result<Value> {
        let body = expression
            .strip_prefix("#{")
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(expression);
        Ok(Value::Str(body.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_parsing() {
        let converter = DefaultTypeConverter::new();
        assert_eq!(
            converter.convert(Value::from(" 42 "), &TypeRef::Int).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            converter.convert(Value::from("2.5"), &TypeRef::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            converter.convert(Value::from("yes"), &TypeRef::Bool).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            converter.convert(Value::from("forty"), &TypeRef::Int),
            Err(InvocationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_widening_and_formatting() {
        let converter = DefaultTypeConverter::new();
        assert_eq!(
            converter.convert(Value::Int(3), &TypeRef::Float).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            converter.convert(Value::Int(3), &TypeRef::Str).unwrap(),
            Value::from("3")
        );
        assert!(converter.convert(Value::Float(3.5), &TypeRef::Int).is_err());
    }

    #[test]
    fn test_collections() {
        let converter = DefaultTypeConverter::new();
        let list = Value::List(vec![Value::from("1"), Value::from("2")]);
        assert_eq!(
            converter
                .convert(list, &TypeRef::list_of(TypeRef::Int))
                .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            converter
                .convert(Value::from("7"), &TypeRef::list_of(TypeRef::Int))
                .unwrap(),
            Value::List(vec![Value::Int(7)])
        );
    }

    #[test]
    fn test_null_into_primitive_fails() {
        let converter = DefaultTypeConverter::new();
        assert!(converter.convert(Value::Null, &TypeRef::Int).is_err());
        assert_eq!(
            converter.convert(Value::Null, &TypeRef::Str).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_literal_evaluator() {
        let evaluator = LiteralEvaluator;
        assert_eq!(
            evaluator.evaluate("#{ greeting }").unwrap(),
            Value::from("greeting")
        );
        assert_eq!(evaluator.evaluate("plain").unwrap(), Value::from("plain"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_any_integer_text_parses(n in any::<i64>(), pad in 0usize..3) {
                let text = format!("{}{}{}", " ".repeat(pad), n, " ".repeat(pad));
                let converted = DefaultTypeConverter::new()
                    .convert(Value::from(text), &TypeRef::Int)
                    .unwrap();
                prop_assert_eq!(converted, Value::Int(n));
            }

            #[test]
            fn test_matching_values_pass_through(items in prop::collection::vec(any::<i64>(), 0..8)) {
                let list = Value::List(items.into_iter().map(Value::Int).collect());
                let converted = DefaultTypeConverter::new()
                    .convert(list.clone(), &TypeRef::list_of(TypeRef::Int))
                    .unwrap();
                prop_assert_eq!(converted, list);
            }
        }
    }
}
