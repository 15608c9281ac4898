use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::log::HostError;

use serde_json::Value;

/// A binary operator usable within an expression.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Greater,
    Lesser,
    Equal,
    NotEqual,
    GreaterOrEqual,
    LesserOrEqual,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let text = match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Greater => ">",
            Operator::Lesser => "<",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::GreaterOrEqual => ">=",
            Operator::LesserOrEqual => "<=",
        };

        write!(f, "{text}")
    }
}

/// Return true if the given [`Value`] is truthy.
///
/// Empty text, empty collections, null, false and zero are falsy,
/// everything else including negative numbers is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(value) => *value,
        Value::Number(value) => value.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        Value::Null => false,
    }
}

/// Return a name for the type of the given [`Value`], for error messages.
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Apply an arithmetic [`Operator`] to the two [`Value`] instances.
///
/// Integer arithmetic stays integral where possible, division always
/// produces a float. Adding two strings or two arrays concatenates them.
///
/// # Errors
///
/// Returns a [`HostError`] if the operator cannot be applied to the
/// types, or on division by zero.
pub fn arithmetic(left: &Value, operator: Operator, right: &Value) -> Result<Value, HostError> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => {
            if operator == Operator::Divide {
                let divisor = right.as_f64().unwrap_or(0.0);
                if divisor == 0.0 {
                    return Err(HostError::build("division by zero"));
                }

                return Ok(Value::from(left.as_f64().unwrap_or(0.0) / divisor));
            }
            if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
                let result = match operator {
                    Operator::Add => left.checked_add(right),
                    Operator::Subtract => left.checked_sub(right),
                    Operator::Multiply => left.checked_mul(right),
                    _ => unreachable!("comparison operators are not arithmetic"),
                };
                if let Some(result) = result {
                    return Ok(Value::from(result));
                }
            }

            let left = left.as_f64().unwrap_or(0.0);
            let right = right.as_f64().unwrap_or(0.0);
            let result = match operator {
                Operator::Add => left + right,
                Operator::Subtract => left - right,
                Operator::Multiply => left * right,
                _ => unreachable!("comparison operators are not arithmetic"),
            };

            Ok(Value::from(result))
        }
        (Value::String(left), Value::String(right)) if operator == Operator::Add => {
            Ok(Value::String(format!("{left}{right}")))
        }
        (Value::Array(left), Value::Array(right)) if operator == Operator::Add => {
            let mut items = left.clone();
            items.extend(right.iter().cloned());

            Ok(Value::Array(items))
        }
        (left, right) => Err(HostError::build(format!(
            "operator `{operator}` is invalid on types `{}` and `{}`",
            type_of(left),
            type_of(right)
        ))),
    }
}

/// Compare the two [`Value`] instances with the given [`Operator`].
///
/// Equality across mismatched types is false rather than an error,
/// ordering is only defined within numbers and within strings.
///
/// # Errors
///
/// Returns a [`HostError`] if the two types cannot be ordered.
pub fn compare(left: &Value, operator: Operator, right: &Value) -> Result<bool, HostError> {
    if let (Value::Number(left), Value::Number(right)) = (left, right) {
        let left = left.as_f64().unwrap_or(0.0);
        let right = right.as_f64().unwrap_or(0.0);

        return Ok(match operator {
            Operator::Greater => left > right,
            Operator::Lesser => left < right,
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::GreaterOrEqual => left >= right,
            Operator::LesserOrEqual => left <= right,
            _ => unreachable!("arithmetic operators are not comparisons"),
        });
    }
    if let (Value::String(left), Value::String(right)) = (left, right) {
        return Ok(match operator {
            Operator::Greater => left > right,
            Operator::Lesser => left < right,
            Operator::Equal => left == right,
            Operator::NotEqual => left != right,
            Operator::GreaterOrEqual => left >= right,
            Operator::LesserOrEqual => left <= right,
            _ => unreachable!("arithmetic operators are not comparisons"),
        });
    }

    match operator {
        Operator::Equal => Ok(left == right),
        Operator::NotEqual => Ok(left != right),
        _ => Err(HostError::build(format!(
            "types `{}` and `{}` cannot be ordered",
            type_of(left),
            type_of(right)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{arithmetic, compare, is_truthy, Operator};
    use serde_json::{json, Value};

    #[test]
    fn test_truthy() {
        let truthy = [
            json!("lorem"),
            json!(12),
            json!(-12),
            json!(114.4),
            json!(true),
            json!(["lorem"]),
            json!({"lorem": "ipsum"}),
        ];
        let falsy = [
            json!(""),
            json!(0),
            json!(0.0),
            json!(false),
            json!([]),
            json!({}),
            Value::Null,
        ];

        for value in truthy {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
        for value in falsy {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_arithmetic_integers() {
        assert_eq!(
            arithmetic(&json!(2), Operator::Add, &json!(3)).unwrap(),
            json!(5)
        );
        assert_eq!(
            arithmetic(&json!(2), Operator::Multiply, &json!(3)).unwrap(),
            json!(6)
        );
    }

    #[test]
    fn test_arithmetic_divide_is_float() {
        assert_eq!(
            arithmetic(&json!(7), Operator::Divide, &json!(2)).unwrap(),
            json!(3.5)
        );
        assert!(arithmetic(&json!(7), Operator::Divide, &json!(0)).is_err());
    }

    #[test]
    fn test_arithmetic_concat() {
        assert_eq!(
            arithmetic(&json!("<"), Operator::Add, &json!(">")).unwrap(),
            json!("<>")
        );
        assert_eq!(
            arithmetic(&json!([1]), Operator::Add, &json!([2])).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_arithmetic_incompatible() {
        assert!(arithmetic(&json!("a"), Operator::Subtract, &json!(1)).is_err());
    }

    #[test]
    fn test_compare_numbers_mixed_width() {
        assert!(compare(&json!(1), Operator::Equal, &json!(1.0)).unwrap());
        assert!(compare(&json!(2), Operator::Greater, &json!(1.5)).unwrap());
    }

    #[test]
    fn test_compare_mismatched_equality() {
        assert!(!compare(&json!("1"), Operator::Equal, &json!(1)).unwrap());
        assert!(compare(&json!("1"), Operator::NotEqual, &json!(1)).unwrap());
    }

    #[test]
    fn test_compare_mismatched_ordering() {
        assert!(compare(&json!("hello"), Operator::Greater, &json!(true)).is_err());
    }
}
