//! Automatic type coercions.
//!
//! Applied by the typed facade and by concatenation joining: strings
//! parse to numbers/booleans/null on request, scalars render to strings,
//! and an object whose keys are all numeric indices converts to a list
//! (the `.properties`-style `foo.0`, `foo.1` idiom).

use crate::value::{Kind, Value, ValueType};

/// Convert `value` toward `requested` where an automatic coercion
/// exists; returns the value unchanged otherwise.
pub(crate) fn transform(value: &Value, requested: ValueType) -> Value {
    match value.kind() {
        Kind::Str {
            value: s,
            quoted: _,
        } => match requested {
            ValueType::Number => {
                if let Ok(n) = s.parse::<i64>() {
                    return Value::int(n, value.origin().clone());
                }
                if let Ok(f) = s.parse::<f64>() {
                    return Value::float(f, value.origin().clone());
                }
                value.clone()
            }
            ValueType::Null => {
                if s == "null" {
                    Value::null(value.origin().clone())
                } else {
                    value.clone()
                }
            }
            ValueType::Bool => match s.as_str() {
                "true" | "yes" | "on" => Value::bool(true, value.origin().clone()),
                "false" | "no" | "off" => Value::bool(false, value.origin().clone()),
                _ => value.clone(),
            },
            _ => value.clone(),
        },
        Kind::Number(n) if requested == ValueType::Str => {
            Value::string(n.render(), value.origin().clone())
        }
        Kind::Bool(b) if requested == ValueType::Str => {
            Value::string(if *b { "true" } else { "false" }, value.origin().clone())
        }
        // null deliberately does not become the string "null": a missing
        // value error is more useful than the text
        Kind::Object(data) if requested == ValueType::List => {
            let mut indexed: Vec<(i64, Value)> = Vec::new();
            for (key, v) in &data.fields {
                match key.parse::<i64>() {
                    Ok(i) if i >= 0 => indexed.push((i, v.clone())),
                    _ => continue,
                }
            }
            if indexed.is_empty() {
                // refuse to convert an object with no numeric keys, so
                // type errors still surface for ordinary objects
                return value.clone();
            }
            indexed.sort_by_key(|(i, _)| *i);
            // gaps in the indices are allowed
            let elements = indexed.into_iter().map(|(_, v)| v).collect();
            Value::list(elements, value.origin().clone())
        }
        _ => value.clone(),
    }
}

/// The string a scalar contributes to a string concatenation, `None` for
/// objects, lists, and unresolved values.
pub(crate) fn transform_to_string(value: &Value) -> Option<String> {
    match value.kind() {
        Kind::Null => Some("null".to_owned()),
        Kind::Bool(b) => Some(if *b { "true" } else { "false" }.to_owned()),
        Kind::Number(n) => Some(n.render()),
        Kind::Str { value: s, .. } => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use std::collections::BTreeMap;

    fn origin() -> Origin {
        Origin::new("test")
    }

    #[test]
    fn string_to_number_and_bool() {
        let s = Value::string("42", origin());
        assert_eq!(transform(&s, ValueType::Number).as_int(), Some(42));
        let s = Value::string("2.5", origin());
        assert_eq!(transform(&s, ValueType::Number).as_float(), Some(2.5));
        let s = Value::string("yes", origin());
        assert_eq!(transform(&s, ValueType::Bool).as_bool(), Some(true));
        let s = Value::string("off", origin());
        assert_eq!(transform(&s, ValueType::Bool).as_bool(), Some(false));
    }

    #[test]
    fn scalar_to_string() {
        assert_eq!(
            transform(&Value::int(7, origin()), ValueType::Str).as_str(),
            Some("7")
        );
        assert_eq!(
            transform(&Value::bool(true, origin()), ValueType::Str).as_str(),
            Some("true")
        );
        // null stays null
        assert!(transform(&Value::null(origin()), ValueType::Str).is_null());
    }

    #[test]
    fn numeric_keyed_object_to_list() {
        let mut fields = BTreeMap::new();
        fields.insert("2".to_owned(), Value::string("c", origin()));
        fields.insert("0".to_owned(), Value::string("a", origin()));
        fields.insert("9".to_owned(), Value::string("z", origin()));
        let obj = Value::object(fields, origin());
        let list = transform(&obj, ValueType::List);
        let elements = list.list_elements().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].as_str(), Some("a"));
        assert_eq!(elements[1].as_str(), Some("c"));
        assert_eq!(elements[2].as_str(), Some("z"));
    }

    #[test]
    fn ordinary_object_refuses_list_conversion() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_owned(), Value::string("a", origin()));
        let obj = Value::object(fields, origin());
        assert!(transform(&obj, ValueType::List).object_fields().is_some());
    }
}
