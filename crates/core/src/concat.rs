//! Concatenation consolidation.
//!
//! A concatenation node only has to exist while at least one piece is an
//! unresolved substitution; everything else folds eagerly. The same
//! consolidation runs at parse time and again after the resolver has
//! materialized the pieces.

use crate::error::ConfigError;
use crate::origin::Origin;
use crate::transform::{transform, transform_to_string};
use crate::value::{Kind, Value, ValueType};

/// Flatten nested concatenations and fold every adjacent pair of pieces
/// that can already be joined.
pub(crate) fn consolidate(pieces: Vec<Value>) -> Result<Vec<Value>, ConfigError> {
    if pieces.len() < 2 {
        return Ok(pieces);
    }
    let mut flattened: Vec<Value> = Vec::with_capacity(pieces.len());
    for v in pieces {
        if let Kind::Concat(inner) = v.kind() {
            flattened.extend(inner.iter().cloned());
        } else {
            flattened.push(v);
        }
    }
    let mut consolidated: Vec<Value> = Vec::with_capacity(flattened.len());
    for v in flattened {
        if consolidated.is_empty() {
            consolidated.push(v);
        } else {
            join(&mut consolidated, v)?;
        }
    }
    Ok(consolidated)
}

/// Build the value for a parsed or resolved run of adjacent pieces.
/// `None` means the whole concatenation vanished (all pieces were
/// optional substitutions that went missing).
pub(crate) fn concatenate(pieces: Vec<Value>) -> Result<Option<Value>, ConfigError> {
    let consolidated = consolidate(pieces)?;
    match consolidated.len() {
        0 => Ok(None),
        1 => Ok(Some(consolidated.into_iter().next().unwrap())),
        _ => {
            let origins: Vec<&Origin> = consolidated.iter().map(Value::origin).collect();
            let origin = Origin::merge(&origins);
            Ok(Some(Value::concat_node(consolidated, origin)))
        }
    }
}

/// Join `right` onto the last element of `builder`, or push it when the
/// pair cannot fold yet.
fn join(builder: &mut Vec<Value>, orig_right: Value) -> Result<(), ConfigError> {
    let mut left = builder
        .last()
        .cloned()
        .ok_or_else(|| ConfigError::bug("join called with an empty builder"))?;
    let mut right = orig_right.clone();

    // an object with numeric keys next to a list converts and appends
    if left.object_fields().is_some() && right.list_elements().is_some() {
        left = transform(&left, ValueType::List);
    } else if left.list_elements().is_some() && right.object_fields().is_some() {
        right = transform(&right, ValueType::List);
    }

    let joined: Option<Value> = match (left.kind(), right.kind()) {
        (Kind::Object(_), Kind::Object(_)) => Some(right.with_fallback(&left)),
        (Kind::List(a), Kind::List(b)) => {
            let mut elements = a.elements.clone();
            elements.extend(b.elements.iter().cloned());
            Some(Value::list(
                elements,
                Origin::merge(&[left.origin(), right.origin()]),
            ))
        }
        // unquoted text next to a list or object is ignorable
        (Kind::List(_) | Kind::Object(_), Kind::Str { quoted: false, .. }) => Some(left.clone()),
        (Kind::Concat(_), _) | (_, Kind::Concat(_)) => {
            return Err(ConfigError::bug("unflattened concatenation in join"))
        }
        _ if left.is_unmergeable() || right.is_unmergeable() => None,
        _ => {
            let s1 = transform_to_string(&left);
            let s2 = transform_to_string(&right);
            match (s1, s2) {
                (Some(a), Some(b)) => Some(Value::string(
                    format!("{}{}", a, b),
                    Origin::merge(&[left.origin(), right.origin()]),
                )),
                _ => {
                    return Err(ConfigError::wrong_type(
                        left.origin(),
                        format!(
                            "cannot concatenate object or list with a non-object-or-list, {:?} and {:?} are not compatible",
                            left, right
                        ),
                    ))
                }
            }
        }
    };

    match joined {
        None => builder.push(orig_right),
        Some(j) => {
            builder.pop();
            builder.push(j);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::value::SubstitutionExpression;
    use std::collections::BTreeMap;

    fn origin() -> Origin {
        Origin::new("test")
    }

    fn subst(path: &str) -> Value {
        Value::reference(
            SubstitutionExpression {
                path: Path::parse(path).unwrap(),
                optional: false,
            },
            0,
            origin(),
        )
    }

    #[test]
    fn strings_fold_to_one() {
        let pieces = vec![
            Value::string("a", origin()),
            Value::string("b", origin()),
            Value::string("c", origin()),
        ];
        let v = concatenate(pieces).unwrap().unwrap();
        assert_eq!(v.as_str(), Some("abc"));
    }

    #[test]
    fn scalars_fold_through_strings() {
        let pieces = vec![
            Value::string("n=", origin()),
            Value::int(3, origin()),
            Value::bool(true, origin()),
        ];
        let v = concatenate(pieces).unwrap().unwrap();
        assert_eq!(v.as_str(), Some("n=3true"));
    }

    #[test]
    fn lists_append() {
        let a = Value::list(vec![Value::int(1, origin()), Value::int(2, origin())], origin());
        let b = Value::list(vec![Value::int(3, origin())], origin());
        let v = concatenate(vec![a, b]).unwrap().unwrap();
        let elements = v.list_elements().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[2].as_int(), Some(3));
    }

    #[test]
    fn objects_merge_later_wins() {
        let mut f1 = BTreeMap::new();
        f1.insert("x".to_owned(), Value::int(1, origin()));
        f1.insert("shared".to_owned(), Value::int(1, origin()));
        let mut f2 = BTreeMap::new();
        f2.insert("shared".to_owned(), Value::int(2, origin()));
        let v = concatenate(vec![
            Value::object(f1, origin()),
            Value::object(f2, origin()),
        ])
        .unwrap()
        .unwrap();
        let fields = v.object_fields().unwrap();
        assert_eq!(fields["shared"].as_int(), Some(2));
        assert_eq!(fields["x"].as_int(), Some(1));
    }

    #[test]
    fn substitution_keeps_concatenation_alive() {
        let pieces = vec![Value::string("a", origin()), subst("x")];
        let v = concatenate(pieces).unwrap().unwrap();
        assert!(matches!(v.kind(), Kind::Concat(p) if p.len() == 2));
    }

    #[test]
    fn unquoted_text_next_to_list_is_dropped() {
        let list = Value::list(vec![Value::int(1, origin())], origin());
        let ws = Value::unquoted_string("  ", origin());
        let v = concatenate(vec![list, ws]).unwrap().unwrap();
        assert!(v.list_elements().is_some());
    }

    #[test]
    fn quoted_string_next_to_list_is_an_error() {
        let list = Value::list(vec![Value::int(1, origin())], origin());
        let s = Value::string("boom", origin());
        assert!(matches!(
            concatenate(vec![list, s]),
            Err(ConfigError::WrongType { .. })
        ));
    }

    #[test]
    fn empty_and_single_collapse() {
        assert!(concatenate(vec![]).unwrap().is_none());
        let single = concatenate(vec![Value::int(1, origin())]).unwrap().unwrap();
        assert_eq!(single.as_int(), Some(1));
    }
}
