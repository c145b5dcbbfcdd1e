//! The configuration value model.
//!
//! One closed tagged union covers every kind of node, resolved or not:
//! scalars, objects, lists, `${}` references, concatenations, and the
//! two delayed-merge stacks. Values are immutable and `Rc`-shared; every
//! transformation builds new nodes and shares untouched children, so a
//! node's pointer identity is stable and is what the resolver keys its
//! memo table and cycle markers on.
//!
//! Merge semantics (`with_fallback`) live here because they are a
//! property of the value model itself: two objects deep-merge
//! immediately, while anything involving an unresolved node must be
//! deferred into a merge stack, since a reference may turn out to be an
//! object that needs merging with its peers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::origin::Origin;
use crate::path::Path;

// ──────────────────────────────────────────────
// Substitution expressions
// ──────────────────────────────────────────────

/// A `${path}` or `${?path}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionExpression {
    pub path: Path,
    pub optional: bool,
}

impl fmt::Display for SubstitutionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "${{?{}}}", self.path.render())
        } else {
            write!(f, "${{{}}}", self.path.render())
        }
    }
}

// ──────────────────────────────────────────────
// Kinds
// ──────────────────────────────────────────────

/// The kinds a fully resolved value can have, as reported by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Bool,
    Number,
    Str,
    Object,
    List,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Null => "null",
            ValueType::Bool => "boolean",
            ValueType::Number => "number",
            ValueType::Str => "string",
            ValueType::Object => "object",
            ValueType::List => "list",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Number::Int(n) => *n,
            Number::Float(f) => *f as i64,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Number::Int(n) => n.to_string(),
            Number::Float(f) => f.to_string(),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectData {
    pub(crate) fields: BTreeMap<String, Value>,
    /// True when no descendant contains substitutions.
    pub(crate) resolved: bool,
    /// True once this object has been merged over a non-object, which
    /// hides everything below it in any future merge stack.
    pub(crate) ignores_fallbacks: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ListData {
    pub(crate) elements: Vec<Value>,
    pub(crate) resolved: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    Null,
    Bool(bool),
    Number(Number),
    Str {
        value: String,
        /// Unquoted strings are ignorable next to lists and objects in
        /// concatenations; quoted strings are not.
        quoted: bool,
    },
    Object(ObjectData),
    List(ListData),
    Reference {
        expr: SubstitutionExpression,
        /// Number of keys prepended by relativization; lookups against
        /// external fallbacks strip this prefix again.
        prefix_length: usize,
    },
    /// At least two pieces, at least one of them unmergeable, never
    /// nested.
    Concat(Vec<Value>),
    /// Priority stack, earlier entries win; never nested.
    DelayedMerge(Vec<Value>),
    /// Same, but statically known to resolve to an object because the
    /// highest-priority entry is one.
    DelayedMergeObject(Vec<Value>),
}

#[derive(Debug)]
struct ValueInner {
    origin: Origin,
    kind: Kind,
}

/// A shared, immutable configuration tree node.
#[derive(Clone)]
pub struct Value {
    inner: Rc<ValueInner>,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.kind.fmt(f)
    }
}

// ──────────────────────────────────────────────
// Construction
// ──────────────────────────────────────────────

impl Value {
    pub(crate) fn new(kind: Kind, origin: Origin) -> Value {
        Value {
            inner: Rc::new(ValueInner { origin, kind }),
        }
    }

    pub fn null(origin: Origin) -> Value {
        Value::new(Kind::Null, origin)
    }

    pub fn bool(value: bool, origin: Origin) -> Value {
        Value::new(Kind::Bool(value), origin)
    }

    pub fn int(value: i64, origin: Origin) -> Value {
        Value::new(Kind::Number(Number::Int(value)), origin)
    }

    pub fn float(value: f64, origin: Origin) -> Value {
        Value::new(Kind::Number(Number::Float(value)), origin)
    }

    pub fn string(value: impl Into<String>, origin: Origin) -> Value {
        Value::new(
            Kind::Str {
                value: value.into(),
                quoted: true,
            },
            origin,
        )
    }

    pub(crate) fn unquoted_string(value: impl Into<String>, origin: Origin) -> Value {
        Value::new(
            Kind::Str {
                value: value.into(),
                quoted: false,
            },
            origin,
        )
    }

    pub fn object(fields: BTreeMap<String, Value>, origin: Origin) -> Value {
        let resolved = fields.values().all(Value::is_resolved);
        Value::object_raw(fields, resolved, false, origin)
    }

    pub(crate) fn object_raw(
        fields: BTreeMap<String, Value>,
        resolved: bool,
        ignores_fallbacks: bool,
        origin: Origin,
    ) -> Value {
        Value::new(
            Kind::Object(ObjectData {
                fields,
                resolved,
                ignores_fallbacks,
            }),
            origin,
        )
    }

    pub fn empty_object(origin: Origin) -> Value {
        Value::object(BTreeMap::new(), origin)
    }

    pub fn list(elements: Vec<Value>, origin: Origin) -> Value {
        let resolved = elements.iter().all(Value::is_resolved);
        Value::new(Kind::List(ListData { elements, resolved }), origin)
    }

    pub(crate) fn reference(
        expr: SubstitutionExpression,
        prefix_length: usize,
        origin: Origin,
    ) -> Value {
        Value::new(
            Kind::Reference {
                expr,
                prefix_length,
            },
            origin,
        )
    }

    pub(crate) fn concat_node(pieces: Vec<Value>, origin: Origin) -> Value {
        debug_assert!(pieces.len() >= 2, "concatenation needs at least 2 pieces");
        debug_assert!(
            pieces.iter().any(Value::is_unmergeable),
            "concatenation without an unmergeable piece should have been folded"
        );
        debug_assert!(
            !pieces
                .iter()
                .any(|p| matches!(p.kind(), Kind::Concat(_))),
            "concatenations are flattened at construction"
        );
        Value::new(Kind::Concat(pieces), origin)
    }

    pub(crate) fn delayed_merge_stack(stack: Vec<Value>, object: bool, origin: Origin) -> Value {
        debug_assert!(!stack.is_empty(), "empty delayed merge stack");
        debug_assert!(
            !stack.iter().any(Value::is_merge_stack),
            "merge stacks are flattened at construction"
        );
        if object {
            Value::new(Kind::DelayedMergeObject(stack), origin)
        } else {
            Value::new(Kind::DelayedMerge(stack), origin)
        }
    }
}

// ──────────────────────────────────────────────
// Queries
// ──────────────────────────────────────────────

impl Value {
    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    pub fn with_origin(&self, origin: Origin) -> Value {
        Value::new(self.inner.kind.clone(), origin)
    }

    pub(crate) fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Pointer identity; the identity used by memo keys, cycle markers,
    /// and child replacement.
    pub fn same_node(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable address for hashing by node identity. Only meaningful while
    /// the holder keeps the node alive.
    pub(crate) fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// The kind of a resolved value. Unresolved nodes have no kind yet.
    pub fn value_type(&self) -> Result<ValueType, ConfigError> {
        match &self.inner.kind {
            Kind::Null => Ok(ValueType::Null),
            Kind::Bool(_) => Ok(ValueType::Bool),
            Kind::Number(_) => Ok(ValueType::Number),
            Kind::Str { .. } => Ok(ValueType::Str),
            Kind::Object(_) => Ok(ValueType::Object),
            Kind::List(_) => Ok(ValueType::List),
            Kind::Reference { expr, .. } => Err(ConfigError::not_resolved(format!(
                "substitution {} has not been resolved",
                expr
            ))),
            Kind::Concat(_) => Err(ConfigError::not_resolved(
                "concatenation with unresolved pieces",
            )),
            Kind::DelayedMerge(_) | Kind::DelayedMergeObject(_) => Err(
                ConfigError::not_resolved("merge stack with unresolved entries"),
            ),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match &self.inner.kind {
            Kind::Null | Kind::Bool(_) | Kind::Number(_) | Kind::Str { .. } => true,
            Kind::Object(data) => data.resolved,
            Kind::List(data) => data.resolved,
            Kind::Reference { .. }
            | Kind::Concat(_)
            | Kind::DelayedMerge(_)
            | Kind::DelayedMergeObject(_) => false,
        }
    }

    pub(crate) fn is_unmergeable(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Reference { .. }
                | Kind::Concat(_)
                | Kind::DelayedMerge(_)
                | Kind::DelayedMergeObject(_)
        )
    }

    pub(crate) fn is_merge_stack(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::DelayedMerge(_) | Kind::DelayedMergeObject(_)
        )
    }

    pub(crate) fn is_object_like(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Object(_) | Kind::DelayedMergeObject(_)
        )
    }

    pub(crate) fn is_container(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::Object(_)
                | Kind::List(_)
                | Kind::Concat(_)
                | Kind::DelayedMerge(_)
                | Kind::DelayedMergeObject(_)
        )
    }

    /// True when merging anything below this value can no longer change
    /// it, so `with_fallback` may discard the fallback outright.
    pub(crate) fn ignores_fallbacks(&self) -> bool {
        match &self.inner.kind {
            Kind::Null | Kind::Bool(_) | Kind::Number(_) | Kind::Str { .. } => true,
            Kind::Object(data) => data.ignores_fallbacks,
            Kind::List(data) => data.resolved,
            Kind::Reference { .. } | Kind::Concat(_) => false,
            Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => stack
                .last()
                .map(Value::ignores_fallbacks)
                .unwrap_or(false),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.inner.kind {
            Kind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.inner.kind {
            Kind::Number(n) => Some(n.as_i64()),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.inner.kind {
            Kind::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.inner.kind {
            Kind::Str { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.inner.kind, Kind::Null)
    }

    pub fn object_fields(&self) -> Option<&BTreeMap<String, Value>> {
        match &self.inner.kind {
            Kind::Object(data) => Some(&data.fields),
            _ => None,
        }
    }

    pub fn list_elements(&self) -> Option<&[Value]> {
        match &self.inner.kind {
            Kind::List(data) => Some(&data.elements),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Merging
// ──────────────────────────────────────────────

impl Value {
    /// Merge `self` over `fallback`; `self` wins wherever both provide a
    /// value.
    pub fn with_fallback(&self, fallback: &Value) -> Value {
        if self.ignores_fallbacks() {
            return self.clone();
        }
        match (&self.inner.kind, &fallback.inner.kind) {
            // the fallback itself is unmergeable: keep its whole stack
            // around for resolution time
            (
                _,
                Kind::Reference { .. }
                | Kind::Concat(_)
                | Kind::DelayedMerge(_)
                | Kind::DelayedMergeObject(_),
            ) => self.merged_with_stack(fallback.unmerged_values()),
            (Kind::Object(_), Kind::Object(_)) => self.merged_with_object(fallback),
            (Kind::DelayedMerge(_) | Kind::DelayedMergeObject(_), _) => {
                self.merged_with_stack(vec![fallback.clone()])
            }
            _ => {
                if self.is_resolved() {
                    // a resolved object over a non-object: nothing merges,
                    // and later objects must not merge either
                    match &self.inner.kind {
                        Kind::Object(data) => Value::object_raw(
                            data.fields.clone(),
                            data.resolved,
                            true,
                            self.origin().clone(),
                        ),
                        _ => self.clone(),
                    }
                } else {
                    // unresolved: resolution may need to look down into
                    // the fallback, so always delay
                    self.merged_with_stack(vec![fallback.clone()])
                }
            }
        }
    }

    /// The stack this value contributes when it ends up in a merge stack.
    pub(crate) fn unmerged_values(&self) -> Vec<Value> {
        match &self.inner.kind {
            Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => stack.clone(),
            _ => vec![self.clone()],
        }
    }

    fn merged_with_stack(&self, extra: Vec<Value>) -> Value {
        let mut stack = self.unmerged_values();
        stack.extend(extra);
        let origins: Vec<&Origin> = stack.iter().map(Value::origin).collect();
        let origin = Origin::merge(&origins);
        let object = matches!(
            self.inner.kind,
            Kind::Object(_) | Kind::DelayedMergeObject(_)
        );
        Value::delayed_merge_stack(stack, object, origin)
    }

    /// Deep per-key merge of two objects. Keys unique to either side pass
    /// through; keys in both recurse with `self`'s child as primary.
    fn merged_with_object(&self, fallback: &Value) -> Value {
        let (a, b) = match (&self.inner.kind, &fallback.inner.kind) {
            (Kind::Object(a), Kind::Object(b)) => (a, b),
            _ => unreachable!("merged_with_object called on non-objects"),
        };
        let all_keys: BTreeSet<&String> = a.fields.keys().chain(b.fields.keys()).collect();
        let mut merged = BTreeMap::new();
        let mut all_resolved = true;
        let mut changed = false;
        for key in all_keys {
            let first = a.fields.get(key);
            let second = b.fields.get(key);
            let kept = match (first, second) {
                (Some(f), Some(s)) => f.with_fallback(s),
                (Some(f), None) => f.clone(),
                (None, Some(s)) => s.clone(),
                (None, None) => continue,
            };
            match first {
                Some(f) if f.same_node(&kept) => {}
                _ => changed = true,
            }
            if !kept.is_resolved() {
                all_resolved = false;
            }
            merged.insert(key.clone(), kept);
        }
        let ignores = b.ignores_fallbacks;
        if changed {
            Value::object_raw(
                merged,
                all_resolved,
                ignores,
                Origin::merge(&[self.origin(), fallback.origin()]),
            )
        } else if all_resolved != a.resolved || ignores != a.ignores_fallbacks {
            Value::object_raw(
                a.fields.clone(),
                all_resolved,
                ignores,
                self.origin().clone(),
            )
        } else {
            self.clone()
        }
    }
}

// ──────────────────────────────────────────────
// Tree surgery
// ──────────────────────────────────────────────

impl Value {
    /// Prefix every substitution path in this subtree, recording the
    /// prefix length so external lookups can strip it again. Used when an
    /// included or nested object is grafted under a path.
    pub(crate) fn relativized(&self, prefix: &Path) -> Value {
        match &self.inner.kind {
            Kind::Reference {
                expr,
                prefix_length,
            } => Value::reference(
                SubstitutionExpression {
                    path: expr.path.prepend(prefix),
                    optional: expr.optional,
                },
                prefix_length + prefix.len(),
                self.origin().clone(),
            ),
            Kind::Object(data) => {
                let fields = data
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.relativized(prefix)))
                    .collect();
                Value::object_raw(
                    fields,
                    data.resolved,
                    data.ignores_fallbacks,
                    self.origin().clone(),
                )
            }
            Kind::List(data) => {
                let elements = data.elements.iter().map(|v| v.relativized(prefix)).collect();
                Value::new(
                    Kind::List(ListData {
                        elements,
                        resolved: data.resolved,
                    }),
                    self.origin().clone(),
                )
            }
            Kind::Concat(pieces) => Value::new(
                Kind::Concat(pieces.iter().map(|v| v.relativized(prefix)).collect()),
                self.origin().clone(),
            ),
            Kind::DelayedMerge(stack) => Value::new(
                Kind::DelayedMerge(stack.iter().map(|v| v.relativized(prefix)).collect()),
                self.origin().clone(),
            ),
            Kind::DelayedMergeObject(stack) => Value::new(
                Kind::DelayedMergeObject(stack.iter().map(|v| v.relativized(prefix)).collect()),
                self.origin().clone(),
            ),
            _ => self.clone(),
        }
    }

    /// Replace a direct child (by node identity) with `replacement`, or
    /// delete it when `replacement` is `None`. Returns `Ok(None)` when
    /// the deletion leaves nothing of this container.
    pub(crate) fn replace_child(
        &self,
        child: &Value,
        replacement: Option<Value>,
    ) -> Result<Option<Value>, ConfigError> {
        match &self.inner.kind {
            Kind::Object(data) => {
                let mut found = false;
                let mut fields = BTreeMap::new();
                for (k, v) in &data.fields {
                    if v.same_node(child) {
                        found = true;
                        if let Some(r) = &replacement {
                            fields.insert(k.clone(), r.clone());
                        }
                    } else {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                if !found {
                    return Err(ConfigError::bug("replace_child did not find the child"));
                }
                let resolved = fields.values().all(Value::is_resolved);
                Ok(Some(Value::object_raw(
                    fields,
                    resolved,
                    data.ignores_fallbacks,
                    self.origin().clone(),
                )))
            }
            Kind::List(data) => {
                let new = replace_in_list(&data.elements, child, replacement)?;
                Ok(new.map(|elements| Value::list(elements, self.origin().clone())))
            }
            Kind::Concat(pieces) => {
                let new = replace_in_list(pieces, child, replacement)?;
                Ok(new.map(|pieces| match pieces.len() {
                    1 => pieces.into_iter().next().unwrap(),
                    _ => Value::new(Kind::Concat(pieces), self.origin().clone()),
                }))
            }
            Kind::DelayedMerge(stack) => {
                let new = replace_in_list(stack, child, replacement)?;
                Ok(new
                    .map(|stack| Value::new(Kind::DelayedMerge(stack), self.origin().clone())))
            }
            Kind::DelayedMergeObject(stack) => {
                let new = replace_in_list(stack, child, replacement)?;
                Ok(new.map(|stack| {
                    Value::new(Kind::DelayedMergeObject(stack), self.origin().clone())
                }))
            }
            _ => Err(ConfigError::bug("replace_child on a non-container value")),
        }
    }

    /// Whether `child` is a direct child of this container, by identity.
    pub(crate) fn has_child(&self, child: &Value) -> bool {
        match &self.inner.kind {
            Kind::Object(data) => data.fields.values().any(|v| v.same_node(child)),
            Kind::List(data) => data.elements.iter().any(|v| v.same_node(child)),
            Kind::Concat(pieces) => pieces.iter().any(|v| v.same_node(child)),
            Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => {
                stack.iter().any(|v| v.same_node(child))
            }
            _ => false,
        }
    }

    /// Full traversal looking for `descendant` anywhere underneath.
    pub(crate) fn has_descendant(&self, descendant: &Value) -> bool {
        let children: &[Value] = match &self.inner.kind {
            Kind::List(data) => &data.elements,
            Kind::Concat(pieces) => pieces,
            Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => stack,
            Kind::Object(data) => {
                return data.fields.values().any(|v| {
                    v.same_node(descendant) || (v.is_container() && v.has_descendant(descendant))
                });
            }
            _ => return false,
        };
        children
            .iter()
            .any(|v| v.same_node(descendant) || (v.is_container() && v.has_descendant(descendant)))
    }

    /// Look up a key without resolving, if the answer is already knowable.
    ///
    /// On a plain object this is a map lookup. On a delayed-merge object
    /// the key is only knowable when some object layer pins it down
    /// before any unmergeable layer could change it.
    pub(crate) fn attempt_peek_with_partial_resolve(
        &self,
        key: &str,
    ) -> Result<Option<Value>, ConfigError> {
        match &self.inner.kind {
            Kind::Object(data) => Ok(data.fields.get(key).cloned()),
            Kind::DelayedMergeObject(stack) => {
                for layer in stack {
                    match layer.kind() {
                        Kind::Object(_) => {
                            if let Some(v) = layer.attempt_peek_with_partial_resolve(key)? {
                                if v.ignores_fallbacks() {
                                    return Ok(Some(v));
                                }
                                return Err(ConfigError::not_resolved(format!(
                                    "key '{}' is in an unresolved merge",
                                    key
                                )));
                            }
                        }
                        _ if layer.is_unmergeable() => {
                            return Err(ConfigError::not_resolved(format!(
                                "key '{}' may depend on an unresolved substitution",
                                key
                            )));
                        }
                        _ => {
                            if !layer.ignores_fallbacks() {
                                return Err(ConfigError::bug(
                                    "resolved non-object in merge stack should ignore fallbacks",
                                ));
                            }
                            // a non-object layer hides everything below
                            return Ok(None);
                        }
                    }
                }
                Err(ConfigError::bug(
                    "delayed merge object with no unmergeable layer",
                ))
            }
            _ => Err(ConfigError::not_resolved(format!(
                "cannot look up '{}' in an unresolved value",
                key
            ))),
        }
    }

    /// Walk a path with raw peeks; `None` when the path leads through or
    /// to a non-object.
    pub(crate) fn peek_path(&self, path: &Path) -> Result<Option<Value>, ConfigError> {
        let v = self.attempt_peek_with_partial_resolve(path.first())?;
        match path.remainder() {
            None => Ok(v),
            Some(rest) => match v {
                Some(child) if child.is_object_like() => child.peek_path(&rest),
                _ => Ok(None),
            },
        }
    }
}

fn replace_in_list(
    list: &[Value],
    child: &Value,
    replacement: Option<Value>,
) -> Result<Option<Vec<Value>>, ConfigError> {
    let index = list
        .iter()
        .position(|v| v.same_node(child))
        .ok_or_else(|| ConfigError::bug("replace_child did not find the child"))?;
    let mut new: Vec<Value> = Vec::with_capacity(list.len());
    new.extend_from_slice(&list[..index]);
    if let Some(r) = replacement {
        new.push(r);
    }
    new.extend_from_slice(&list[index + 1..]);
    if new.is_empty() {
        Ok(None)
    } else {
        Ok(Some(new))
    }
}

// Structural equality; origins are deliberately not part of it.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if self.same_node(other) {
            return true;
        }
        match (&self.inner.kind, &other.inner.kind) {
            (Kind::Null, Kind::Null) => true,
            (Kind::Bool(a), Kind::Bool(b)) => a == b,
            (Kind::Number(a), Kind::Number(b)) => a == b,
            (Kind::Str { value: a, .. }, Kind::Str { value: b, .. }) => a == b,
            (Kind::Object(a), Kind::Object(b)) => a.fields == b.fields,
            (Kind::List(a), Kind::List(b)) => a.elements == b.elements,
            (
                Kind::Reference {
                    expr: a,
                    prefix_length: pa,
                },
                Kind::Reference {
                    expr: b,
                    prefix_length: pb,
                },
            ) => a == b && pa == pb,
            (Kind::Concat(a), Kind::Concat(b)) => a == b,
            (Kind::DelayedMerge(a), Kind::DelayedMerge(b)) => a == b,
            (Kind::DelayedMergeObject(a), Kind::DelayedMergeObject(b)) => a == b,
            _ => false,
        }
    }
}
