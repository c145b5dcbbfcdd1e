//! The substitution resolver.
//!
//! Walks an unresolved value tree and produces a resolved one, without
//! ever mutating the input: every rewritten node is fresh, untouched
//! subtrees are shared. Resolution is driven by two pieces of state:
//!
//! - a [`ResolveContext`], owning the per-call memo table, the set of
//!   in-flight cycle markers, the current restriction path, and a depth
//!   guard;
//! - a [`ResolveSource`], the document root plus the chain of enclosing
//!   containers, which is what substitution lookups search and what lets
//!   a merge stack virtually replace itself with only its lower-priority
//!   remainder while one of its entries resolves (the "look only
//!   backward" rule for self-referential merges).
//!
//! "Not possible to resolve" (a re-entered cycle marker) travels as an
//! explicit `Cycle` result, never as unwinding. References are the
//! firewall: they convert a cycle into either a missing value (for
//! `${?}`) or an unresolved-substitution error carrying the trace.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::trace;

use crate::concat;
use crate::error::ConfigError;
use crate::origin::Origin;
use crate::path::Path;
use crate::value::{Kind, ObjectData, SubstitutionExpression, Value};

/// Recursion limit; pathological substitution chains fail with an error
/// rather than exhausting the call stack.
const MAX_RESOLVE_DEPTH: usize = 600;

// ──────────────────────────────────────────────
// Options and the external fallback
// ──────────────────────────────────────────────

/// External fallback lookup, consulted only for paths not found in the
/// document itself.
pub trait Resolver {
    /// `path` is the substitution path as written, rendered to dotted
    /// form.
    fn lookup(&self, path: &str) -> Option<Value>;
}

/// Fallback to process environment variables, keyed by the rendered
/// path.
pub struct EnvResolver;

impl Resolver for EnvResolver {
    fn lookup(&self, path: &str) -> Option<Value> {
        std::env::var(path).ok().map(|v| {
            Value::string(
                v,
                Origin::new(format!("env variable '{}'", path)),
            )
        })
    }
}

#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Return partially-unresolved nodes instead of erroring on
    /// substitutions that cannot be resolved. Cycles still error.
    pub allow_unresolved: bool,
    /// Resolve only this sub-path of the document; everything off the
    /// path is returned as-is.
    pub restrict_to_path: Option<Path>,
    /// External fallback lookup.
    pub resolver: Option<Rc<dyn Resolver>>,
}

impl ResolveOptions {
    pub fn new() -> ResolveOptions {
        ResolveOptions::default()
    }

    pub fn allow_unresolved(mut self, allow: bool) -> ResolveOptions {
        self.allow_unresolved = allow;
        self
    }

    pub fn restrict_to_path(mut self, path: Path) -> ResolveOptions {
        self.restrict_to_path = Some(path);
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn Resolver>) -> ResolveOptions {
        self.resolver = Some(resolver);
        self
    }
}

// ──────────────────────────────────────────────
// Internal result plumbing
// ──────────────────────────────────────────────

/// Resolution failure. `Cycle` is the non-local "not possible to
/// resolve" signal; it never escapes a reference node.
#[derive(Debug)]
enum ResolveError {
    Cycle(Vec<String>),
    Fatal(ConfigError),
}

impl From<ConfigError> for ResolveError {
    fn from(e: ConfigError) -> ResolveError {
        ResolveError::Fatal(e)
    }
}

/// `Ok(None)` is the "missing" outcome: an optional substitution that
/// found nothing, absorbed by the enclosing object/list/concatenation.
type Resolved = Result<Option<Value>, ResolveError>;

struct MemoKey {
    node: Value,
    restrict: Option<Path>,
}

impl PartialEq for MemoKey {
    fn eq(&self, other: &MemoKey) -> bool {
        self.node.same_node(&other.node) && self.restrict == other.restrict
    }
}

impl Eq for MemoKey {}

impl Hash for MemoKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.ptr_id().hash(state);
        self.restrict.hash(state);
    }
}

// ──────────────────────────────────────────────
// Resolve source
// ──────────────────────────────────────────────

/// Where substitutions look things up: the true document root plus the
/// chain of containers enclosing the node currently being resolved,
/// nearest first.
#[derive(Clone)]
pub(crate) struct ResolveSource {
    root: Value,
    path_from_root: Vec<Value>,
}

impl ResolveSource {
    pub(crate) fn new(root: Value) -> ResolveSource {
        ResolveSource {
            root,
            path_from_root: Vec::new(),
        }
    }

    fn rooted_at_chain(chain: Vec<Value>) -> Result<ResolveSource, ResolveError> {
        let root = chain
            .last()
            .cloned()
            .ok_or_else(|| ConfigError::bug("substitution lookup produced an empty chain"))?;
        Ok(ResolveSource {
            root,
            path_from_root: chain,
        })
    }

    fn push_parent(&self, parent: &Value) -> ResolveSource {
        let mut path_from_root = Vec::with_capacity(self.path_from_root.len() + 1);
        path_from_root.push(parent.clone());
        path_from_root.extend(self.path_from_root.iter().cloned());
        ResolveSource {
            root: self.root.clone(),
            path_from_root,
        }
    }

    /// Forget the ancestor chain; used after a merge stack has replaced
    /// itself, because the entry resolves against a root that no longer
    /// contains it.
    fn reset_parents(&self) -> ResolveSource {
        ResolveSource::new(self.root.clone())
    }

    /// Rebuild the ancestor chain bottom-up with `old` (a child of the
    /// nearest parent) swapped for `replacement`, yielding a source whose
    /// root has the replacement grafted in. `None` deletes the child.
    fn replace_within_current_parent(
        &self,
        old: &Value,
        replacement: Option<Value>,
    ) -> Result<ResolveSource, ResolveError> {
        if let Some(r) = &replacement {
            if old.same_node(r) {
                return Ok(self.clone());
            }
        }
        if self.path_from_root.is_empty() {
            return if old.same_node(&self.root) {
                match replacement {
                    Some(r) if r.is_container() => Ok(ResolveSource::new(r)),
                    _ => Err(ConfigError::bug(
                        "attempt to replace the root with a non-container",
                    )
                    .into()),
                }
            } else {
                Err(ConfigError::bug(
                    "replace_within_current_parent with no parents and old is not the root",
                )
                .into())
            };
        }
        let mut rebuilt: Vec<Value> = Vec::with_capacity(self.path_from_root.len());
        let mut current_old = old.clone();
        let mut current_new = replacement;
        for parent in &self.path_from_root {
            // the ancestor chain skips list values, so a merge stack
            // living inside a list element cannot be grafted back to the
            // root; resolving against the unmodified root is sound there
            // because substitution paths cannot address into lists
            if !parent.has_child(&current_old) {
                return Ok(self.reset_parents());
            }
            let new_parent = parent.replace_child(&current_old, current_new.clone())?;
            if let Some(p) = &new_parent {
                if p.is_container() {
                    rebuilt.push(p.clone());
                }
            }
            current_old = parent.clone();
            current_new = new_parent;
        }
        match current_new {
            Some(new_root) => Ok(ResolveSource {
                root: new_root,
                path_from_root: rebuilt,
            }),
            None => Ok(ResolveSource::new(Value::empty_object(Origin::new(
                "empty config",
            )))),
        }
    }

    /// Look up a substitution: first the full (possibly relativized)
    /// path, then the path as originally written relative to the root.
    /// Returns the raw value found (unresolved) and the chain of objects
    /// walked through, nearest first, ending at the root.
    fn lookup_subst(
        &self,
        ctx: &mut ResolveContext<'_>,
        expr: &SubstitutionExpression,
        prefix_length: usize,
    ) -> Result<(Option<Value>, Vec<Value>), ResolveError> {
        trace!(path = %expr.path.render(), "looking up substitution");
        let (mut value, mut chain) = Self::find_in_object(&self.root, ctx, &expr.path)?;
        if value.is_none() && prefix_length != 0 {
            if let Some(unprefixed) = expr.path.sub_path(prefix_length) {
                let found = Self::find_in_object(&self.root, ctx, &unprefixed)?;
                value = found.0;
                chain = found.1;
            }
        }
        Ok((value, chain))
    }

    /// Resolve just enough of `obj` to traverse `path`, then walk it with
    /// raw peeks.
    fn find_in_object(
        obj: &Value,
        ctx: &mut ResolveContext<'_>,
        path: &Path,
    ) -> Result<(Option<Value>, Vec<Value>), ResolveError> {
        let saved = std::mem::replace(&mut ctx.restrict, Some(path.clone()));
        let partially_resolved = ctx.resolve(obj, &ResolveSource::new(obj.clone()));
        ctx.restrict = saved;
        let partially_resolved = partially_resolved?.ok_or_else(|| {
            ResolveError::from(ConfigError::bug("an object cannot resolve to missing"))
        })?;
        Self::find_in_object_raw(&partially_resolved, path, Vec::new())
    }

    fn find_in_object_raw(
        obj: &Value,
        path: &Path,
        parents: Vec<Value>,
    ) -> Result<(Option<Value>, Vec<Value>), ResolveError> {
        let v = obj.attempt_peek_with_partial_resolve(path.first())?;
        let mut parents = parents;
        parents.insert(0, obj.clone());
        match path.remainder() {
            None => Ok((v, parents)),
            Some(next) => match v {
                Some(child) if child.is_object_like() => {
                    Self::find_in_object_raw(&child, &next, parents)
                }
                _ => Ok((None, parents)),
            },
        }
    }
}

// ──────────────────────────────────────────────
// Resolve context
// ──────────────────────────────────────────────

pub(crate) struct ResolveContext<'a> {
    options: &'a ResolveOptions,
    restrict: Option<Path>,
    memos: HashMap<MemoKey, Option<Value>>,
    cycle_markers: Vec<Value>,
    depth: usize,
}

impl<'a> ResolveContext<'a> {
    fn new(options: &'a ResolveOptions, restrict: Option<Path>) -> ResolveContext<'a> {
        ResolveContext {
            options,
            restrict,
            memos: HashMap::new(),
            cycle_markers: Vec::new(),
            depth: 0,
        }
    }

    /// Memoized resolution of one node under the current restriction.
    fn resolve(&mut self, value: &Value, source: &ResolveSource) -> Resolved {
        let full_key = MemoKey {
            node: value.clone(),
            restrict: None,
        };
        if let Some(hit) = self.memos.get(&full_key) {
            return Ok(hit.clone());
        }
        let restricted_key = self.restrict.as_ref().map(|r| MemoKey {
            node: value.clone(),
            restrict: Some(r.clone()),
        });
        if let Some(key) = &restricted_key {
            if let Some(hit) = self.memos.get(key) {
                return Ok(hit.clone());
            }
        }

        if self.depth >= MAX_RESOLVE_DEPTH {
            return Err(ConfigError::unresolved(
                value.origin(),
                "substitution chain is too deep (possible runaway recursion)",
            )
            .into());
        }
        self.depth += 1;
        let result = self.resolve_inner(value, source);
        self.depth -= 1;
        let resolved = result?;

        let fully_resolved = resolved.as_ref().map(Value::is_resolved).unwrap_or(true);
        if fully_resolved {
            // resolving only the restricted child turned out to resolve
            // everything, so the result holds for unrestricted use too
            self.memos.insert(full_key, resolved.clone());
        } else if let Some(key) = restricted_key {
            self.memos.insert(key, resolved.clone());
        } else if self.options.allow_unresolved {
            self.memos.insert(full_key, resolved.clone());
        } else {
            return Err(ConfigError::bug(
                "resolver produced an unresolved value without restriction or allow_unresolved",
            )
            .into());
        }
        Ok(resolved)
    }

    fn resolve_inner(&mut self, value: &Value, source: &ResolveSource) -> Resolved {
        match value.kind() {
            Kind::Null | Kind::Bool(_) | Kind::Number(_) | Kind::Str { .. } => {
                Ok(Some(value.clone()))
            }
            Kind::Object(data) => self.resolve_object(value, data, source),
            Kind::List(_) => self.resolve_list(value, source),
            Kind::Concat(_) => self.resolve_concat(value, source),
            Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => {
                self.resolve_delayed_merge(value, stack, source)
            }
            Kind::Reference {
                expr,
                prefix_length,
            } => self.resolve_reference(value, expr, *prefix_length, source),
        }
    }

    fn resolve_object(
        &mut self,
        value: &Value,
        data: &ObjectData,
        source: &ResolveSource,
    ) -> Resolved {
        if data.resolved {
            return Ok(Some(value.clone()));
        }
        let source_with_parent = source.push_parent(value);
        let original_restrict = self.restrict.clone();
        let mut fields = std::collections::BTreeMap::new();
        let mut changed = false;
        for (key, child) in &data.fields {
            let outcome = match &original_restrict {
                Some(restrict) if key.as_str() == restrict.first() => match restrict.remainder() {
                    Some(remainder) => {
                        self.restrict = Some(remainder);
                        let r = self.resolve(child, &source_with_parent);
                        self.restrict = original_restrict.clone();
                        r
                    }
                    // the restricted leaf is peeked, not resolved, here;
                    // whoever looked it up resolves it against its own
                    // ancestor chain
                    None => Ok(Some(child.clone())),
                },
                Some(_) => Ok(Some(child.clone())),
                None => self.resolve(child, &source_with_parent),
            };
            match outcome {
                Ok(Some(new_child)) => {
                    if !new_child.same_node(child) {
                        changed = true;
                    }
                    fields.insert(key.clone(), new_child);
                }
                Ok(None) => {
                    // an optional substitution went missing; drop the key
                    changed = true;
                }
                Err(e) => {
                    self.restrict = original_restrict;
                    return Err(e);
                }
            }
        }
        if !changed {
            return Ok(Some(value.clone()));
        }
        let resolved = fields.values().all(Value::is_resolved);
        Ok(Some(Value::object_raw(
            fields,
            resolved,
            data.ignores_fallbacks,
            value.origin().clone(),
        )))
    }

    fn resolve_list(&mut self, value: &Value, source: &ResolveSource) -> Resolved {
        if value.is_resolved() {
            return Ok(Some(value.clone()));
        }
        // list elements are not addressable by a restriction path, so a
        // restricted resolve has nothing to do here
        if self.restrict.is_some() {
            return Ok(Some(value.clone()));
        }
        let elements = match value.kind() {
            Kind::List(data) => &data.elements,
            _ => return Err(ConfigError::bug("resolve_list on a non-list").into()),
        };
        let mut resolved_elements = Vec::with_capacity(elements.len());
        let mut changed = false;
        for element in elements {
            match self.resolve(element, source)? {
                Some(new_element) => {
                    if !new_element.same_node(element) {
                        changed = true;
                    }
                    resolved_elements.push(new_element);
                }
                None => changed = true,
            }
        }
        if !changed {
            return Ok(Some(value.clone()));
        }
        Ok(Some(Value::list(
            resolved_elements,
            value.origin().clone(),
        )))
    }

    fn resolve_concat(&mut self, value: &Value, source: &ResolveSource) -> Resolved {
        let pieces = match value.kind() {
            Kind::Concat(pieces) => pieces.clone(),
            _ => return Err(ConfigError::bug("resolve_concat on a non-concatenation").into()),
        };
        trace!(pieces = pieces.len(), "resolving concatenation");
        // concatenation needs full values to fold, so pieces resolve
        // unrestricted no matter what the outer restriction was
        let saved_restrict = self.restrict.take();
        let mut resolved_pieces = Vec::with_capacity(pieces.len());
        let mut failed = None;
        for piece in &pieces {
            match self.resolve(piece, source) {
                Ok(Some(v)) => resolved_pieces.push(v),
                Ok(None) => {}
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }
        self.restrict = saved_restrict;
        if let Some(e) = failed {
            return Err(e);
        }
        let joined = concat::consolidate(resolved_pieces)?;
        if joined.len() > 1 && self.options.allow_unresolved {
            Ok(Some(Value::concat_node(joined, value.origin().clone())))
        } else if joined.is_empty() {
            // just a list of optional references that went missing
            Ok(None)
        } else if joined.len() == 1 {
            Ok(Some(joined.into_iter().next().unwrap()))
        } else {
            Err(ConfigError::bug(
                "concatenation resolved to multiple values without allow_unresolved",
            )
            .into())
        }
    }

    fn resolve_delayed_merge(
        &mut self,
        value: &Value,
        stack: &[Value],
        source: &ResolveSource,
    ) -> Resolved {
        if stack.is_empty() {
            return Err(ConfigError::bug("empty delayed merge stack").into());
        }
        trace!(entries = stack.len(), "resolving delayed merge");
        let mut merged: Option<Value> = None;
        for (index, end) in stack.iter().enumerate() {
            if end.is_merge_stack() {
                return Err(ConfigError::bug(
                    "a delayed merge should not contain another one",
                )
                .into());
            }
            let source_for_end = if end.is_unmergeable() {
                // while resolving this entry, the merge node is replaced
                // by only the remaining lower-priority entries, so a
                // self-referential substitution sees strictly older
                // definitions and never itself
                let remainder = make_replacement(stack, index + 1);
                source
                    .replace_within_current_parent(value, remainder)?
                    .reset_parents()
            } else {
                source.push_parent(value)
            };
            if let Some(resolved_end) = self.resolve(end, &source_for_end)? {
                merged = Some(match merged {
                    None => resolved_end,
                    Some(m) => m.with_fallback(&resolved_end),
                });
            }
            if merged
                .as_ref()
                .map(Value::ignores_fallbacks)
                .unwrap_or(false)
            {
                // nothing lower in the stack can change the result
                break;
            }
        }
        Ok(merged)
    }

    fn resolve_reference(
        &mut self,
        value: &Value,
        expr: &SubstitutionExpression,
        prefix_length: usize,
        source: &ResolveSource,
    ) -> Resolved {
        self.push_cycle_marker(value)?;
        let outcome = self.resolve_reference_body(expr, prefix_length, source);
        let outcome = match outcome {
            Err(ResolveError::Cycle(cycle_trace)) => {
                trace!(substitution = %expr, "substitution cycle detected");
                if expr.optional {
                    Ok(None)
                } else {
                    self.pop_cycle_marker(value);
                    return Err(ConfigError::unresolved(
                        value.origin(),
                        format!(
                            "{} was part of a cycle of substitutions involving {}",
                            expr,
                            cycle_trace.join(", ")
                        ),
                    )
                    .into());
                }
            }
            other => other,
        };
        let result = match outcome {
            Ok(None) if !expr.optional => {
                if self.options.allow_unresolved {
                    Ok(Some(value.clone()))
                } else {
                    Err(ConfigError::unresolved(
                        value.origin(),
                        format!("could not resolve substitution to a value: {}", expr),
                    )
                    .into())
                }
            }
            other => other,
        };
        self.pop_cycle_marker(value);
        result
    }

    fn resolve_reference_body(
        &mut self,
        expr: &SubstitutionExpression,
        prefix_length: usize,
        source: &ResolveSource,
    ) -> Resolved {
        let (found, chain) = source.lookup_subst(self, expr, prefix_length)?;
        match found {
            Some(found_value) => {
                trace!(path = %expr.path.render(), "recursively resolving substitution target");
                let recursive_source = ResolveSource::rooted_at_chain(chain)?;
                self.resolve(&found_value, &recursive_source)
            }
            None => {
                let as_written = expr.path.sub_path(prefix_length).ok_or_else(|| {
                    ConfigError::bug("relativization prefix swallowed the whole path")
                })?;
                Ok(self
                    .options
                    .resolver
                    .as_ref()
                    .and_then(|r| r.lookup(&as_written.render())))
            }
        }
    }

    fn push_cycle_marker(&mut self, value: &Value) -> Result<(), ResolveError> {
        if self.cycle_markers.iter().any(|m| m.same_node(value)) {
            let trace: Vec<String> = self
                .cycle_markers
                .iter()
                .filter_map(|m| match m.kind() {
                    Kind::Reference { expr, .. } => Some(expr.to_string()),
                    _ => None,
                })
                .collect();
            Err(ResolveError::Cycle(trace))
        } else {
            self.cycle_markers.push(value.clone());
            Ok(())
        }
    }

    fn pop_cycle_marker(&mut self, value: &Value) {
        if let Some(pos) = self
            .cycle_markers
            .iter()
            .rposition(|m| m.same_node(value))
        {
            self.cycle_markers.remove(pos);
        }
    }
}

/// The value standing in for the skipped part of a merge stack: the
/// remaining entries folded together, or `None` when nothing remains.
fn make_replacement(stack: &[Value], skipping: usize) -> Option<Value> {
    let remainder = &stack[skipping.min(stack.len())..];
    let mut merged: Option<Value> = None;
    for v in remainder {
        merged = Some(match merged {
            None => v.clone(),
            Some(m) => m.with_fallback(v),
        });
    }
    merged
}

// ──────────────────────────────────────────────
// Entry points
// ──────────────────────────────────────────────

/// Resolve a document root. With `restrict_to_path` set, only that
/// sub-path is materialized and the rest of the tree is returned as-is.
pub fn resolve(root: &Value, options: &ResolveOptions) -> Result<Value, ConfigError> {
    let mut ctx = ResolveContext::new(options, options.restrict_to_path.clone());
    let source = ResolveSource::new(root.clone());
    match ctx.resolve(root, &source) {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(ConfigError::bug("root value resolved to missing")),
        Err(ResolveError::Fatal(e)) => Err(e),
        Err(ResolveError::Cycle(trace)) => Err(ConfigError::bug(format!(
            "cycle escaped the reference firewall: {}",
            trace.join(", ")
        ))),
    }
}

/// Lazily resolve a single path: materialize just enough of the document
/// to find the value, then fully resolve that value against its true
/// ancestor chain. `None` when the path is absent or optional-missing.
pub fn resolve_path(
    root: &Value,
    path: &Path,
    options: &ResolveOptions,
) -> Result<Option<Value>, ConfigError> {
    let mut ctx = ResolveContext::new(options, None);
    let lookup = ResolveSource::find_in_object(root, &mut ctx, path);
    let (found, chain) = match lookup {
        Ok(r) => r,
        Err(ResolveError::Fatal(e)) => return Err(e),
        Err(ResolveError::Cycle(trace)) => {
            return Err(ConfigError::bug(format!(
                "cycle escaped the reference firewall: {}",
                trace.join(", ")
            )))
        }
    };
    let found_value = match found {
        Some(v) => v,
        None => return Ok(None),
    };
    let source = match ResolveSource::rooted_at_chain(chain) {
        Ok(s) => s,
        Err(ResolveError::Fatal(e)) => return Err(e),
        Err(ResolveError::Cycle(_)) => return Err(ConfigError::bug("unexpected cycle")),
    };
    match ctx.resolve(&found_value, &source) {
        Ok(v) => Ok(v),
        Err(ResolveError::Fatal(e)) => Err(e),
        Err(ResolveError::Cycle(trace)) => Err(ConfigError::bug(format!(
            "cycle escaped the reference firewall: {}",
            trace.join(", ")
        ))),
    }
}
