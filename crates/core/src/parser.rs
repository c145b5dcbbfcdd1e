//! Token stream to value tree.
//!
//! All the syntax-level desugaring happens here: adjacent values on one
//! line become concatenations, dotted keys expand into nested objects,
//! duplicate keys merge with the later occurrence primary, `path +=
//! value` expands to `path = ${?path} [value]`, and `include` directives
//! are satisfied eagerly through the [`Includer`] and merged so that
//! directly authored keys stay primary.

use std::collections::BTreeMap;

use crate::concat;
use crate::error::ConfigError;
use crate::include::{IncludeKind, Includer};
use crate::lexer::{self, Spanned, Token};
use crate::origin::Origin;
use crate::path::Path;
use crate::value::{SubstitutionExpression, Value};

/// Parse a document to its (unresolved) root value: an object, or a list
/// for documents whose root is an array.
pub fn parse(
    text: &str,
    description: &str,
    includer: &dyn Includer,
) -> Result<Value, ConfigError> {
    let tokens = lexer::lex(text, description)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        base_origin: Origin::new(description),
        includer,
        path_stack: Vec::new(),
        array_depth: 0,
    };
    parser.parse_root()
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    base_origin: Origin,
    includer: &'a dyn Includer,
    /// Field paths enclosing the value being parsed, outermost first.
    path_stack: Vec<Path>,
    /// How many list values we are inside; `+=` and includes with
    /// substitutions cannot be desugared correctly there.
    array_depth: usize,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn line_origin(&self) -> Origin {
        self.base_origin.with_line(self.cur_line())
    }

    fn err(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::parse(&self.line_origin(), message)
    }

    /// `include` is a directive only when what follows could be an
    /// include target; otherwise it is an ordinary key.
    fn at_include_directive(&self, text: &str) -> bool {
        if text.starts_with("include ") {
            return true;
        }
        text == "include"
            && matches!(
                self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].token,
                Token::Str(_)
            )
    }

    fn full_current_path(&self) -> Option<Path> {
        let mut keys: Vec<String> = Vec::new();
        for p in &self.path_stack {
            keys.extend(p.keys().iter().cloned());
        }
        Path::from_keys(keys).ok()
    }

    // ── Root ────────────────────────────────────────────────────────

    fn parse_root(&mut self) -> Result<Value, ConfigError> {
        loop {
            match self.peek() {
                Token::Newline | Token::Comment(_) => self.advance(),
                _ => break,
            }
        }
        let root = match self.peek() {
            Token::OpenCurly => self.parse_object()?,
            Token::OpenSquare => self.parse_array()?,
            Token::Eof => Value::empty_object(self.base_origin.with_line(1)),
            _ => self.parse_object_body(false)?,
        };
        loop {
            match self.peek() {
                Token::Newline | Token::Comment(_) => self.advance(),
                Token::Eof => return Ok(root),
                other => {
                    return Err(self.err(format!(
                        "unexpected {:?} after the root value",
                        other
                    )))
                }
            }
        }
    }

    // ── Objects ─────────────────────────────────────────────────────

    fn parse_object(&mut self) -> Result<Value, ConfigError> {
        // caller saw '{'
        self.advance();
        self.parse_object_body(true)
    }

    fn parse_object_body(&mut self, braced: bool) -> Result<Value, ConfigError> {
        let object_origin = self.line_origin();
        let mut values: BTreeMap<String, Value> = BTreeMap::new();
        let mut comments: Vec<String> = Vec::new();
        let mut last_was_newline = false;
        loop {
            match self.peek().clone() {
                Token::CloseCurly => {
                    if braced {
                        self.advance();
                        break;
                    }
                    return Err(self.err("unbalanced '}'"));
                }
                Token::Eof => {
                    if braced {
                        return Err(self.err("expected '}' before end of input"));
                    }
                    break;
                }
                Token::Newline => {
                    if last_was_newline {
                        // a blank line detaches pending comments
                        comments.clear();
                    }
                    last_was_newline = true;
                    self.advance();
                }
                Token::Comment(text) => {
                    comments.push(text);
                    last_was_newline = false;
                    self.advance();
                }
                Token::Comma => {
                    last_was_newline = false;
                    self.advance();
                }
                Token::Unquoted(ref s) if self.at_include_directive(s) => {
                    last_was_newline = false;
                    self.parse_include(&mut values)?;
                }
                _ => {
                    last_was_newline = false;
                    self.parse_field(&mut values, &mut comments)?;
                }
            }
        }
        Ok(Value::object(values, object_origin))
    }

    fn parse_field(
        &mut self,
        values: &mut BTreeMap<String, Value>,
        comments: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let path = self.parse_key_path()?;

        let plus_equals = match self.peek() {
            Token::Colon | Token::Equals => {
                self.advance();
                false
            }
            Token::PlusEquals => {
                self.advance();
                true
            }
            // `key { ... }` omits the separator
            Token::OpenCurly => false,
            other => {
                return Err(self.err(format!(
                    "expected ':', '=', or an object for key '{}', got {:?}",
                    path.render(),
                    other
                )))
            }
        };

        if plus_equals && self.array_depth > 0 {
            return Err(self.err(
                "+= does not work nested inside a list; it expands to a ${} substitution \
                 and the path in ${} cannot refer to list elements",
            ));
        }

        self.path_stack.push(path.clone());
        let value_result = if plus_equals {
            // the value ends up inside a list, so nested += / includes
            // must see the restriction
            self.array_depth += 1;
            let r = self.parse_value(comments);
            self.array_depth -= 1;
            r.and_then(|v| self.expand_plus_equals(v))
        } else {
            self.parse_value(comments)
        };
        self.path_stack.pop();
        let mut value = value_result?;

        // a comment on the same line after the value belongs to it
        if let Token::Comment(text) = self.peek().clone() {
            value = value.with_origin(value.origin().append_comments(vec![text]));
            self.advance();
        }

        let key = path.first().to_owned();
        match path.remainder() {
            None => {
                let merged = match values.get(&key) {
                    // duplicate key: the later occurrence is primary
                    Some(existing) => value.with_fallback(existing),
                    None => value,
                };
                values.insert(key, merged);
            }
            Some(remaining) => {
                let mut obj = create_value_under_path(&remaining, value);
                if let Some(existing) = values.get(&key) {
                    obj = obj.with_fallback(existing);
                }
                values.insert(key, obj);
            }
        }
        Ok(())
    }

    /// `path += value` becomes `path = ${?path} [value]`.
    fn expand_plus_equals(&self, value: Value) -> Result<Value, ConfigError> {
        let full_path = self
            .full_current_path()
            .ok_or_else(|| ConfigError::bug("+= outside of any field"))?;
        let previous = Value::reference(
            SubstitutionExpression {
                path: full_path,
                optional: true,
            },
            0,
            value.origin().clone(),
        );
        let appended = Value::list(vec![value.clone()], value.origin().clone());
        concat::concatenate(vec![previous, appended])?
            .ok_or_else(|| ConfigError::bug("+= expansion vanished"))
    }

    // ── Keys ────────────────────────────────────────────────────────

    fn parse_key_path(&mut self) -> Result<Path, ConfigError> {
        let origin = self.line_origin();
        let mut pieces: Vec<(String, bool)> = Vec::new();
        loop {
            match self.peek().clone() {
                Token::Unquoted(s) => pieces.push((s, false)),
                Token::Str(s) => pieces.push((s, true)),
                Token::Int(n) => pieces.push((n.to_string(), false)),
                Token::Float(text) => pieces.push((text, false)),
                Token::Bool(b) => {
                    pieces.push(((if b { "true" } else { "false" }).to_owned(), false))
                }
                Token::Null => pieces.push(("null".to_owned(), false)),
                _ => break,
            }
            self.advance();
        }
        if pieces.is_empty() {
            return Err(self.err(format!("expected a key, got {:?}", self.peek())));
        }
        key_path_from_pieces(pieces, &origin)
    }

    // ── Values ──────────────────────────────────────────────────────

    fn parse_value(&mut self, comments: &mut Vec<String>) -> Result<Value, ConfigError> {
        let mut pieces: Vec<Value> = Vec::new();
        loop {
            let origin = self.line_origin();
            let piece = match self.peek().clone() {
                Token::Int(n) => {
                    self.advance();
                    Value::int(n, origin)
                }
                Token::Float(text) => {
                    self.advance();
                    let f = text.parse::<f64>().map_err(|_| {
                        ConfigError::parse(&origin, format!("invalid number '{}'", text))
                    })?;
                    Value::float(f, origin)
                }
                Token::Bool(b) => {
                    self.advance();
                    Value::bool(b, origin)
                }
                Token::Null => {
                    self.advance();
                    Value::null(origin)
                }
                Token::Str(s) => {
                    self.advance();
                    Value::string(s, origin)
                }
                Token::Unquoted(s) => {
                    self.advance();
                    Value::unquoted_string(s, origin)
                }
                Token::Substitution {
                    expression,
                    optional,
                } => {
                    self.advance();
                    let path = Path::parse(&expression)
                        .map_err(|_| ConfigError::parse(&origin, format!(
                            "invalid substitution path '{}'", expression
                        )))?;
                    Value::reference(SubstitutionExpression { path, optional }, 0, origin)
                }
                Token::OpenCurly => self.parse_object()?,
                Token::OpenSquare => self.parse_array()?,
                _ => break,
            };
            pieces.push(piece);
        }
        if pieces.is_empty() {
            return Err(self.err(format!("expected a value, got {:?}", self.peek())));
        }
        let mut value = concat::concatenate(pieces)?
            .ok_or_else(|| ConfigError::bug("parsed concatenation vanished"))?;
        if !comments.is_empty() {
            value = value.with_origin(
                value
                    .origin()
                    .prepend_comments(std::mem::take(comments)),
            );
        }
        Ok(value)
    }

    fn parse_array(&mut self) -> Result<Value, ConfigError> {
        // caller saw '['
        let array_origin = self.line_origin();
        self.advance();
        self.array_depth += 1;
        let result = self.parse_array_body(array_origin);
        self.array_depth -= 1;
        result
    }

    fn parse_array_body(&mut self, array_origin: Origin) -> Result<Value, ConfigError> {
        let mut elements: Vec<Value> = Vec::new();
        let mut comments: Vec<String> = Vec::new();
        loop {
            match self.peek().clone() {
                Token::CloseSquare => {
                    self.advance();
                    return Ok(Value::list(elements, array_origin));
                }
                Token::Eof => return Err(self.err("expected ']' before end of input")),
                Token::Newline | Token::Comma => self.advance(),
                Token::Comment(text) => {
                    comments.push(text);
                    self.advance();
                }
                _ => {
                    let element = self.parse_value(&mut comments)?;
                    elements.push(element);
                }
            }
        }
    }

    // ── Includes ────────────────────────────────────────────────────

    fn parse_include(
        &mut self,
        values: &mut BTreeMap<String, Value>,
    ) -> Result<(), ConfigError> {
        let directive = match self.peek().clone() {
            Token::Unquoted(s) => {
                self.advance();
                s
            }
            _ => return Err(self.err("expected include directive")),
        };
        let form = directive["include".len()..].trim_start();
        let (required, form) = match form.strip_prefix("required(") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, form),
        };
        let kind = match form {
            "" => IncludeKind::Heuristic,
            "file(" => IncludeKind::File,
            "url(" => IncludeKind::Url,
            "classpath(" => IncludeKind::Classpath,
            other => {
                return Err(self.err(format!("invalid include syntax 'include {}'", other)))
            }
        };
        let name = match self.peek().clone() {
            Token::Str(name) => {
                self.advance();
                name
            }
            other => {
                return Err(self.err(format!(
                    "include requires a quoted name, got {:?}",
                    other
                )))
            }
        };
        let expected_closes =
            usize::from(required) + usize::from(kind != IncludeKind::Heuristic);
        if expected_closes > 0 {
            match self.peek().clone() {
                Token::Unquoted(t) if t.trim() == ")".repeat(expected_closes) => self.advance(),
                other => {
                    return Err(self.err(format!(
                        "expected '{}' to close include, got {:?}",
                        ")".repeat(expected_closes),
                        other
                    )))
                }
            }
        }

        let included = self.includer.include(kind, &name, required)?;
        if included.object_fields().is_none() {
            return Err(self.err(format!(
                "include \"{}\" did not result in an object",
                name
            )));
        }
        // substitutions inside an included file cannot be resolved
        // correctly when the include sits inside a list value; refuse
        // rather than produce a wrong result
        if self.array_depth > 0 && !included.is_resolved() {
            return Err(self.err(
                "an include with ${} substitutions cannot appear inside a list value; \
                 move the include outside the list or remove the substitutions",
            ));
        }
        let included = match self.full_current_path() {
            Some(prefix) => included.relativized(&prefix),
            None => included,
        };
        let fields = included
            .object_fields()
            .ok_or_else(|| ConfigError::bug("relativize changed the value kind"))?;
        for (key, v) in fields {
            let merged = match values.get(key) {
                // directly authored keys stay primary; included keys
                // only fill gaps
                Some(existing) => existing.with_fallback(v),
                None => v.clone(),
            };
            values.insert(key.clone(), merged);
        }
        Ok(())
    }
}

/// For `a.b.c : v`, build `{ b : { c : v } }` (the caller owns `a`).
/// Comments stay on the leaf value only.
fn create_value_under_path(path: &Path, value: Value) -> Value {
    let origin = value.origin().with_comments(Vec::new());
    let mut keys = path.keys().to_vec();
    let mut current = value;
    while let Some(key) = keys.pop() {
        let mut fields = BTreeMap::new();
        fields.insert(key, current);
        current = Value::object(fields, origin.clone());
    }
    current
}

fn key_path_from_pieces(
    pieces: Vec<(String, bool)>,
    origin: &Origin,
) -> Result<Path, ConfigError> {
    let mut keys: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut buf_used = false;
    for (text, quoted) in pieces {
        if quoted {
            buf.push_str(&text);
            buf_used = true;
        } else {
            for (i, part) in text.split('.').enumerate() {
                if i > 0 {
                    if !buf_used {
                        return Err(ConfigError::parse(origin, "key has an empty path segment"));
                    }
                    keys.push(std::mem::take(&mut buf));
                    buf_used = false;
                }
                let part = part.trim();
                if !part.is_empty() {
                    buf.push_str(part);
                    buf_used = true;
                }
            }
        }
    }
    if !buf_used {
        return Err(ConfigError::parse(
            origin,
            "key ends with a '.' or is empty",
        ));
    }
    keys.push(buf);
    Path::from_keys(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::{MemoryIncluder, NullIncluder};
    use crate::value::Kind;

    fn parse_str(text: &str) -> Value {
        parse(text, "test", &NullIncluder).unwrap()
    }

    fn field<'v>(root: &'v Value, key: &str) -> &'v Value {
        &root.object_fields().unwrap()[key]
    }

    #[test]
    fn simple_fields() {
        let root = parse_str("a = 1\nb : \"two\"\nc = true\nd = null");
        assert_eq!(field(&root, "a").as_int(), Some(1));
        assert_eq!(field(&root, "b").as_str(), Some("two"));
        assert_eq!(field(&root, "c").as_bool(), Some(true));
        assert!(field(&root, "d").is_null());
    }

    #[test]
    fn braced_and_unbraced_roots_agree() {
        let a = parse_str("x = 1");
        let b = parse_str("{ x = 1 }");
        assert_eq!(a, b);
    }

    #[test]
    fn dotted_keys_expand() {
        let root = parse_str("a.b.c = 5");
        let a = field(&root, "a");
        let b = &a.object_fields().unwrap()["b"];
        assert_eq!(b.object_fields().unwrap()["c"].as_int(), Some(5));
    }

    #[test]
    fn duplicate_keys_merge_later_wins() {
        let root = parse_str("a = { x = 1, y = 1 }\na = { x = 2 }");
        let a = field(&root, "a");
        assert_eq!(a.object_fields().unwrap()["x"].as_int(), Some(2));
        assert_eq!(a.object_fields().unwrap()["y"].as_int(), Some(1));
    }

    #[test]
    fn duplicate_scalar_keys_replace() {
        let root = parse_str("a = 1\na = 2");
        assert_eq!(field(&root, "a").as_int(), Some(2));
    }

    #[test]
    fn object_without_separator() {
        let root = parse_str("server { port = 80 }");
        assert_eq!(
            field(&root, "server").object_fields().unwrap()["port"].as_int(),
            Some(80)
        );
    }

    #[test]
    fn arrays_with_newline_and_comma_separators() {
        let root = parse_str("xs = [1, 2\n3]");
        let xs = field(&root, "xs").list_elements().unwrap();
        assert_eq!(xs.len(), 3);
        assert_eq!(xs[2].as_int(), Some(3));
    }

    #[test]
    fn root_array_documents() {
        let root = parse("[1, 2]", "test", &NullIncluder).unwrap();
        assert_eq!(root.list_elements().unwrap().len(), 2);
    }

    #[test]
    fn adjacent_strings_concatenate_at_parse_time() {
        let root = parse_str("x = abc \"def\"");
        assert_eq!(field(&root, "x").as_str(), Some("abcdef"));
    }

    #[test]
    fn substitution_keeps_concatenation() {
        let root = parse_str("x = abc ${y}");
        assert!(matches!(field(&root, "x").kind(), Kind::Concat(_)));
    }

    #[test]
    fn object_values_merge_at_parse_time() {
        let root = parse_str("x = { a = 1 } { b = 2 }");
        let x = field(&root, "x").object_fields().unwrap();
        assert_eq!(x["a"].as_int(), Some(1));
        assert_eq!(x["b"].as_int(), Some(2));
    }

    #[test]
    fn plus_equals_desugars_to_self_reference() {
        let root = parse_str("xs += 1");
        match field(&root, "xs").kind() {
            Kind::Concat(pieces) => {
                assert_eq!(pieces.len(), 2);
                match pieces[0].kind() {
                    Kind::Reference { expr, .. } => {
                        assert!(expr.optional);
                        assert_eq!(expr.path.render(), "xs");
                    }
                    other => panic!("expected reference, got {:?}", other),
                }
                assert_eq!(pieces[1].list_elements().unwrap().len(), 1);
            }
            other => panic!("expected concatenation, got {:?}", other),
        }
    }

    #[test]
    fn plus_equals_rejected_inside_lists() {
        let err = parse("xs = [ { ys += 1 } ]", "test", &NullIncluder).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn include_fills_gaps_only() {
        let includer = MemoryIncluder::new().with("base", "a = from-include\nb = 2");
        let root = parse("a = authored\ninclude \"base\"", "test", &includer).unwrap();
        assert_eq!(field(&root, "a").as_str(), Some("authored"));
        assert_eq!(field(&root, "b").as_int(), Some(2));
    }

    #[test]
    fn include_relativizes_substitutions() {
        let includer = MemoryIncluder::new().with("inner", "r = ${target}");
        let root = parse("outer { include \"inner\"\ntarget = 9 }", "test", &includer).unwrap();
        let r = &field(&root, "outer").object_fields().unwrap()["r"];
        match r.kind() {
            Kind::Reference { expr, .. } => assert_eq!(expr.path.render(), "outer.target"),
            other => panic!("expected reference, got {:?}", other),
        }
    }

    #[test]
    fn missing_optional_include_is_empty() {
        let root = parse("include \"nope\"\na = 1", "test", &MemoryIncluder::new()).unwrap();
        assert_eq!(field(&root, "a").as_int(), Some(1));
    }

    #[test]
    fn missing_required_include_is_an_error() {
        let err = parse(
            "include required(\"nope\")",
            "test",
            &MemoryIncluder::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Include { .. }));
    }

    #[test]
    fn include_with_substitutions_rejected_inside_lists() {
        let includer = MemoryIncluder::new().with("inner", "r = ${x}");
        let err = parse("xs = [ { include \"inner\" } ]", "test", &includer).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn comments_attach_to_the_following_value() {
        let root = parse_str("# what a\n# value\na = 1");
        assert_eq!(field(&root, "a").origin().comments(), ["what a", "value"]);
    }

    #[test]
    fn blank_line_detaches_comments() {
        let root = parse_str("# stale\n\na = 1");
        assert!(field(&root, "a").origin().comments().is_empty());
    }

    #[test]
    fn quoted_keys_keep_dots() {
        let root = parse_str("\"a.b\" = 1");
        assert!(root.object_fields().unwrap().contains_key("a.b"));
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = parse("a = 1\nb = = 2", "test", &NullIncluder).unwrap_err();
        match err {
            ConfigError::Parse { origin, .. } => assert_eq!(origin.line(), Some(2)),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn unbalanced_braces_error() {
        assert!(parse("a = { b = 1", "test", &NullIncluder).is_err());
        assert!(parse("a = [1", "test", &NullIncluder).is_err());
    }
}
