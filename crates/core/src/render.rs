//! Rendering value trees back to text.
//!
//! Works on resolved and unresolved trees alike: substitutions render as
//! `${path}`, concatenations as their juxtaposed pieces, and a merge
//! stack at a key renders as that key repeated, lowest priority first,
//! which re-parses to the same merge. Resolved trees render to valid
//! JSON when `json` is set.

use crate::error::ConfigError;
use crate::value::{Kind, Number, Value};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Emit strict JSON (only meaningful for resolved trees).
    pub json: bool,
    /// Newlines and indentation instead of a single line.
    pub formatted: bool,
    /// Emit origin comments before fields (non-JSON only).
    pub comments: bool,
}

impl RenderOptions {
    pub fn hocon() -> RenderOptions {
        RenderOptions {
            json: false,
            formatted: true,
            comments: false,
        }
    }

    pub fn json() -> RenderOptions {
        RenderOptions {
            json: true,
            formatted: true,
            comments: false,
        }
    }

    pub fn concise() -> RenderOptions {
        RenderOptions {
            json: false,
            formatted: false,
            comments: false,
        }
    }

    pub fn with_comments(mut self, comments: bool) -> RenderOptions {
        self.comments = comments;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> RenderOptions {
        RenderOptions::hocon()
    }
}

pub fn render(value: &Value, options: &RenderOptions) -> String {
    let mut out = String::new();
    render_value(&mut out, value, 0, options);
    out
}

fn indent(out: &mut String, levels: usize, options: &RenderOptions) {
    if options.formatted {
        for _ in 0..levels {
            out.push_str("    ");
        }
    }
}

fn render_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn key_is_safe_unquoted(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        && !matches!(key, "true" | "false" | "null" | "include")
}

fn render_key(out: &mut String, key: &str, options: &RenderOptions) {
    if options.json || !key_is_safe_unquoted(key) {
        render_json_string(out, key);
    } else {
        out.push_str(key);
    }
}

fn render_value(out: &mut String, value: &Value, depth: usize, options: &RenderOptions) {
    match value.kind() {
        Kind::Null => out.push_str("null"),
        Kind::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Kind::Number(Number::Int(n)) => out.push_str(&n.to_string()),
        Kind::Number(Number::Float(f)) => out.push_str(&f.to_string()),
        Kind::Str { value: s, .. } => render_json_string(out, s),
        Kind::List(data) => {
            if data.elements.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, element) in data.elements.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                    if options.formatted {
                        out.push(' ');
                    }
                }
                render_value(out, element, depth, options);
            }
            out.push(']');
        }
        Kind::Object(data) => {
            if data.fields.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push('{');
            if options.formatted {
                out.push('\n');
            }
            let last = data.fields.len() - 1;
            for (i, (key, child)) in data.fields.iter().enumerate() {
                render_field(out, key, child, depth + 1, i == last, options);
            }
            indent(out, depth, options);
            out.push('}');
        }
        Kind::Reference { expr, .. } => out.push_str(&expr.to_string()),
        Kind::Concat(pieces) => {
            for piece in pieces {
                render_value(out, piece, depth, options);
            }
        }
        Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) => {
            // keyless position; lowest priority first so re-parsing merges
            // back in the same order
            for (i, entry) in stack.iter().rev().enumerate() {
                if i > 0 {
                    out.push(',');
                    if options.formatted {
                        out.push(' ');
                    }
                }
                render_value(out, entry, depth, options);
            }
        }
    }
}

fn render_field(
    out: &mut String,
    key: &str,
    value: &Value,
    depth: usize,
    is_last: bool,
    options: &RenderOptions,
) {
    // a merge stack renders as the key repeated, lowest priority first,
    // so later occurrences win on re-parse
    if let Kind::DelayedMerge(stack) | Kind::DelayedMergeObject(stack) = value.kind() {
        let last = stack.len() - 1;
        for (i, entry) in stack.iter().rev().enumerate() {
            render_single_field(out, key, entry, depth, is_last && i == last, options);
        }
        return;
    }
    render_single_field(out, key, value, depth, is_last, options);
}

fn render_single_field(
    out: &mut String,
    key: &str,
    value: &Value,
    depth: usize,
    is_last: bool,
    options: &RenderOptions,
) {
    if options.comments && !options.json {
        for comment in value.origin().comments() {
            indent(out, depth, options);
            out.push_str("# ");
            out.push_str(comment);
            out.push('\n');
        }
    }
    indent(out, depth, options);
    render_key(out, key, options);
    if options.formatted {
        out.push_str(" : ");
    } else {
        out.push(':');
    }
    render_value(out, value, depth, options);
    if !is_last {
        out.push(',');
    }
    if options.formatted {
        out.push('\n');
    }
}

/// Convert a fully resolved tree to JSON. Unresolved nodes are a
/// `NotResolved` error.
pub fn to_json(value: &Value) -> Result<serde_json::Value, ConfigError> {
    match value.kind() {
        Kind::Null => Ok(serde_json::Value::Null),
        Kind::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Kind::Number(Number::Int(n)) => Ok(serde_json::Value::from(*n)),
        Kind::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                ConfigError::wrong_type(value.origin(), "number has no JSON representation")
            }),
        Kind::Str { value: s, .. } => Ok(serde_json::Value::String(s.clone())),
        Kind::Object(data) => {
            let mut map = serde_json::Map::new();
            for (key, child) in &data.fields {
                map.insert(key.clone(), to_json(child)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        Kind::List(data) => {
            let mut elements = Vec::with_capacity(data.elements.len());
            for element in &data.elements {
                elements.push(to_json(element)?);
            }
            Ok(serde_json::Value::Array(elements))
        }
        _ => Err(ConfigError::not_resolved(
            "cannot convert an unresolved value to JSON",
        )),
    }
}
