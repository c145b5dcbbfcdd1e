//! Dotted key paths.
//!
//! A [`Path`] is a non-empty ordered sequence of string keys, used for
//! substitution expressions, restricted resolution, and facade lookups.
//! Paths render back to dotted form, quoting any key that would not
//! survive re-parsing.

use crate::error::ConfigError;
use crate::origin::Origin;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    keys: Vec<String>,
}

impl Path {
    pub fn new_key(key: impl Into<String>) -> Path {
        Path {
            keys: vec![key.into()],
        }
    }

    /// `keys` must be non-empty.
    pub fn from_keys(keys: Vec<String>) -> Result<Path, ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::bug("tried to create an empty path"));
        }
        Ok(Path { keys })
    }

    pub fn first(&self) -> &str {
        &self.keys[0]
    }

    pub fn remainder(&self) -> Option<Path> {
        if self.keys.len() <= 1 {
            None
        } else {
            Some(Path {
                keys: self.keys[1..].to_vec(),
            })
        }
    }

    /// Drop `n` keys from the front; `None` when nothing would remain.
    pub fn sub_path(&self, n: usize) -> Option<Path> {
        if n == 0 {
            Some(self.clone())
        } else if n >= self.keys.len() {
            None
        } else {
            Some(Path {
                keys: self.keys[n..].to_vec(),
            })
        }
    }

    pub fn prepend(&self, prefix: &Path) -> Path {
        let mut keys = prefix.keys.clone();
        keys.extend(self.keys.iter().cloned());
        Path { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn starts_with(&self, other: &Path) -> bool {
        self.keys.len() >= other.keys.len() && self.keys[..other.keys.len()] == other.keys[..]
    }

    /// Render to dotted form, quoting keys that would not re-parse.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            if needs_quotes(key) {
                out.push('"');
                for c in key.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        other => out.push(other),
                    }
                }
                out.push('"');
            } else {
                out.push_str(key);
            }
        }
        out
    }

    /// Parse a dotted path expression. Double-quoted segments keep dots
    /// intact: `a."b.c".d` has three keys.
    pub fn parse(expression: &str) -> Result<Path, ConfigError> {
        let origin = Origin::new(format!("path expression '{}'", expression));
        let mut keys: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_used = false;
        let mut chars = expression.chars();
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !current_used {
                        return Err(ConfigError::parse(
                            &origin,
                            "path has a leading or doubled '.'",
                        ));
                    }
                    keys.push(std::mem::take(&mut current).trim_end().to_owned());
                    current_used = false;
                }
                '"' => {
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => match chars.next() {
                                Some(esc) => current.push(esc),
                                None => {
                                    return Err(ConfigError::parse(
                                        &origin,
                                        "unterminated quoted key in path",
                                    ))
                                }
                            },
                            Some(inner) => current.push(inner),
                            None => {
                                return Err(ConfigError::parse(
                                    &origin,
                                    "unterminated quoted key in path",
                                ))
                            }
                        }
                    }
                    current_used = true;
                }
                other if other.is_whitespace() => {
                    // whitespace inside a key is preserved only when quoted
                    if !current.is_empty() {
                        current.push(other);
                    }
                }
                other => {
                    current.push(other);
                    current_used = true;
                }
            }
        }
        if !current_used {
            return Err(ConfigError::parse(
                &origin,
                "path has a trailing '.' or is empty",
            ));
        }
        keys.push(current.trim_end().to_owned());
        Path::from_keys(keys)
    }
}

fn needs_quotes(key: &str) -> bool {
    key.is_empty()
        || key.chars().any(|c| {
            c.is_whitespace()
                || matches!(
                    c,
                    '$' | '"' | '{' | '}' | '[' | ']' | ':' | '=' | ',' | '+' | '#' | '`' | '^'
                        | '?' | '!' | '@' | '*' | '&' | '\\' | '.' | '/'
                )
        })
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn parse_and_render_round_trip() {
        assert_eq!(path("a.b.c").keys(), ["a", "b", "c"]);
        assert_eq!(path("a.b.c").render(), "a.b.c");
        assert_eq!(path("a").keys(), ["a"]);
    }

    #[test]
    fn quoted_segment_keeps_dots() {
        let p = path("a.\"b.c\".d");
        assert_eq!(p.keys(), ["a", "b.c", "d"]);
        assert_eq!(p.render(), "a.\"b.c\".d");
    }

    #[test]
    fn rejects_degenerate_paths() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse(".a").is_err());
        assert!(Path::parse("a.").is_err());
        assert!(Path::parse("a..b").is_err());
    }

    #[test]
    fn first_and_remainder() {
        let p = path("a.b.c");
        assert_eq!(p.first(), "a");
        assert_eq!(p.remainder().unwrap().render(), "b.c");
        assert_eq!(path("a").remainder(), None);
    }

    #[test]
    fn sub_path_drops_prefix_keys() {
        let p = path("a.b.c");
        assert_eq!(p.sub_path(1).unwrap().render(), "b.c");
        assert_eq!(p.sub_path(3), None);
        assert_eq!(p.sub_path(0).unwrap(), p);
    }

    #[test]
    fn prepend_and_starts_with() {
        let p = path("c.d").prepend(&path("a.b"));
        assert_eq!(p.render(), "a.b.c.d");
        assert!(p.starts_with(&path("a.b")));
        assert!(!p.starts_with(&path("a.c")));
    }

    #[test]
    fn render_quotes_awkward_keys() {
        let p = Path::from_keys(vec!["a.b".to_owned(), "plain".to_owned()]).unwrap();
        assert_eq!(p.render(), "\"a.b\".plain");
    }
}
