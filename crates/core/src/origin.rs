//! Source provenance attached to every configuration value.
//!
//! An [`Origin`] records where a value came from (a description such as a
//! file name, an optional line number, and any comments that preceded the
//! value in the source). Origins are immutable; every transformation
//! returns a derived copy.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    description: String,
    line: Option<u32>,
    comments: Vec<String>,
}

impl Origin {
    pub fn new(description: impl Into<String>) -> Origin {
        Origin {
            description: description.into(),
            line: None,
            comments: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn with_line(&self, line: u32) -> Origin {
        Origin {
            description: self.description.clone(),
            line: Some(line),
            comments: self.comments.clone(),
        }
    }

    pub fn with_comments(&self, comments: Vec<String>) -> Origin {
        Origin {
            description: self.description.clone(),
            line: self.line,
            comments,
        }
    }

    /// Comments that appeared before the value come first.
    pub fn prepend_comments(&self, mut comments: Vec<String>) -> Origin {
        comments.extend(self.comments.iter().cloned());
        self.with_comments(comments)
    }

    pub fn append_comments(&self, comments: Vec<String>) -> Origin {
        let mut merged = self.comments.clone();
        merged.extend(comments);
        self.with_comments(merged)
    }

    /// Combine the origins of values that were merged into one.
    ///
    /// Duplicate descriptions collapse; the line number survives only when
    /// every merged origin agrees on it.
    pub fn merge(origins: &[&Origin]) -> Origin {
        if origins.is_empty() {
            return Origin::new("empty merge");
        }
        if origins.len() == 1 {
            return origins[0].clone();
        }
        let mut descriptions: Vec<&str> = Vec::new();
        for o in origins {
            if !descriptions.contains(&o.description.as_str()) {
                descriptions.push(&o.description);
            }
        }
        let same_line = origins.iter().all(|o| o.line == origins[0].line);
        Origin {
            description: descriptions.join(","),
            line: if same_line && descriptions.len() == 1 {
                origins[0].line
            } else {
                None
            },
            comments: Vec::new(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: {}", self.description, line),
            None => write!(f, "{}", self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_when_known() {
        let o = Origin::new("app.conf").with_line(12);
        assert_eq!(o.to_string(), "app.conf: 12");
        assert_eq!(Origin::new("app.conf").to_string(), "app.conf");
    }

    #[test]
    fn merge_collapses_duplicate_descriptions() {
        let a = Origin::new("app.conf").with_line(3);
        let b = Origin::new("app.conf").with_line(3);
        let merged = Origin::merge(&[&a, &b]);
        assert_eq!(merged.description(), "app.conf");
        assert_eq!(merged.line(), Some(3));

        let c = Origin::new("other.conf").with_line(9);
        let merged = Origin::merge(&[&a, &c]);
        assert_eq!(merged.description(), "app.conf,other.conf");
        assert_eq!(merged.line(), None);
    }

    #[test]
    fn comments_prepend_and_append() {
        let o = Origin::new("x").with_comments(vec!["middle".to_owned()]);
        let o = o.prepend_comments(vec!["first".to_owned()]);
        let o = o.append_comments(vec!["last".to_owned()]);
        assert_eq!(o.comments(), ["first", "middle", "last"]);
    }
}
