//! Character-level tokenizer for the configuration syntax.
//!
//! Produces a flat token stream with line numbers; the parser is the only
//! consumer. Newlines are significant (they separate fields), so they are
//! real tokens rather than skipped whitespace.

use crate::error::ConfigError;
use crate::origin::Origin;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    OpenCurly,
    CloseCurly,
    OpenSquare,
    CloseSquare,
    Comma,
    Colon,
    Equals,
    PlusEquals,
    Newline,
    Comment(String),
    /// Bare text outside quotes. May contain interior spaces; stops at
    /// reserved characters, comments, and line ends.
    Unquoted(String),
    /// Quoted string literal, escapes resolved.
    Str(String),
    Int(i64),
    /// Decimal literal -- kept as string to preserve exact representation
    Float(String),
    Bool(bool),
    Null,
    /// `${path}` or `${?path}` with the raw inner expression.
    Substitution { expression: String, optional: bool },
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// Characters that terminate unquoted text. Forward slash is handled
/// separately since it is only special when doubled.
fn is_reserved(c: char) -> bool {
    matches!(
        c,
        '$' | '"' | '{' | '}' | '[' | ']' | ':' | '=' | ',' | '+' | '#' | '`' | '^' | '?' | '!'
            | '@' | '*' | '&' | '\\'
    )
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    origin: Origin,
}

impl Lexer {
    fn err(&self, line: u32, message: impl Into<String>) -> ConfigError {
        ConfigError::parse(&self.origin.with_line(line), message)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_comment_start(&self) -> bool {
        match self.peek_at(0) {
            Some('#') => true,
            Some('/') => self.peek_at(1) == Some('/'),
            _ => false,
        }
    }

    fn pull_comment(&mut self) -> Token {
        // skip '#' or '//'
        self.pos += if self.chars[self.pos] == '#' { 1 } else { 2 };
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::Comment(text.trim().to_owned())
    }

    fn pull_quoted(&mut self, tok_line: u32) -> Result<Token, ConfigError> {
        // caller consumed nothing; chars[pos] == '"'
        if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            return self.pull_multiline(tok_line);
        }
        self.pos += 1;
        let mut s = String::new();
        loop {
            let c = match self.peek_at(0) {
                Some(c) => c,
                None => return Err(self.err(tok_line, "unterminated string literal")),
            };
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(Token::Str(s));
                }
                '\n' => return Err(self.err(tok_line, "string literal crosses a line end")),
                '\\' => {
                    self.pos += 1;
                    let esc = self
                        .peek_at(0)
                        .ok_or_else(|| self.err(tok_line, "unterminated escape in string"))?;
                    self.pos += 1;
                    match esc {
                        '"' => s.push('"'),
                        '\\' => s.push('\\'),
                        '/' => s.push('/'),
                        'b' => s.push('\u{0008}'),
                        'f' => s.push('\u{000C}'),
                        'n' => s.push('\n'),
                        'r' => s.push('\r'),
                        't' => s.push('\t'),
                        'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let h = self.peek_at(0).and_then(|c| c.to_digit(16)).ok_or_else(
                                    || self.err(tok_line, "malformed \\u escape in string"),
                                )?;
                                code = code * 16 + h;
                                self.pos += 1;
                            }
                            let c = char::from_u32(code).ok_or_else(|| {
                                self.err(tok_line, "\\u escape is not a valid character")
                            })?;
                            s.push(c);
                        }
                        other => {
                            return Err(self.err(
                                tok_line,
                                format!("invalid escape '\\{}' in string", other),
                            ))
                        }
                    }
                }
                other => {
                    s.push(other);
                    self.pos += 1;
                }
            }
        }
    }

    fn pull_multiline(&mut self, tok_line: u32) -> Result<Token, ConfigError> {
        self.pos += 3;
        let mut s = String::new();
        loop {
            if self.peek_at(0) == Some('"')
                && self.peek_at(1) == Some('"')
                && self.peek_at(2) == Some('"')
            {
                // any extra quotes belong to the string content
                if self.peek_at(3) == Some('"') {
                    s.push('"');
                    self.pos += 1;
                    continue;
                }
                self.pos += 3;
                return Ok(Token::Str(s));
            }
            match self.peek_at(0) {
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    s.push(c);
                    self.pos += 1;
                }
                None => return Err(self.err(tok_line, "unterminated multiline string")),
            }
        }
    }

    fn pull_substitution(&mut self, tok_line: u32) -> Result<Token, ConfigError> {
        // chars[pos] == '$'
        if self.peek_at(1) != Some('{') {
            return Err(self.err(tok_line, "'$' not followed by '{'"));
        }
        self.pos += 2;
        let optional = if self.peek_at(0) == Some('?') {
            self.pos += 1;
            true
        } else {
            false
        };
        let mut expression = String::new();
        loop {
            match self.peek_at(0) {
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some('\n') | None => {
                    return Err(self.err(tok_line, "unterminated substitution expression"))
                }
                Some(c) => {
                    expression.push(c);
                    self.pos += 1;
                }
            }
        }
        let expression = expression.trim().to_owned();
        if expression.is_empty() {
            return Err(self.err(tok_line, "empty substitution expression"));
        }
        Ok(Token::Substitution {
            expression,
            optional,
        })
    }

    /// Pull unquoted text starting at the current position. Interior
    /// spaces are kept; trailing whitespace is trimmed.
    fn pull_unquoted(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '\n' || is_reserved(c) || self.at_comment_start() {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let text = text.trim_end().to_owned();
        match text.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            _ => Token::Unquoted(text),
        }
    }

    /// Pull a number, falling back to unquoted text for forms like
    /// `1.2.3` that look numeric but are not.
    fn pull_number(&mut self) -> Token {
        let start = self.pos;
        if self.chars[self.pos] == '-' {
            self.pos += 1;
        }
        while self.pos < self.chars.len() && is_number_char(self.chars[self.pos]) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        // a number running directly into other unquoted characters is not
        // a number at all ("1.2.3beta")
        let runs_on = self
            .peek_at(0)
            .map(|c| c != '\n' && !c.is_whitespace() && !is_reserved(c) && !self.at_comment_start())
            .unwrap_or(false);
        if !runs_on {
            if text.contains('.') || text.contains('e') || text.contains('E') {
                if text.parse::<f64>().is_ok() {
                    return Token::Float(text);
                }
            } else if let Ok(n) = text.parse::<i64>() {
                return Token::Int(n);
            }
        }
        // not a valid number; rewind and treat as unquoted text
        self.pos = start;
        self.pull_unquoted()
    }

    fn run(&mut self) -> Result<Vec<Spanned>, ConfigError> {
        let mut tokens: Vec<Spanned> = Vec::new();
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            let tok_line = self.line;

            if c == '\n' {
                tokens.push(Spanned {
                    token: Token::Newline,
                    line: tok_line,
                });
                self.line += 1;
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            if self.at_comment_start() {
                let token = self.pull_comment();
                tokens.push(Spanned {
                    token,
                    line: tok_line,
                });
                continue;
            }

            let token = match c {
                '{' => {
                    self.pos += 1;
                    Token::OpenCurly
                }
                '}' => {
                    self.pos += 1;
                    Token::CloseCurly
                }
                '[' => {
                    self.pos += 1;
                    Token::OpenSquare
                }
                ']' => {
                    self.pos += 1;
                    Token::CloseSquare
                }
                ',' => {
                    self.pos += 1;
                    Token::Comma
                }
                ':' => {
                    self.pos += 1;
                    Token::Colon
                }
                '=' => {
                    self.pos += 1;
                    Token::Equals
                }
                '+' => {
                    if self.peek_at(1) == Some('=') {
                        self.pos += 2;
                        Token::PlusEquals
                    } else {
                        return Err(self.err(tok_line, "'+' not followed by '='"));
                    }
                }
                '"' => self.pull_quoted(tok_line)?,
                '$' => self.pull_substitution(tok_line)?,
                _ if c.is_ascii_digit()
                    || (c == '-'
                        && self
                            .peek_at(1)
                            .map(|n| n.is_ascii_digit())
                            .unwrap_or(false)) =>
                {
                    self.pull_number()
                }
                _ if is_reserved(c) => {
                    return Err(self.err(
                        tok_line,
                        format!("reserved character '{}' outside quoted string", c),
                    ));
                }
                _ => self.pull_unquoted(),
            };
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
        }
        tokens.push(Spanned {
            token: Token::Eof,
            line: self.line,
        });
        Ok(tokens)
    }
}

pub fn lex(src: &str, description: &str) -> Result<Vec<Spanned>, ConfigError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        origin: Origin::new(description),
    };
    lexer.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex(src, "test")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn punctuation_and_scalars() {
        assert_eq!(
            tokens("{ a : 1 }"),
            vec![
                Token::OpenCurly,
                Token::Unquoted("a".to_owned()),
                Token::Colon,
                Token::Int(1),
                Token::CloseCurly,
                Token::Eof,
            ]
        );
        assert_eq!(
            tokens("x = 3.25"),
            vec![
                Token::Unquoted("x".to_owned()),
                Token::Equals,
                Token::Float("3.25".to_owned()),
                Token::Eof,
            ]
        );
        assert_eq!(
            tokens("on = true\noff = false\nn = null"),
            vec![
                Token::Unquoted("on".to_owned()),
                Token::Equals,
                Token::Bool(true),
                Token::Newline,
                Token::Unquoted("off".to_owned()),
                Token::Equals,
                Token::Bool(false),
                Token::Newline,
                Token::Unquoted("n".to_owned()),
                Token::Equals,
                Token::Null,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unquoted_text_keeps_interior_spaces() {
        assert_eq!(
            tokens("greeting = hello world"),
            vec![
                Token::Unquoted("greeting".to_owned()),
                Token::Equals,
                Token::Unquoted("hello world".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn version_strings_are_not_numbers() {
        assert_eq!(
            tokens("v = 1.2.3"),
            vec![
                Token::Unquoted("v".to_owned()),
                Token::Equals,
                Token::Unquoted("1.2.3".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn quoted_strings_resolve_escapes() {
        assert_eq!(
            tokens(r#"s = "a\nbA""#),
            vec![
                Token::Unquoted("s".to_owned()),
                Token::Equals,
                Token::Str("a\nbA".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn multiline_strings_take_everything_raw() {
        assert_eq!(
            tokens("s = \"\"\"line1\nline\\2\"\"\""),
            vec![
                Token::Unquoted("s".to_owned()),
                Token::Equals,
                Token::Str("line1\nline\\2".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn substitutions() {
        assert_eq!(
            tokens("a = ${x.y} ${?z}"),
            vec![
                Token::Unquoted("a".to_owned()),
                Token::Equals,
                Token::Substitution {
                    expression: "x.y".to_owned(),
                    optional: false,
                },
                Token::Substitution {
                    expression: "z".to_owned(),
                    optional: true,
                },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_line_end() {
        assert_eq!(
            tokens("# top\na = 1 // trailing"),
            vec![
                Token::Comment("top".to_owned()),
                Token::Newline,
                Token::Unquoted("a".to_owned()),
                Token::Equals,
                Token::Int(1),
                Token::Comment("trailing".to_owned()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn plus_equals_token() {
        assert_eq!(
            tokens("xs += 4"),
            vec![
                Token::Unquoted("xs".to_owned()),
                Token::PlusEquals,
                Token::Int(4),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lex_errors_carry_line_numbers() {
        let err = lex("ok = 1\nbad = \"oops", "test").unwrap_err();
        match err {
            ConfigError::Parse { origin, .. } => assert_eq!(origin.line(), Some(2)),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_substitution_is_an_error() {
        assert!(lex("a = ${x", "test").is_err());
        assert!(lex("a = ${}", "test").is_err());
    }
}
