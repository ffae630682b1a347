//! Lexical analysis for Joy source.
//!
//! Byte stream in, token stream out. Handles numeric literals (including
//! `inf`, `-inf`, `nan`), character literals with C-style escapes (octal
//! included), double-quoted strings, the bracket/brace punctuation,
//! comments (`(* ... *)` and `# ...`), shell-escape lines, and identifiers.
//!
//! `inf`/`-inf`/`nan` are floats only when the token stands alone; when it
//! is about to be defined (`inf == ...`) the scanner leaves it a symbol, so
//! the dictionary wins on ambiguity.

use joy_core::JoyError;

/// Keywords that introduce or structure definition blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Define,
    Hide,
    In,
    Module,
    Public,
    Private,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Symbol(String),
    Keyword(Keyword),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Period,
    /// `==`, the definition operator.
    DefOp,
    /// The remainder of a line whose first non-blank byte was `$`.
    ShellEscape(String),
}

/// A token with its source position (1-indexed line, 0-indexed column).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, JoyError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks_and_comments()?;
            if self.at_end() {
                break;
            }

            // Shell escape: `$` as the first non-blank byte on a line.
            if self.peek() == Some('$') && self.at_line_start_content(&tokens) {
                let (line, column) = self.position();
                self.advance();
                let mut cmd = String::new();
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    cmd.push(c);
                    self.advance();
                }
                tokens.push(Token {
                    kind: TokenKind::ShellEscape(cmd.trim().to_string()),
                    line,
                    column,
                });
                continue;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(resolve_special_floats(tokens))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn position(&self) -> (usize, usize) {
        (self.line, self.pos - self.line_start)
    }

    /// True when nothing but blanks precede the cursor on this line. The
    /// previous-token check keeps `2 $x` from reading as a shell escape
    /// after a newline was consumed inside a comment.
    fn at_line_start_content(&self, tokens: &[Token]) -> bool {
        let col_clear = self.chars[self.line_start..self.pos]
            .iter()
            .all(|c| c.is_whitespace());
        let prior_line = tokens.last().map(|t| t.line).unwrap_or(0);
        col_clear && prior_line < self.line
    }

    fn skip_blanks_and_comments(&mut self) -> Result<(), JoyError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('(') if self.peek_at(1) == Some('*') => {
                    let (line, column) = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some(')') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(JoyError::syntax(
                                    "unterminated comment",
                                    line,
                                    column,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, JoyError> {
        let (line, column) = self.position();
        let c = self.peek().expect("next_token called at end of input");

        let kind = match c {
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            '{' => {
                self.advance();
                TokenKind::LBrace
            }
            '}' => {
                self.advance();
                TokenKind::RBrace
            }
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            '"' => self.scan_string(line, column)?,
            '\'' => self.scan_char(line, column)?,
            '.' => {
                self.advance();
                TokenKind::Period
            }
            c if c.is_ascii_digit() => self.scan_number(line, column)?,
            '-' if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) => {
                self.scan_number(line, column)?
            }
            c if is_word_char(c) => self.scan_word(),
            other => {
                return Err(JoyError::syntax(
                    format!("unexpected character '{}'", other),
                    line,
                    column,
                ));
            }
        };

        Ok(Token { kind, line, column })
    }

    fn scan_number(&mut self, line: usize, column: usize) -> Result<TokenKind, JoyError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                for _ in 0..lookahead {
                    text.push(self.peek().unwrap());
                    self.advance();
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| JoyError::syntax(format!("bad float literal '{}'", text), line, column))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| {
                    JoyError::syntax(format!("integer literal out of range '{}'", text), line, column)
                })
        }
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Result<TokenKind, JoyError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Str(out));
                }
                Some('\\') => {
                    self.advance();
                    out.push(self.scan_escape(line, column)?);
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
                None => {
                    return Err(JoyError::syntax("unterminated string literal", line, column));
                }
            }
        }
    }

    fn scan_char(&mut self, line: usize, column: usize) -> Result<TokenKind, JoyError> {
        self.advance(); // opening quote
        let value = match self.peek() {
            Some('\\') => {
                self.advance();
                self.scan_escape(line, column)?
            }
            Some(c) if !c.is_whitespace() => {
                self.advance();
                c
            }
            _ => {
                return Err(JoyError::syntax("empty character literal", line, column));
            }
        };
        // The closing quote is optional (Joy accepts both 'x and 'x').
        if self.peek() == Some('\'') {
            self.advance();
        }
        Ok(TokenKind::Char(value))
    }

    /// One escape after the backslash: the C set plus up to three octal
    /// digits.
    fn scan_escape(&mut self, line: usize, column: usize) -> Result<char, JoyError> {
        let c = self
            .advance()
            .ok_or_else(|| JoyError::syntax("dangling escape", line, column))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0'..='7' => {
                let mut code = c as u32 - '0' as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ '0'..='7') => {
                            code = code * 8 + (d as u32 - '0' as u32);
                            self.advance();
                        }
                        _ => break,
                    }
                }
                char::from_u32(code).ok_or_else(|| {
                    JoyError::syntax(format!("escape \\{:o} out of range", code), line, column)
                })?
            }
            '\\' | '\'' | '"' => c,
            other => other,
        })
    }

    fn scan_word(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_word_char(c) {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match text.as_str() {
            "==" => TokenKind::DefOp,
            "DEFINE" | "LIBRA" | "CONST" => TokenKind::Keyword(Keyword::Define),
            "HIDE" => TokenKind::Keyword(Keyword::Hide),
            "IN" => TokenKind::Keyword(Keyword::In),
            "MODULE" => TokenKind::Keyword(Keyword::Module),
            "PUBLIC" => TokenKind::Keyword(Keyword::Public),
            "PRIVATE" => TokenKind::Keyword(Keyword::Private),
            "END" => TokenKind::Keyword(Keyword::End),
            _ => TokenKind::Symbol(text),
        }
    }
}

/// Identifier bytes: anything that is not whitespace, bracket/brace, paren,
/// quote, or standalone punctuation. Operator words (`+`, `<=`, `!=`...)
/// are ordinary identifiers under this rule.
fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | ';' | '.' | '"' | '\'' | '#')
}

/// Turn standalone `inf`/`-inf`/`nan` symbols into float tokens, unless the
/// next token is `==` (the word is being defined).
fn resolve_special_floats(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for i in 0..tokens.len() {
        let token = &tokens[i];
        let next_is_def = matches!(tokens.get(i + 1), Some(t) if t.kind == TokenKind::DefOp);
        let kind = match &token.kind {
            TokenKind::Symbol(name) if !next_is_def => match name.as_str() {
                "inf" => TokenKind::Float(f64::INFINITY),
                "-inf" => TokenKind::Float(f64::NEG_INFINITY),
                "nan" => TokenKind::Float(f64::NAN),
                _ => token.kind.clone(),
            },
            other => other.clone(),
        };
        out.push(Token {
            kind,
            line: token.line,
            column: token.column,
        });
    }
    out
}

/// Tokenize Joy source in one shot.
pub fn tokenize(source: &str) -> Result<Vec<Token>, JoyError> {
    Scanner::new(source).tokenize()
}
