//! Parser for Joy programs.
//!
//! Token stream in, `Program` out. Aggregate literals are parsed
//! recursively; `DEFINE`/`LIBRA`/`CONST`, `MODULE`...`END`, and
//! `HIDE`/`IN`/`END` blocks become inline definition terms. A `.` is a
//! block terminator only while inside a definition block; anywhere else it
//! is the print word.

use crate::ast::{Definition, Program, Term};
use crate::scanner::{tokenize, Keyword, Token, TokenKind};
use joy_core::{JoyError, Value};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, JoyError> {
        Ok(Parser {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    pub fn parse(&mut self) -> Result<Program, JoyError> {
        let mut program = Program::new();

        while let Some(token) = self.current() {
            match &token.kind {
                TokenKind::Keyword(Keyword::Define) => {
                    let defs = self.parse_definition_block()?;
                    program.terms.push(Term::Defs(defs));
                }
                TokenKind::Keyword(Keyword::Module) => {
                    let defs = self.parse_module_block()?;
                    program.terms.push(Term::Defs(defs));
                }
                TokenKind::Keyword(Keyword::Hide) => {
                    let defs = self.parse_hide_block()?;
                    program.terms.push(Term::Defs(defs));
                }
                TokenKind::ShellEscape(cmd) => {
                    let cmd = cmd.clone();
                    self.advance();
                    program.terms.push(Term::Shell(cmd));
                }
                _ => {
                    if let Some(value) = self.parse_term()? {
                        program.terms.push(Term::Value(value));
                    }
                }
            }
        }

        Ok(program)
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> (usize, usize) {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((0, 0))
    }

    /// Parse one executable term. Returns None for separators and stray
    /// definition punctuation, which are skipped.
    fn parse_term(&mut self) -> Result<Option<Value>, JoyError> {
        let token = match self.current() {
            Some(t) => t.clone(),
            None => return Ok(None),
        };

        let value = match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Value::Int(n)
            }
            TokenKind::Float(x) => {
                self.advance();
                Value::Float(x)
            }
            TokenKind::Char(c) => {
                self.advance();
                Value::Char(c)
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.advance();
                Value::String(s)
            }
            TokenKind::LBracket => self.parse_quotation()?,
            TokenKind::LBrace => self.parse_set()?,
            TokenKind::Symbol(ref name) => {
                let name = name.clone();
                self.advance();
                match name.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::Symbol(name),
                }
            }
            TokenKind::Period => {
                self.advance();
                Value::Symbol(".".into())
            }
            TokenKind::Semicolon | TokenKind::DefOp => {
                self.advance();
                return Ok(None);
            }
            TokenKind::Keyword(_) | TokenKind::ShellEscape(_) => {
                // Stray block keyword outside definition context.
                self.advance();
                return Ok(None);
            }
            TokenKind::RBracket => {
                return Err(JoyError::syntax("unexpected ']'", token.line, token.column));
            }
            TokenKind::RBrace => {
                return Err(JoyError::syntax("unexpected '}'", token.line, token.column));
            }
        };

        Ok(Some(value))
    }

    /// Parse terms until one of the terminator kinds (not consumed).
    fn parse_terms_until(
        &mut self,
        stop: impl Fn(&TokenKind) -> bool,
    ) -> Result<Vec<Value>, JoyError> {
        let mut terms = Vec::new();
        while let Some(token) = self.current() {
            if stop(&token.kind) {
                break;
            }
            if let Some(value) = self.parse_term()? {
                terms.push(value);
            }
        }
        Ok(terms)
    }

    fn parse_quotation(&mut self) -> Result<Value, JoyError> {
        let open = self.advance().expect("parse_quotation at '['");
        let terms = self.parse_terms_until(|k| *k == TokenKind::RBracket)?;
        match self.current() {
            Some(t) if t.kind == TokenKind::RBracket => {
                self.advance();
                Ok(Value::Quotation(terms))
            }
            _ => Err(JoyError::syntax("expected ']'", open.line, open.column)),
        }
    }

    fn parse_set(&mut self) -> Result<Value, JoyError> {
        let open = self.advance().expect("parse_set at '{'");
        let mut members = Vec::new();
        loop {
            let token = match self.current() {
                Some(t) => t.clone(),
                None => return Err(JoyError::syntax("expected '}'", open.line, open.column)),
            };
            match token.kind {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Int(n) => {
                    self.advance();
                    members.push(n);
                }
                _ => {
                    return Err(JoyError::syntax(
                        "set members must be integers in range 0..63",
                        token.line,
                        token.column,
                    ));
                }
            }
        }
        Value::set_from_members(members).map_err(|m| {
            JoyError::syntax(
                format!("set member {} out of range 0..63", m),
                open.line,
                open.column,
            )
        })
    }

    /// A `DEFINE`/`LIBRA`/`CONST` block: clauses `name == body` separated
    /// by `;`, terminated by `.` (or `END`, or the start of another block).
    fn parse_definition_block(&mut self) -> Result<Vec<Definition>, JoyError> {
        self.advance(); // DEFINE keyword
        let mut definitions = Vec::new();

        loop {
            let token = match self.current() {
                Some(t) => t.clone(),
                None => break,
            };

            match token.kind {
                TokenKind::Keyword(Keyword::Public) | TokenKind::Keyword(Keyword::Private) => {
                    // Visibility markers are accepted and ignored.
                    self.advance();
                    continue;
                }
                TokenKind::Keyword(Keyword::End) => {
                    self.advance();
                    self.consume_optional_period();
                    break;
                }
                TokenKind::Period => {
                    self.advance();
                    break;
                }
                TokenKind::Keyword(Keyword::Define) => break,
                TokenKind::Semicolon => {
                    self.advance();
                    continue;
                }
                TokenKind::Symbol(ref name) => {
                    let name = name.clone();
                    self.advance();
                    definitions.push(self.parse_clause_body(name)?);
                }
                _ => {
                    return Err(JoyError::syntax(
                        format!("expected name in definition, got {:?}", token.kind),
                        token.line,
                        token.column,
                    ));
                }
            }
        }

        Ok(definitions)
    }

    /// After the clause name: `== body`.
    fn parse_clause_body(&mut self, name: String) -> Result<Definition, JoyError> {
        match self.current() {
            Some(t) if t.kind == TokenKind::DefOp => {
                self.advance();
            }
            _ => {
                let (line, column) = self.position();
                return Err(JoyError::syntax(
                    format!("expected '==' after '{}' in definition", name),
                    line,
                    column,
                ));
            }
        }
        let body = self.parse_terms_until(|k| {
            matches!(
                k,
                TokenKind::Semicolon
                    | TokenKind::Period
                    | TokenKind::Keyword(Keyword::Define)
                    | TokenKind::Keyword(Keyword::End)
                    | TokenKind::Keyword(Keyword::In)
            )
        })?;
        Ok(Definition { name, body })
    }

    /// `MODULE name ... END` — the clauses are installed like a DEFINE
    /// block when execution reaches the block.
    fn parse_module_block(&mut self) -> Result<Vec<Definition>, JoyError> {
        self.advance(); // MODULE
        match self.current() {
            Some(t) if matches!(t.kind, TokenKind::Symbol(_)) => {
                self.advance();
            }
            _ => {
                let (line, column) = self.position();
                return Err(JoyError::syntax("expected module name", line, column));
            }
        }

        let mut definitions = Vec::new();
        loop {
            let token = match self.current() {
                Some(t) => t.clone(),
                None => {
                    let (line, column) = self.position();
                    return Err(JoyError::syntax("unterminated MODULE block", line, column));
                }
            };
            match token.kind {
                TokenKind::Keyword(Keyword::End) => {
                    self.advance();
                    self.consume_optional_period();
                    break;
                }
                TokenKind::Semicolon | TokenKind::Period => {
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Public) | TokenKind::Keyword(Keyword::Private) => {
                    self.advance();
                }
                TokenKind::Symbol(ref name) => {
                    let name = name.clone();
                    self.advance();
                    definitions.push(self.parse_clause_body(name)?);
                }
                _ => {
                    return Err(JoyError::syntax(
                        format!("unexpected {:?} in MODULE block", token.kind),
                        token.line,
                        token.column,
                    ));
                }
            }
        }
        Ok(definitions)
    }

    /// `HIDE <defs> IN <defs> END` — both sections install; the HIDE names
    /// are simply helpers for the IN section.
    fn parse_hide_block(&mut self) -> Result<Vec<Definition>, JoyError> {
        self.advance(); // HIDE
        let mut definitions = Vec::new();
        let mut seen_in = false;

        loop {
            let token = match self.current() {
                Some(t) => t.clone(),
                None => {
                    let (line, column) = self.position();
                    return Err(JoyError::syntax("unterminated HIDE block", line, column));
                }
            };
            match token.kind {
                TokenKind::Keyword(Keyword::In) => {
                    self.advance();
                    seen_in = true;
                }
                TokenKind::Keyword(Keyword::End) => {
                    self.advance();
                    self.consume_optional_period();
                    break;
                }
                TokenKind::Semicolon | TokenKind::Period => {
                    self.advance();
                }
                TokenKind::Symbol(ref name) => {
                    let name = name.clone();
                    self.advance();
                    definitions.push(self.parse_clause_body(name)?);
                }
                _ => {
                    return Err(JoyError::syntax(
                        format!(
                            "unexpected {:?} in HIDE block ({} section)",
                            token.kind,
                            if seen_in { "IN" } else { "HIDE" }
                        ),
                        token.line,
                        token.column,
                    ));
                }
            }
        }
        Ok(definitions)
    }

    fn consume_optional_period(&mut self) {
        if matches!(self.current(), Some(t) if t.kind == TokenKind::Period) {
            self.advance();
        }
    }
}

/// Parse Joy source into a program.
pub fn parse(source: &str) -> Result<Program, JoyError> {
    Parser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_terms() {
        let program = parse("2 3 + .").unwrap();
        assert_eq!(
            program.terms,
            vec![
                Term::Value(Value::Int(2)),
                Term::Value(Value::Int(3)),
                Term::Value(Value::Symbol("+".into())),
                Term::Value(Value::Symbol(".".into())),
            ]
        );
    }

    #[test]
    fn test_quotation_literal() {
        let program = parse("[1 2 dup]").unwrap();
        assert_eq!(
            program.terms,
            vec![Term::Value(Value::Quotation(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Symbol("dup".into()),
            ]))]
        );
    }

    #[test]
    fn test_nested_quotations() {
        let program = parse("[[1] [2 3]]").unwrap();
        assert_eq!(
            program.terms,
            vec![Term::Value(Value::Quotation(vec![
                Value::Quotation(vec![Value::Int(1)]),
                Value::Quotation(vec![Value::Int(2), Value::Int(3)]),
            ]))]
        );
    }

    #[test]
    fn test_set_literal() {
        let program = parse("{0 2 4}").unwrap();
        assert_eq!(program.terms, vec![Term::Value(Value::Set(0b10101))]);
    }

    #[test]
    fn test_set_member_out_of_range() {
        assert!(parse("{64}").is_err());
        assert!(parse("{1 x}").is_err());
    }

    #[test]
    fn test_boolean_literals() {
        let program = parse("true false").unwrap();
        assert_eq!(
            program.terms,
            vec![
                Term::Value(Value::Bool(true)),
                Term::Value(Value::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_define_block() {
        let program = parse("DEFINE double == 2 * ; triple == 3 * .").unwrap();
        assert_eq!(
            program.terms,
            vec![Term::Defs(vec![
                Definition {
                    name: "double".into(),
                    body: vec![Value::Int(2), Value::Symbol("*".into())],
                },
                Definition {
                    name: "triple".into(),
                    body: vec![Value::Int(3), Value::Symbol("*".into())],
                },
            ])]
        );
    }

    #[test]
    fn test_definition_then_code() {
        let program = parse("DEFINE sq == dup * . 3 sq .").unwrap();
        assert_eq!(program.terms.len(), 3);
        assert!(matches!(program.terms[0], Term::Defs(_)));
        assert_eq!(program.terms[1], Term::Value(Value::Int(3)));
    }

    #[test]
    fn test_definition_without_defop_is_error() {
        assert!(parse("DEFINE broken 2 * .").is_err());
    }

    #[test]
    fn test_unbalanced_bracket_is_error() {
        assert!(parse("[1 2").is_err());
        assert!(parse("1 ]").is_err());
    }

    #[test]
    fn test_module_block() {
        let program = parse("MODULE m one == 1 ; two == 2 END.").unwrap();
        match &program.terms[0] {
            Term::Defs(defs) => {
                assert_eq!(defs.len(), 2);
                assert_eq!(defs[0].name, "one");
                assert_eq!(defs[1].name, "two");
            }
            other => panic!("expected Defs, got {:?}", other),
        }
    }

    #[test]
    fn test_hide_block_installs_both_sections() {
        let program = parse("HIDE helper == 1 IN visible == helper 2 + END.").unwrap();
        match &program.terms[0] {
            Term::Defs(defs) => {
                assert_eq!(defs.len(), 2);
                assert_eq!(defs[0].name, "helper");
                assert_eq!(defs[1].name, "visible");
            }
            other => panic!("expected Defs, got {:?}", other),
        }
    }

    #[test]
    fn test_period_outside_definition_is_print_word() {
        let program = parse("5 .").unwrap();
        assert_eq!(
            program.terms[1],
            Term::Value(Value::Symbol(".".into()))
        );
    }

    #[test]
    fn test_shell_term() {
        let program = parse("$echo hi\n1").unwrap();
        assert_eq!(program.terms[0], Term::Shell("echo hi".into()));
        assert_eq!(program.terms[1], Term::Value(Value::Int(1)));
    }

    #[test]
    fn test_definitions_iterator() {
        let program = parse("DEFINE a == 1 . 5 DEFINE b == 2 .").unwrap();
        let names: Vec<_> = program.definitions().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
