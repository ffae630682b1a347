//! Parsed program form.
//!
//! A program is a flat sequence of terms. Quotation bodies are plain value
//! sequences: a SYMBOL term is executed, anything else is pushed. Definition
//! blocks stay inline in the term stream so that execution installs them in
//! source order; a program may redefine a name mid-stream and later
//! occurrences must see the new body.

use joy_core::Value;

/// A user definition clause: `name == body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub body: Vec<Value>,
}

/// One top-level program term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A literal to push or a symbol to execute.
    Value(Value),
    /// A definition block, installed atomically when execution reaches it.
    Defs(Vec<Definition>),
    /// A `$`-line: run the command through the shell.
    Shell(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub terms: Vec<Term>,
}

impl Program {
    pub fn new() -> Self {
        Program { terms: Vec::new() }
    }

    /// All definitions in source order (later clauses shadow earlier ones).
    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.terms.iter().flat_map(|t| match t {
            Term::Defs(defs) => defs.as_slice(),
            _ => &[],
        })
    }
}
