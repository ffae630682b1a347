//! The Joy evaluator.
//!
//! Executes parsed programs against an operand stack and a dictionary.
//! Dispatch rule: a SYMBOL term is looked up — primitives run as native
//! actions, user definitions expand recursively — and every other term is
//! pushed as a deep copy.
//!
//! Primitives are registered into one static table, one `register`
//! function per module, mirroring the split of the primitive families.

pub mod aggregate;
pub mod arithmetic;
pub mod combinators;
pub mod io;
pub mod logic;
pub mod stack_ops;
pub mod system;
pub mod types;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use joy_core::{JoyError, Stack, Value};

use crate::ast::{Program, Term};
use crate::parser;
use crate::stdlib_embed;

/// A primitive: an action on the evaluator with a fixed arity contract.
pub type Primitive = fn(&mut Evaluator) -> Result<(), JoyError>;

static PRIMITIVES: LazyLock<HashMap<&'static str, Primitive>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, Primitive> = HashMap::new();
    stack_ops::register(&mut table);
    arithmetic::register(&mut table);
    logic::register(&mut table);
    aggregate::register(&mut table);
    types::register(&mut table);
    combinators::register(&mut table);
    io::register(&mut table);
    system::register(&mut table);
    table
});

/// Look up a primitive by name.
pub fn primitive(name: &str) -> Option<Primitive> {
    PRIMITIVES.get(name).copied()
}

/// All primitive names, sorted.
pub fn primitive_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PRIMITIVES.keys().copied().collect();
    names.sort_unstable();
    names
}

/// An output sink backed by a shared buffer, for capturing program output
/// (used by the test runner to compare evaluator and compiled output).
#[derive(Clone, Default)]
pub struct SharedOutput(pub Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        SharedOutput::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Evaluator state: stack, dictionary of user definitions, process flags,
/// program arguments, and the output sink.
pub struct Evaluator {
    pub stack: Stack,
    definitions: HashMap<String, Vec<Value>>,
    /// Print TOS after each top-level program when the stack is non-empty.
    pub autoput: bool,
    /// Fatal error on unknown words; when off they are recorded no-ops.
    pub undeferror: bool,
    /// Trace setting 0..3.
    pub echo: i64,
    undefs: Vec<String>,
    pub args: Vec<String>,
    pub(crate) rng: StdRng,
    out: Box<dyn Write>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_output(Box::new(std::io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Evaluator {
            stack: Stack::new(),
            definitions: HashMap::new(),
            autoput: true,
            undeferror: true,
            echo: 0,
            undefs: Vec::new(),
            args: Vec::new(),
            rng: StdRng::from_entropy(),
            out,
        }
    }

    /// Load the embedded base and aggregate libraries, in order, with
    /// program output suppressed.
    pub fn load_stdlib(&mut self) -> Result<(), JoyError> {
        let real_out = std::mem::replace(&mut self.out, Box::new(std::io::sink()));
        let result = (|| {
            for (name, source) in stdlib_embed::startup_libraries() {
                debug!(library = name, "loading standard library");
                self.run(source)?;
            }
            Ok(())
        })();
        self.out = real_out;
        result
    }

    /// Parse and execute Joy source.
    pub fn run(&mut self, source: &str) -> Result<(), JoyError> {
        let program = parser::parse(source)?;
        self.run_program(&program)
    }

    /// Execute a parsed program, installing definition blocks in order.
    pub fn run_program(&mut self, program: &Program) -> Result<(), JoyError> {
        for term in &program.terms {
            match term {
                Term::Value(value) => self.execute_term(value)?,
                Term::Defs(defs) => {
                    for def in defs {
                        self.define(&def.name, def.body.clone());
                    }
                }
                Term::Shell(cmd) => {
                    system::run_shell(cmd);
                }
            }
        }
        Ok(())
    }

    /// Execute one term: symbols dispatch, everything else pushes a copy.
    pub fn execute_term(&mut self, term: &Value) -> Result<(), JoyError> {
        if self.echo >= 2 {
            debug!(term = %term, "execute");
        }
        match term {
            Value::Symbol(name) => self.execute_symbol(&name.clone()),
            other => {
                self.stack.push(other.clone());
                Ok(())
            }
        }
    }

    pub fn execute_symbol(&mut self, name: &str) -> Result<(), JoyError> {
        if let Some(prim) = primitive(name) {
            return prim(self);
        }
        if let Some(body) = self.definitions.get(name) {
            let body = body.clone();
            return self.execute_quotation(&body);
        }
        if self.undeferror {
            Err(JoyError::undefined(name))
        } else {
            self.undefs.push(name.to_string());
            Ok(())
        }
    }

    /// Execute a term sequence (a quotation body).
    pub fn execute_quotation(&mut self, terms: &[Value]) -> Result<(), JoyError> {
        for term in terms {
            self.execute_term(term)?;
        }
        Ok(())
    }

    /// Run a predicate quotation under snapshot/restore and report its
    /// truth. The snapshot discipline: whatever the predicate leaves
    /// behind is dropped and the saved items reinstated.
    pub(crate) fn probe(&mut self, predicate: &[Value]) -> Result<bool, JoyError> {
        let saved = self.stack.snapshot();
        self.execute_quotation(predicate)?;
        let result = self.stack.pop("predicate")?;
        self.stack.restore(saved);
        Ok(result.truthy())
    }

    pub fn define(&mut self, name: &str, body: Vec<Value>) {
        self.definitions.insert(name.to_string(), body);
    }

    pub fn unassign(&mut self, name: &str) {
        self.definitions.remove(name);
    }

    pub fn definition(&self, name: &str) -> Option<&Vec<Value>> {
        self.definitions.get(name)
    }

    pub fn definition_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn undefs(&self) -> &[String] {
        &self.undefs
    }

    /// Write program output; best-effort like the C runtime's stdio.
    pub(crate) fn emit(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
    }

    pub fn flush_output(&mut self) {
        let _ = self.out.flush();
    }

    /// Print TOS if `autoput` is on and the stack is non-empty; called by
    /// the driver after a top-level program.
    pub fn autoput_top(&mut self) {
        if self.autoput && !self.stack.is_empty() {
            if let Ok(top) = self.stack.peek(".", 0) {
                let text = format!("{}\n", top);
                self.emit(&text);
            }
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers for primitive implementations
// ---------------------------------------------------------------------------

/// Extract a quotation body for execution. LIST is accepted and treated
/// identically; anything else is a type error naming `op`.
pub(crate) fn expect_quotation(value: Value, op: &str) -> Result<Vec<Value>, JoyError> {
    match value {
        Value::Quotation(terms) | Value::List(terms) => Ok(terms),
        other => Err(JoyError::type_error(op, "quotation", other.type_name())),
    }
}

/// Elements of an aggregate, or a type error naming `op`.
pub(crate) fn elements(value: &Value, op: &str) -> Result<Vec<Value>, JoyError> {
    value
        .elements()
        .ok_or_else(|| JoyError::type_error(op, "aggregate", value.type_name()))
}

/// A numeric operand: integers stay exact, floats stay floats. CHAR and
/// BOOLEAN participate with their ordinal values.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

pub(crate) fn numeric(value: &Value, op: &str) -> Result<Num, JoyError> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(x) => Ok(Num::Float(*x)),
        Value::Char(c) => Ok(Num::Int(*c as i64)),
        Value::Bool(b) => Ok(Num::Int(if *b { 1 } else { 0 })),
        other => Err(JoyError::type_error(op, "numeric", other.type_name())),
    }
}

/// Apply a binary numeric operation with INTEGER→FLOAT promotion; integer
/// arithmetic wraps (two's complement) to match the compiled runtime.
pub(crate) fn numeric_binary(
    op: &str,
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, JoyError> {
    match (numeric(a, op)?, numeric(b, op)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(int_op(x, y))),
        (x, y) => Ok(Value::Float(float_op(x.as_f64(), y.as_f64()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with_output(source: &str) -> (Evaluator, SharedOutput) {
        let out = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(out.clone()));
        ev.run(source).unwrap();
        (ev, out)
    }

    #[test]
    fn test_literals_push() {
        let (ev, _) = eval_with_output("1 2.5 true 'a \"s\" [dup] {1 2}");
        assert_eq!(ev.stack.depth(), 7);
    }

    #[test]
    fn test_symbol_dispatch() {
        let (ev, _) = eval_with_output("2 3 +");
        assert_eq!(ev.stack.items(), &[Value::Int(5)]);
    }

    #[test]
    fn test_definition_installed_in_order() {
        let (ev, _) = eval_with_output("DEFINE n == 1 . n DEFINE n == 2 . n");
        assert_eq!(ev.stack.items(), &[Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_undefined_word_is_fatal_by_default() {
        let mut ev = Evaluator::new();
        let err = ev.run("nonsense").unwrap_err();
        assert_eq!(err, JoyError::undefined("nonsense"));
    }

    #[test]
    fn test_undeferror_off_records_noop() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.undeferror = false;
        ev.run("1 nonsense 2").unwrap();
        assert_eq!(ev.stack.depth(), 2);
        assert_eq!(ev.undefs(), &["nonsense".to_string()]);
    }

    #[test]
    fn test_probe_restores_stack() {
        let mut ev = Evaluator::with_output(Box::new(std::io::sink()));
        ev.run("10 20").unwrap();
        let truthy = ev
            .probe(&[Value::Int(7), Value::Int(7), Value::Symbol("+".into())])
            .unwrap();
        assert!(truthy);
        assert_eq!(ev.stack.items(), &[Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn test_primitive_registry_has_core_words() {
        for name in ["dup", "+", "ifte", "map", "linrec", "put", "fopen"] {
            assert!(primitive(name).is_some(), "missing primitive {}", name);
        }
    }
}
