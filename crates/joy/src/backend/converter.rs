//! Lowers a parsed program to the C-form intermediate representation.
//!
//! Every literal aggregate anywhere in the program lands in a constant
//! pool, built bottom-up at startup (nested aggregates get lower indices
//! than their parents). Each user definition becomes a function plus a
//! pool quotation that is registered in the runtime dictionary, which is
//! what makes `body` reflection and symbol dispatch work in compiled
//! code.

use std::collections::HashMap;

use joy_core::Value;

use crate::ast::{Program, Term};

/// One element of an aggregate constant.
#[derive(Debug, Clone, PartialEq)]
pub enum CItem {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
    Set(u64),
    Symbol(String),
    /// A nested aggregate already in the pool.
    Pool(usize),
}

/// A pooled aggregate constant.
#[derive(Debug, Clone, PartialEq)]
pub enum CConst {
    List(Vec<CItem>),
    Quotation(Vec<CItem>),
}

/// One executable step of a word body or the main program.
#[derive(Debug, Clone, PartialEq)]
pub enum CTerm {
    PushInt(i64),
    PushFloat(f64),
    PushBool(bool),
    PushChar(char),
    PushString(String),
    PushSet(u64),
    /// Push a deep copy of a pool constant.
    PushPool(usize),
    /// Direct call to another user word.
    CallUser(String),
    /// Dictionary dispatch (primitives, forward references).
    CallSymbol(String),
    /// A `$`-line lowered to a shell invocation.
    Shell(String),
}

#[derive(Debug, Clone)]
pub struct CDefinition {
    pub name: String,
    pub c_name: String,
    /// Pool index of the body quotation (dictionary registration).
    pub body_pool: usize,
    pub terms: Vec<CTerm>,
}

#[derive(Debug, Clone, Default)]
pub struct CProgram {
    pub pool: Vec<CConst>,
    pub definitions: Vec<CDefinition>,
    pub main_terms: Vec<CTerm>,
}

pub struct Converter {
    pool: Vec<CConst>,
    c_names: HashMap<String, String>,
    used_c_names: HashMap<String, usize>,
}

impl Converter {
    pub fn new() -> Self {
        Converter {
            pool: Vec::new(),
            c_names: HashMap::new(),
            used_c_names: HashMap::new(),
        }
    }

    /// Convert a preprocessed program. Definitions shadow by name: the
    /// last body for a name wins, in its first position.
    pub fn convert(mut self, program: &Program) -> CProgram {
        // Pass 1: collect definitions (latest body per name) and assign
        // stable C names so bodies can call forward references directly.
        let mut order: Vec<String> = Vec::new();
        let mut bodies: HashMap<String, Vec<Value>> = HashMap::new();
        for def in program.definitions() {
            if !bodies.contains_key(&def.name) {
                order.push(def.name.clone());
            }
            bodies.insert(def.name.clone(), def.body.clone());
        }
        for name in &order {
            let c_name = self.assign_c_name(name);
            self.c_names.insert(name.clone(), c_name);
        }

        // Pass 2: lower each definition body.
        let mut definitions = Vec::with_capacity(order.len());
        for name in &order {
            let body = &bodies[name];
            let terms = self.convert_terms(body);
            let body_pool = self.pool_aggregate(body, true);
            definitions.push(CDefinition {
                name: name.clone(),
                c_name: self.c_names[name].clone(),
                body_pool,
                terms,
            });
        }

        // Pass 3: lower the top-level terms.
        let mut main_terms = Vec::new();
        for term in &program.terms {
            match term {
                Term::Value(value) => main_terms.push(self.convert_term(value)),
                Term::Defs(_) => {}
                Term::Shell(cmd) => main_terms.push(CTerm::Shell(cmd.clone())),
            }
        }

        CProgram {
            pool: self.pool,
            definitions,
            main_terms,
        }
    }

    fn assign_c_name(&mut self, name: &str) -> String {
        let base = format!("joy_word_{}", mangle(name));
        let count = self.used_c_names.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}_{}", base, count)
        }
    }

    fn convert_terms(&mut self, terms: &[Value]) -> Vec<CTerm> {
        terms.iter().map(|t| self.convert_term(t)).collect()
    }

    fn convert_term(&mut self, value: &Value) -> CTerm {
        match value {
            Value::Int(n) => CTerm::PushInt(*n),
            Value::Float(x) => CTerm::PushFloat(*x),
            Value::Bool(b) => CTerm::PushBool(*b),
            Value::Char(c) => CTerm::PushChar(*c),
            Value::String(s) => CTerm::PushString(s.clone()),
            Value::Set(bits) => CTerm::PushSet(*bits),
            Value::Symbol(name) => match self.c_names.get(name) {
                Some(c_name) => CTerm::CallUser(c_name.clone()),
                None => CTerm::CallSymbol(name.clone()),
            },
            Value::List(items) => CTerm::PushPool(self.pool_aggregate(items, false)),
            Value::Quotation(items) => CTerm::PushPool(self.pool_aggregate(items, true)),
            Value::File(_) => CTerm::CallSymbol("stdin".into()),
        }
    }

    /// Pool an aggregate, pooling nested aggregates first.
    fn pool_aggregate(&mut self, items: &[Value], quotation: bool) -> usize {
        let converted: Vec<CItem> = items.iter().map(|item| self.convert_item(item)).collect();
        let constant = if quotation {
            CConst::Quotation(converted)
        } else {
            CConst::List(converted)
        };
        self.pool.push(constant);
        self.pool.len() - 1
    }

    fn convert_item(&mut self, item: &Value) -> CItem {
        match item {
            Value::Int(n) => CItem::Int(*n),
            Value::Float(x) => CItem::Float(*x),
            Value::Bool(b) => CItem::Bool(*b),
            Value::Char(c) => CItem::Char(*c),
            Value::String(s) => CItem::String(s.clone()),
            Value::Set(bits) => CItem::Set(*bits),
            Value::Symbol(name) => CItem::Symbol(name.clone()),
            Value::List(items) => CItem::Pool(self.pool_aggregate(items, false)),
            Value::Quotation(items) => CItem::Pool(self.pool_aggregate(items, true)),
            Value::File(_) => CItem::Symbol("stdin".into()),
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Converter::new()
    }
}

/// Mangle a Joy word name into a valid C identifier. Alphanumerics pass
/// through, `-` becomes `_`, operator characters get named escapes, and
/// anything else is hex-encoded.
pub fn mangle(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        match c {
            '+' => out.push_str("_plus"),
            '-' => out.push('_'),
            '*' => out.push_str("_star"),
            '/' => out.push_str("_slash"),
            '=' => out.push_str("_eq"),
            '<' => out.push_str("_lt"),
            '>' => out.push_str("_gt"),
            '!' => out.push_str("_bang"),
            '?' => out.push_str("_q"),
            '.' => out.push_str("_dot"),
            '_' => out.push('_'),
            c if c.is_ascii_alphanumeric() => out.push(c),
            other => out.push_str(&format!("_x{:02x}", other as u32)),
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out.is_empty() {
        out.push_str("_unnamed");
    }
    out
}
