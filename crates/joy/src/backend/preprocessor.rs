//! Compile-time `include` expansion.
//!
//! The compiled artifact has no runtime parser, so `include` is resolved
//! while lowering: included files are parsed and their terms spliced in
//! place. A visited set keyed by canonical path skips repeats and breaks
//! cycles; a missing file is a fatal error naming the include chain.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use joy_core::{JoyError, Value};

use crate::ast::{Program, Term};
use crate::parser;

pub struct IncludePreprocessor {
    base_dir: PathBuf,
    visited: HashSet<PathBuf>,
    chain: Vec<PathBuf>,
}

impl IncludePreprocessor {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        IncludePreprocessor {
            base_dir: base_dir.into(),
            visited: HashSet::new(),
            chain: Vec::new(),
        }
    }

    /// Expand every include in `program`, resolving relative paths
    /// against the source file's directory.
    pub fn process(
        &mut self,
        program: Program,
        source_path: Option<&Path>,
    ) -> Result<Program, JoyError> {
        let base = match source_path {
            Some(path) => {
                if let Ok(canonical) = path.canonicalize() {
                    self.visited.insert(canonical);
                }
                path.parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| self.base_dir.clone())
            }
            None => self.base_dir.clone(),
        };
        let terms = self.process_terms(program.terms, &base)?;
        Ok(Program { terms })
    }

    fn process_terms(&mut self, terms: Vec<Term>, base: &Path) -> Result<Vec<Term>, JoyError> {
        let mut out = Vec::with_capacity(terms.len());
        let mut iter = terms.into_iter().peekable();

        while let Some(term) = iter.next() {
            // `"file" include` — the string was already emitted; replace
            // both terms with the included program.
            if is_include_symbol(&term) {
                if let Some(Term::Value(Value::String(path))) = out.last() {
                    let path = path.clone();
                    out.pop();
                    out.extend(self.include_file(&path, base)?);
                    continue;
                }
                // `include "file"` — prefix form.
                if let Some(Term::Value(Value::String(_))) = iter.peek() {
                    let path = match iter.next() {
                        Some(Term::Value(Value::String(p))) => p,
                        _ => unreachable!(),
                    };
                    out.extend(self.include_file(&path, base)?);
                    continue;
                }
            }
            out.push(term);
        }
        Ok(out)
    }

    fn include_file(&mut self, path: &str, base: &Path) -> Result<Vec<Term>, JoyError> {
        let resolved = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            base.join(path)
        };
        let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());

        if self.visited.contains(&canonical) {
            // Already included somewhere up or before; splice nothing.
            return Ok(Vec::new());
        }

        let source = std::fs::read_to_string(&resolved).map_err(|e| {
            let chain = self
                .chain
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            JoyError::domain(
                "include",
                format!("{}: {} (include chain: {})", resolved.display(), e, chain),
            )
        })?;

        self.visited.insert(canonical.clone());
        self.chain.push(canonical);
        let program = parser::parse(&source)?;
        let new_base = resolved
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.to_path_buf());
        let result = self.process_terms(program.terms, &new_base);
        self.chain.pop();
        result
    }
}

fn is_include_symbol(term: &Term) -> bool {
    matches!(term, Term::Value(Value::Symbol(name)) if name == "include")
}

/// Expand includes in parsed source, with paths relative to `source_path`.
pub fn preprocess_includes(
    program: Program,
    source_path: Option<&Path>,
) -> Result<Program, JoyError> {
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    IncludePreprocessor::new(base).process(program, source_path)
}
