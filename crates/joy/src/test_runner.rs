//! Test runner for Joy test files.
//!
//! Discovers `.joy` files under the given directories and runs each one
//! in a fresh evaluator. A file passes when it runs to completion and its
//! output matches its `# expect:` comment lines; files without expect
//! comments follow the older convention and fail when any output line is
//! `false`. With `--compile` each file is additionally lowered, built,
//! and executed, and the binary's stdout must match the evaluator's
//! byte for byte.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::backend::{compile_file, CompileOptions};
use crate::eval::{Evaluator, SharedOutput};
use joy_core::JoyError;

/// Result of running one test file.
#[derive(Debug)]
pub struct TestResult {
    pub path: PathBuf,
    pub passed: bool,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestResult>,
}

pub struct TestRunner {
    pub verbose: bool,
    pub pattern: String,
    pub compile: bool,
}

impl TestRunner {
    pub fn new(verbose: bool, pattern: Option<String>, compile: bool) -> Self {
        TestRunner {
            verbose,
            pattern: pattern.unwrap_or_else(|| "*.joy".to_string()),
            compile,
        }
    }

    /// All files under `paths` matching the pattern, sorted.
    pub fn discover(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_file() {
                if self.matches(path) {
                    files.push(path.clone());
                }
            } else if path.is_dir() {
                self.discover_in(path, &mut files);
            }
        }
        files.sort();
        files
    }

    fn discover_in(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    self.discover_in(&path, files);
                } else if self.matches(&path) {
                    files.push(path);
                }
            }
        }
    }

    fn matches(&self, path: &Path) -> bool {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => glob_match(&self.pattern, name),
            None => false,
        }
    }

    /// Run one test file through the evaluator (and optionally the
    /// compiled binary).
    pub fn run_file(&self, path: &Path) -> TestResult {
        let start = Instant::now();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                return TestResult {
                    path: path.to_path_buf(),
                    passed: false,
                    duration_ms: 0,
                    detail: Some(format!("read error: {}", e)),
                };
            }
        };

        let (passed, output, detail) = self.run_evaluator(path, &source);
        let mut passed = passed;
        let mut detail = detail;

        if passed && self.compile {
            if let Err(e) = self.check_compiled(path, &output) {
                passed = false;
                detail = Some(e);
            }
        }

        TestResult {
            path: path.to_path_buf(),
            passed,
            duration_ms: start.elapsed().as_millis() as u64,
            detail,
        }
    }

    fn run_evaluator(&self, path: &Path, source: &str) -> (bool, String, Option<String>) {
        let sink = SharedOutput::new();
        let mut ev = Evaluator::with_output(Box::new(sink.clone()));
        if let Err(e) = ev.load_stdlib() {
            return (false, String::new(), Some(format!("stdlib: {}", e)));
        }
        ev.args = vec![path.display().to_string()];

        match ev.run(source) {
            Ok(()) | Err(JoyError::Exit(0)) => {}
            Err(e) => {
                return (false, sink.contents(), Some(format!("error: {}", e)));
            }
        }
        let output = sink.contents();

        let expected = expected_lines(source);
        if !expected.is_empty() {
            let actual: Vec<&str> = output.lines().collect();
            if actual == expected {
                (true, output, None)
            } else {
                let detail = format!(
                    "expected {:?}, got {:?}",
                    expected, actual
                );
                (false, output, Some(detail))
            }
        } else if output.lines().any(|line| line.trim() == "false") {
            (false, output.clone(), Some(format!("output: {}", output.trim())))
        } else {
            (true, output, None)
        }
    }

    /// Compile the file and require byte-identical stdout.
    fn check_compiled(&self, path: &Path, evaluator_output: &str) -> Result<(), String> {
        let dir = std::env::temp_dir().join(format!(
            "joy_test_{}",
            sanitize_name(&path.display().to_string())
        ));
        let options = CompileOptions {
            output_dir: Some(dir.clone()),
            name: Some("test".into()),
            no_compile: false,
            run: false,
        };
        let artifacts = compile_file(path, &options)?;
        let exe = artifacts
            .executable
            .ok_or_else(|| "no executable produced".to_string())?;
        let output = Command::new(&exe)
            .output()
            .map_err(|e| format!("failed to run compiled binary: {}", e))?;
        let _ = fs::remove_dir_all(&dir);
        let compiled = String::from_utf8_lossy(&output.stdout);
        if compiled != evaluator_output {
            return Err(format!(
                "compiled output differs: evaluator {:?}, binary {:?}",
                evaluator_output, compiled
            ));
        }
        Ok(())
    }

    pub fn run(&self, paths: &[PathBuf]) -> TestSummary {
        let mut summary = TestSummary::default();
        for path in self.discover(paths) {
            let result = self.run_file(&path);
            summary.total += 1;
            if result.passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }
        summary
    }

    pub fn print_results(&self, summary: &TestSummary) {
        for result in &summary.results {
            let status = if result.passed { "ok" } else { "FAILED" };
            if self.verbose {
                println!(
                    "  {} ... {} ({}ms)",
                    result.path.display(),
                    status,
                    result.duration_ms
                );
            } else {
                println!("  {} ... {}", result.path.display(), status);
            }
        }

        println!();
        println!(
            "Results: {} passed, {} failed",
            summary.passed, summary.failed
        );

        let failures: Vec<&TestResult> =
            summary.results.iter().filter(|r| !r.passed).collect();
        if !failures.is_empty() {
            println!("\nFAILURES:\n");
            for result in failures {
                println!("{}", result.path.display());
                if let Some(detail) = &result.detail {
                    for line in detail.lines() {
                        println!("  {}", line);
                    }
                }
                println!();
            }
        }
    }
}

/// The `# expect:` comment lines of a test file, in order.
fn expected_lines(source: &str) -> Vec<&str> {
    source
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# expect:"))
        .map(|rest| rest.trim())
        .collect()
}

/// Minimal glob: `*` matches any run of characters; everything else is
/// literal.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn matches(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&p[1..], n) || (!n.is_empty() && matches(p, &n[1..]))
            }
            (Some(pc), Some(nc)) if pc == nc => matches(&p[1..], &n[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), name.as_bytes())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
