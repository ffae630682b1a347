//! The C backend: lowering driver and compiled-artifact layout.
//!
//! `compile FILE -o DIR -n N` produces `DIR/N/` containing the generated
//! translation unit `N.c`, the runtime sources (byte-identical across
//! compilations), a minimal Makefile, and - unless `--no-compile` - the
//! executable `N` built with the system C compiler.

pub mod converter;
pub mod emitter;
pub mod preprocessor;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use tracing::debug;

use joy_core::JoyError;

use crate::parser;
use converter::Converter;
use emitter::Emitter;

/// The embedded runtime library sources, written next to every generated
/// translation unit.
pub const RUNTIME_SOURCES: [(&str, &str); 3] = [
    ("joy_runtime.h", include_str!("runtime/joy_runtime.h")),
    ("joy_runtime.c", include_str!("runtime/joy_runtime.c")),
    ("joy_primitives.c", include_str!("runtime/joy_primitives.c")),
];

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Output directory (defaults to the current directory).
    pub output_dir: Option<PathBuf>,
    /// Artifact name (defaults to the source file stem).
    pub name: Option<String>,
    /// Generate C only; skip the system C compiler.
    pub no_compile: bool,
    /// Execute the produced binary.
    pub run: bool,
}

/// Paths of the produced artifacts.
#[derive(Debug, Clone)]
pub struct CompileArtifacts {
    pub dir: PathBuf,
    pub c_file: PathBuf,
    pub makefile: PathBuf,
    pub executable: Option<PathBuf>,
}

/// Lower Joy source to a C translation unit. Includes are expanded
/// relative to `source_path` when given.
pub fn compile_to_c(source: &str, source_path: Option<&Path>) -> Result<String, JoyError> {
    let program = parser::parse(source)?;
    let program = preprocessor::preprocess_includes(program, source_path)?;
    let lowered = Converter::new().convert(&program);
    Ok(Emitter::new().emit(&lowered))
}

/// Compile a Joy source file into a standalone artifact directory.
pub fn compile_file(source_path: &Path, options: &CompileOptions) -> Result<CompileArtifacts, String> {
    let source = std::fs::read_to_string(source_path)
        .map_err(|e| format!("failed to read {}: {}", source_path.display(), e))?;

    let name = options.name.clone().unwrap_or_else(|| {
        source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "joyprog".to_string())
    });
    let base_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let dir = base_dir.join(&name);
    std::fs::create_dir_all(&dir).map_err(|e| format!("failed to create {}: {}", dir.display(), e))?;

    let c_source =
        compile_to_c(&source, Some(source_path)).map_err(|e| format!("lowering failed: {}", e))?;
    let c_file = dir.join(format!("{}.c", name));
    std::fs::write(&c_file, c_source).map_err(|e| format!("failed to write C file: {}", e))?;

    for (file_name, contents) in RUNTIME_SOURCES {
        std::fs::write(dir.join(file_name), contents)
            .map_err(|e| format!("failed to write {}: {}", file_name, e))?;
    }

    let makefile = dir.join("Makefile");
    std::fs::write(&makefile, makefile_text(&name))
        .map_err(|e| format!("failed to write Makefile: {}", e))?;

    let executable = if options.no_compile {
        None
    } else {
        let cc = find_c_compiler()?;
        let exe = dir.join(&name);
        debug!(compiler = cc, output = %exe.display(), "invoking C compiler");
        let output = Command::new(cc)
            .arg("-O2")
            .arg("-std=c99")
            .arg("-o")
            .arg(&exe)
            .arg(&c_file)
            .arg(dir.join("joy_runtime.c"))
            .arg(dir.join("joy_primitives.c"))
            .arg("-lm")
            .output()
            .map_err(|e| format!("failed to run {}: {}", cc, e))?;
        if !output.status.success() {
            return Err(format!(
                "C compilation failed:\n{}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Some(exe)
    };

    Ok(CompileArtifacts {
        dir,
        c_file,
        makefile,
        executable,
    })
}

fn makefile_text(name: &str) -> String {
    format!(
        "CC ?= cc\n\
         CFLAGS ?= -O2 -std=c99\n\
         \n\
         {name}: {name}.c joy_runtime.c joy_primitives.c joy_runtime.h\n\
         \t$(CC) $(CFLAGS) -o {name} {name}.c joy_runtime.c joy_primitives.c -lm\n\
         \n\
         clean:\n\
         \trm -f {name}\n",
        name = name
    )
}

static C_COMPILER: OnceLock<Result<&'static str, String>> = OnceLock::new();

/// First working compiler of cc, gcc, clang. Checked once per process.
fn find_c_compiler() -> Result<&'static str, String> {
    C_COMPILER
        .get_or_init(|| {
            for candidate in ["cc", "gcc", "clang"] {
                let works = Command::new(candidate)
                    .arg("--version")
                    .output()
                    .map(|o| o.status.success())
                    .unwrap_or(false);
                if works {
                    return Ok(candidate);
                }
            }
            Err("no C compiler found (tried cc, gcc, clang)".to_string())
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_to_c_smoke() {
        let c = compile_to_c("2 3 + .", None).unwrap();
        assert!(c.starts_with("/* Generated by joy compile"));
        assert!(c.contains("int main(int argc, char** argv)"));
    }

    #[test]
    fn test_runtime_sources_are_embedded() {
        for (name, contents) in RUNTIME_SOURCES {
            assert!(!contents.is_empty(), "{} is empty", name);
        }
        assert!(RUNTIME_SOURCES[0].1.contains("JOY_RUNTIME_H"));
    }

    #[test]
    fn test_artifact_layout_without_cc() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("prog.joy");
        std::fs::write(&src, "2 3 + .").unwrap();
        let options = CompileOptions {
            output_dir: Some(dir.path().to_path_buf()),
            name: Some("prog".into()),
            no_compile: true,
            run: false,
        };
        let artifacts = compile_file(&src, &options).unwrap();
        assert!(artifacts.c_file.ends_with("prog/prog.c"));
        assert!(artifacts.c_file.exists());
        assert!(artifacts.makefile.exists());
        assert!(artifacts.dir.join("joy_runtime.h").exists());
        assert!(artifacts.dir.join("joy_runtime.c").exists());
        assert!(artifacts.dir.join("joy_primitives.c").exists());
        assert!(artifacts.executable.is_none());
    }

    #[test]
    fn test_makefile_names_artifact() {
        let text = makefile_text("demo");
        assert!(text.contains("demo: demo.c joy_runtime.c"));
    }
}
