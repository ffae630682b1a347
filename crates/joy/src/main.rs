//! Joy CLI.
//!
//! Command-line interface for running Joy programs, compiling them to C,
//! and running test suites.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use joyc::backend::{compile_file, CompileOptions};
use joyc::eval::Evaluator;
use joyc::test_runner::TestRunner;
use joy_core::JoyError;

#[derive(ClapParser)]
#[command(name = "joy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Joy programming language - interpreter and C compiler", long_about = None)]
struct Cli {
    /// Evaluate an inline expression and print the result
    #[arg(short = 'e', long = "eval", value_name = "EXPR")]
    eval: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a Joy source file
    Run {
        /// Joy source file (becomes argv[0] inside the program)
        file: PathBuf,

        /// Arguments passed to the program as argv[1..]
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Compile a Joy program to C and build a standalone executable
    Compile {
        /// Input Joy source file
        input: PathBuf,

        /// Output directory (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Name of the produced executable (default: source file stem)
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,

        /// Generate C only, do not invoke the system C compiler
        #[arg(long)]
        no_compile: bool,

        /// Run the produced executable after compiling
        #[arg(long)]
        run: bool,
    },

    /// Run Joy test files
    Test {
        /// Directory or file to test
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// File pattern to match
        #[arg(long, default_value = "*.joy")]
        pattern: String,

        /// Also compile each file and compare outputs byte for byte
        #[arg(long)]
        compile: bool,

        /// Show timing for each test
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    // Bare `joy FILE [ARGS..]` compatibility: if the first argument looks
    // like a source file rather than a subcommand, execute it directly.
    let raw: Vec<String> = std::env::args().collect();
    if let Some(first) = raw.get(1) {
        let known = ["run", "compile", "test", "completions", "help"];
        if !first.starts_with('-') && !known.contains(&first.as_str()) {
            let path = Path::new(first);
            if path.extension().is_some_and(|e| e == "joy") || path.exists() {
                process::exit(run_file(path, &raw[2..]));
            }
        }
    }

    let cli = Cli::parse();

    if let Some(expr) = cli.eval {
        process::exit(run_expression(&expr));
    }

    match cli.command {
        Some(Commands::Run { file, args }) => {
            process::exit(run_file(&file, &args));
        }
        Some(Commands::Compile {
            input,
            output,
            name,
            no_compile,
            run,
        }) => {
            process::exit(run_compile(&input, output, name, no_compile, run));
        }
        Some(Commands::Test {
            dir,
            pattern,
            compile,
            verbose,
        }) => {
            process::exit(run_test(&dir, pattern, compile, verbose));
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "joy", &mut io::stdout());
        }
        None => {
            // No REPL in this build: print usage.
            let _ = Cli::command().print_help();
            println!();
        }
    }
}

fn new_evaluator() -> Result<Evaluator, String> {
    let mut ev = Evaluator::new();
    ev.load_stdlib()
        .map_err(|e| format!("failed to load standard library: {}", e))?;
    Ok(ev)
}

fn finish(result: Result<(), JoyError>, ev: &mut Evaluator) -> i32 {
    match result {
        Ok(()) => {
            ev.autoput_top();
            ev.flush_output();
            0
        }
        Err(JoyError::Exit(code)) => {
            ev.flush_output();
            code
        }
        Err(e) => {
            ev.flush_output();
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn run_file(path: &Path, args: &[String]) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    let mut ev = match new_evaluator() {
        Ok(ev) => ev,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    ev.args = std::iter::once(path.display().to_string())
        .chain(args.iter().cloned())
        .collect();
    let result = ev.run(&source);
    finish(result, &mut ev)
}

fn run_expression(expr: &str) -> i32 {
    let mut ev = match new_evaluator() {
        Ok(ev) => ev,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let result = ev.run(expr);
    finish(result, &mut ev)
}

fn run_compile(
    input: &Path,
    output: Option<PathBuf>,
    name: Option<String>,
    no_compile: bool,
    run: bool,
) -> i32 {
    let options = CompileOptions {
        output_dir: output,
        name,
        no_compile,
        run,
    };
    let artifacts = match compile_file(input, &options) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    println!("Generated: {}", artifacts.c_file.display());
    println!("Generated: {}", artifacts.makefile.display());
    if let Some(exe) = &artifacts.executable {
        println!("Compiled:  {}", exe.display());
        if run {
            println!();
            match process::Command::new(exe).status() {
                Ok(status) => return status.code().unwrap_or(1),
                Err(e) => {
                    eprintln!("Error: failed to run {}: {}", exe.display(), e);
                    return 1;
                }
            }
        }
    }
    0
}

fn run_test(dir: &Path, pattern: String, compile: bool, verbose: bool) -> i32 {
    let runner = TestRunner::new(verbose, Some(pattern), compile);
    let summary = runner.run(&[dir.to_path_buf()]);
    runner.print_results(&summary);
    if summary.failed > 0 {
        1
    } else if summary.total == 0 {
        eprintln!("No tests found");
        2
    } else {
        0
    }
}
