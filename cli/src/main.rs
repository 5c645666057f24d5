use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weft_core::ops::NativeFunction;
use weft_core::val::Val;
use weft_core::vm::{ScriptMachine, ScriptProgram};

#[derive(Debug, Parser)]
#[command(name = "weft", version, about = "Run Weft scripts", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// If no subcommand, treat as a source file to execute
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Report script errors as a JSON object on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a script file
    Run { file: PathBuf },
    /// Print the compiled blocks of a script file
    Disasm { file: PathBuf },
}

fn print(_machine: &mut ScriptMachine, args: &[Val]) -> Val {
    println!("{}", args[0]);
    Val::default()
}

const HOST_FUNCTIONS: &[NativeFunction] = &[NativeFunction {
    name: "print",
    func: print,
    arity: 1,
}];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let outcome = match (args.command, args.file) {
        (Some(Commands::Run { file }), _) | (None, Some(file)) => execute(&file, args.json),
        (Some(Commands::Disasm { file }), _) => disasm(&file, args.json),
        (None, None) => {
            eprintln!("error: no input file (try --help)");
            return ExitCode::FAILURE;
        }
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn compile_file(file: &Path) -> Result<ScriptProgram> {
    let source =
        fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    Ok(ScriptProgram::compile(&source, HOST_FUNCTIONS))
}

/// Compile and run one script; script failures are reported, not bubbled.
fn execute(file: &Path, json: bool) -> Result<bool> {
    let program = compile_file(file)?;
    if program.has_error() {
        report_failure(json, "compile", program.error_line(), program.error_message());
        return Ok(false);
    }
    let mut machine = ScriptMachine::new(Arc::new(program));
    machine.run();
    if machine.has_error() {
        report_failure(json, "runtime", machine.error_line(), machine.error_message());
        return Ok(false);
    }
    Ok(true)
}

fn disasm(file: &Path, json: bool) -> Result<bool> {
    let program = compile_file(file)?;
    if program.has_error() {
        report_failure(json, "compile", program.error_line(), program.error_message());
        return Ok(false);
    }
    for (id, block) in program.blocks().iter().enumerate() {
        if block.native.is_some() {
            continue;
        }
        let name = if block.name.is_empty() { "<anonymous>" } else { block.name.as_str() };
        println!(
            "block {id} {:?} level={} args={} {}",
            block.kind, block.level, block.arguments, name
        );
        for (at, instr) in block.codes.iter().enumerate() {
            println!("  {at:4}  {:<32}; line {}", format!("{:?}", instr.op), instr.line);
        }
    }
    Ok(true)
}

fn report_failure(json: bool, phase: &str, line: u32, message: &str) {
    if json {
        let payload = serde_json::json!({
            "phase": phase,
            "line": line,
            "message": message,
        });
        println!("{payload}");
    } else {
        eprintln!("error: line {line}: {message}");
    }
}
