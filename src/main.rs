//! Intcode program runner.
//!
//! Loads a program, runs it to halt and prints what it outputs.
//!
//! # Usage
//! ```text
//! intcode <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: Comma-separated Intcode file, or assembly source if it ends in `.asm`
//!
//! # Options
//! - `-i, --input <v1,v2,...>`: Input values, consumed in order (before stdin in ASCII mode)
//! - `-a, --ascii`: Feed stdin lines as ASCII and print output as text
//! - `-d, --disassemble`: Print an assembly listing instead of running
//! - `-s, --max-steps <n>`: Fail once `n` instructions have executed
//!
//! # Environment
//! - `INTCODE_LOG`: `debug`, `info`, `warn`, `error` or `off` (default `info`)
//! - `INTCODE_LOG_TIMESTAMPS`: set to `0` to drop timestamps

use intcode::composition::ascii::AsciiPort;
use intcode::utils::log;
use intcode::virtual_machine::assembler::{assemble_source, render_diagnostic};
use intcode::virtual_machine::disassembler::listing;
use intcode::virtual_machine::io::QueuePort;
use intcode::virtual_machine::program::Program;
use intcode::virtual_machine::vm::{Status, VM};
use intcode::{error, info};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

const ASM_EXTENSION: &str = "asm";

struct Options {
    path: String,
    input: Vec<i64>,
    ascii: bool,
    disassemble: bool,
    max_steps: Option<u64>,
}

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let options = parse_args(&args);
    let program = load(&options.path);

    if options.disassemble {
        print!("{}", listing(program.cells()));
        return;
    }

    let mut vm = VM::new(program);
    if let Some(limit) = options.max_steps {
        vm = vm.with_step_limit(limit);
    }

    let result = if options.ascii {
        run_ascii(&mut vm, &options.input)
    } else {
        run_numeric(&mut vm, &options.input)
    };

    if let Err(message) = result {
        error!("{message}");
        process::exit(1);
    }
    info!("Halted after {} steps", vm.steps());
}

fn parse_args(args: &[String]) -> Options {
    let mut options = Options {
        path: args[1].clone(),
        input: Vec::new(),
        ascii: false,
        disassemble: false,
        max_steps: None,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--input" | "-i") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                options.input = Program::parse(&args[i])
                    .map(Program::into_cells)
                    .unwrap_or_else(|e| {
                        error!("Invalid input values: {e}");
                        process::exit(1);
                    });
            }
            "--ascii" | "-a" => options.ascii = true,
            "--disassemble" | "-d" => options.disassemble = true,
            k @ ("--max-steps" | "-s") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                options.max_steps = Some(args[i].parse::<u64>().unwrap_or_else(|_| {
                    error!("Invalid step limit: '{}' is not a valid number", args[i]);
                    process::exit(1);
                }));
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
        i += 1;
    }

    options
}

/// Reads a program file, assembling it first if it is assembly source.
fn load(path: &str) -> Program {
    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        error!("Failed to read {path}: {e}");
        process::exit(1);
    });

    let is_asm = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ASM_EXTENSION));
    if !is_asm {
        return Program::parse(&source).unwrap_or_else(|e| {
            error!("Invalid program {path}: {e}");
            process::exit(1);
        });
    }

    match assemble_source(&source) {
        Ok(asm) => asm.program,
        Err(e) => {
            eprint!("{}", render_diagnostic(path, &source, &e));
            process::exit(1);
        }
    }
}

fn run_numeric(vm: &mut VM, input: &[i64]) -> Result<(), String> {
    let mut port = QueuePort::with_input(input.iter().copied());
    let status = vm.run(&mut port).map_err(|e| e.to_string())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let values = port.drain_output();
    write_output(&mut out, "", &values).map_err(stdout_error)?;

    match status {
        Status::Halted => Ok(()),
        _ => Err(format!("program is {status} at ip {} with no input left", vm.ip())),
    }
}

/// Runs an ASCII program, pulling a stdin line each time it blocks.
fn run_ascii(vm: &mut VM, input: &[i64]) -> Result<(), String> {
    let mut port = AsciiPort::new();
    port.extend(input.iter().copied());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    loop {
        let status = vm.run(&mut port).map_err(|e| e.to_string())?;
        let rendered = port.take();
        write_output(&mut out, &rendered.text, &rendered.values).map_err(stdout_error)?;

        match status {
            Status::Halted => return Ok(()),
            Status::AwaitingInput => match lines.next() {
                Some(Ok(line)) => port.send_line(&line),
                Some(Err(e)) => return Err(format!("Failed to read stdin: {e}")),
                None => return Err("stdin closed while the program awaits input".to_string()),
            },
            _ => {}
        }
    }
}

/// Writes `text` followed by one line per value, then flushes.
fn write_output<W: Write>(out: &mut W, text: &str, values: &[i64]) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    for value in values {
        writeln!(out, "{value}")?;
    }
    out.flush()
}

fn stdout_error(e: io::Error) -> String {
    format!("Failed to write stdout: {e}")
}

const USAGE: &str = "\
Intcode Runner

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Intcode file (comma-separated cells) or assembly source (*.asm)

OPTIONS:
    -i, --input <v1,v2,...>    Input values, consumed in order (before stdin with --ascii)
    -a, --ascii                Read input lines from stdin and print output as text
    -d, --disassemble          Print an assembly listing instead of running
    -s, --max-steps <n>        Fail once n instructions have executed
    -h, --help                 Print this help message

EXAMPLES:
    # Run with two inputs
    {program} program.txt -i 1,2

    # Interactive text adventure
    {program} adventure.txt --ascii

    # Inspect a program
    {program} program.txt -d
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
