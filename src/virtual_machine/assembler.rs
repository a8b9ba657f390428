//! Assembly language parser and Intcode compiler.
//!
//! Converts human-readable assembly source into program cells. Mnemonics and
//! operand roles come from the [`Opcode`] table, so the assembler accepts
//! exactly what the executor runs.
//!
//! # Syntax
//!
//! ```text
//! label: MNEMONIC operand1, operand2, ...  # optional comment
//! ```
//!
//! - Mnemonics are case-insensitive (`ADD`, `mul`, `Halt`, ...)
//! - `42`, `-1` or `label` is an immediate operand
//! - `[42]` or `[label]` is a position-mode operand
//! - `[rb]`, `[rb+3]`, `[rb-1]` are relative-mode operands
//! - `DATA v1, v2, ...` emits raw cells (integers or label addresses)
//! - Comments start with `#`
//! - A label names the address of the next emitted cell

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Access, Opcode};
use crate::virtual_machine::operand::ParamMode;
use crate::virtual_machine::program::Program;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';
const OPERAND_SEPARATOR: char = ',';
const DATA_DIRECTIVE: &str = "DATA";
const RELATIVE_BASE: &str = "rb";

/// Formats a compiler-style diagnostic for assembly failures.
pub fn render_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let VMError::AssemblyError { line, message } = err else {
        return format!("error: {err}");
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}");
    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
        let _ = writeln!(diag, "  |");
    }
    diag
}

/// Output of a successful assembly.
#[derive(Clone, Debug)]
pub struct Assembly {
    /// Assembled cells.
    pub program: Program,
    /// Label definitions mapping names to cell addresses.
    pub labels: HashMap<String, usize>,
}

impl Assembly {
    /// Address of `label`, if it was defined.
    pub fn label(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }
}

/// A literal or a label reference, resolved in the second pass.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Value {
    Literal(i64),
    Label(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Operand {
    Immediate(Value),
    Position(Value),
    Relative(i64),
}

impl Operand {
    fn mode(&self) -> ParamMode {
        match self {
            Operand::Immediate(_) => ParamMode::Immediate,
            Operand::Position(_) => ParamMode::Position,
            Operand::Relative(_) => ParamMode::Relative,
        }
    }
}

/// One parsed source statement.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Statement {
    Instruction { opcode: Opcode, operands: Vec<Operand> },
    Data(Vec<Value>),
}

impl Statement {
    /// Number of cells the statement emits.
    fn width(&self) -> usize {
        match self {
            Statement::Instruction { opcode, .. } => opcode.width(),
            Statement::Data(values) => values.len(),
        }
    }
}

/// A source line after the first pass.
#[derive(Debug)]
struct Line {
    number: usize,
    statement: Statement,
}

fn line_error(line: usize, message: impl Into<String>) -> VMError {
    VMError::AssemblyError {
        line,
        message: message.into(),
    }
}

fn is_identifier(tok: &str) -> bool {
    let mut chars = tok.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `tok` is a label definition (ends with `:`).
fn is_label_def(tok: &str) -> bool {
    tok.strip_suffix(LABEL_SUFFIX).is_some_and(is_identifier)
}

/// Parse an integer literal or a label reference.
fn parse_value(line: usize, tok: &str) -> Result<Value, VMError> {
    if let Ok(v) = tok.parse::<i64>() {
        return Ok(Value::Literal(v));
    }
    if is_identifier(tok) && !tok.eq_ignore_ascii_case(RELATIVE_BASE) {
        return Ok(Value::Label(tok.to_string()));
    }
    Err(line_error(line, format!("invalid value {tok:?}")))
}

/// Parse one operand token. Whitespace inside brackets is ignored.
fn parse_operand(line: usize, tok: &str) -> Result<Operand, VMError> {
    let tok: String = tok.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(inner) = tok.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
        return Ok(Operand::Immediate(parse_value(line, &tok)?));
    };

    let relative = inner
        .get(..RELATIVE_BASE.len())
        .filter(|head| head.eq_ignore_ascii_case(RELATIVE_BASE))
        .map(|_| &inner[RELATIVE_BASE.len()..]);
    match relative {
        Some("") => Ok(Operand::Relative(0)),
        Some(offset) if offset.starts_with(['+', '-']) => offset
            .parse::<i64>()
            .map(Operand::Relative)
            .map_err(|_| line_error(line, format!("invalid relative offset {offset:?}"))),
        _ => Ok(Operand::Position(parse_value(line, inner)?)),
    }
}

/// Parses a comment-free, label-free statement.
fn parse_statement(line: usize, text: &str) -> Result<Statement, VMError> {
    let (name, rest) = match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim()),
        None => (text, ""),
    };

    let tokens: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(OPERAND_SEPARATOR).map(str::trim).collect()
    };
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(line_error(line, "empty operand"));
    }

    if name.eq_ignore_ascii_case(DATA_DIRECTIVE) {
        if tokens.is_empty() {
            return Err(line_error(line, "DATA requires at least one value"));
        }
        let values = tokens
            .iter()
            .map(|t| parse_value(line, t))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Statement::Data(values));
    }

    let opcode = Opcode::from_mnemonic(name)
        .ok_or_else(|| line_error(line, format!("unknown instruction {name:?}")))?;

    if tokens.len() != opcode.arity() {
        return Err(line_error(
            line,
            format!(
                "{} expects {} operand(s), got {}",
                opcode.mnemonic(),
                opcode.arity(),
                tokens.len()
            ),
        ));
    }

    let mut operands = Vec::with_capacity(tokens.len());
    for (k, (tok, access)) in tokens.iter().zip(opcode.operands()).enumerate() {
        let operand = parse_operand(line, tok)?;
        if *access == Access::Write && operand.mode() == ParamMode::Immediate {
            return Err(line_error(
                line,
                format!(
                    "operand {} of {} is written and cannot be immediate",
                    k + 1,
                    opcode.mnemonic()
                ),
            ));
        }
        operands.push(operand);
    }

    Ok(Statement::Instruction { opcode, operands })
}

/// First pass: parse statements and record the address of every label.
fn first_pass(source: &str) -> Result<(Vec<Line>, HashMap<String, usize>), VMError> {
    let mut lines = Vec::new();
    let mut labels = HashMap::new();
    let mut address = 0usize;

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let mut text = raw.split(COMMENT_CHAR).next().unwrap_or_default().trim();

        while let Some(head) = text.split_whitespace().next()
            && is_label_def(head)
        {
            let name = &head[..head.len() - 1];
            if labels.insert(name.to_string(), address).is_some() {
                return Err(line_error(number, format!("duplicate label {name:?}")));
            }
            text = text[head.len()..].trim_start();
        }
        if text.is_empty() {
            continue;
        }
        if text.split_whitespace().next().is_some_and(|t| t.ends_with(LABEL_SUFFIX)) {
            return Err(line_error(number, format!("invalid label definition {text:?}")));
        }

        let statement = parse_statement(number, text)?;
        address += statement.width();
        lines.push(Line { number, statement });
    }

    Ok((lines, labels))
}

fn resolve(line: usize, value: &Value, labels: &HashMap<String, usize>) -> Result<i64, VMError> {
    match value {
        Value::Literal(v) => Ok(*v),
        Value::Label(name) => labels
            .get(name)
            .map(|&addr| addr as i64)
            .ok_or_else(|| line_error(line, format!("undefined label {name:?}"))),
    }
}

/// Second pass: emit cells with every label resolved.
fn second_pass(lines: &[Line], labels: &HashMap<String, usize>) -> Result<Vec<i64>, VMError> {
    let mut cells = Vec::new();
    for Line { number, statement } in lines {
        match statement {
            Statement::Data(values) => {
                for value in values {
                    cells.push(resolve(*number, value, labels)?);
                }
            }
            Statement::Instruction { opcode, operands } => {
                let mut head = *opcode as i64;
                let mut scale = 100;
                for operand in operands {
                    head += operand.mode() as i64 * scale;
                    scale *= 10;
                }
                cells.push(head);
                for operand in operands {
                    cells.push(match operand {
                        Operand::Immediate(v) | Operand::Position(v) => resolve(*number, v, labels)?,
                        Operand::Relative(offset) => *offset,
                    });
                }
            }
        }
    }
    Ok(cells)
}

/// Assemble a full source string into program cells.
///
/// Uses two-pass assembly:
/// 1. First pass: parse lines and record label positions
/// 2. Second pass: resolve labels and emit cells
pub fn assemble_source(source: &str) -> Result<Assembly, VMError> {
    let (lines, labels) = first_pass(source)?;
    let cells = second_pass(&lines, &labels)?;
    if cells.is_empty() {
        return Err(VMError::EmptyProgram);
    }
    Ok(Assembly {
        program: Program::new(cells),
        labels,
    })
}

/// Convenience: assemble directly from file path
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Assembly, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        reason: e.to_string(),
    })?;
    assemble_source(&source)
}
