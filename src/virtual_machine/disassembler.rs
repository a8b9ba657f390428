//! Renders program cells as assembly listings.
//!
//! Output uses the assembler's syntax, so a listing assembles back to the
//! cells it came from. Cells that do not decode to an instruction whose
//! canonical encoding matches them byte for byte, or that would write through
//! an immediate operand, are listed as `DATA`.

use crate::virtual_machine::isa::{Access, Opcode};
use crate::virtual_machine::operand::{Instruction, ParamMode};
use std::fmt;

/// One listing entry covering `len` cells starting at `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub address: usize,
    pub len: usize,
    pub kind: EntryKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Instruction {
        opcode: Opcode,
        operands: Vec<(ParamMode, i64)>,
    },
    Data(i64),
}

fn write_operand(f: &mut fmt::Formatter<'_>, mode: ParamMode, value: i64) -> fmt::Result {
    match mode {
        ParamMode::Immediate => write!(f, "{value}"),
        ParamMode::Position => write!(f, "[{value}]"),
        ParamMode::Relative if value == 0 => write!(f, "[rb]"),
        ParamMode::Relative if value > 0 => write!(f, "[rb+{value}]"),
        ParamMode::Relative => write!(f, "[rb{value}]"),
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Data(value) => write!(f, "DATA {value}"),
            EntryKind::Instruction { opcode, operands } => {
                f.write_str(opcode.mnemonic())?;
                for (i, (mode, value)) in operands.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write_operand(f, *mode, *value)?;
                }
                Ok(())
            }
        }
    }
}

/// Canonical cell for `instr`, with no stray mode digits.
fn encode(instr: &Instruction) -> i64 {
    let mut cell = instr.opcode as i64;
    let mut scale = 100;
    for k in 0..instr.opcode.arity() {
        cell += instr.mode(k) as i64 * scale;
        scale *= 10;
    }
    cell
}

/// Decodes the entry starting at `address`.
fn entry_at(cells: &[i64], address: usize) -> Entry {
    let cell = cells[address];
    let data = Entry {
        address,
        len: 1,
        kind: EntryKind::Data(cell),
    };

    let Ok(instr) = Instruction::decode(cell, address) else {
        return data;
    };
    let width = instr.opcode.width();
    if address + width > cells.len() || encode(&instr) != cell {
        return data;
    }
    // Immediate write targets do not assemble.
    let immediate_write = instr
        .opcode
        .operands()
        .iter()
        .enumerate()
        .any(|(k, access)| *access == Access::Write && instr.mode(k) == ParamMode::Immediate);
    if immediate_write {
        return data;
    }

    let operands = (0..instr.opcode.arity())
        .map(|k| (instr.mode(k), cells[address + 1 + k]))
        .collect();
    Entry {
        address,
        len: width,
        kind: EntryKind::Instruction {
            opcode: instr.opcode,
            operands,
        },
    }
}

/// Walks `cells` linearly and decodes every entry.
///
/// The walk does not follow jumps, so data embedded in code may be listed as
/// instructions.
pub fn disassemble(cells: &[i64]) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut address = 0;
    while address < cells.len() {
        let entry = entry_at(cells, address);
        address += entry.len;
        entries.push(entry);
    }
    entries
}

/// Renders a listing with the address of each entry as a trailing comment.
pub fn listing(cells: &[i64]) -> String {
    let entries = disassemble(cells);
    let rendered: Vec<String> = entries.iter().map(|e| e.kind.to_string()).collect();
    let width = rendered.iter().map(String::len).max().unwrap_or(0);

    let mut out = String::new();
    for (entry, text) in entries.iter().zip(rendered) {
        out.push_str(&format!("{text:<width$}  # {:04}\n", entry.address));
    }
    out
}
