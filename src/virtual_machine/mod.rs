//! Intcode virtual machine.
//!
//! The VM executes a flat array of signed 64-bit cells in which code and data
//! share one address space, so programs may rewrite their own instructions.
//!
//! # Architecture
//!
//! - **Memory**: growable, zero-filled cells addressed from 0, capped by a memory limit
//! - **Instruction format**: one cell holding the opcode (`cell % 100`) and one mode
//!   digit per operand, followed by the operand cells
//! - **Operand modes**: position (0), immediate (1) and relative to the relative base (2)
//! - **Execution model**: re-entrant [`vm::VM::run`] stops on halt, failure, missing
//!   input or a yield requested by the I/O port, and resumes where it stopped
//! - **Step limit**: execution can be bounded by an instruction budget
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, and cell generation
//! - [`disassembler`]: Assembly listings of program cells
//! - [`errors`]: Parse, assembly and execution error types
//! - [`io`]: The I/O port trait and ready-made ports
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Parameter mode decoding
//! - [`program`]: Program text format
//! - [`vm`]: Core virtual machine implementation

pub mod assembler;
pub mod disassembler;
pub mod errors;
pub mod io;
pub mod isa;
pub mod operand;
pub mod program;
pub mod vm;
