//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction table and hands it to a callback macro for code
//! generation, so the executor, assembler and disassembler all agree on
//! opcodes, mnemonics and operand roles.
//!
//! This module generates:
//! - The [`Opcode`] enum with its numeric encoding
//! - `TryFrom<i64>` for decoding the two low-order digits of a cell
//! - Mnemonic lookup in both directions and per-operand [`Access`] roles
//!
//! # Cell Format
//!
//! An instruction is one memory cell followed by its operand cells:
//! - Opcode: `cell % 100`
//! - Mode of operand `k` (1-based): `(cell / 100) / 10^(k-1) % 10`
//! - Operands: one cell each, interpreted according to their mode

use crate::virtual_machine::errors::VMError;

/// How an instruction uses one of its operands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Access {
    /// The operand is resolved to a value.
    Read,
    /// The operand is resolved to an address that receives the result.
    Write,
}

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// ADD a, b, dst ; dst = a + b
            Add = 1, "ADD" => [a: Read, b: Read, dst: Write],
            /// MUL a, b, dst ; dst = a * b
            Mul = 2, "MUL" => [a: Read, b: Read, dst: Write],
            /// IN dst ; dst = next input value
            Input = 3, "IN" => [dst: Write],
            /// OUT a ; emit a
            Output = 4, "OUT" => [a: Read],
            /// JT cond, target ; if cond != 0 then ip = target
            JumpIfTrue = 5, "JT" => [cond: Read, target: Read],
            /// JF cond, target ; if cond == 0 then ip = target
            JumpIfFalse = 6, "JF" => [cond: Read, target: Read],
            /// LT a, b, dst ; dst = (a < b) as 0/1
            LessThan = 7, "LT" => [a: Read, b: Read, dst: Write],
            /// EQ a, b, dst ; dst = (a == b) as 0/1
            Equals = 8, "EQ" => [a: Read, b: Read, dst: Write],
            /// ARB a ; relative_base += a
            AdjustBase = 9, "ARB" => [a: Read],
            /// HALT ; stop execution
            Halt = 99, "HALT" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $access:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<i64> for Opcode {
            type Error = VMError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::InvalidOpcode {
                        opcode: value,
                        ip: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns how each operand is used, in operand order.
            pub const fn operands(&self) -> &'static [Access] {
                match self {
                    $( Opcode::$name => &[ $( Access::$access, )* ], )*
                }
            }

            /// Looks up an opcode by mnemonic, ignoring ASCII case.
            pub fn from_mnemonic(name: &str) -> Option<Opcode> {
                $(
                    if name.eq_ignore_ascii_case($mnemonic) {
                        return Some(Opcode::$name);
                    }
                )*
                None
            }
        }
    };
}

for_each_instruction!(define_instructions);

impl Opcode {
    /// Number of operand cells following the opcode cell.
    pub const fn arity(&self) -> usize {
        self.operands().len()
    }

    /// Total cells occupied by the instruction, opcode included.
    pub const fn width(&self) -> usize {
        1 + self.arity()
    }
}
