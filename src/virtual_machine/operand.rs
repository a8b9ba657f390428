use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;

/// Maximum number of operands any instruction takes.
pub const MAX_OPERANDS: usize = 3;

/// Addressing mode of a single operand.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParamMode {
    /// The operand is an absolute address.
    #[default]
    Position = 0,
    /// The operand is the value itself.
    Immediate = 1,
    /// The operand is an offset from the relative base.
    Relative = 2,
}

impl ParamMode {
    /// Returns a human-readable mode name for diagnostics.
    pub const fn to_string(&self) -> &'static str {
        match self {
            ParamMode::Position => "Position",
            ParamMode::Immediate => "Immediate",
            ParamMode::Relative => "Relative",
        }
    }
}

impl TryFrom<i64> for ParamMode {
    type Error = VMError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Position),
            1 => Ok(Self::Immediate),
            2 => Ok(Self::Relative),
            _ => Err(VMError::InvalidParameterMode {
                mode: value,
                param: 0,
                ip: 0,
            }),
        }
    }
}

/// Decoded view of one instruction cell.
///
/// Only the modes of operands the opcode actually takes are validated; mode
/// digits beyond the arity are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [ParamMode; MAX_OPERANDS],
}

impl Instruction {
    /// Decodes the cell found at `ip`.
    ///
    /// `ip` is only used to locate errors.
    pub fn decode(cell: i64, ip: usize) -> Result<Self, VMError> {
        let opcode = Opcode::try_from(cell % 100)
            .map_err(|_| VMError::InvalidOpcode { opcode: cell, ip })?;

        let mut modes = [ParamMode::Position; MAX_OPERANDS];
        let mut digits = cell / 100;
        for (k, slot) in modes.iter_mut().enumerate().take(opcode.arity()) {
            let digit = digits % 10;
            *slot = ParamMode::try_from(digit).map_err(|_| VMError::InvalidParameterMode {
                mode: digit,
                param: k + 1,
                ip,
            })?;
            digits /= 10;
        }

        Ok(Self { opcode, modes })
    }

    /// Returns the mode of operand `k` (0-based).
    pub fn mode(&self, k: usize) -> ParamMode {
        self.modes[k]
    }
}
