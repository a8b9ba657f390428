use crate::virtual_machine::io::PortError;

/// Errors that can occur while parsing, assembling or executing Intcode.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VMError {
    /// Program text contained no cells.
    #[error("program text is empty")]
    EmptyProgram,
    /// A comma-separated token is not a base-10 integer.
    #[error("invalid program cell {index}: {token:?} is not an integer")]
    ParseError { index: usize, token: String },
    /// Opcode digits do not name an instruction.
    #[error("invalid opcode {opcode} at ip {ip}")]
    InvalidOpcode { opcode: i64, ip: usize },
    /// Parameter mode digit is not 0, 1 or 2.
    #[error("invalid parameter mode {mode} for parameter {param} at ip {ip}")]
    InvalidParameterMode { mode: i64, param: usize, ip: usize },
    /// Resolved address is below zero.
    #[error("negative address {address} at ip {ip}")]
    NegativeAddress { address: i64, ip: usize },
    /// Relative address computation overflowed an i64.
    #[error("address overflow: relative base {base} + offset {offset} at ip {ip}")]
    AddressOverflow { base: i64, offset: i64, ip: usize },
    /// Address lies above the configured memory limit.
    #[error("address {address} exceeds memory limit of {limit} cells")]
    MemoryLimitExceeded { address: usize, limit: usize },
    /// An instruction tried to write through an immediate-mode parameter.
    #[error("parameter {param} of {instruction} at ip {ip} is an immediate write target")]
    ImmediateWrite {
        instruction: &'static str,
        param: usize,
        ip: usize,
    },
    /// The I/O port refused a fetch or put.
    #[error("port error: {0}")]
    Port(#[from] PortError),
    /// Execution ran past the configured step limit.
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
    /// `run` was called again on a VM that already failed.
    #[error("vm has faulted: {0}")]
    Faulted(Box<VMError>),
    /// Buffer-driven execution ended without reaching a halt instruction.
    #[error("program stopped at ip {ip} without halting")]
    NotHalted { ip: usize },
    /// Assembly failed on a specific source line.
    #[error("line {line}: {message}")]
    AssemblyError { line: usize, message: String },
    /// File I/O error while loading a program.
    #[error("io error on {path}: {reason}")]
    IoError { path: String, reason: String },
}
