//! Core virtual machine implementation.
//!
//! The VM is a plain value: growable memory, an instruction pointer, a relative
//! base and a run status. [`VM::run`] executes instructions until the program
//! halts, fails, blocks on missing input or is asked to yield by its port. All
//! transient state lives on the VM, so calling `run` again resumes exactly where
//! the previous call stopped. All arithmetic uses wrapping semantics to prevent
//! overflow panics.

mod memory;
#[cfg(test)]
mod tests;

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::io::{BufferPort, IoPort, QueuePort};
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::{Instruction, ParamMode};
use crate::virtual_machine::program::Program;
use memory::Memory;
use std::fmt;
use std::path::Path;

pub use memory::DEFAULT_MEMORY_LIMIT;

/// Execution state of a VM between instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Ready to execute the instruction at `ip`.
    Running,
    /// Blocked on opcode 3 with no input ready; `ip` still points at it.
    AwaitingInput,
    /// Returned control after an output; `ip` points past it.
    Yielded,
    /// Reached opcode 99.
    Halted,
    /// Failed; the error is kept in [`VM::fault`].
    Errored,
}

impl Status {
    /// Halted and Errored VMs never execute again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Status::Halted | Status::Errored)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Running => "running",
            Status::AwaitingInput => "awaiting input",
            Status::Yielded => "yielded",
            Status::Halted => "halted",
            Status::Errored => "errored",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intcode virtual machine.
///
/// Cloning produces a fully independent deep copy, which callers use to fork
/// execution from a checkpoint.
#[derive(Clone, Debug)]
pub struct VM {
    /// Program memory.
    memory: Memory,
    /// Address of the next instruction.
    ip: usize,
    /// Base for relative-mode operands, adjusted by opcode 9.
    relative_base: i64,
    status: Status,
    /// Error that moved the VM into [`Status::Errored`].
    fault: Option<VMError>,
    /// Instructions completed so far.
    steps: u64,
    step_limit: Option<u64>,
}

impl VM {
    /// Creates a new VM with `program` loaded at address 0.
    ///
    /// Memory grows on demand up to [`DEFAULT_MEMORY_LIMIT`] cells. Use
    /// [`with_memory_limit`](VM::with_memory_limit) to raise or lower the cap.
    pub fn new(program: Program) -> Self {
        Self {
            memory: Memory::new(program.into_cells()),
            ip: 0,
            relative_base: 0,
            status: Status::Running,
            fault: None,
            steps: 0,
            step_limit: None,
        }
    }

    /// Parses program text into a fresh VM.
    pub fn parse(text: &str) -> Result<Self, VMError> {
        Ok(Self::new(Program::parse(text)?))
    }

    /// Loads a program file into a fresh VM.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        Ok(Self::new(Program::from_file(path)?))
    }

    /// Fails any `run` once `limit` instructions have been executed in total.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Caps memory auto-extension at `cells` cells. `usize::MAX` lifts the cap.
    pub fn with_memory_limit(mut self, cells: usize) -> Self {
        self.memory.set_limit(cells);
        self
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Number of instructions completed over the VM's lifetime.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn step_limit(&self) -> Option<u64> {
        self.step_limit
    }

    pub fn memory_limit(&self) -> usize {
        self.memory.limit()
    }

    /// The error that stopped the VM, if it is [`Status::Errored`].
    pub fn fault(&self) -> Option<&VMError> {
        self.fault.as_ref()
    }

    /// Current memory contents.
    pub fn memory(&self) -> &[i64] {
        self.memory.as_slice()
    }

    /// Reads a cell without extending memory; unwritten cells read as zero.
    pub fn peek(&self, addr: usize) -> i64 {
        self.memory.get(addr)
    }

    /// Writes a cell, extending memory if needed.
    pub fn poke(&mut self, addr: usize, value: i64) -> Result<(), VMError> {
        self.memory.write(addr, value)
    }

    /// Runs until the VM halts, errors, awaits input or yields.
    ///
    /// Calling `run` on a halted VM returns [`Status::Halted`] immediately; on
    /// an errored VM it returns [`VMError::Faulted`] carrying the original
    /// error.
    pub fn run<P: IoPort>(&mut self, mut port: P) -> Result<Status, VMError> {
        loop {
            match self.step(&mut port)? {
                Status::Running => continue,
                status => return Ok(status),
            }
        }
    }

    /// Executes at most one instruction.
    pub fn step<P: IoPort>(&mut self, port: &mut P) -> Result<Status, VMError> {
        match self.status {
            Status::Halted => return Ok(Status::Halted),
            Status::Errored => return Err(self.faulted()),
            _ => {}
        }

        match self.exec(port) {
            Ok(status) => {
                self.status = status;
                Ok(status)
            }
            Err(err) => {
                self.status = Status::Errored;
                self.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Runs to halt over fixed buffers.
    ///
    /// Input exhaustion is fatal and outputs are appended to `output`.
    pub fn run_with_buffers(&mut self, input: &[i64], output: &mut Vec<i64>) -> Result<(), VMError> {
        let mut port = BufferPort::new(input, output);
        match self.run(&mut port)? {
            Status::Halted => Ok(()),
            _ => Err(VMError::NotHalted { ip: self.ip }),
        }
    }

    /// Runs to halt with `input` and returns every output.
    pub fn run_to_halt(&mut self, input: &[i64]) -> Result<Vec<i64>, VMError> {
        let mut output = Vec::new();
        self.run_with_buffers(input, &mut output)?;
        Ok(output)
    }

    /// Runs until the VM stops, feeding `input` through a queue.
    ///
    /// Unlike [`run_to_halt`](VM::run_to_halt), running dry is not an error:
    /// the returned status says whether the VM halted or is waiting for more.
    pub fn run_with_queue(
        &mut self,
        input: impl IntoIterator<Item = i64>,
    ) -> Result<(Status, Vec<i64>), VMError> {
        let mut port = QueuePort::with_input(input);
        let status = self.run(&mut port)?;
        Ok((status, port.drain_output()))
    }

    fn faulted(&self) -> VMError {
        let cause = self
            .fault
            .clone()
            .unwrap_or(VMError::NotHalted { ip: self.ip });
        VMError::Faulted(Box::new(cause))
    }

    /// Decodes and executes the instruction at `ip`.
    fn exec<P: IoPort>(&mut self, port: &mut P) -> Result<Status, VMError> {
        if let Some(limit) = self.step_limit
            && self.steps >= limit
        {
            return Err(VMError::StepLimitExceeded { limit });
        }

        let ip = self.ip;
        let instr = Instruction::decode(self.memory.read(ip)?, ip)?;

        let status = match instr.opcode {
            Opcode::Add => self.op_binary(&instr, i64::wrapping_add)?,
            Opcode::Mul => self.op_binary(&instr, i64::wrapping_mul)?,
            Opcode::LessThan => self.op_binary(&instr, |a, b| i64::from(a < b))?,
            Opcode::Equals => self.op_binary(&instr, |a, b| i64::from(a == b))?,
            Opcode::Input => self.op_input(&instr, port)?,
            Opcode::Output => self.op_output(&instr, port)?,
            Opcode::JumpIfTrue => self.op_jump(&instr, true)?,
            Opcode::JumpIfFalse => self.op_jump(&instr, false)?,
            Opcode::AdjustBase => {
                let delta = self.read_param(&instr, 0)?;
                self.relative_base = self.relative_base.wrapping_add(delta);
                self.advance(&instr);
                Status::Running
            }
            Opcode::Halt => Status::Halted,
        };

        if status != Status::AwaitingInput {
            self.steps += 1;
        }
        Ok(status)
    }

    fn op_binary(&mut self, instr: &Instruction, f: impl Fn(i64, i64) -> i64) -> Result<Status, VMError> {
        let a = self.read_param(instr, 0)?;
        let b = self.read_param(instr, 1)?;
        let dst = self.write_addr(instr, 2)?;
        self.memory.write(dst, f(a, b))?;
        self.advance(instr);
        Ok(Status::Running)
    }

    fn op_input<P: IoPort>(&mut self, instr: &Instruction, port: &mut P) -> Result<Status, VMError> {
        // Resolve the target first so a bad program never consumes input.
        let dst = self.write_addr(instr, 0)?;
        match port.fetch()? {
            Some(value) => {
                self.memory.write(dst, value)?;
                self.advance(instr);
                Ok(Status::Running)
            }
            None => Ok(Status::AwaitingInput),
        }
    }

    fn op_output<P: IoPort>(&mut self, instr: &Instruction, port: &mut P) -> Result<Status, VMError> {
        let value = self.read_param(instr, 0)?;
        port.put(value)?;
        self.advance(instr);
        if port.should_yield() {
            Ok(Status::Yielded)
        } else {
            Ok(Status::Running)
        }
    }

    fn op_jump(&mut self, instr: &Instruction, when_nonzero: bool) -> Result<Status, VMError> {
        let cond = self.read_param(instr, 0)?;
        let target = self.read_param(instr, 1)?;
        if (cond != 0) == when_nonzero {
            self.ip = self.address(target)?;
        } else {
            self.advance(instr);
        }
        Ok(Status::Running)
    }

    fn advance(&mut self, instr: &Instruction) {
        self.ip += instr.opcode.width();
    }

    /// Raw operand cell `k` (0-based) of the current instruction.
    fn operand(&mut self, k: usize) -> Result<i64, VMError> {
        self.memory.read(self.ip + 1 + k)
    }

    /// Resolves operand `k` to a value.
    fn read_param(&mut self, instr: &Instruction, k: usize) -> Result<i64, VMError> {
        let raw = self.operand(k)?;
        match instr.mode(k) {
            ParamMode::Immediate => Ok(raw),
            ParamMode::Position => {
                let addr = self.address(raw)?;
                self.memory.read(addr)
            }
            ParamMode::Relative => {
                let addr = self.relative_address(raw)?;
                self.memory.read(addr)
            }
        }
    }

    /// Resolves operand `k` to the address it writes to.
    fn write_addr(&mut self, instr: &Instruction, k: usize) -> Result<usize, VMError> {
        let raw = self.operand(k)?;
        match instr.mode(k) {
            ParamMode::Immediate => Err(VMError::ImmediateWrite {
                instruction: instr.opcode.mnemonic(),
                param: k + 1,
                ip: self.ip,
            }),
            ParamMode::Position => self.address(raw),
            ParamMode::Relative => self.relative_address(raw),
        }
    }

    fn relative_address(&self, offset: i64) -> Result<usize, VMError> {
        let address = self
            .relative_base
            .checked_add(offset)
            .ok_or(VMError::AddressOverflow {
                base: self.relative_base,
                offset,
                ip: self.ip,
            })?;
        self.address(address)
    }

    fn address(&self, value: i64) -> Result<usize, VMError> {
        if value < 0 {
            return Err(VMError::NegativeAddress {
                address: value,
                ip: self.ip,
            });
        }
        usize::try_from(value).map_err(|_| VMError::MemoryLimitExceeded {
            address: usize::MAX,
            limit: self.memory.limit(),
        })
    }
}
