//! I/O port abstraction used by the executor.
//!
//! The [`IoPort`] trait is the only channel between a running VM and the outside
//! world. Opcode 3 pulls from [`IoPort::fetch`], opcode 4 pushes through
//! [`IoPort::put`], and [`IoPort::should_yield`] decides after every output
//! whether control returns to the caller.
//!
//! Two ready-made ports cover most callers:
//! - [`QueuePort`]: an owned input queue and output buffer that persists across
//!   `run` calls, used by every multi-VM driver.
//! - [`BufferPort`]: borrows a fixed input slice and an output vector, treating
//!   input exhaustion as fatal.

use std::collections::VecDeque;

/// Errors raised by a port.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The port has no more input and will never have any.
    #[error("input exhausted")]
    InputExhausted,
    /// The port refused an output value.
    #[error("output {value} rejected: {reason}")]
    Rejected { value: i64, reason: String },
}

/// Caller-supplied input/output endpoint for one VM.
pub trait IoPort {
    /// Returns the next input value.
    ///
    /// `Ok(None)` means no value is ready yet: the VM suspends in
    /// [`Status::AwaitingInput`](crate::virtual_machine::vm::Status::AwaitingInput)
    /// without consuming the input instruction.
    fn fetch(&mut self) -> Result<Option<i64>, PortError>;
    /// Receives one output value.
    fn put(&mut self, value: i64) -> Result<(), PortError>;
    /// Consulted after every successful [`put`](IoPort::put).
    fn should_yield(&self) -> bool {
        false
    }
}

impl<P: IoPort + ?Sized> IoPort for &mut P {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        (**self).fetch()
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        (**self).put(value)
    }

    fn should_yield(&self) -> bool {
        (**self).should_yield()
    }
}

/// Queue-backed port owning its input and output.
#[derive(Clone, Debug, Default)]
pub struct QueuePort {
    input: VecDeque<i64>,
    output: Vec<i64>,
    /// Yield after this many outputs have accumulated since the last drain.
    yield_every: Option<usize>,
}

impl QueuePort {
    /// Creates a port that never yields on output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a port that yields after every single output.
    pub fn interactive() -> Self {
        Self::yielding_every(1)
    }

    /// Creates a port that yields once `count` outputs are buffered.
    pub fn yielding_every(count: usize) -> Self {
        Self {
            yield_every: Some(count.max(1)),
            ..Self::default()
        }
    }

    /// Creates a non-yielding port pre-loaded with `input`.
    pub fn with_input(input: impl IntoIterator<Item = i64>) -> Self {
        let mut port = Self::new();
        port.extend(input);
        port
    }

    /// Appends one value to the input queue.
    pub fn push(&mut self, value: i64) {
        self.input.push_back(value);
    }

    /// Appends several values to the input queue.
    pub fn extend(&mut self, values: impl IntoIterator<Item = i64>) {
        self.input.extend(values);
    }

    /// Number of input values not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Outputs produced since the last drain.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    /// Removes and returns every buffered output.
    pub fn drain_output(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.output)
    }

    /// Removes and returns the first `count` buffered outputs, if available.
    pub fn take_output(&mut self, count: usize) -> Option<Vec<i64>> {
        if self.output.len() < count {
            return None;
        }
        Some(self.output.drain(..count).collect())
    }
}

impl IoPort for QueuePort {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        Ok(self.input.pop_front())
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        self.output.push(value);
        Ok(())
    }

    fn should_yield(&self) -> bool {
        match self.yield_every {
            Some(n) => !self.output.is_empty() && self.output.len() % n == 0,
            None => false,
        }
    }
}

/// Port over borrowed buffers, for run-to-halt execution.
///
/// Running out of input is an error rather than a suspension.
pub struct BufferPort<'a> {
    input: &'a [i64],
    cursor: usize,
    output: &'a mut Vec<i64>,
}

impl<'a> BufferPort<'a> {
    pub fn new(input: &'a [i64], output: &'a mut Vec<i64>) -> Self {
        Self {
            input,
            cursor: 0,
            output,
        }
    }

    /// Number of input values consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl IoPort for BufferPort<'_> {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        let value = self
            .input
            .get(self.cursor)
            .copied()
            .ok_or(PortError::InputExhausted)?;
        self.cursor += 1;
        Ok(Some(value))
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        self.output.push(value);
        Ok(())
    }
}
