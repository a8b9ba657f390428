//! Text helpers for programs that talk in ASCII.
//!
//! Input lines become one value per character followed by a newline. Output
//! values in `0..=127` are rendered as text; anything else (a final score, a
//! large count) is kept aside as a plain number.

use crate::virtual_machine::io::{IoPort, PortError};
use std::collections::VecDeque;

pub const NEWLINE: i64 = b'\n' as i64;

/// Returns true if `value` renders as a character.
pub fn is_ascii_value(value: i64) -> bool {
    (0..=0x7f).contains(&value)
}

/// Encodes `line` as input values, appending a newline unless one is present.
pub fn encode_line(line: &str) -> Vec<i64> {
    let mut values: Vec<i64> = line.chars().map(|c| i64::from(u32::from(c))).collect();
    if values.last() != Some(&NEWLINE) {
        values.push(NEWLINE);
    }
    values
}

/// Output split into its textual and numeric parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Non-ASCII values in output order.
    pub values: Vec<i64>,
}

impl Rendered {
    fn push(&mut self, value: i64) {
        if is_ascii_value(value) {
            self.text.push(char::from(value as u8));
        } else {
            self.values.push(value);
        }
    }
}

/// Splits `outputs` into text and non-ASCII values.
pub fn render(outputs: &[i64]) -> Rendered {
    let mut rendered = Rendered::default();
    for &value in outputs {
        rendered.push(value);
    }
    rendered
}

/// Port that feeds text lines and collects rendered output.
#[derive(Clone, Debug, Default)]
pub struct AsciiPort {
    input: VecDeque<i64>,
    rendered: Rendered,
    yield_on_newline: bool,
    last: Option<i64>,
}

impl AsciiPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yields after every newline the program prints.
    pub fn line_mode() -> Self {
        Self {
            yield_on_newline: true,
            ..Self::default()
        }
    }

    /// Queues `line` as input.
    pub fn send_line(&mut self, line: &str) {
        self.input.extend(encode_line(line));
    }

    /// Queues raw input values.
    pub fn extend(&mut self, values: impl IntoIterator<Item = i64>) {
        self.input.extend(values);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Text printed so far.
    pub fn text(&self) -> &str {
        &self.rendered.text
    }

    /// Non-ASCII values printed so far.
    pub fn values(&self) -> &[i64] {
        &self.rendered.values
    }

    /// Takes everything printed so far.
    pub fn take(&mut self) -> Rendered {
        std::mem::take(&mut self.rendered)
    }
}

impl IoPort for AsciiPort {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        Ok(self.input.pop_front())
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        self.rendered.push(value);
        self.last = Some(value);
        Ok(())
    }

    fn should_yield(&self) -> bool {
        self.yield_on_newline && self.last == Some(NEWLINE)
    }
}
