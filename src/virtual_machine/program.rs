//! Program text representation and parsing.
//!
//! A [`Program`] is the initial memory image of a VM: the cells of a single
//! line of comma-separated, optionally signed, base-10 integers.

use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const SEPARATOR: char = ',';

/// Initial memory image loaded into a VM.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    cells: Vec<i64>,
}

impl Program {
    /// Wraps already-decoded cells.
    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells }
    }

    /// Parses program text.
    ///
    /// Whitespace around the text and around each token is ignored, and a
    /// single trailing separator is tolerated.
    pub fn parse(text: &str) -> Result<Self, VMError> {
        let text = text.trim();
        let text = text.strip_suffix(SEPARATOR).unwrap_or(text);
        if text.trim().is_empty() {
            return Err(VMError::EmptyProgram);
        }

        let cells = text
            .split(SEPARATOR)
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| VMError::ParseError {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cells })
    }

    /// Reads and parses a program file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let path_ref = path.as_ref();
        let text = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&text)
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn into_cells(self) -> Vec<i64> {
        self.cells
    }
}

impl FromStr for Program {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<i64>> for Program {
    fn from(cells: Vec<i64>) -> Self {
        Self::new(cells)
    }
}

/// Renders the program back to its canonical text form.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}
