use crate::virtual_machine::errors::VMError;

/// Default cap on auto-extension: 16 Mi cells (128 MiB).
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 24;

/// Growable, zero-initialized Intcode memory.
///
/// Any access at or beyond the current length extends the buffer with zeros up to
/// and including the accessed cell. The length never shrinks. Extension past
/// `limit` cells is refused so a stray address fails instead of exhausting the
/// host allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Memory {
    cells: Vec<i64>,
    limit: usize,
}

impl Memory {
    /// Creates memory holding `cells`.
    pub(crate) fn new(cells: Vec<i64>) -> Self {
        Self {
            cells,
            limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }

    /// Reads the cell at `addr`, extending memory if needed.
    pub(crate) fn read(&mut self, addr: usize) -> Result<i64, VMError> {
        self.ensure(addr)?;
        Ok(self.cells[addr])
    }

    /// Writes `value` at `addr`, extending memory if needed.
    pub(crate) fn write(&mut self, addr: usize, value: i64) -> Result<(), VMError> {
        self.ensure(addr)?;
        self.cells[addr] = value;
        Ok(())
    }

    /// Reads without extending; cells past the end read as zero.
    pub(crate) fn get(&self, addr: usize) -> i64 {
        self.cells.get(addr).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    fn ensure(&mut self, addr: usize) -> Result<(), VMError> {
        if addr < self.cells.len() {
            return Ok(());
        }
        if addr >= self.limit {
            return Err(VMError::MemoryLimitExceeded {
                address: addr,
                limit: self.limit,
            });
        }
        self.cells.resize(addr + 1, 0);
        Ok(())
    }
}
