//! CP-1600 memory subsystem.
//!
//! A flat, word-addressed region (64K words by default). Addresses are
//! reduced modulo the configured size, so the default region wraps
//! naturally at 16 bits. A smaller region can opt into bounds checking,
//! in which case an address past its end is an error instead.

use crate::bits::Word;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full CP-1600 address space, in words.
pub const MEMORY_SIZE: usize = 0x1_0000;

/// Words per line in [`Memory::dump`].
const DUMP_WORDS_PER_LINE: usize = 8;

/// Memory construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Number of words, 1 to 65536.
    pub size: usize,
    /// Fail on addresses `>= size` instead of wrapping them.
    pub bounds_check: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: MEMORY_SIZE,
            bounds_check: false,
        }
    }
}

/// Word-addressed memory.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Word>,
    bounds_check: bool,
}

impl Memory {
    /// Create a full 64K-word memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
            bounds_check: false,
        }
    }

    /// Create memory from explicit options.
    pub fn with_config(config: MemoryConfig) -> Result<Self, MemoryError> {
        if config.size == 0 || config.size > MEMORY_SIZE {
            return Err(MemoryError::InvalidSize(config.size));
        }
        Ok(Self {
            cells: vec![0; config.size],
            bounds_check: config.bounds_check,
        })
    }

    /// Resolve an address to a cell index.
    #[inline]
    fn index(&self, addr: Word) -> Result<usize, MemoryError> {
        let addr = addr as usize;
        if self.bounds_check && addr >= self.cells.len() {
            return Err(MemoryError::AddressOutOfBounds {
                address: addr as Word,
                size: self.cells.len(),
            });
        }
        Ok(addr % self.cells.len())
    }

    /// Read the word at `addr`.
    #[inline]
    pub fn read(&self, addr: Word) -> Result<Word, MemoryError> {
        let index = self.index(addr)?;
        Ok(self.cells[index])
    }

    /// Write `value` to `addr`.
    #[inline]
    pub fn write(&mut self, addr: Word, value: Word) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Write `words` sequentially starting at `addr`, wrapping at the top
    /// of the address space.
    pub fn load(&mut self, addr: Word, words: &[Word]) -> Result<(), MemoryError> {
        for (offset, &word) in words.iter().enumerate() {
            self.write(addr.wrapping_add(offset as Word), word)?;
        }
        Ok(())
    }

    /// Bulk copy `words` to `addr`. Whatever does not fit before the end of
    /// the region is dropped rather than wrapped.
    ///
    /// Returns the number of words actually copied.
    pub fn load_buffer(&mut self, addr: Word, words: &[Word]) -> Result<usize, MemoryError> {
        let start = self.index(addr)?;
        let count = words.len().min(self.cells.len() - start);
        self.cells[start..start + count].copy_from_slice(&words[..count]);
        Ok(count)
    }

    /// Clear all memory to zero.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Zero every cell from `start` to `end`, both inclusive. Cells past the
    /// end of the region are ignored.
    pub fn clear_range(&mut self, start: Word, end: Word) {
        let start = start as usize;
        let end = (end as usize).min(self.cells.len().saturating_sub(1));
        if start <= end {
            self.cells[start..=end].fill(0);
        }
    }

    /// Copy `len` words starting at `start`, following the same wrapping
    /// rules as [`Memory::read`].
    pub fn read_range(&self, start: Word, len: usize) -> Result<Vec<Word>, MemoryError> {
        (0..len)
            .map(|offset| self.read(start.wrapping_add(offset as Word)))
            .collect()
    }

    /// Hex dump of `len` words, eight per line: `$5000: 02B8 002A ...`.
    pub fn dump(&self, start: Word, len: usize) -> Result<String, MemoryError> {
        let words = self.read_range(start, len)?;
        let lines: Vec<String> = words
            .chunks(DUMP_WORDS_PER_LINE)
            .enumerate()
            .map(|(line, chunk)| {
                let line_addr = start.wrapping_add((line * DUMP_WORDS_PER_LINE) as Word);
                let values: Vec<String> = chunk.iter().map(|w| format!("{:04X}", w)).collect();
                format!("${:04X}: {}", line_addr, values.join(" "))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Region size in words.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Whether out-of-range addresses are rejected.
    pub fn bounds_check(&self) -> bool {
        self.bounds_check
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .field("bounds_check", &self.bounds_check)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside a bounds-checked region.
    #[error("address out of bounds: ${address:04X} (size {size})")]
    AddressOutOfBounds { address: Word, size: usize },

    /// Requested region size is zero or larger than the address space.
    #[error("invalid memory size {0} (must be 1-65536 words)")]
    InvalidSize(usize),
}
