//! Raw binary ROM images.
//!
//! A ROM is a flat sequence of 16-bit words stored little-endian: the low
//! byte comes first. There is no header.

use crate::bits::Word;
use crate::cpu::MEMORY_SIZE;
use std::path::Path;
use thiserror::Error;

/// Conventional address at which cartridge ROMs are loaded.
pub const DEFAULT_LOAD_ADDRESS: Word = 0x5000;

/// A ROM image read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    /// File name without directories.
    pub name: String,
    pub words: Vec<Word>,
}

impl Rom {
    pub fn new(name: impl Into<String>, words: Vec<Word>) -> Self {
        Self {
            name: name.into(),
            words,
        }
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Pair little-endian bytes into words.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<Word>, RomError> {
    if bytes.len() % 2 != 0 {
        return Err(RomError::OddLength(bytes.len()));
    }
    if bytes.len() / 2 > MEMORY_SIZE {
        return Err(RomError::TooLarge(bytes.len() / 2));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| Word::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Split words into little-endian bytes.
pub fn words_to_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Load a ROM file from disk.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<Rom, RomError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| RomError::Io(format!("{}: {}", path.display(), e)))?;
    let words = words_from_bytes(&bytes)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    log::debug!("read ROM {} ({} words)", name, words.len());

    Ok(Rom::new(name, words))
}

/// Save words to disk as a ROM file.
pub fn save_rom<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), RomError> {
    let path = path.as_ref();
    std::fs::write(path, words_to_bytes(words))
        .map_err(|e| RomError::Io(format!("{}: {}", path.display(), e)))
}

/// Errors that can occur while reading or writing ROM files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("ROM has an odd number of bytes ({0})")]
    OddLength(usize),

    #[error("ROM of {0} words does not fit in the address space")]
    TooLarge(usize),
}
