// the 16-bit word array backing both code and data memory

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{VmError, VmResult};

const WORD_MASK: u16 = 0x7fff;

/// Owns the flat array of raw cells that is the VM's entire addressable
/// memory. Code and data share this space; `wmem` can overwrite
/// instructions ahead of the program counter, so nothing here may cache
/// a decoded view across a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    cells: Vec<u16>,
}

impl Image {
    pub fn new(cells: Vec<u16>) -> Self {
        Self { cells }
    }

    /// Loads a little-endian sequence of 16-bit words from `path`.
    /// Fails if the file cannot be opened or has an odd byte length.
    pub fn load(path: &Path) -> VmResult<Self> {
        let bytes = fs::read(path).map_err(|source| VmError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }

    pub fn from_bytes(bytes: &[u8], path: &Path) -> VmResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(VmError::OddImageLength {
                path: path.to_path_buf(),
                len: bytes.len(),
            });
        }
        let cells = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self::new(cells))
    }

    /// Dumps the memory image to `path` as a raw little-endian byte
    /// sequence, in the same format accepted by `load`.
    pub fn dump(&self, path: &Path) -> VmResult<()> {
        let mut file = fs::File::create(path)?;
        for cell in &self.cells {
            file.write_all(&cell.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reads the raw cell at `addr`, masked to 15 significant bits plus
    /// the register-tag range — callers that need the tagged value use
    /// `read_raw`; this is the word-only accessor used by `rmem`.
    pub fn read(&self, addr: u16) -> VmResult<u16> {
        self.cells
            .get(addr as usize)
            .copied()
            .map(|w| w & WORD_MASK)
            .ok_or(VmError::ProgramCounterOutOfBounds { pc: addr })
    }

    /// Reads the raw cell at `addr` unmodified — used by the fetch loop,
    /// which must see tagged operand values, not masked words.
    pub fn read_raw(&self, addr: u16) -> VmResult<u16> {
        self.cells
            .get(addr as usize)
            .copied()
            .ok_or(VmError::ProgramCounterOutOfBounds { pc: addr })
    }

    /// Writes exactly one word at `addr`. Out-of-range writes are a
    /// fatal error rather than growing the image.
    pub fn write(&mut self, addr: u16, value: u16) -> VmResult<()> {
        let cell = self
            .cells
            .get_mut(addr as usize)
            .ok_or(VmError::ProgramCounterOutOfBounds { pc: addr })?;
        *cell = value & WORD_MASK;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_odd_length() {
        let err = Image::from_bytes(&[1, 2, 3], Path::new("x.bin")).unwrap_err();
        assert!(matches!(err, VmError::OddImageLength { len: 3, .. }));
    }

    #[test]
    fn load_decodes_little_endian_words() {
        let img = Image::from_bytes(&[0x48, 0x00, 0x69, 0x00], Path::new("x.bin")).unwrap();
        assert_eq!(img.as_slice(), &[0x48, 0x69]);
    }

    #[test]
    fn write_is_masked_to_one_word() {
        let mut img = Image::new(vec![0, 0]);
        img.write(0, 0xFFFF).unwrap();
        assert_eq!(img.read(0).unwrap(), 0x7FFF);
        assert_eq!(img.read(1).unwrap(), 0);
    }

    #[test]
    fn out_of_bounds_read_is_fatal() {
        let img = Image::new(vec![1]);
        assert!(img.read(5).is_err());
    }
}
