//! Byte-addressed memory image and its output encodings.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::{ImageError, Result};

/// Bit ranges of each byte lane within a 32-bit memory word.
const LANES: [&str; 4] = ["7:0", "15:8", "23:16", "31:24"];

/// Sparse memory contents, addressed by byte.
///
/// Bytes that were never written read as zero when the image is packed.
#[derive(Clone, Debug)]
pub struct MemoryImage {
    bytes: BTreeMap<u64, u8>,
    limit_words: u64,
}

impl MemoryImage {
    /// Create an empty image for a memory of `limit_words` 32-bit words.
    pub const fn new(limit_words: u64) -> Self {
        Self {
            bytes: BTreeMap::new(),
            limit_words,
        }
    }

    /// Place one byte. `line` is only used for error reporting.
    pub fn place(&mut self, addr: u64, byte: u8, line: usize) -> Result<()> {
        let word = addr / 4;
        if word >= self.limit_words {
            return Err(ImageError::AddressOutOfRange {
                word,
                limit: self.limit_words,
                line,
            });
        }
        self.bytes.insert(addr, byte);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte at `addr`, if one was placed there.
    pub fn byte(&self, addr: u64) -> Option<u8> {
        self.bytes.get(&addr).copied()
    }

    /// Lowest and highest word index touched by the image.
    pub fn word_span(&self) -> Option<(u64, u64)> {
        let first = self.bytes.keys().next()?;
        let last = self.bytes.keys().next_back()?;
        Some((first / 4, last / 4))
    }

    /// Words from the lowest to the highest touched word, gaps zeroed.
    pub fn words(&self) -> Vec<u32> {
        let Some((first, last)) = self.word_span() else {
            return Vec::new();
        };
        (first..=last)
            .map(|word| {
                let base = word * 4;
                u32::from_le_bytes([
                    self.byte(base).unwrap_or(0),
                    self.byte(base + 1).unwrap_or(0),
                    self.byte(base + 2).unwrap_or(0),
                    self.byte(base + 3).unwrap_or(0),
                ])
            })
            .collect()
    }

    /// Packed little-endian words, as loaded by the memory model.
    pub fn to_binary(&self) -> Vec<u8> {
        self.words()
            .into_iter()
            .flat_map(u32::to_le_bytes)
            .collect()
    }

    /// SystemVerilog block that fills `debug_memory` byte lane by byte lane.
    pub fn to_initializer(&self) -> String {
        let size = self.word_span().map_or(0, |(_, last)| last + 1);
        let mut out = String::from("logic [31:0] debug_memory [];\ninitial begin\n");
        let _ = writeln!(out, "debug_memory = new[{size}];");
        for (&addr, &byte) in &self.bytes {
            let lane = LANES[usize::try_from(addr % 4).unwrap_or(0)];
            let _ = writeln!(out, "debug_memory[{}][{lane}] = 8'h{byte:02x};", addr / 4);
        }
        out.push_str("end\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_fill_gaps() {
        let mut image = MemoryImage::new(16);
        image.place(0, 0x93, 1).unwrap();
        image.place(9, 0xaa, 2).unwrap();
        assert_eq!(image.word_span(), Some((0, 2)));
        assert_eq!(image.words(), vec![0x93, 0, 0xaa00]);
        assert_eq!(image.to_binary().len(), 12);
    }

    #[test]
    fn test_limit() {
        let mut image = MemoryImage::new(4);
        assert!(image.place(15, 1, 1).is_ok());
        assert!(matches!(
            image.place(16, 1, 7),
            Err(ImageError::AddressOutOfRange {
                word: 4,
                limit: 4,
                line: 7
            })
        ));
    }

    #[test]
    fn test_initializer() {
        let mut image = MemoryImage::new(16);
        image.place(4, 0x13, 1).unwrap();
        image.place(7, 0xff, 1).unwrap();
        let text = image.to_initializer();
        assert!(text.starts_with("logic [31:0] debug_memory [];\ninitial begin\n"));
        assert!(text.contains("debug_memory = new[2];\n"));
        assert!(text.contains("debug_memory[1][7:0] = 8'h13;\n"));
        assert!(text.contains("debug_memory[1][31:24] = 8'hff;\n"));
        assert!(text.ends_with("end\n"));
    }

    #[test]
    fn test_empty() {
        let image = MemoryImage::new(16);
        assert!(image.is_empty());
        assert!(image.words().is_empty());
        assert!(image.to_initializer().contains("new[0]"));
    }
}
