//! Read-only memory images and the boot ROM checksum.

use crate::error::{Result, VerificationError};
use crate::revision_config::{RegionConfig, RegionKind};

/// CRC-32/MPEG-2: polynomial 0x04C11DB7, initial value 0xFFFFFFFF, MSB-first,
/// no reflection and no final xor.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// A fixed ROM image, zero-padded to its region size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    name: String,
    memory: Vec<u8>,
    has_checksum: bool,
}

impl RomImage {
    /// Build an image from little-endian words, optionally sealing it with a
    /// checksum in the final 4 bytes.
    pub fn from_words(name: &str, size: usize, words: &[u32], checksum: Option<u32>) -> Result<Self> {
        let reserved = if checksum.is_some() { 4 } else { 0 };
        if words.len() * 4 + reserved > size {
            return Err(VerificationError::config(format!(
                "ROM '{}' content of {} words does not fit in {} bytes",
                name,
                words.len(),
                size
            )));
        }

        let mut memory: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        memory.resize(size, 0);
        if let Some(checksum) = checksum {
            memory[size - 4..].copy_from_slice(&checksum.to_le_bytes());
        }

        Ok(Self {
            name: name.to_string(),
            memory,
            has_checksum: checksum.is_some(),
        })
    }

    pub fn from_config(config: &RegionConfig) -> Result<Self> {
        if config.kind != RegionKind::Rom {
            return Err(VerificationError::config(format!(
                "region '{}' is not a ROM",
                config.name
            )));
        }
        Self::from_words(&config.name, config.size as usize, &config.words, config.checksum)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }

    pub fn read(&self, offset: usize) -> u8 {
        self.memory[offset % self.memory.len()]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.memory
    }

    /// Checksum word stored in the image, if it carries one
    pub fn stored_checksum(&self) -> Option<u32> {
        if !self.has_checksum {
            return None;
        }
        let tail = &self.memory[self.memory.len() - 4..];
        Some(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]))
    }

    /// CRC over every byte before the checksum word
    pub fn computed_checksum(&self) -> u32 {
        crc32_mpeg2(&self.memory[..self.memory.len() - 4])
    }

    pub fn checksum_valid(&self) -> bool {
        self.stored_checksum()
            .map_or(true, |stored| stored == self.computed_checksum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision_config::RevisionConfig;

    #[test]
    fn test_crc32_mpeg2_check_value() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
        assert_eq!(crc32_mpeg2(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_words_are_little_endian() {
        let rom = RomImage::from_words("test", 16, &[0x21264a15], None).unwrap();
        assert_eq!(&rom.bytes()[..4], &[0x15, 0x4a, 0x26, 0x21]);
        assert!(rom.bytes()[4..].iter().all(|&b| b == 0));
        assert_eq!(rom.stored_checksum(), None);
        assert!(rom.checksum_valid());
    }

    #[test]
    fn test_read_wraps() {
        let rom = RomImage::from_words("test", 8, &[0x04030201, 0x08070605], None).unwrap();
        assert_eq!(rom.read(0), 1);
        assert_eq!(rom.read(9), 2);
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(RomImage::from_words("test", 8, &[1, 2], Some(0)).is_err());
    }

    #[test]
    fn test_tt05_boot_checksum() {
        let revision = RevisionConfig::tt05();
        let boot = revision.roms().find(|r| r.checksum.is_some()).unwrap();
        let rom = RomImage::from_config(boot).unwrap();
        assert_eq!(rom.size(), 256);
        assert_eq!(rom.stored_checksum(), Some(0xd3536af3));
        assert_eq!(rom.computed_checksum(), 0xd3536af3);
        assert!(rom.checksum_valid());
    }

    #[test]
    fn test_tt05_program_rom() {
        let revision = RevisionConfig::tt05();
        let program = revision.roms().find(|r| r.base == 0x200).unwrap();
        let rom = RomImage::from_config(program).unwrap();
        assert_eq!(rom.size(), 128);
        assert_eq!(&rom.bytes()[104..108], &[0x50, 0x00, 0x05, 0x40]);
        assert!(rom.bytes()[108..].iter().all(|&b| b == 0));
    }
}
