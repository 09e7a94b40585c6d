//! Address decoding for the device memory map.

use crate::revision_config::{RegionConfig, RegionKind};
use crate::types::U24;
use std::fmt;

/// What the golden model predicts for one byte of a read
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ExpectedByte {
    Fixed(u8),
    /// Any value is acceptable; freshness is checked separately
    Entropy,
}

impl ExpectedByte {
    pub fn matches(&self, actual: u8) -> bool {
        match self {
            ExpectedByte::Fixed(expected) => *expected == actual,
            ExpectedByte::Entropy => true,
        }
    }

    pub fn fixed(&self) -> Option<u8> {
        match self {
            ExpectedByte::Fixed(value) => Some(*value),
            ExpectedByte::Entropy => None,
        }
    }
}

impl fmt::Debug for ExpectedByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedByte::Fixed(value) => write!(f, "{:02X}", value),
            ExpectedByte::Entropy => write!(f, "??"),
        }
    }
}

/// A decoded window of the address space.
///
/// An address belongs to the region when its bits under `decode_mask` equal
/// the base; within the region the offset wraps modulo `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub kind: RegionKind,
    pub base: U24,
    pub size: u32,
    pub decode_mask: u32,
}

impl MemoryRegion {
    pub fn new(name: &str, kind: RegionKind, base: u32, size: u32, decode_mask: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base: U24::new(base),
            size,
            decode_mask,
        }
    }

    pub fn contains(&self, address: U24) -> bool {
        address.value() & self.decode_mask == self.base.value() & self.decode_mask
    }

    pub fn offset(&self, address: U24) -> usize {
        (address.wrapping_sub(self.base.value()).value() % self.size) as usize
    }
}

impl From<&RegionConfig> for MemoryRegion {
    fn from(config: &RegionConfig) -> Self {
        Self::new(
            &config.name,
            config.kind,
            config.base,
            config.size,
            config.decode_mask,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_decode_and_mirror() {
        let ram = MemoryRegion::new("ram", RegionKind::Ram, 0x100, 8, 0x500);
        assert!(ram.contains(U24::new(0x100)));
        assert!(ram.contains(U24::new(0x1FF)));
        assert!(ram.contains(U24::new(0x300)));
        assert!(!ram.contains(U24::new(0x000)));
        assert!(!ram.contains(U24::new(0x200)));
        assert!(!ram.contains(U24::new(0x500)));

        assert_eq!(ram.offset(U24::new(0x101)), 1);
        assert_eq!(ram.offset(U24::new(0x10F)), 7);
        assert_eq!(ram.offset(U24::new(0x1FF)), 7);
        assert_eq!(ram.offset(U24::new(0x305)), 5);
    }

    #[test]
    fn test_offset_wraps_below_base() {
        let rom = MemoryRegion::new("program_rom", RegionKind::Rom, 0x200, 128, 0x700);
        assert_eq!(rom.offset(U24::new(0x27F)), 127);
        assert_eq!(rom.offset(U24::new(0x280)), 0);
        assert!(rom.contains(U24::new(0x2FF)));
    }

    #[test]
    fn test_expected_byte_matching() {
        assert!(ExpectedByte::Fixed(0x12).matches(0x12));
        assert!(!ExpectedByte::Fixed(0x12).matches(0x13));
        assert!(ExpectedByte::Entropy.matches(0xFF));
        assert_eq!(format!("{:?}", vec![ExpectedByte::Fixed(0xA), ExpectedByte::Entropy]), "[0A, ??]");
    }
}
