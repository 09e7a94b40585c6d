//! # Revision Configuration
//!
//! Hardware revisions of the peripheral differ in clock polarity, dummy-cycle
//! count, QUAD_READ turnaround point, reset/enable sequencing and ROM
//! contents. Everything the exerciser, the golden model and the device model
//! need to know about one revision lives in a [`RevisionConfig`], which can be
//! built in code or loaded from JSON.
//!
//! ## Usage
//!
//! ```rust
//! use rusty_qspi::revision_config::RevisionConfig;
//!
//! let revision = RevisionConfig::tt05();
//! revision.validate().expect("built-in revision is consistent");
//! assert_eq!(revision.quad_dummy_cycles, 2);
//! ```
//!
//! ## Configuration File Format
//!
//! ```json
//! {
//!   "name": "tt05",
//!   "description": "Scratch RAM, boot ROM and entropy behind SPI/QSPI",
//!   "clock_polarity": "RisingEdge",
//!   "clock": { "setup_ns": 4, "low_ns": 8, "high_ns": 5 },
//!   "select_setup_ns": 10,
//!   "deselect_settle_ns": 10,
//!   "deselect_hold_ns": 90,
//!   "quad_dummy_cycles": 2,
//!   "quad_turnaround_cycle": 1,
//!   "has_enable": true,
//!   "debug_clock_period_ns": 77,
//!   "regions": [
//!     { "name": "ram", "kind": "Ram", "base": 256, "size": 8, "decode_mask": 1280 }
//!   ]
//! }
//! ```

use crate::components::memory::rom::crc32_mpeg2;
use crate::error::{Result, VerificationError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Main clock edge on which the device samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockPolarity {
    RisingEdge,
    FallingEdge,
}

/// Skew of one main-clock cycle, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTiming {
    /// Data driven this long before the clock leaves its idle level
    pub setup_ns: u64,
    /// Time at the inactive level before the active edge
    pub low_ns: u64,
    /// Time after the active edge before outputs are sampled
    pub high_ns: u64,
}

impl Default for ClockTiming {
    fn default() -> Self {
        Self {
            setup_ns: 4,
            low_ns: 8,
            high_ns: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    Ram,
    Rom,
    Entropy,
}

/// One decoded window of the device address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub kind: RegionKind,
    pub base: u32,
    /// Backing storage in bytes; offsets wrap modulo this size
    pub size: u32,
    /// Address bits compared against `base` to select this region
    pub decode_mask: u32,
    /// ROM content as little-endian 32-bit words
    #[serde(default)]
    pub words: Vec<u32>,
    /// Checksum word stored in the final 4 bytes of the ROM
    #[serde(default)]
    pub checksum: Option<u32>,
}

/// JSON-loadable description of one hardware revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionConfig {
    pub name: String,
    pub description: String,
    pub clock_polarity: ClockPolarity,
    pub clock: ClockTiming,
    /// Chip-select low to first clock edge
    pub select_setup_ns: u64,
    /// Chip-select high to the idle mask check
    pub deselect_settle_ns: u64,
    /// Idle mask check to the next transaction
    pub deselect_hold_ns: u64,
    pub quad_dummy_cycles: u8,
    /// Dummy cycle index from which QUAD_READ drives all four lanes
    pub quad_turnaround_cycle: u8,
    /// Whether the harness exposes an enable input that must be raised at power-on
    pub has_enable: bool,
    pub debug_clock_period_ns: u64,
    pub regions: Vec<RegionConfig>,
}

// Generated with: od -Ax -tx4 -w4 tt05.bin
const TT05_PROGRAM_WORDS: [u32; 27] = [
    0x21264a15, 0x21706251, 0x491462d1, 0x21026311, 0x4d136339, 0x26556829, 0x60116016,
    0x21044d11, 0x4b1165b9, 0x60182001, 0x44080341, 0xd1012801, 0x44084249, 0x6cfc60d8,
    0xd4f603a4, 0x60296829, 0x60116016, 0x60110a09, 0x140907c9, 0x6cfc60d9, 0xd5fc03a4,
    0x0000e7e6, 0x40038000, 0x00000101, 0x10000100, 0x10000400, 0x40050050,
];

// Generated with: od -Ax -tx4 -w4 boot2_tt05.bin
const TT05_BOOT_WORDS: [u32; 53] = [
    0x22014b29, 0x649a02d2, 0x4a294b28, 0x2105601a, 0x64b94f28, 0x65b96539, 0x204a4d27,
    0x66686628, 0x064a06be, 0x21006232, 0x03806cf8, 0x61f2d505, 0x3c010b74, 0x3101d1fd,
    0x2318e7f6, 0x2200061b, 0x221f609a, 0x601a0412, 0x609a2201, 0x661d4d1b, 0x6c786619,
    0xd5030380, 0x010921ab, 0xe0126619, 0x2a0e6a9a, 0x6e1ad1fc, 0x4a156e19, 0x6619661a,
    0x2a0e6a9a, 0x6e1ad1fc, 0x4c126e19, 0x39016121, 0x661a1d2a, 0x6a9a6619, 0xd1fc2a0e,
    0x609a2200, 0x6019490d, 0x33f4490d, 0x3bf46019, 0x2101605a, 0x490b6099, 0x00004708,
    0x40008000, 0x4000f000, 0x00804020, 0x40014074, 0x4001c000, 0x02000100, 0x03000104,
    0x40060000, 0x005f0300, 0x6b001218, 0x10000201,
];

const TT05_BOOT_CHECKSUM: u32 = 0xd3536af3;

impl RevisionConfig {
    /// The tt05 tape-out: 8-byte scratch RAM, boot ROM, program ROM, ring-oscillator entropy
    pub fn tt05() -> Self {
        Self {
            name: "tt05".to_string(),
            description: "Scratch RAM, boot ROM, program ROM and entropy behind SPI/QSPI"
                .to_string(),
            clock_polarity: ClockPolarity::RisingEdge,
            clock: ClockTiming::default(),
            select_setup_ns: 10,
            deselect_settle_ns: 10,
            deselect_hold_ns: 90,
            quad_dummy_cycles: 2,
            quad_turnaround_cycle: 1,
            has_enable: true,
            debug_clock_period_ns: 77,
            regions: vec![
                RegionConfig {
                    name: "entropy".to_string(),
                    kind: RegionKind::Entropy,
                    base: 0x400,
                    size: 1,
                    decode_mask: 0x400,
                    words: Vec::new(),
                    checksum: None,
                },
                RegionConfig {
                    name: "ram".to_string(),
                    kind: RegionKind::Ram,
                    base: 0x100,
                    size: 8,
                    decode_mask: 0x500,
                    words: Vec::new(),
                    checksum: None,
                },
                RegionConfig {
                    name: "program_rom".to_string(),
                    kind: RegionKind::Rom,
                    base: 0x200,
                    size: 128,
                    decode_mask: 0x700,
                    words: TT05_PROGRAM_WORDS.to_vec(),
                    checksum: None,
                },
                RegionConfig {
                    name: "boot_rom".to_string(),
                    kind: RegionKind::Rom,
                    base: 0x000,
                    size: 256,
                    decode_mask: 0x700,
                    words: TT05_BOOT_WORDS.to_vec(),
                    checksum: Some(TT05_BOOT_CHECKSUM),
                },
            ],
        }
    }

    /// tt05 variant whose lanes only turn at the end of the dummy cycles
    pub fn tt05_late_turnaround() -> Self {
        Self {
            name: "tt05-late-turnaround".to_string(),
            quad_turnaround_cycle: 2,
            ..Self::tt05()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RevisionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        debug!(revision = %config.name, path = %path.display(), "loaded revision config");
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Main clock period implied by the skew settings
    pub fn clock_period_ns(&self) -> u64 {
        self.clock.setup_ns + self.clock.low_ns + self.clock.high_ns
    }

    pub fn ram(&self) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.kind == RegionKind::Ram)
    }

    pub fn roms(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.iter().filter(|r| r.kind == RegionKind::Rom)
    }

    pub fn entropy(&self) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.kind == RegionKind::Entropy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock.low_ns == 0 || self.clock.high_ns == 0 {
            return Err(VerificationError::config("clock phases must be non-zero"));
        }
        if self.debug_clock_period_ns < 2 {
            return Err(VerificationError::config("debug clock period too short"));
        }
        if self.quad_turnaround_cycle > self.quad_dummy_cycles {
            return Err(VerificationError::config(format!(
                "quad turnaround at dummy cycle {} but only {} dummy cycles",
                self.quad_turnaround_cycle, self.quad_dummy_cycles
            )));
        }

        let ram_count = self.regions.iter().filter(|r| r.kind == RegionKind::Ram).count();
        if ram_count != 1 {
            return Err(VerificationError::config(format!(
                "expected exactly one RAM region, found {}",
                ram_count
            )));
        }
        if self.regions.iter().filter(|r| r.kind == RegionKind::Entropy).count() > 1 {
            return Err(VerificationError::config("more than one entropy region"));
        }

        for region in &self.regions {
            region.validate()?;
        }
        Ok(())
    }
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self::tt05()
    }
}

impl RegionConfig {
    /// ROM content as bytes, zero-padded to `size`, checksum word appended
    pub fn rom_bytes(&self) -> Vec<u8> {
        let size = self.size as usize;
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.resize(size, 0);
        if let Some(checksum) = self.checksum {
            if size >= 4 {
                bytes[size - 4..].copy_from_slice(&checksum.to_le_bytes());
            }
        }
        bytes
    }

    fn validate(&self) -> Result<()> {
        if self.size == 0 || !self.size.is_power_of_two() {
            return Err(VerificationError::config(format!(
                "region '{}' size {} is not a power of two",
                self.name, self.size
            )));
        }
        if self.kind != RegionKind::Rom {
            return Ok(());
        }
        if self.size > 256 {
            return Err(VerificationError::config(format!(
                "ROM '{}' is {} bytes, limit is 256",
                self.name, self.size
            )));
        }

        let reserved = if self.checksum.is_some() { 4 } else { 0 };
        let content = self.words.len() * 4;
        if content + reserved > self.size as usize {
            return Err(VerificationError::config(format!(
                "ROM '{}' content of {} bytes does not fit in {} bytes",
                self.name, content, self.size
            )));
        }

        if let Some(checksum) = self.checksum {
            let bytes = self.rom_bytes();
            let computed = crc32_mpeg2(&bytes[..bytes.len() - 4]);
            if computed != checksum {
                return Err(VerificationError::config(format!(
                    "ROM '{}' checksum 0x{:08x} does not match computed 0x{:08x}",
                    self.name, checksum, computed
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_revisions_validate() {
        assert!(RevisionConfig::tt05().validate().is_ok());
        assert!(RevisionConfig::tt05_late_turnaround().validate().is_ok());
        assert_eq!(RevisionConfig::default(), RevisionConfig::tt05());
    }

    #[test]
    fn test_clock_period() {
        assert_eq!(RevisionConfig::tt05().clock_period_ns(), 17);
    }

    #[test]
    fn test_boot_rom_layout() {
        let revision = RevisionConfig::tt05();
        let boot = revision.roms().find(|r| r.name == "boot_rom").unwrap();
        let bytes = boot.rom_bytes();
        assert_eq!(bytes.len(), 256);
        assert_eq!(&bytes[..4], &[0x29, 0x4b, 0x01, 0x22]);
        assert!(bytes[212..252].iter().all(|&b| b == 0));
        assert_eq!(&bytes[252..], &[0xf3, 0x6a, 0x53, 0xd3]);
    }

    #[test]
    fn test_json_round_trip() {
        let revision = RevisionConfig::tt05_late_turnaround();
        let json = revision.to_json_string().unwrap();
        let parsed = RevisionConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, revision);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let err = RevisionConfig::from_json_str("{\"invalid\": json}").unwrap_err();
        assert!(matches!(err, VerificationError::Json { .. }));
    }

    #[test]
    fn test_turnaround_beyond_dummy_cycles_is_rejected() {
        let revision = RevisionConfig {
            quad_turnaround_cycle: 3,
            ..RevisionConfig::tt05()
        };
        assert!(matches!(revision.validate(), Err(VerificationError::Config { .. })));
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let mut revision = RevisionConfig::tt05();
        for region in revision.regions.iter_mut() {
            if region.checksum.is_some() {
                region.checksum = Some(0xdeadbeef);
            }
        }
        assert!(matches!(revision.validate(), Err(VerificationError::Config { .. })));
    }

    #[test]
    fn test_missing_ram_is_rejected() {
        let mut revision = RevisionConfig::tt05();
        revision.regions.retain(|r| r.kind != RegionKind::Ram);
        assert!(revision.validate().is_err());
    }
}
