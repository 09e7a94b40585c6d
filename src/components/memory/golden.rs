//! Golden reference model of the device memory map.
//!
//! The model owns its own copy of the scratch RAM window and the ROM images
//! of one revision. It is mutated only by completed writes and never looks at
//! what the device under test returns, except to compare against it.

use crate::components::common::seven_seg::DebugFrame;
use crate::components::memory::region::{ExpectedByte, MemoryRegion};
use crate::components::memory::rom::RomImage;
use crate::error::{Result, VerificationError};
use crate::revision_config::{RegionKind, RevisionConfig};
use crate::types::U24;
use tracing::trace;

pub struct GoldenMemoryModel {
    ram_region: MemoryRegion,
    ram: Vec<u8>,
    roms: Vec<(MemoryRegion, RomImage)>,
    entropy: Option<MemoryRegion>,
}

impl GoldenMemoryModel {
    pub fn new(revision: &RevisionConfig) -> Result<Self> {
        revision.validate()?;

        let ram_config = revision
            .ram()
            .ok_or_else(|| VerificationError::config("revision has no RAM region"))?;
        let ram_region = MemoryRegion::from(ram_config);
        let ram = vec![0u8; ram_region.size as usize];

        let roms = revision
            .roms()
            .map(|config| Ok((MemoryRegion::from(config), RomImage::from_config(config)?)))
            .collect::<Result<Vec<_>>>()?;

        let entropy = revision.entropy().map(MemoryRegion::from);

        Ok(Self {
            ram_region,
            ram,
            roms,
            entropy,
        })
    }

    pub fn ram_region(&self) -> &MemoryRegion {
        &self.ram_region
    }

    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// Current contents of the RAM window, offset 0 first
    pub fn ram_window(&self) -> &[u8] {
        &self.ram
    }

    pub fn rom_regions(&self) -> impl Iterator<Item = (&MemoryRegion, &RomImage)> {
        self.roms.iter().map(|(region, rom)| (region, rom))
    }

    pub fn entropy_region(&self) -> Option<&MemoryRegion> {
        self.entropy.as_ref()
    }

    /// Region an address decodes to, in priority order entropy, RAM, ROMs
    pub fn region_for(&self, address: U24) -> Option<&MemoryRegion> {
        if let Some(entropy) = self.entropy.as_ref().filter(|r| r.contains(address)) {
            return Some(entropy);
        }
        if self.ram_region.contains(address) {
            return Some(&self.ram_region);
        }
        self.roms
            .iter()
            .map(|(region, _)| region)
            .find(|region| region.contains(address))
    }

    /// Record a completed WRITE/QUAD_WRITE.
    ///
    /// The write path has no region decode: every byte lands in the RAM
    /// window at `(address + k - ram_base) mod ram_size`.
    pub fn apply_write(&mut self, address: U24, data: &[u8]) {
        for (k, &byte) in data.iter().enumerate() {
            let offset = self.ram_region.offset(address.wrapping_add(k as u32));
            self.ram[offset] = byte;
        }
        trace!(address = %address, length = data.len(), "golden write applied");
    }

    pub fn expected_byte(&self, address: U24) -> ExpectedByte {
        if self.entropy.as_ref().is_some_and(|r| r.contains(address)) {
            return ExpectedByte::Entropy;
        }
        if self.ram_region.contains(address) {
            return ExpectedByte::Fixed(self.ram[self.ram_region.offset(address)]);
        }
        for (region, rom) in &self.roms {
            if region.contains(address) {
                return ExpectedByte::Fixed(rom.read(region.offset(address)));
            }
        }
        ExpectedByte::Fixed(0)
    }

    pub fn expected_read(&self, address: U24, length: usize) -> Vec<ExpectedByte> {
        (0..length)
            .map(|k| self.expected_byte(address.wrapping_add(k as u32)))
            .collect()
    }

    /// Compare bytes read from the device at `address` against the model
    pub fn verify_read(&self, address: U24, actual: &[u8]) -> Result<()> {
        let expected = self.expected_read(address, actual.len());
        if expected.iter().zip(actual).all(|(e, &a)| e.matches(a)) {
            return Ok(());
        }
        Err(VerificationError::DataMismatch {
            address,
            length: actual.len(),
            expected,
            actual: actual.to_vec(),
        })
    }

    /// Compare only the trailing `window` bytes of a read.
    ///
    /// Used when a read is longer than the RAM window and only the last
    /// window-sized suffix has a defined value after a wrapping write.
    pub fn verify_read_suffix(&self, address: U24, actual: &[u8], window: usize) -> Result<()> {
        let skip = actual.len().saturating_sub(window);
        self.verify_read(address.wrapping_add(skip as u32), &actual[skip..])
    }

    /// Two reads of the same entropy span of 2 or more bytes must differ
    pub fn verify_entropy(&self, address: U24, first: &[u8], second: &[u8]) -> Result<()> {
        if first.len() != second.len() {
            return Err(VerificationError::protocol(format!(
                "entropy reads differ in length: {} vs {}",
                first.len(),
                second.len()
            )));
        }
        if first.len() >= 2 && first == second {
            return Err(VerificationError::EntropyViolation {
                address,
                length: first.len(),
                sample: first.to_vec(),
            });
        }
        Ok(())
    }

    pub fn is_entropy(&self, address: U24) -> bool {
        matches!(self.region_for(address), Some(r) if r.kind == RegionKind::Entropy)
    }

    pub fn debug_frame(&self, nibble_index: u8) -> DebugFrame {
        DebugFrame::from_window(nibble_index, &self.ram)
    }

    pub fn ram_snapshot(&self) -> Vec<u8> {
        self.ram.clone()
    }

    pub fn restore_snapshot(&mut self, snapshot: &[u8]) -> Result<()> {
        if snapshot.len() != self.ram.len() {
            return Err(VerificationError::protocol(format!(
                "snapshot of {} bytes does not fit a {} byte window",
                snapshot.len(),
                self.ram.len()
            )));
        }
        self.ram.copy_from_slice(snapshot);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.ram.fill(0);
    }
}
