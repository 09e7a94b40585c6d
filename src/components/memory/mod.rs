//! Memory map, ROM images and the golden reference model.

pub mod golden;
pub mod region;
pub mod rom;

pub use golden::GoldenMemoryModel;
pub use region::{ExpectedByte, MemoryRegion};
pub use rom::{crc32_mpeg2, RomImage};
