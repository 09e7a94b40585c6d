use serde::{Deserialize, Serialize};
use std::fmt;

/// 24-bit unsigned integer for the serial address phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct U24(u32);

impl U24 {
    pub const MAX: U24 = U24(0xFF_FFFF);
    pub const BITS: u32 = 24;

    pub fn new(value: u32) -> Self {
        U24(value & 0xFF_FFFF)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn inc(&mut self) {
        self.0 = (self.0 + 1) & 0xFF_FFFF;
    }

    pub fn wrapping_add(&self, value: u32) -> Self {
        U24::new(self.0.wrapping_add(value))
    }

    pub fn wrapping_sub(&self, value: u32) -> Self {
        U24::new(self.0.wrapping_sub(value))
    }

    /// Address bit `index` (0 = LSB)
    pub fn bit(&self, index: u32) -> bool {
        index < Self::BITS && (self.0 >> index) & 1 == 1
    }
}

impl fmt::Display for U24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl From<u32> for U24 {
    fn from(value: u32) -> Self {
        U24::new(value)
    }
}

impl From<U24> for u32 {
    fn from(value: U24) -> Self {
        value.value()
    }
}

/// High nibble of a byte
pub fn high_nibble(byte: u8) -> u8 {
    byte >> 4
}

/// Low nibble of a byte
pub fn low_nibble(byte: u8) -> u8 {
    byte & 0x0F
}
