use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low,
    High,
    HighZ, // Tri-state
}

impl PinValue {
    pub fn to_str(&self) -> &'static str {
        match self {
            PinValue::Low => "Low",
            PinValue::High => "High",
            PinValue::HighZ => "HighZ",
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            PinValue::High
        } else {
            PinValue::Low
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            PinValue::Low => Some(false),
            PinValue::High => Some(true),
            PinValue::HighZ => None,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, PinValue::High)
    }

    pub fn is_low(&self) -> bool {
        matches!(self, PinValue::Low)
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Output-enable mask of the bidirectional pin bank.
///
/// A set bit means the device drives the pin. Bits 4-7 are fixed-direction
/// outputs unrelated to the serial bus and always read back as 1; bits 0-3
/// are the shared lanes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionMask(u8);

impl DirectionMask {
    pub const FIXED_OUTPUTS: u8 = 0b1111_0000;
    pub const LANE_BITS: u8 = 0b0000_1111;

    /// All lanes are inputs
    pub const IDLE: DirectionMask = DirectionMask(0b1111_0000);
    /// The single-lane read output (lane 1) is driven by the device
    pub const SINGLE_OUT: DirectionMask = DirectionMask(0b1111_0010);
    /// All four lanes are driven by the device
    pub const QUAD_OUT: DirectionMask = DirectionMask(0b1111_1111);

    pub fn from_bits(bits: u8) -> Self {
        DirectionMask(bits)
    }

    /// Build a mask from the lane bits only; the fixed outputs are forced on.
    pub fn from_lanes(lanes: u8) -> Self {
        DirectionMask(Self::FIXED_OUTPUTS | (lanes & Self::LANE_BITS))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn lanes(&self) -> u8 {
        self.0 & Self::LANE_BITS
    }

    pub fn is_lane_output(&self, lane: u8) -> bool {
        lane < 4 && (self.0 >> lane) & 1 == 1
    }
}

impl Default for DirectionMask {
    fn default() -> Self {
        DirectionMask::IDLE
    }
}

impl fmt::Debug for DirectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:08b}", self.0)
    }
}

impl fmt::Display for DirectionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_value_conversions() {
        assert_eq!(PinValue::from_bool(true), PinValue::High);
        assert_eq!(PinValue::from_bool(false), PinValue::Low);
        assert_eq!(PinValue::High.to_bool(), Some(true));
        assert_eq!(PinValue::HighZ.to_bool(), None);
        assert_eq!(PinValue::HighZ.to_string(), "HighZ");
    }

    #[test]
    fn test_direction_mask_constants() {
        assert_eq!(DirectionMask::IDLE.bits(), 0b1111_0000);
        assert_eq!(DirectionMask::SINGLE_OUT.bits(), 0b1111_0010);
        assert_eq!(DirectionMask::QUAD_OUT.bits(), 0b1111_1111);
    }

    #[test]
    fn test_direction_mask_forces_fixed_outputs() {
        let mask = DirectionMask::from_lanes(0b0010);
        assert_eq!(mask, DirectionMask::SINGLE_OUT);
        assert!(mask.is_lane_output(1));
        assert!(!mask.is_lane_output(0));
        assert!(!mask.is_lane_output(7));
    }

    #[test]
    fn test_direction_mask_formatting() {
        assert_eq!(format!("{}", DirectionMask::SINGLE_OUT), "11110010");
        assert_eq!(format!("{:?}", DirectionMask::IDLE), "0b11110000");
    }
}
