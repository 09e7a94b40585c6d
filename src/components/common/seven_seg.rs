//! Hexadecimal 7-segment decoding for the debug scan port.

/// Segment patterns for 0-F, bit 0 = segment a through bit 6 = segment g
pub const SEVEN_SEG_TABLE: [u8; 16] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, // 0-7
    0x7F, 0x67, 0x77, 0x7C, 0x39, 0x5E, 0x79, 0x71, // 8-F
];

/// Number of nibbles addressable through the debug port
pub const DEBUG_NIBBLES: u8 = 16;

pub fn segments_for(nibble: u8) -> u8 {
    SEVEN_SEG_TABLE[(nibble & 0x0F) as usize]
}

/// One observation of the debug port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugFrame {
    pub nibble_index: u8,
    pub value: u8,
    pub segment_pattern: u8,
}

impl DebugFrame {
    /// Frame the debug port must show for `nibble_index` over a RAM window.
    ///
    /// Even indices select the low nibble of `window[index >> 1]`, odd ones
    /// the high nibble.
    pub fn from_window(nibble_index: u8, window: &[u8]) -> Self {
        let nibble_index = nibble_index & (DEBUG_NIBBLES - 1);
        let byte = window
            .get((nibble_index >> 1) as usize)
            .copied()
            .unwrap_or(0);
        let value = (byte >> (4 * (nibble_index & 1))) & 0x0F;
        Self {
            nibble_index,
            value,
            segment_pattern: segments_for(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_decimal_patterns() {
        let expected = [63, 6, 91, 79, 102, 109, 125, 7, 127, 103, 119, 124, 57, 94, 121, 113];
        assert_eq!(SEVEN_SEG_TABLE, expected);
        assert!(SEVEN_SEG_TABLE.iter().all(|&p| p < 0x80));
    }

    #[test]
    fn test_frame_nibble_order() {
        let window = [1, 0xFF, 0xAA, 4, 0x80, 0x08, 0xA5, 0x5A];
        let values: Vec<u8> = (0..16).map(|i| DebugFrame::from_window(i, &window).value).collect();
        assert_eq!(
            values,
            vec![1, 0, 0xF, 0xF, 0xA, 0xA, 4, 0, 0, 8, 8, 0, 5, 0xA, 0xA, 5]
        );
        let frame = DebugFrame::from_window(13, &window);
        assert_eq!(frame.segment_pattern, segments_for(0xA));
    }
}
