//! Signal-level surface of the peripheral under test.
//!
//! The exerciser only ever talks to a device through these traits, so the
//! same transactor and scanner drive the behavioral model, a fault-injecting
//! wrapper or a bridge to an external simulator.

use crate::pin::{DirectionMask, PinValue};

/// Main SPI/QSPI bus: chip-select, clock, data lines and the lane direction mask
pub trait SpiPeripheral: Send {
    fn name(&self) -> &str;

    /// Chip-select, active low
    fn set_chip_select(&mut self, level: PinValue);

    fn set_clock(&mut self, level: PinValue);

    /// Host-to-device data line (IO0)
    fn set_mosi(&mut self, level: PinValue);

    /// Host-driven lanes 0-2 (IO1-IO3) as the low 3 bits
    fn set_lanes_in(&mut self, lanes: u8);

    /// Device-to-host data line; `HighZ` when the device is not driving it
    fn miso(&self) -> PinValue;

    /// Nibble on all four lanes in quad output mode, `None` when not driving
    fn lanes_out(&self) -> Option<u8>;

    /// Current output enable of the lane bank
    fn output_enable(&self) -> DirectionMask;
}

/// Debug scan port, clocked independently of the main bus
pub trait DebugPort: Send {
    fn set_debug_clock(&mut self, level: PinValue);

    fn set_debug_addr(&mut self, nibble_index: u8);

    /// Nibble value selected by the registered debug address
    fn debug_data(&self) -> u8;

    /// 7-segment pattern for [`DebugPort::debug_data`]
    fn segments(&self) -> u8;
}

/// Optional harness control inputs
pub trait ChipControl {
    fn set_enable(&mut self, _enabled: bool) {}

    fn set_reset_n(&mut self, _level: bool) {}
}
