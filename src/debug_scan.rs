//! # Debug Scanner
//!
//! Walks the debug scan port on its own free-running clock. The address is
//! changed on a falling edge, the device registers it on the following rising
//! edge, and the frame is sampled on the next falling edge: exactly one debug
//! clock cycle after the change. The scanner only needs [`DebugPort`], so it
//! cannot touch chip-select or any other main bus signal.

use crate::component::DebugPort;
use crate::components::clock::DebugClock;
use crate::components::common::seven_seg::{DebugFrame, DEBUG_NIBBLES};
use crate::components::memory::GoldenMemoryModel;
use crate::error::{Result, VerificationError};
use crate::pin::PinValue;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// Address requested, waiting for the falling edge to apply it
    Pending(u8),
    /// Address applied, waiting for the device to register it
    AddressSet(u8),
    /// Registered, waiting for the sampling edge
    Registered(u8),
}

pub struct DebugScanner {
    clock: DebugClock,
    state: ScanState,
}

impl DebugScanner {
    pub fn new(period_ns: u64) -> Self {
        Self {
            clock: DebugClock::new(period_ns),
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn clock(&self) -> &DebugClock {
        &self.clock
    }

    pub fn begin(&mut self, nibble_index: u8) -> Result<()> {
        if self.state != ScanState::Idle {
            return Err(VerificationError::protocol(format!(
                "debug scan of nibble {} while {:?}",
                nibble_index, self.state
            )));
        }
        if nibble_index >= DEBUG_NIBBLES {
            return Err(VerificationError::protocol(format!(
                "debug nibble index {} out of range",
                nibble_index
            )));
        }
        self.state = ScanState::Pending(nibble_index);
        Ok(())
    }

    /// Advance to the next debug clock edge of interest.
    ///
    /// Returns the verified frame once the sampling edge has been reached.
    pub fn step<D: DebugPort + ?Sized>(
        &mut self,
        device: &mut D,
        golden: &GoldenMemoryModel,
    ) -> Result<Option<DebugFrame>> {
        match self.state {
            ScanState::Idle => Ok(None),
            ScanState::Pending(index) => {
                self.clock
                    .advance_to(PinValue::Low, |level| device.set_debug_clock(level));
                device.set_debug_addr(index);
                self.state = ScanState::AddressSet(index);
                Ok(None)
            }
            ScanState::AddressSet(index) => {
                self.clock
                    .advance_to(PinValue::High, |level| device.set_debug_clock(level));
                self.state = ScanState::Registered(index);
                Ok(None)
            }
            ScanState::Registered(index) => {
                self.clock
                    .advance_to(PinValue::Low, |level| device.set_debug_clock(level));
                self.state = ScanState::Idle;
                Self::verify(device, golden, index).map(Some)
            }
        }
    }

    fn verify<D: DebugPort + ?Sized>(
        device: &D,
        golden: &GoldenMemoryModel,
        index: u8,
    ) -> Result<DebugFrame> {
        let observed = DebugFrame {
            nibble_index: index,
            value: device.debug_data(),
            segment_pattern: device.segments(),
        };
        let expected = golden.debug_frame(index);
        trace!(index, value = observed.value, segments = observed.segment_pattern, "debug frame");
        if observed != expected {
            return Err(VerificationError::DebugMismatch {
                nibble_index: index,
                expected,
                observed,
            });
        }
        Ok(observed)
    }

    pub fn scan<D: DebugPort + ?Sized>(
        &mut self,
        device: &mut D,
        golden: &GoldenMemoryModel,
        nibble_index: u8,
    ) -> Result<DebugFrame> {
        self.begin(nibble_index)?;
        loop {
            if let Some(frame) = self.step(device, golden)? {
                return Ok(frame);
            }
        }
    }

    /// Scan every nibble of the RAM window in index order
    pub fn scan_all<D: DebugPort + ?Sized>(
        &mut self,
        device: &mut D,
        golden: &GoldenMemoryModel,
    ) -> Result<Vec<DebugFrame>> {
        let frames = (0..DEBUG_NIBBLES)
            .map(|index| self.scan(device, golden, index))
            .collect::<Result<Vec<_>>>()?;
        debug!(nibbles = frames.len(), "debug scan complete");
        Ok(frames)
    }
}
