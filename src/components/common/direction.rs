//! Expected direction mask of the shared lane bank for every protocol phase.

use crate::components::common::codec::ADDRESS_BITS;
use crate::components::common::command::{Command, Phase};
use crate::pin::DirectionMask;

/// Pure mapping from (command, phase) to the mask the device must present.
///
/// The only revision-dependent input is the QUAD_READ turnaround: the dummy
/// cycle index from which all four lanes are expected to be outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionTracker {
    quad_turnaround_cycle: u8,
}

impl DirectionTracker {
    pub fn new(quad_turnaround_cycle: u8) -> Self {
        Self {
            quad_turnaround_cycle,
        }
    }

    pub fn quad_turnaround_cycle(&self) -> u8 {
        self.quad_turnaround_cycle
    }

    pub fn expected(&self, command: Command, phase: Phase) -> DirectionMask {
        match (command, phase) {
            (_, Phase::Idle) | (_, Phase::Deselected) => DirectionMask::IDLE,
            (_, Phase::Opcode(_)) => DirectionMask::IDLE,

            // The read output lane turns one cycle before the first data bit
            (Command::Read, Phase::Address(i)) if i == ADDRESS_BITS - 1 => {
                DirectionMask::SINGLE_OUT
            }
            (Command::Read, Phase::Payload(_)) => DirectionMask::SINGLE_OUT,

            (Command::QuadRead, Phase::Dummy(i)) if i >= self.quad_turnaround_cycle => {
                DirectionMask::QUAD_OUT
            }
            (Command::QuadRead, Phase::Payload(_)) => DirectionMask::QUAD_OUT,

            _ => DirectionMask::IDLE,
        }
    }
}

impl Default for DirectionTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_and_deselected_are_inputs() {
        let tracker = DirectionTracker::default();
        for command in Command::ALL {
            assert_eq!(tracker.expected(command, Phase::Idle), DirectionMask::IDLE);
            assert_eq!(tracker.expected(command, Phase::Deselected), DirectionMask::IDLE);
            assert_eq!(tracker.expected(command, Phase::Opcode(7)), DirectionMask::IDLE);
        }
    }

    #[test]
    fn test_read_turnaround_on_last_address_cycle() {
        let tracker = DirectionTracker::default();
        assert_eq!(tracker.expected(Command::Read, Phase::Address(22)), DirectionMask::IDLE);
        assert_eq!(tracker.expected(Command::Read, Phase::Address(23)), DirectionMask::SINGLE_OUT);
        assert_eq!(tracker.expected(Command::Read, Phase::Payload(0)), DirectionMask::SINGLE_OUT);
        assert_eq!(tracker.expected(Command::Write, Phase::Address(23)), DirectionMask::IDLE);
    }

    #[test]
    fn test_quad_read_turnaround_is_configurable() {
        let early = DirectionTracker::new(1);
        assert_eq!(early.expected(Command::QuadRead, Phase::Address(23)), DirectionMask::IDLE);
        assert_eq!(early.expected(Command::QuadRead, Phase::Dummy(0)), DirectionMask::IDLE);
        assert_eq!(early.expected(Command::QuadRead, Phase::Dummy(1)), DirectionMask::QUAD_OUT);

        let late = DirectionTracker::new(2);
        assert_eq!(late.expected(Command::QuadRead, Phase::Dummy(1)), DirectionMask::IDLE);
        assert_eq!(late.expected(Command::QuadRead, Phase::Payload(0)), DirectionMask::QUAD_OUT);
    }

    #[test]
    fn test_writes_never_turn_lanes() {
        let tracker = DirectionTracker::default();
        for i in 0..64 {
            assert_eq!(tracker.expected(Command::QuadWrite, Phase::Payload(i)), DirectionMask::IDLE);
            assert_eq!(tracker.expected(Command::Write, Phase::Payload(i)), DirectionMask::IDLE);
        }
    }
}
