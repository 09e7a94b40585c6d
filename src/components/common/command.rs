//! Commands, phases and transactions of the serial memory protocol.

use crate::pin::DirectionMask;
use crate::types::U24;
use serde::{Deserialize, Serialize};

/// The four supported operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Write,
    Read,
    QuadWrite,
    QuadRead,
}

/// Which side drives the payload phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HostDrives,
    DeviceDrives,
}

/// Payload lane width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lanes {
    Single,
    Quad,
}

impl Lanes {
    /// Payload bits moved per clock cycle
    pub fn bits_per_cycle(&self) -> usize {
        match self {
            Lanes::Single => 1,
            Lanes::Quad => 4,
        }
    }

    pub fn cycles_per_byte(&self) -> usize {
        8 / self.bits_per_cycle()
    }
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::Write,
        Command::Read,
        Command::QuadWrite,
        Command::QuadRead,
    ];

    pub fn opcode(&self) -> u8 {
        match self {
            Command::Write => 0x02,
            Command::Read => 0x03,
            Command::QuadWrite => 0x32,
            Command::QuadRead => 0x6B,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Command> {
        Command::ALL.into_iter().find(|c| c.opcode() == opcode)
    }

    pub fn lanes(&self) -> Lanes {
        match self {
            Command::Write | Command::Read => Lanes::Single,
            Command::QuadWrite | Command::QuadRead => Lanes::Quad,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Command::Write | Command::QuadWrite => Direction::HostDrives,
            Command::Read | Command::QuadRead => Direction::DeviceDrives,
        }
    }

    pub fn is_read(&self) -> bool {
        self.direction() == Direction::DeviceDrives
    }

    pub fn is_write(&self) -> bool {
        self.direction() == Direction::HostDrives
    }

    /// Write command moving data over the given lane width
    pub fn write_for(lanes: Lanes) -> Command {
        match lanes {
            Lanes::Single => Command::Write,
            Lanes::Quad => Command::QuadWrite,
        }
    }

    /// Read command moving data over the given lane width
    pub fn read_for(lanes: Lanes) -> Command {
        match lanes {
            Lanes::Single => Command::Read,
            Lanes::Quad => Command::QuadRead,
        }
    }
}

/// Position within a transaction; the index counts cycles inside the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Opcode(u8),
    Address(u8),
    Dummy(u8),
    Payload(u32),
    Deselected,
}

impl Phase {
    pub fn is_payload(&self) -> bool {
        matches!(self, Phase::Payload(_))
    }
}

/// One bus operation as issued by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTransaction {
    pub command: Command,
    pub address: U24,
    /// Bytes the host drives; empty for reads
    pub payload: Vec<u8>,
    /// Bytes requested from the device; equals `payload.len()` for writes
    pub length: usize,
}

impl BusTransaction {
    pub fn write(address: u32, data: &[u8]) -> Self {
        Self::host_drives(Command::Write, U24::new(address), data)
    }

    pub fn quad_write(address: u32, data: &[u8]) -> Self {
        Self::host_drives(Command::QuadWrite, U24::new(address), data)
    }

    pub fn read(address: u32, length: usize) -> Self {
        Self::device_drives(Command::Read, U24::new(address), length)
    }

    pub fn quad_read(address: u32, length: usize) -> Self {
        Self::device_drives(Command::QuadRead, U24::new(address), length)
    }

    /// Build a transaction for any command; `data` is ignored for reads.
    pub fn new(command: Command, address: u32, data: &[u8], length: usize) -> Self {
        if command.is_write() {
            Self::host_drives(command, U24::new(address), data)
        } else {
            Self::device_drives(command, U24::new(address), length)
        }
    }

    fn host_drives(command: Command, address: U24, data: &[u8]) -> Self {
        Self {
            command,
            address,
            payload: data.to_vec(),
            length: data.len(),
        }
    }

    fn device_drives(command: Command, address: U24, length: usize) -> Self {
        Self {
            command,
            address,
            payload: Vec::new(),
            length,
        }
    }

    pub fn direction(&self) -> Direction {
        self.command.direction()
    }
}

/// Direction mask observed at one phase boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskSample {
    pub phase: Phase,
    pub mask: DirectionMask,
}

/// Outcome of a completed (or aborted) transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction: BusTransaction,
    /// Bytes sampled from the device; empty for writes
    pub data: Vec<u8>,
    /// Every mask sample taken, in bus order
    pub mask_trace: Vec<MaskSample>,
    /// Main clock edges consumed
    pub cycles: u64,
    pub aborted: bool,
}

impl TransactionRecord {
    /// Masks sampled before each clock edge, without the idle/deselect samples
    pub fn cycle_masks(&self) -> Vec<DirectionMask> {
        self.mask_trace
            .iter()
            .filter(|s| !matches!(s.phase, Phase::Idle | Phase::Deselected))
            .map(|s| s.mask)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes() {
        assert_eq!(Command::Write.opcode(), 0x02);
        assert_eq!(Command::Read.opcode(), 0x03);
        assert_eq!(Command::QuadWrite.opcode(), 0x32);
        assert_eq!(Command::QuadRead.opcode(), 0x6B);
        for command in Command::ALL {
            assert_eq!(Command::from_opcode(command.opcode()), Some(command));
        }
        assert_eq!(Command::from_opcode(0x9F), None);
    }

    #[test]
    fn test_command_lanes_and_direction() {
        assert_eq!(Command::QuadRead.lanes(), Lanes::Quad);
        assert_eq!(Command::Read.direction(), Direction::DeviceDrives);
        assert_eq!(Command::QuadWrite.direction(), Direction::HostDrives);
        assert_eq!(Command::write_for(Lanes::Quad), Command::QuadWrite);
        assert_eq!(Command::read_for(Lanes::Single), Command::Read);
        assert_eq!(Lanes::Quad.cycles_per_byte(), 2);
        assert_eq!(Lanes::Single.cycles_per_byte(), 8);
    }

    #[test]
    fn test_transaction_builders() {
        let write = BusTransaction::write(1, &[1, 2, 3]);
        assert_eq!(write.length, 3);
        assert_eq!(write.direction(), Direction::HostDrives);

        let read = BusTransaction::quad_read(0x101, 4);
        assert!(read.payload.is_empty());
        assert_eq!(read.length, 4);
        assert_eq!(read.address.value(), 0x101);

        let generic = BusTransaction::new(Command::Read, 5, &[9, 9], 1);
        assert!(generic.payload.is_empty());
        assert_eq!(generic.length, 1);
    }
}
