//! Bit and nibble framing of the four serial commands.
//!
//! Every transaction starts with an 8-bit opcode and a 24-bit address, both
//! sent most-significant bit first on the host data line, one bit per cycle.
//! The payload then runs either one bit per cycle (single lane) or one nibble
//! per cycle (quad), high nibble first.
//!
//! Quad nibbles use the standard IO numbering: nibble bit 0 is IO0, which is
//! the host data line, and nibble bits 1-3 are IO1-IO3 on bidirectional lanes
//! 0-2. For the high nibble of `d` that puts bit 7 on lane 2, bit 6 on lane 1,
//! bit 5 on lane 0 and bit 4 on the host data line.

use crate::components::common::command::{BusTransaction, Command, Lanes, Phase};
use crate::error::{Result, VerificationError};
use crate::pin::PinValue;
use crate::types::{high_nibble, low_nibble, U24};

pub const OPCODE_BITS: u8 = 8;
pub const ADDRESS_BITS: u8 = 24;

/// What the host puts on its lines before a clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDrive {
    /// One bit on the host data line
    Bit(bool),
    /// One nibble across the host data line and lanes 0-2
    Nibble(u8),
    /// Host lines parked low while the device talks
    Idle,
}

/// What the host samples from the device before a clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    None,
    Bit,
    Nibble,
}

/// One clock cycle of a framed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCycle {
    pub phase: Phase,
    pub drive: HostDrive,
    pub sample: SampleKind,
}

/// Levels on the host data line and the 3 host-driven lanes for one nibble
pub fn nibble_to_lines(nibble: u8) -> (PinValue, u8) {
    let mosi = PinValue::from_bool(nibble & 0x1 != 0);
    let lanes = (nibble >> 1) & 0x7;
    (mosi, lanes)
}

/// Inverse of [`nibble_to_lines`]
pub fn lines_to_nibble(mosi: bool, lanes: u8) -> u8 {
    ((lanes & 0x7) << 1) | mosi as u8
}

/// Accumulates received bits or nibbles MSB-first into bytes
#[derive(Debug, Default, Clone)]
pub struct ByteAssembler {
    current: u8,
    bits: u8,
}

impl ByteAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bit(&mut self, bit: bool) -> Option<u8> {
        self.current = (self.current << 1) | bit as u8;
        self.bits += 1;
        self.take_if_full()
    }

    pub fn push_nibble(&mut self, nibble: u8) -> Option<u8> {
        self.current = (self.current << 4) | (nibble & 0x0F);
        self.bits += 4;
        self.take_if_full()
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    fn take_if_full(&mut self) -> Option<u8> {
        if self.bits >= 8 {
            let byte = self.current;
            self.current = 0;
            self.bits = 0;
            Some(byte)
        } else {
            None
        }
    }
}

/// Encoder/decoder for the serial command set
#[derive(Debug, Clone, Copy)]
pub struct CommandCodec {
    quad_dummy_cycles: u8,
}

impl CommandCodec {
    pub fn new(quad_dummy_cycles: u8) -> Self {
        Self { quad_dummy_cycles }
    }

    pub fn quad_dummy_cycles(&self) -> u8 {
        self.quad_dummy_cycles
    }

    /// Dummy cycles between address and payload for a command
    pub fn dummy_cycles(&self, command: Command) -> u8 {
        match command {
            Command::QuadRead => self.quad_dummy_cycles,
            _ => 0,
        }
    }

    pub fn opcode_bits(command: Command) -> [bool; 8] {
        Self::byte_bits(command.opcode())
    }

    pub fn address_bits(address: U24) -> [bool; 24] {
        let mut bits = [false; 24];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = address.bit(23 - i as u32);
        }
        bits
    }

    pub fn byte_bits(byte: u8) -> [bool; 8] {
        let mut bits = [false; 8];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (byte >> (7 - i)) & 1 == 1;
        }
        bits
    }

    pub fn byte_nibbles(byte: u8) -> [u8; 2] {
        [high_nibble(byte), low_nibble(byte)]
    }

    /// Serialize a payload into per-cycle host drives
    pub fn encode_payload(lanes: Lanes, payload: &[u8]) -> Vec<HostDrive> {
        match lanes {
            Lanes::Single => payload
                .iter()
                .flat_map(|&b| Self::byte_bits(b))
                .map(HostDrive::Bit)
                .collect(),
            Lanes::Quad => payload
                .iter()
                .flat_map(|&b| Self::byte_nibbles(b))
                .map(HostDrive::Nibble)
                .collect(),
        }
    }

    pub fn decode_bits(bits: &[bool]) -> Vec<u8> {
        let mut assembler = ByteAssembler::new();
        bits.iter().filter_map(|&b| assembler.push_bit(b)).collect()
    }

    pub fn decode_nibbles(nibbles: &[u8]) -> Vec<u8> {
        let mut assembler = ByteAssembler::new();
        nibbles
            .iter()
            .filter_map(|&n| assembler.push_nibble(n))
            .collect()
    }

    /// Decode the command carried by the first 8 host bits
    pub fn decode_opcode(bits: &[bool]) -> Result<Command> {
        if bits.len() != OPCODE_BITS as usize {
            return Err(VerificationError::protocol(format!(
                "opcode needs {} bits, got {}",
                OPCODE_BITS,
                bits.len()
            )));
        }
        let opcode = Self::decode_bits(bits)[0];
        Command::from_opcode(opcode)
            .ok_or_else(|| VerificationError::protocol(format!("unknown opcode 0x{:02X}", opcode)))
    }

    pub fn decode_address(bits: &[bool]) -> Result<U24> {
        if bits.len() != ADDRESS_BITS as usize {
            return Err(VerificationError::protocol(format!(
                "address needs {} bits, got {}",
                ADDRESS_BITS,
                bits.len()
            )));
        }
        let value = bits.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32);
        Ok(U24::new(value))
    }

    /// Full cycle schedule of a transaction, from the first opcode bit to the
    /// last payload cycle.
    pub fn frame(&self, transaction: &BusTransaction) -> Result<Vec<BusCycle>> {
        let command = transaction.command;
        if command.is_read() && !transaction.payload.is_empty() {
            return Err(VerificationError::protocol(format!(
                "{:?} carries a host payload of {} bytes",
                command,
                transaction.payload.len()
            )));
        }
        if command.is_write() && transaction.payload.len() != transaction.length {
            return Err(VerificationError::protocol(format!(
                "{:?} length {} disagrees with payload of {} bytes",
                command,
                transaction.length,
                transaction.payload.len()
            )));
        }

        let lanes = command.lanes();
        let payload_cycles = transaction.length * lanes.cycles_per_byte();
        let dummy = self.dummy_cycles(command);
        let mut cycles = Vec::with_capacity(32 + dummy as usize + payload_cycles);

        for (i, bit) in Self::opcode_bits(command).into_iter().enumerate() {
            cycles.push(BusCycle {
                phase: Phase::Opcode(i as u8),
                drive: HostDrive::Bit(bit),
                sample: SampleKind::None,
            });
        }
        for (i, bit) in Self::address_bits(transaction.address).into_iter().enumerate() {
            cycles.push(BusCycle {
                phase: Phase::Address(i as u8),
                drive: HostDrive::Bit(bit),
                sample: SampleKind::None,
            });
        }
        for i in 0..dummy {
            cycles.push(BusCycle {
                phase: Phase::Dummy(i),
                drive: HostDrive::Idle,
                sample: SampleKind::None,
            });
        }

        if command.is_write() {
            for (i, drive) in Self::encode_payload(lanes, &transaction.payload)
                .into_iter()
                .enumerate()
            {
                cycles.push(BusCycle {
                    phase: Phase::Payload(i as u32),
                    drive,
                    sample: SampleKind::None,
                });
            }
        } else {
            let sample = match lanes {
                Lanes::Single => SampleKind::Bit,
                Lanes::Quad => SampleKind::Nibble,
            };
            for i in 0..payload_cycles {
                cycles.push(BusCycle {
                    phase: Phase::Payload(i as u32),
                    drive: HostDrive::Idle,
                    sample,
                });
            }
        }

        Ok(cycles)
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new(2)
    }
}
