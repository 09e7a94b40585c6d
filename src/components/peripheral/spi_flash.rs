//! Behavioral model of the serial memory peripheral.
//!
//! An edge-driven device that keeps its own RAM, ROM images and entropy
//! source. Inputs are sampled on the active edge of the main clock and the
//! outputs (data lines and lane direction mask) change right after that edge,
//! so they are stable for the host when it samples before the next edge.
//!
//! Relative to chip-select going low, edges are counted from 1:
//!
//! - edges 1-8 shift in the opcode, edges 9-32 the address
//! - READ turns the output lane on after edge 31 and presents bit 7 of the
//!   first byte after edge 32
//! - QUAD_READ turns all four lanes on after edge `32 + turnaround` and
//!   presents the first high nibble after edge `32 + dummy_cycles`
//! - writes store each byte on the edge that completes it
//!
//! Raising chip-select returns the device to idle with all lanes as inputs.

use crate::component::{ChipControl, DebugPort, SpiPeripheral};
use crate::components::common::codec::{lines_to_nibble, ByteAssembler, ADDRESS_BITS, OPCODE_BITS};
use crate::components::common::command::Command;
use crate::components::common::seven_seg::{segments_for, DebugFrame, DEBUG_NIBBLES};
use crate::components::memory::region::MemoryRegion;
use crate::components::memory::rom::RomImage;
use crate::error::{Result, VerificationError};
use crate::pin::{DirectionMask, PinValue};
use crate::revision_config::{ClockPolarity, RevisionConfig};
use crate::types::{high_nibble, low_nibble, U24};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

const HEADER_EDGES: u32 = (OPCODE_BITS + ADDRESS_BITS) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Deselected,
    Opcode,
    Address,
    Dummy,
    Payload,
    /// Unknown opcode; wait for chip-select to rise
    Ignore,
}

pub struct SpiFlashModel {
    name: String,
    polarity: ClockPolarity,
    quad_dummy_cycles: u8,
    quad_turnaround_cycle: u8,

    ram_region: MemoryRegion,
    ram: Vec<u8>,
    roms: Vec<(MemoryRegion, RomImage)>,
    entropy: Option<MemoryRegion>,
    rng: StdRng,

    // input pins
    selected: bool,
    clock: PinValue,
    mosi: bool,
    lanes_in: u8,
    enabled: bool,
    reset_n: bool,

    // protocol state
    state: DeviceState,
    command: Option<Command>,
    edges: u32,
    shift: u32,
    address: U24,
    assembler: ByteAssembler,
    out_byte: u8,
    out_pos: u8,

    // outputs
    output_enable: DirectionMask,
    miso: PinValue,
    lanes_out: Option<u8>,

    // debug port
    debug_clock: PinValue,
    debug_addr: u8,
    debug_index: u8,
}

impl SpiFlashModel {
    pub fn new(revision: &RevisionConfig) -> Result<Self> {
        Self::with_seed(revision, 0x5EED_F1A5)
    }

    /// Build a model whose entropy source is seeded with `seed`
    pub fn with_seed(revision: &RevisionConfig, seed: u64) -> Result<Self> {
        revision.validate()?;
        let ram_region = revision
            .ram()
            .map(MemoryRegion::from)
            .ok_or_else(|| VerificationError::config("revision has no RAM region"))?;
        let roms = revision
            .roms()
            .map(|config| Ok((MemoryRegion::from(config), RomImage::from_config(config)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(SpiFlashModel {
            name: format!("spi_flash[{}]", revision.name),
            polarity: revision.clock_polarity,
            quad_dummy_cycles: revision.quad_dummy_cycles,
            quad_turnaround_cycle: revision.quad_turnaround_cycle,
            ram: vec![0u8; ram_region.size as usize],
            ram_region,
            roms,
            entropy: revision.entropy().map(MemoryRegion::from),
            rng: StdRng::seed_from_u64(seed),
            selected: false,
            clock: PinValue::Low,
            mosi: false,
            lanes_in: 0,
            enabled: true,
            reset_n: true,
            state: DeviceState::Deselected,
            command: None,
            edges: 0,
            shift: 0,
            address: U24::default(),
            assembler: ByteAssembler::new(),
            out_byte: 0,
            out_pos: 0,
            output_enable: DirectionMask::IDLE,
            miso: PinValue::HighZ,
            lanes_out: None,
            debug_clock: PinValue::Low,
            debug_addr: 0,
            debug_index: 0,
        })
    }

    /// Backdoor view of the scratch RAM
    pub fn ram_window(&self) -> &[u8] {
        &self.ram
    }

    /// Command decoded in the current transaction, if any
    pub fn active_command(&self) -> Option<Command> {
        self.command
    }

    pub fn is_idle(&self) -> bool {
        self.state == DeviceState::Deselected
    }

    fn active_level(&self) -> PinValue {
        match self.polarity {
            ClockPolarity::RisingEdge => PinValue::High,
            ClockPolarity::FallingEdge => PinValue::Low,
        }
    }

    fn release_bus(&mut self) {
        self.state = DeviceState::Deselected;
        self.command = None;
        self.edges = 0;
        self.shift = 0;
        self.assembler = ByteAssembler::new();
        self.out_pos = 0;
        self.output_enable = DirectionMask::IDLE;
        self.miso = PinValue::HighZ;
        self.lanes_out = None;
    }

    fn read_byte(&mut self, address: U24) -> u8 {
        if self.entropy.as_ref().is_some_and(|r| r.contains(address)) {
            return self.rng.gen();
        }
        if self.ram_region.contains(address) {
            return self.ram[self.ram_region.offset(address)];
        }
        self.roms
            .iter()
            .find(|(region, _)| region.contains(address))
            .map_or(0, |(region, rom)| rom.read(region.offset(address)))
    }

    fn store_byte(&mut self, byte: u8) {
        let offset = self.ram_region.offset(self.address);
        self.ram[offset] = byte;
        trace!(address = %self.address, byte, "stored");
        self.address.inc();
    }

    fn present_bit(&mut self) {
        self.miso = PinValue::from_bool((self.out_byte >> (7 - self.out_pos)) & 1 == 1);
    }

    fn present_nibble(&mut self) {
        let nibble = if self.out_pos == 0 {
            high_nibble(self.out_byte)
        } else {
            low_nibble(self.out_byte)
        };
        self.lanes_out = Some(nibble);
    }

    fn load_next_byte(&mut self) {
        self.out_byte = self.read_byte(self.address);
        self.out_pos = 0;
        self.address.inc();
    }

    fn on_active_edge(&mut self) {
        self.edges += 1;
        match self.state {
            DeviceState::Deselected | DeviceState::Ignore => {}
            DeviceState::Opcode => {
                self.shift = (self.shift << 1) | self.mosi as u32;
                if self.edges == OPCODE_BITS as u32 {
                    let opcode = self.shift as u8;
                    self.shift = 0;
                    match Command::from_opcode(opcode) {
                        Some(command) => {
                            trace!(?command, "opcode decoded");
                            self.command = Some(command);
                            self.state = DeviceState::Address;
                        }
                        None => {
                            debug!(opcode, "unknown opcode ignored");
                            self.state = DeviceState::Ignore;
                        }
                    }
                }
            }
            DeviceState::Address => {
                self.shift = (self.shift << 1) | self.mosi as u32;
                if self.edges == HEADER_EDGES - 1 && self.command == Some(Command::Read) {
                    self.output_enable = DirectionMask::SINGLE_OUT;
                    self.miso = PinValue::Low;
                }
                if self.edges == HEADER_EDGES {
                    self.address = U24::new(self.shift);
                    trace!(address = %self.address, "address latched");
                    self.start_payload();
                }
            }
            DeviceState::Dummy => {
                let elapsed = (self.edges - HEADER_EDGES) as u8;
                self.advance_dummy(elapsed);
            }
            DeviceState::Payload => self.payload_edge(),
        }
    }

    fn start_payload(&mut self) {
        match self.command {
            Some(Command::Read) => {
                self.load_next_byte();
                self.present_bit();
                self.state = DeviceState::Payload;
            }
            Some(Command::QuadRead) => {
                self.state = DeviceState::Dummy;
                self.advance_dummy(0);
            }
            Some(Command::Write) | Some(Command::QuadWrite) => {
                self.assembler = ByteAssembler::new();
                self.state = DeviceState::Payload;
            }
            None => self.state = DeviceState::Ignore,
        }
    }

    fn advance_dummy(&mut self, elapsed: u8) {
        if elapsed == self.quad_turnaround_cycle {
            self.output_enable = DirectionMask::QUAD_OUT;
            self.lanes_out = Some(0);
        }
        if elapsed == self.quad_dummy_cycles {
            self.load_next_byte();
            self.present_nibble();
            self.state = DeviceState::Payload;
        }
    }

    fn payload_edge(&mut self) {
        match self.command {
            Some(Command::Write) => {
                if let Some(byte) = self.assembler.push_bit(self.mosi) {
                    self.store_byte(byte);
                }
            }
            Some(Command::QuadWrite) => {
                let nibble = lines_to_nibble(self.mosi, self.lanes_in);
                if let Some(byte) = self.assembler.push_nibble(nibble) {
                    self.store_byte(byte);
                }
            }
            Some(Command::Read) => {
                self.out_pos += 1;
                if self.out_pos == 8 {
                    self.load_next_byte();
                }
                self.present_bit();
            }
            Some(Command::QuadRead) => {
                self.out_pos += 1;
                if self.out_pos == 2 {
                    self.load_next_byte();
                }
                self.present_nibble();
            }
            None => {}
        }
    }
}

impl SpiPeripheral for SpiFlashModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_chip_select(&mut self, level: PinValue) {
        let selected = level.is_low();
        if selected == self.selected {
            return;
        }
        self.selected = selected;
        self.release_bus();
        if selected && self.enabled && self.reset_n {
            self.state = DeviceState::Opcode;
        }
    }

    fn set_clock(&mut self, level: PinValue) {
        let previous = self.clock;
        self.clock = level;
        if previous != level && level == self.active_level() && self.selected {
            self.on_active_edge();
        }
    }

    fn set_mosi(&mut self, level: PinValue) {
        self.mosi = level.is_high();
    }

    fn set_lanes_in(&mut self, lanes: u8) {
        self.lanes_in = lanes & 0x7;
    }

    fn miso(&self) -> PinValue {
        if self.output_enable.is_lane_output(1) {
            self.miso
        } else {
            PinValue::HighZ
        }
    }

    fn lanes_out(&self) -> Option<u8> {
        if self.output_enable == DirectionMask::QUAD_OUT {
            self.lanes_out
        } else {
            None
        }
    }

    fn output_enable(&self) -> DirectionMask {
        self.output_enable
    }
}

impl DebugPort for SpiFlashModel {
    fn set_debug_clock(&mut self, level: PinValue) {
        if self.debug_clock == PinValue::Low && level == PinValue::High {
            self.debug_index = self.debug_addr & (DEBUG_NIBBLES - 1);
        }
        self.debug_clock = level;
    }

    fn set_debug_addr(&mut self, nibble_index: u8) {
        self.debug_addr = nibble_index;
    }

    fn debug_data(&self) -> u8 {
        DebugFrame::from_window(self.debug_index, &self.ram).value
    }

    fn segments(&self) -> u8 {
        segments_for(self.debug_data())
    }
}

impl ChipControl for SpiFlashModel {
    fn set_enable(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.release_bus();
        }
    }

    fn set_reset_n(&mut self, level: bool) {
        self.reset_n = level;
        if !level {
            self.release_bus();
            self.debug_index = 0;
        }
    }
}
