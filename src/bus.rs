//! # Bus Transactor
//!
//! Host side of the main SPI/QSPI bus. A transaction is framed up front by
//! the [`CommandCodec`] and then advanced by [`BusTransactor::step`], one
//! clock cycle (or setup/hold delay) per call:
//!
//! ```text
//! Idle -> Selecting -> Opcode -> Address -> [Dummy] -> Payload -> Deselecting -> Idle
//! ```
//!
//! Before every clock edge the transactor samples the device's lane
//! direction mask and compares it with the [`DirectionTracker`]; any
//! difference ends the transaction with a framing error. Read data is
//! sampled before the edge as well, so the device must already be driving it.

use crate::component::{ChipControl, SpiPeripheral};
use crate::components::clock::BitClock;
use crate::components::common::codec::{nibble_to_lines, BusCycle, ByteAssembler, CommandCodec, HostDrive, SampleKind};
use crate::components::common::command::{BusTransaction, MaskSample, Phase, TransactionRecord};
use crate::components::common::direction::DirectionTracker;
use crate::error::{Result, VerificationError};
use crate::pin::{DirectionMask, PinValue};
use crate::revision_config::RevisionConfig;
use tracing::{debug, trace, warn};

/// Power-on sequencing step, in simulated nanoseconds
const POWER_ON_STEP_NS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Idle,
    Selecting,
    Opcode,
    Address,
    Dummy,
    Payload,
    Deselecting,
}

impl BusState {
    fn for_phase(phase: Phase) -> BusState {
        match phase {
            Phase::Opcode(_) => BusState::Opcode,
            Phase::Address(_) => BusState::Address,
            Phase::Dummy(_) => BusState::Dummy,
            Phase::Payload(_) => BusState::Payload,
            Phase::Idle => BusState::Idle,
            Phase::Deselected => BusState::Deselecting,
        }
    }
}

struct ActiveTransaction {
    transaction: BusTransaction,
    cycles: Vec<BusCycle>,
    next: usize,
    assembler: ByteAssembler,
    data: Vec<u8>,
    mask_trace: Vec<MaskSample>,
    start_edge: u64,
}

pub struct BusTransactor {
    codec: CommandCodec,
    tracker: DirectionTracker,
    clock: BitClock,
    select_setup_ns: u64,
    deselect_settle_ns: u64,
    deselect_hold_ns: u64,
    has_enable: bool,
    state: BusState,
    active: Option<ActiveTransaction>,
    completed: Option<TransactionRecord>,
}

impl BusTransactor {
    pub fn new(revision: &RevisionConfig) -> Self {
        Self {
            codec: CommandCodec::new(revision.quad_dummy_cycles),
            tracker: DirectionTracker::new(revision.quad_turnaround_cycle),
            clock: BitClock::from_revision(revision),
            select_setup_ns: revision.select_setup_ns,
            deselect_settle_ns: revision.deselect_settle_ns,
            deselect_hold_ns: revision.deselect_hold_ns,
            has_enable: revision.has_enable,
            state: BusState::Idle,
            active: None,
            completed: None,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == BusState::Idle
    }

    pub fn clock(&self) -> &BitClock {
        &self.clock
    }

    /// Simulated time on the main bus
    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn codec(&self) -> &CommandCodec {
        &self.codec
    }

    pub fn tracker(&self) -> &DirectionTracker {
        &self.tracker
    }

    /// Enable/reset sequencing of the harness, ending with the idle mask check
    pub fn power_on<D>(&mut self, device: &mut D) -> Result<()>
    where
        D: SpiPeripheral + ChipControl + ?Sized,
    {
        if !self.is_idle() {
            return Err(VerificationError::protocol("power-on during a transaction"));
        }

        if self.has_enable {
            device.set_enable(false);
        }
        device.set_chip_select(PinValue::Low);
        device.set_reset_n(false);
        self.clock.wait_ns(POWER_ON_STEP_NS);

        if self.has_enable {
            device.set_enable(true);
        }
        self.clock.wait_ns(POWER_ON_STEP_NS);

        device.set_chip_select(PinValue::High);
        device.set_reset_n(true);
        device.set_clock(self.clock.inactive_level());
        self.clock.wait_ns(POWER_ON_STEP_NS);

        device.set_reset_n(false);
        self.clock.wait_ns(POWER_ON_STEP_NS);
        device.set_reset_n(true);
        self.clock.wait_ns(POWER_ON_STEP_NS);

        let observed = device.output_enable();
        if observed != DirectionMask::IDLE {
            return Err(VerificationError::protocol(format!(
                "lane mask {} after power-on, expected {}",
                observed,
                DirectionMask::IDLE
            )));
        }
        device.set_mosi(PinValue::Low);
        device.set_lanes_in(0);
        self.clock.wait_ns(POWER_ON_STEP_NS);
        debug!(device = device.name(), "power-on complete");
        Ok(())
    }

    /// Frame a transaction and arm the state machine
    pub fn begin(&mut self, transaction: BusTransaction) -> Result<()> {
        if self.state != BusState::Idle {
            return Err(VerificationError::protocol(format!(
                "{:?} issued while the bus is in {:?}",
                transaction.command, self.state
            )));
        }
        let cycles = self.codec.frame(&transaction)?;
        debug!(
            command = ?transaction.command,
            address = %transaction.address,
            length = transaction.length,
            "transaction start"
        );
        self.active = Some(ActiveTransaction {
            transaction,
            cycles,
            next: 0,
            assembler: ByteAssembler::new(),
            data: Vec::new(),
            mask_trace: Vec::new(),
            start_edge: self.clock.edges(),
        });
        self.completed = None;
        self.state = BusState::Selecting;
        Ok(())
    }

    /// Advance by one clock cycle or delay; returns the state entered
    pub fn step<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) -> Result<BusState> {
        let result = match self.state {
            BusState::Idle => Ok(BusState::Idle),
            BusState::Selecting => self.select(device),
            BusState::Opcode | BusState::Address | BusState::Dummy | BusState::Payload => {
                self.clock_cycle(device)
            }
            BusState::Deselecting => self.deselect(device),
        };
        match result {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(err) => {
                warn!(error = %err, "transaction failed");
                self.release(device);
                Err(err)
            }
        }
    }

    /// Run a transaction to completion
    pub fn run<D: SpiPeripheral + ?Sized>(
        &mut self,
        device: &mut D,
        transaction: BusTransaction,
    ) -> Result<TransactionRecord> {
        self.begin(transaction)?;
        while self.step(device)? != BusState::Idle {}
        self.take_record()
            .ok_or_else(|| VerificationError::protocol("transaction ended without a record"))
    }

    /// Record of the last transaction that reached Idle
    pub fn take_record(&mut self) -> Option<TransactionRecord> {
        self.completed.take()
    }

    /// Raise chip-select in the middle of a transaction.
    ///
    /// The device must return to the idle mask after the usual settle time.
    /// The returned record is marked aborted and holds whatever was sampled.
    pub fn abort<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) -> Result<TransactionRecord> {
        let Some(mut active) = self.active.take() else {
            return Err(VerificationError::protocol("abort with no transaction in flight"));
        };
        debug!(
            command = ?active.transaction.command,
            cycles = active.next,
            "aborting transaction"
        );

        device.set_chip_select(PinValue::High);
        self.clock.wait_ns(self.deselect_settle_ns);
        let observed = device.output_enable();
        active.mask_trace.push(MaskSample {
            phase: Phase::Deselected,
            mask: observed,
        });
        self.clock.wait_ns(self.deselect_hold_ns);
        self.state = BusState::Idle;

        if observed != DirectionMask::IDLE {
            return Err(VerificationError::Framing {
                command: active.transaction.command,
                phase: Phase::Deselected,
                expected: DirectionMask::IDLE,
                observed,
            });
        }

        Ok(TransactionRecord {
            cycles: self.clock.edges() - active.start_edge,
            transaction: active.transaction,
            data: active.data,
            mask_trace: active.mask_trace,
            aborted: true,
        })
    }

    fn check_mask<D: SpiPeripheral + ?Sized>(
        tracker: &DirectionTracker,
        active: &mut ActiveTransaction,
        device: &D,
        phase: Phase,
    ) -> Result<()> {
        let command = active.transaction.command;
        let expected = tracker.expected(command, phase);
        let observed = device.output_enable();
        active.mask_trace.push(MaskSample {
            phase,
            mask: observed,
        });
        if observed != expected {
            return Err(VerificationError::Framing {
                command,
                phase,
                expected,
                observed,
            });
        }
        Ok(())
    }

    fn select<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) -> Result<BusState> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| VerificationError::protocol("selecting with no transaction"))?;
        Self::check_mask(&self.tracker, active, device, Phase::Idle)?;

        device.set_clock(self.clock.inactive_level());
        device.set_chip_select(PinValue::Low);
        self.clock.wait_ns(self.select_setup_ns);

        let first = active
            .cycles
            .first()
            .map(|c| c.phase)
            .unwrap_or(Phase::Deselected);
        Ok(BusState::for_phase(first))
    }

    fn clock_cycle<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) -> Result<BusState> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| VerificationError::protocol("clocking with no transaction"))?;
        let cycle = *active.cycles.get(active.next).ok_or_else(|| {
            VerificationError::protocol("clocked past the end of the framed transaction")
        })?;

        Self::check_mask(&self.tracker, active, device, cycle.phase)?;

        match cycle.sample {
            SampleKind::None => {}
            SampleKind::Bit => {
                let bit = device.miso().to_bool().ok_or_else(|| {
                    VerificationError::protocol(format!(
                        "device data line floating at {:?}",
                        cycle.phase
                    ))
                })?;
                if let Some(byte) = active.assembler.push_bit(bit) {
                    active.data.push(byte);
                }
            }
            SampleKind::Nibble => {
                let nibble = device.lanes_out().ok_or_else(|| {
                    VerificationError::protocol(format!(
                        "quad lanes not driven at {:?}",
                        cycle.phase
                    ))
                })?;
                if let Some(byte) = active.assembler.push_nibble(nibble) {
                    active.data.push(byte);
                }
            }
        }

        match cycle.drive {
            HostDrive::Bit(bit) => {
                device.set_mosi(PinValue::from_bool(bit));
                device.set_lanes_in(0);
            }
            HostDrive::Nibble(nibble) => {
                let (mosi, lanes) = nibble_to_lines(nibble);
                device.set_mosi(mosi);
                device.set_lanes_in(lanes);
            }
            HostDrive::Idle => {
                device.set_mosi(PinValue::Low);
                device.set_lanes_in(0);
            }
        }

        self.clock.cycle(|level| device.set_clock(level));
        trace!(phase = ?cycle.phase, edge = self.clock.edges(), "cycle");

        active.next += 1;
        Ok(active
            .cycles
            .get(active.next)
            .map_or(BusState::Deselecting, |next| BusState::for_phase(next.phase)))
    }

    fn deselect<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) -> Result<BusState> {
        device.set_chip_select(PinValue::High);
        self.clock.wait_ns(self.deselect_settle_ns);

        let mut active = self
            .active
            .take()
            .ok_or_else(|| VerificationError::protocol("deselecting with no transaction"))?;
        Self::check_mask(&self.tracker, &mut active, device, Phase::Deselected)?;
        self.clock.wait_ns(self.deselect_hold_ns);

        if active.data.len() != active.transaction.length && active.transaction.command.is_read() {
            return Err(VerificationError::protocol(format!(
                "read {} bytes, {} requested",
                active.data.len(),
                active.transaction.length
            )));
        }

        let record = TransactionRecord {
            cycles: self.clock.edges() - active.start_edge,
            transaction: active.transaction,
            data: active.data,
            mask_trace: active.mask_trace,
            aborted: false,
        };
        debug!(
            command = ?record.transaction.command,
            address = %record.transaction.address,
            cycles = record.cycles,
            "transaction complete"
        );
        self.completed = Some(record);
        Ok(BusState::Idle)
    }

    /// Drop the transaction in flight and leave the bus deselected
    fn release<D: SpiPeripheral + ?Sized>(&mut self, device: &mut D) {
        device.set_chip_select(PinValue::High);
        self.clock.wait_ns(self.deselect_settle_ns + self.deselect_hold_ns);
        self.active = None;
        self.state = BusState::Idle;
    }
}
