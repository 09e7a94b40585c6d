//! # Co-simulation
//!
//! Runs the main bus and the debug scan port against one device at the same
//! time. Each channel is an async loop that locks the device for a single
//! clock edge and then yields, so on a current-thread runtime the two
//! channels interleave edge by edge without either waiting on the other.
//!
//! Bus traffic here is read-only: the golden model is shared immutably by
//! both channels and nothing mutates it while they run.

use crate::bus::{BusState, BusTransactor};
use crate::component::{DebugPort, SpiPeripheral};
use crate::components::common::command::BusTransaction;
use crate::components::common::seven_seg::DEBUG_NIBBLES;
use crate::components::memory::GoldenMemoryModel;
use crate::debug_scan::DebugScanner;
use crate::error::{Result, VerificationError};
use crate::revision_config::RevisionConfig;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoSimReport {
    pub bus_transactions: usize,
    pub bus_bytes: usize,
    pub debug_frames: usize,
    pub bus_time_ns: u64,
    pub debug_time_ns: u64,
}

pub struct CoSimulation<D> {
    device: Mutex<D>,
    golden: GoldenMemoryModel,
    bus: BusTransactor,
    scanner: DebugScanner,
}

fn lock<D>(device: &Mutex<D>) -> Result<MutexGuard<'_, D>> {
    device
        .lock()
        .map_err(|_| VerificationError::protocol("device lock poisoned"))
}

impl<D> CoSimulation<D>
where
    D: SpiPeripheral + DebugPort,
{
    /// The device is expected to be powered on and to match `golden`
    pub fn new(revision: &RevisionConfig, device: D, golden: GoldenMemoryModel) -> Self {
        Self {
            device: Mutex::new(device),
            golden,
            bus: BusTransactor::new(revision),
            scanner: DebugScanner::new(revision.debug_clock_period_ns),
        }
    }

    pub fn golden(&self) -> &GoldenMemoryModel {
        &self.golden
    }

    pub fn into_device(self) -> Result<D> {
        self.device
            .into_inner()
            .map_err(|_| VerificationError::protocol("device lock poisoned"))
    }

    /// Issue `reads` on the bus while scanning the debug port `scan_rounds`
    /// times over all nibbles.
    pub async fn run(&mut self, reads: Vec<BusTransaction>, scan_rounds: usize) -> Result<CoSimReport> {
        if let Some(write) = reads.iter().find(|t| t.command.is_write()) {
            return Err(VerificationError::protocol(format!(
                "{:?} in co-simulation; bus traffic must be read-only",
                write.command
            )));
        }

        let device = &self.device;
        let golden = &self.golden;
        let bus = &mut self.bus;
        let scanner = &mut self.scanner;
        let bus_start = bus.now_ns();
        let debug_start = scanner.clock().now_ns();

        let bus_channel = async move {
            let mut bytes = 0;
            let count = reads.len();
            for transaction in reads {
                let address = transaction.address;
                bus.begin(transaction)?;
                loop {
                    let state = {
                        let mut guard = lock(device)?;
                        bus.step(&mut *guard)?
                    };
                    if state == BusState::Idle {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                let record = bus
                    .take_record()
                    .ok_or_else(|| VerificationError::protocol("read ended without a record"))?;
                golden.verify_read(address, &record.data)?;
                bytes += record.data.len();
            }
            Ok::<_, VerificationError>((count, bytes, bus.now_ns() - bus_start))
        };

        let debug_channel = async move {
            let mut frames = 0;
            for _ in 0..scan_rounds {
                for index in 0..DEBUG_NIBBLES {
                    scanner.begin(index)?;
                    loop {
                        let frame = {
                            let mut guard = lock(device)?;
                            scanner.step(&mut *guard, golden)?
                        };
                        if frame.is_some() {
                            frames += 1;
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                }
            }
            debug!(frames, "debug channel done");
            Ok::<_, VerificationError>((frames, scanner.clock().now_ns() - debug_start))
        };

        let (bus_result, debug_result) = tokio::join!(bus_channel, debug_channel);
        let (bus_transactions, bus_bytes, bus_time_ns) = bus_result?;
        let (debug_frames, debug_time_ns) = debug_result?;

        let report = CoSimReport {
            bus_transactions,
            bus_bytes,
            debug_frames,
            bus_time_ns,
            debug_time_ns,
        };
        info!(?report, "co-simulation complete");
        Ok(report)
    }
}
