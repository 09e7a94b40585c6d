//! # Scenario Runner
//!
//! Directed and randomized traffic against one device, cross-checked against
//! the golden model after every read. Randomness comes from a seeded
//! [`StdRng`], so a failing run can be replayed from its seed.
//!
//! | Scenario | What it checks |
//! |---|---|
//! | `smoke` | fixed writes read back, including the window alias at +256 |
//! | `fuzz` | random in-window writes, same-range and whole-window reads |
//! | `wraparound` | writes up to twice the window size, trailing-window suffix |
//! | `rom_check` | every ROM region over both lane widths |
//! | `entropy_check` | repeated entropy reads are not identical |
//! | `debug_scan` | debug port nibbles and segments follow RAM |
//! | `abort_recovery` | chip-select raised mid-transaction leaves no trace |

use crate::bus::{BusState, BusTransactor};
use crate::component::{ChipControl, DebugPort, SpiPeripheral};
use crate::components::common::command::{BusTransaction, Command, Lanes, TransactionRecord};
use crate::components::memory::GoldenMemoryModel;
use crate::debug_scan::DebugScanner;
use crate::error::{Result, VerificationError};
use crate::revision_config::RevisionConfig;
use crate::types::U24;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Attempts at finding a random window alias that holds a whole transfer
const ALIAS_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Iterations of each randomized scenario
    pub iterations: usize,
    pub seed: u64,
    /// Pairs of entropy reads compared
    pub entropy_trials: usize,
    /// Random RAM fills scanned through the debug port
    pub debug_rounds: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            seed: 0x7705,
            entropy_trials: 8,
            debug_rounds: 10,
        }
    }
}

/// Lane widths used by the fuzz scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzMode {
    Single,
    Quad,
    /// Each transaction picks its lane width at random
    Mixed,
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub transactions: u64,
    pub bus_time_ns: u64,
    pub result: Result<()>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    pub fn total_transactions(&self) -> u64 {
        self.outcomes.iter().map(|o| o.transactions).sum()
    }

    pub fn first_error(&self) -> Option<(&'static str, &VerificationError)> {
        self.outcomes
            .iter()
            .find_map(|o| o.result.as_ref().err().map(|e| (o.name, e)))
    }
}

type Scenario<D> = fn(&mut ScenarioRunner<D>) -> Result<()>;

pub struct ScenarioRunner<D> {
    bus: BusTransactor,
    scanner: DebugScanner,
    golden: GoldenMemoryModel,
    device: D,
    rng: StdRng,
    config: ScenarioConfig,
    transactions: u64,
}

impl<D> ScenarioRunner<D>
where
    D: SpiPeripheral + DebugPort + ChipControl,
{
    pub fn new(revision: &RevisionConfig, device: D, config: ScenarioConfig) -> Result<Self> {
        Ok(Self {
            bus: BusTransactor::new(revision),
            scanner: DebugScanner::new(revision.debug_clock_period_ns),
            golden: GoldenMemoryModel::new(revision)?,
            device,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            transactions: 0,
        })
    }

    pub fn golden(&self) -> &GoldenMemoryModel {
        &self.golden
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn bus(&self) -> &BusTransactor {
        &self.bus
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Hand the golden model and device over, e.g. to a co-simulation
    pub fn into_parts(self) -> (GoldenMemoryModel, D) {
        (self.golden, self.device)
    }

    fn ram_base(&self) -> u32 {
        self.golden.ram_region().base.value()
    }

    fn random_lanes(&mut self) -> Lanes {
        if self.rng.gen_bool(0.5) {
            Lanes::Quad
        } else {
            Lanes::Single
        }
    }

    fn lanes_for(&mut self, mode: FuzzMode) -> Lanes {
        match mode {
            FuzzMode::Single => Lanes::Single,
            FuzzMode::Quad => Lanes::Quad,
            FuzzMode::Mixed => self.random_lanes(),
        }
    }

    fn random_bytes(&mut self, length: usize) -> Vec<u8> {
        (0..length).map(|_| self.rng.gen()).collect()
    }

    pub fn power_on(&mut self) -> Result<()> {
        self.bus.power_on(&mut self.device)
    }

    /// Write through the bus and, once it completed cleanly, into the golden model
    pub fn write(&mut self, lanes: Lanes, address: u32, data: &[u8]) -> Result<TransactionRecord> {
        let transaction = BusTransaction::new(Command::write_for(lanes), address, data, data.len());
        let record = self.bus.run(&mut self.device, transaction)?;
        self.transactions += 1;
        self.golden.apply_write(U24::new(address), data);
        Ok(record)
    }

    /// Read without comparing against the golden model
    pub fn read(&mut self, lanes: Lanes, address: u32, length: usize) -> Result<Vec<u8>> {
        let transaction = BusTransaction::new(Command::read_for(lanes), address, &[], length);
        let record = self.bus.run(&mut self.device, transaction)?;
        self.transactions += 1;
        Ok(record.data)
    }

    pub fn read_verified(&mut self, lanes: Lanes, address: u32, length: usize) -> Result<Vec<u8>> {
        let data = self.read(lanes, address, length)?;
        self.golden.verify_read(U24::new(address), &data)?;
        Ok(data)
    }

    /// Directed write/read-back over both protocols
    pub fn smoke(&mut self) -> Result<()> {
        let base = self.ram_base();
        let size = self.golden.ram_size();

        // Address 1 lands in the window at its own offset; read it back
        // through the window alias.
        let alias = base + self.golden.ram_region().offset(U24::new(1)) as u32;
        self.write(Lanes::Single, 1, &[1, 2, 3, 4])?;
        let data = self.read_verified(Lanes::Single, alias, 4)?;
        if data != [1, 2, 3, 4] {
            return Err(VerificationError::protocol(format!(
                "alias read returned {:02X?}",
                data
            )));
        }
        self.read_verified(Lanes::Quad, alias, 4)?;

        let pattern: Vec<u8> = [1, 0xFF, 0xAA, 4, 0x80, 0x08, 0xA5, 0x5A]
            .into_iter()
            .cycle()
            .take(size)
            .collect();
        self.write(Lanes::Single, base, &pattern)?;
        self.read_verified(Lanes::Single, base, size)?;
        self.read_verified(Lanes::Quad, base, size)?;

        let inverted: Vec<u8> = pattern.iter().map(|b| !b).collect();
        self.write(Lanes::Quad, base, &inverted)?;
        self.read_verified(Lanes::Single, base, size)?;
        self.read_verified(Lanes::Quad, base, size)?;

        self.write(Lanes::Single, base, &[])?;
        self.read_verified(Lanes::Quad, base, 0)?;
        Ok(())
    }

    /// Random-length, random-offset writes inside the window
    pub fn fuzz(&mut self, mode: FuzzMode) -> Result<()> {
        let base = self.ram_base();
        let size = self.golden.ram_size();

        for _ in 0..self.config.iterations {
            let length = self.rng.gen_range(1..=size);
            let offset = self.rng.gen_range(0..=size - length);
            let address = base + offset as u32;
            let data = self.random_bytes(length);

            let lanes = self.lanes_for(mode);
            self.write(lanes, address, &data)?;
            let lanes = self.lanes_for(mode);
            self.read_verified(lanes, address, length)?;
            let lanes = self.lanes_for(mode);
            self.read_verified(lanes, base, size)?;
        }
        debug!(?mode, iterations = self.config.iterations, "fuzz done");
        Ok(())
    }

    /// Random start address, anywhere in the window's aliases, whose whole
    /// span decodes to RAM
    fn random_alias(&mut self, length: usize) -> u32 {
        let base = self.ram_base();
        let region = self.golden.ram_region().clone();
        for _ in 0..ALIAS_ATTEMPTS {
            let candidate = base + self.rng.gen_range(0..0x400u32);
            let end = U24::new(candidate + length as u32 - 1);
            if region.contains(U24::new(candidate)) && region.contains(end) {
                return candidate;
            }
        }
        base
    }

    /// Transfers up to twice the window size starting at arbitrary aliases
    pub fn wraparound(&mut self) -> Result<()> {
        let base = self.ram_base();
        let size = self.golden.ram_size();

        for _ in 0..self.config.iterations {
            let length = self.rng.gen_range(1..=2 * size);
            let address = self.random_alias(length);
            let data = self.random_bytes(length);

            let lanes = self.random_lanes();
            self.write(lanes, address, &data)?;
            let lanes = self.random_lanes();
            let readback = self.read(lanes, address, length)?;
            self.golden
                .verify_read_suffix(U24::new(address), &readback, size)?;

            let lanes = self.random_lanes();
            self.read_verified(lanes, base, size)?;
        }
        Ok(())
    }

    /// Full contents of every ROM region
    pub fn rom_check(&mut self) -> Result<()> {
        let roms: Vec<(u32, usize)> = self
            .golden
            .rom_regions()
            .map(|(region, rom)| (region.base.value(), rom.size()))
            .collect();
        for (base, size) in roms {
            self.read_verified(Lanes::Single, base, size)?;
            self.read_verified(Lanes::Quad, base, size)?;
        }
        Ok(())
    }

    /// Repeated entropy reads must not come back identical
    pub fn entropy_check(&mut self) -> Result<()> {
        let Some(address) = self.golden.entropy_region().map(|r| r.base.value()) else {
            debug!("revision has no entropy region");
            return Ok(());
        };

        for _ in 0..self.config.entropy_trials {
            let lanes = self.random_lanes();
            let first = self.read_verified(lanes, address, 2)?;
            let second = self.read_verified(lanes, address, 2)?;
            self.golden
                .verify_entropy(U24::new(address), &first, &second)?;
        }

        let burst = self.read(Lanes::Single, address, 16)?;
        if burst.windows(2).all(|pair| pair[0] == pair[1]) {
            return Err(VerificationError::EntropyViolation {
                address: U24::new(address),
                length: burst.len(),
                sample: burst,
            });
        }
        Ok(())
    }

    /// Debug port against a counting pattern, then random fills
    pub fn debug_scan(&mut self) -> Result<()> {
        let base = self.ram_base();
        let size = self.golden.ram_size();

        let counting: Vec<u8> = (1..=size as u8).collect();
        self.write(Lanes::Single, base, &counting)?;
        for (i, &expected) in counting.iter().enumerate().take(8) {
            let frame = self
                .scanner
                .scan(&mut self.device, &self.golden, (i * 2) as u8)?;
            if frame.value != expected & 0x0F {
                return Err(VerificationError::DebugMismatch {
                    nibble_index: frame.nibble_index,
                    expected: self.golden.debug_frame(frame.nibble_index),
                    observed: frame,
                });
            }
        }

        for _ in 0..self.config.debug_rounds {
            let data = self.random_bytes(size);
            let lanes = self.random_lanes();
            self.write(lanes, base, &data)?;
            self.scanner.scan_all(&mut self.device, &self.golden)?;
        }
        Ok(())
    }

    /// Abort a write in its address phase and a read in its payload, then
    /// check that the window still matches the golden model
    pub fn abort_recovery(&mut self) -> Result<()> {
        let base = self.ram_base();
        let size = self.golden.ram_size();
        let rounds = (self.config.iterations / 10).max(1);

        for _ in 0..rounds {
            let data = self.random_bytes(size);
            let lanes = self.random_lanes();
            let cut = self.rng.gen_range(9..32);
            self.abort_after(
                BusTransaction::new(Command::write_for(lanes), base, &data, size),
                cut,
            )?;

            let lanes = self.random_lanes();
            let command = Command::read_for(lanes);
            let header = 32 + self.bus.codec().dummy_cycles(command) as usize;
            let payload_cycles = size * lanes.cycles_per_byte();
            let cut = header + self.rng.gen_range(1..payload_cycles);
            self.abort_after(BusTransaction::new(command, base, &[], size), cut)?;

            let lanes = self.random_lanes();
            self.read_verified(lanes, base, size)?;
        }
        Ok(())
    }

    fn abort_after(&mut self, transaction: BusTransaction, cycles: usize) -> Result<()> {
        self.bus.begin(transaction)?;
        // one step selects, the rest are clock cycles
        for _ in 0..=cycles {
            if self.bus.step(&mut self.device)? == BusState::Idle {
                return Err(VerificationError::protocol(
                    "transaction completed before the abort point",
                ));
            }
        }
        let record = self.bus.abort(&mut self.device)?;
        self.transactions += 1;
        debug!(
            command = ?record.transaction.command,
            cycles = record.cycles,
            "aborted"
        );
        Ok(())
    }

    /// Power on, then every scenario in turn until the first failure
    pub fn run_all(&mut self) -> ScenarioReport {
        let scenarios: [(&'static str, Scenario<D>); 10] = [
            ("power_on", Self::power_on),
            ("smoke", Self::smoke),
            ("fuzz_single", |r| r.fuzz(FuzzMode::Single)),
            ("fuzz_quad", |r| r.fuzz(FuzzMode::Quad)),
            ("fuzz_mixed", |r| r.fuzz(FuzzMode::Mixed)),
            ("wraparound", Self::wraparound),
            ("rom_check", Self::rom_check),
            ("entropy_check", Self::entropy_check),
            ("debug_scan", Self::debug_scan),
            ("abort_recovery", Self::abort_recovery),
        ];

        let mut report = ScenarioReport::default();
        for (name, scenario) in scenarios {
            let transactions = self.transactions;
            let start_ns = self.bus.now_ns();
            info!(scenario = name, "running");

            let result = scenario(self);
            let outcome = ScenarioOutcome {
                name,
                transactions: self.transactions - transactions,
                bus_time_ns: self.bus.now_ns() - start_ns,
                result,
            };
            let failed = !outcome.passed();
            if let Err(err) = &outcome.result {
                warn!(scenario = name, error = %err, "scenario failed");
            }
            report.outcomes.push(outcome);
            if failed {
                break;
            }
        }
        report
    }
}
