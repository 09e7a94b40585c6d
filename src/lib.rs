//! # Rusty QSPI
//!
//! A cycle-accurate SPI/QSPI bus exerciser and golden reference model for a
//! flash-style memory peripheral.
//!
//! This library provides:
//! - Bit/nibble framing of WRITE, READ, QUAD_WRITE and QUAD_READ
//! - Per-phase checks of the shared lane direction mask
//! - A golden model of the RAM window, ROM images and entropy region
//! - A debug scan port checker on its own free-running clock
//! - Directed and seeded randomized scenarios, plus bus/debug co-simulation
//! - JSON-configurable hardware revisions and a behavioral device model
//!
//! ```rust
//! use rusty_qspi::{BusTransaction, BusTransactor, RevisionConfig, SpiFlashModel};
//!
//! let revision = RevisionConfig::tt05();
//! let mut bus = BusTransactor::new(&revision);
//! let mut device = SpiFlashModel::new(&revision).unwrap();
//! bus.power_on(&mut device).unwrap();
//!
//! bus.run(&mut device, BusTransaction::write(1, &[1, 2, 3, 4])).unwrap();
//! let record = bus.run(&mut device, BusTransaction::read(257, 4)).unwrap();
//! assert_eq!(record.data, vec![1, 2, 3, 4]);
//! ```

pub mod bus;
pub mod component;
pub mod components;
pub mod cosim;
pub mod debug_scan;
pub mod error;
pub mod pin;
pub mod revision_config;
pub mod scenario;
pub mod types;

// Re-export commonly used items for easier importing
pub use bus::{BusState, BusTransactor};
pub use component::{ChipControl, DebugPort, SpiPeripheral};
pub use components::clock::{BitClock, DebugClock};
pub use components::common::{BusTransaction, Command, CommandCodec, DebugFrame, DirectionTracker, Lanes, Phase, TransactionRecord};
pub use components::memory::{ExpectedByte, GoldenMemoryModel, MemoryRegion};
pub use components::peripheral::SpiFlashModel;
pub use cosim::{CoSimReport, CoSimulation};
pub use debug_scan::DebugScanner;
pub use error::{Result, VerificationError};
pub use pin::{DirectionMask, PinValue};
pub use revision_config::RevisionConfig;
pub use scenario::{FuzzMode, ScenarioConfig, ScenarioReport, ScenarioRunner};
pub use types::U24;
