//! Protocol pieces shared by the host-side exerciser and the device model.

pub mod codec;
pub mod command;
pub mod direction;
pub mod seven_seg;

pub use codec::{BusCycle, ByteAssembler, CommandCodec, HostDrive, SampleKind};
pub use command::{BusTransaction, Command, Direction, Lanes, MaskSample, Phase, TransactionRecord};
pub use direction::DirectionTracker;
pub use seven_seg::{DebugFrame, SEVEN_SEG_TABLE};
