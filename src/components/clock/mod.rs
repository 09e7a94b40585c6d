pub mod bit_clock;
pub mod debug_clock;

pub use bit_clock::BitClock;
pub use debug_clock::DebugClock;
