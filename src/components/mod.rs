pub mod clock;
pub mod common;
pub mod memory;
pub mod peripheral;
