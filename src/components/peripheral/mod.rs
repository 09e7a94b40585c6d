//! Device models implementing the peripheral traits.

pub mod spi_flash;

pub use spi_flash::SpiFlashModel;
